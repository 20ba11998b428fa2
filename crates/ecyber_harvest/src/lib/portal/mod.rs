pub mod browser;
pub mod fetcher;
pub mod media_handler;

use std::{
    future::Future,
    path::{Path, PathBuf},
};

use crate::types::{
    CourseToken, Credentials, LectureEntry, LectureUnit, SubjectEntry, WeekEntry,
};

/// Navigation and scraping against the e-learning portal.
pub trait Portal {
    fn sign_in(&self, credentials: &Credentials) -> impl Future<Output = anyhow::Result<()>>;

    /// Switches the course list to the regular subjects tab.
    fn open_regular_subjects(&self) -> impl Future<Output = anyhow::Result<()>>;

    fn scrape_subjects(&self) -> impl Future<Output = anyhow::Result<Vec<SubjectEntry>>>;

    /// Enters the course's weeks view and lists every week container.
    fn scrape_weeks(
        &self,
        token: &CourseToken,
    ) -> impl Future<Output = anyhow::Result<Vec<WeekEntry>>>;

    /// Opens `week` in the weeks view entered by [`Portal::scrape_weeks`] and
    /// lists its `viewGo(...)` rows.
    fn scrape_week_lectures(
        &self,
        week: &WeekEntry,
    ) -> impl Future<Output = anyhow::Result<Vec<LectureEntry>>>;

    /// Re-enters the course, opens the lecture's week and runs its resume script.
    fn open_lecture(
        &self,
        token: &CourseToken,
        lecture: &LectureUnit,
    ) -> impl Future<Output = anyhow::Result<()>>;

    /// Whether the secondary authentication dialog is showing.
    fn secondary_auth_pending(&self) -> impl Future<Output = anyhow::Result<bool>>;

    /// Dismisses the entry prompt and waits for the player page.
    fn enter_player(&self) -> impl Future<Output = anyhow::Result<()>>;

    /// Shows `message` on the automation overlay.
    fn show_message(&self, message: &str) -> impl Future<Output = anyhow::Result<()>>;

    fn quit(&self) -> impl Future<Output = anyhow::Result<()>>;
}

/// The two places the player may mount its `<video>` element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoSlot {
    /// The synchronized (slides + video) player.
    Synced,
    /// The plain single-video player.
    Single,
}

/// The lecture video player, once the player page is open.
pub trait VideoPlayer {
    fn intro_video_url(&self) -> String;

    /// Starts playback and enters the player frame.
    fn start_playback(&self) -> impl Future<Output = anyhow::Result<()>>;

    /// Locates the video element in `slot`, remembering it for later polls.
    ///
    /// Returns `Ok(None)` when the slot holds no video element.
    fn locate_video(&self, slot: VideoSlot)
        -> impl Future<Output = anyhow::Result<Option<String>>>;

    /// Current `src` of the located video element.
    fn current_source(&self) -> impl Future<Output = anyhow::Result<Option<String>>>;

    /// Raw content of the player's total-duration meta tag.
    fn announced_duration(&self) -> impl Future<Output = anyhow::Result<Option<String>>>;

    /// Nudges playback forward so the player loads the next segment.
    fn seek_forward(&self) -> impl Future<Output = anyhow::Result<()>>;

    /// Leaves the player frame.
    fn leave_player(&self) -> impl Future<Output = anyhow::Result<()>>;
}

pub trait SegmentFetcher {
    /// Downloads `url` to `dest`, returning the number of bytes written.
    fn fetch(&self, url: &str, dest: &Path) -> impl Future<Output = anyhow::Result<u64>>;

    /// Duration of a downloaded segment in seconds.
    fn probe_duration(&self, path: &Path) -> impl Future<Output = anyhow::Result<f64>>;
}

pub trait MediaHandler {
    fn merge(&self, segments: &[PathBuf], output: &Path)
        -> impl Future<Output = anyhow::Result<()>>;

    fn extract_audio(&self, video: &Path, output: &Path)
        -> impl Future<Output = anyhow::Result<()>>;
}
