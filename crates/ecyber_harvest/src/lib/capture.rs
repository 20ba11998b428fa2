//! Segment capture: follows the player's `<video src>` as it swaps segments
//! and downloads each new one until the announced duration is covered.

use std::time::Duration;

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::{
    parser::sanitize_filename,
    portal::{SegmentFetcher, VideoPlayer, VideoSlot},
    types::{DownloadedSegment, LectureDirs},
};

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("No video element found in the player")]
    VideoNotFound,
    #[error(transparent)]
    Player(#[from] anyhow::Error),
}

/// Bounded retry with a fixed delay between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    pub fn is_exhausted(&self, attempts: u32) -> bool {
        attempts >= self.max_attempts
    }
}

#[derive(Debug, Clone)]
pub struct CapturePolicy {
    /// Pause after every `src` read.
    pub poll_delay: Duration,
    /// Budget for consecutive reads that yield no new segment.
    pub misses: RetryPolicy,
    /// Capture counts as complete at `announced - completion_slack_secs`.
    pub completion_slack_secs: u64,
    /// Used when the player does not announce a total duration.
    pub fallback_total_secs: u64,
    /// How long the intro placeholder plays before the lecture video appears.
    pub intro_wait: Duration,
}

impl Default for CapturePolicy {
    fn default() -> Self {
        Self {
            poll_delay: Duration::from_secs(1),
            misses: RetryPolicy::fixed(999, Duration::from_secs(2)),
            completion_slack_secs: 1,
            fallback_total_secs: 99_999,
            intro_wait: Duration::from_secs(8),
        }
    }
}

/// Running sum of downloaded segment durations against the announced total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DurationTally {
    target_secs: u64,
    accumulated_secs: u64,
}

impl DurationTally {
    pub fn new(announced_secs: u64, slack_secs: u64) -> Self {
        Self {
            target_secs: announced_secs.saturating_sub(slack_secs),
            accumulated_secs: 0,
        }
    }

    /// Adds a segment and reports whether the target is now reached.
    pub fn add(&mut self, secs: u64) -> bool {
        self.accumulated_secs += secs;
        self.is_complete()
    }

    pub fn is_complete(&self) -> bool {
        self.accumulated_secs >= self.target_secs
    }

    pub fn accumulated_secs(&self) -> u64 {
        self.accumulated_secs
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOutcome {
    Complete,
    Exhausted,
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct CaptureReport {
    pub segments: Vec<DownloadedSegment>,
    pub downloaded_secs: u64,
    pub announced_secs: u64,
    pub outcome: CaptureOutcome,
}

/// Locates the lecture video, skipping the intro placeholder.
///
/// Returns the `src` of the located element.
#[tracing::instrument(skip(player, policy))]
pub async fn locate_lecture_video<P: VideoPlayer>(
    player: &P,
    intro_url: &str,
    policy: &CapturePolicy,
) -> Result<String, CaptureError> {
    let mut source = player
        .locate_video(VideoSlot::Synced)
        .await?
        .filter(|src| !src.is_empty());
    if source.is_none() {
        source = player.locate_video(VideoSlot::Single).await?;
    }
    let source = source.ok_or(CaptureError::VideoNotFound)?;

    if source != intro_url {
        return Ok(source);
    }

    tracing::info!("Intro video found, waiting for the lecture video");
    sleep(policy.intro_wait).await;
    player
        .locate_video(VideoSlot::Single)
        .await?
        .ok_or(CaptureError::VideoNotFound)
}

/// Polls the located video's `src` and downloads every new segment into
/// `dirs.mp4` until their summed duration reaches the announced total, the
/// miss budget runs out, or `cancel` fires.
#[tracing::instrument(skip(player, fetcher, dirs, policy, cancel))]
pub async fn capture_segments<P, F>(
    player: &P,
    fetcher: &F,
    dirs: &LectureDirs,
    title: &str,
    announced_secs: u64,
    policy: &CapturePolicy,
    cancel: &CancellationToken,
) -> Result<CaptureReport, CaptureError>
where
    P: VideoPlayer,
    F: SegmentFetcher,
{
    let mut tally = DurationTally::new(announced_secs, policy.completion_slack_secs);
    let mut segments = Vec::new();
    let mut previous_url: Option<String> = None;
    let mut segment_no = 1;
    let mut misses = 0;

    let outcome = loop {
        if cancel.is_cancelled() {
            break CaptureOutcome::Cancelled;
        }

        let source = player.current_source().await?;
        sleep(policy.poll_delay).await;

        let Some(url) = source.filter(|src| !src.is_empty() && previous_url.as_ref() != Some(src))
        else {
            misses += 1;
            if policy.misses.is_exhausted(misses) {
                tracing::warn!(misses, "No new segment after repeated polls, giving up");
                break CaptureOutcome::Exhausted;
            }
            sleep(policy.misses.delay).await;
            player.seek_forward().await?;
            continue;
        };

        let path = dirs
            .mp4
            .join(sanitize_filename(&format!("{title}_{segment_no}.mp4")));
        segment_no += 1;
        misses = 0;
        previous_url = Some(url.clone());

        tracing::info!(%url, path = %path.display(), "Downloading segment");
        if let Err(e) = fetcher.fetch(&url, &path).await {
            tracing::error!(error = ?e, %url, "Failed to download segment, skipping");
            continue;
        }

        let duration_secs = fetcher
            .probe_duration(&path)
            .await
            .inspect_err(|e| tracing::warn!(error = ?e, path = %path.display(), "Failed to probe segment duration"))
            .map(|secs| secs.max(0.0) as u64)
            .unwrap_or(0);

        segments.push(DownloadedSegment {
            url,
            path,
            duration_secs,
        });

        let complete = tally.add(duration_secs);
        tracing::info!(
            downloaded_secs = tally.accumulated_secs(),
            announced_secs,
            "Segment captured"
        );
        if complete {
            break CaptureOutcome::Complete;
        }
    };

    Ok(CaptureReport {
        segments,
        downloaded_secs: tally.accumulated_secs(),
        announced_secs,
        outcome,
    })
}
