use std::{
    collections::BTreeMap,
    fmt,
    path::{Path, PathBuf},
};

use serde::Serialize;

use crate::parser::sanitize_filename;

/// Opaque per-course navigation token passed to the portal's `eclassRoom(...)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct CourseToken(String);

impl CourseToken {
    pub fn new(token: impl Into<String>) -> Self {
        CourseToken(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CourseToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Subject {
    pub title: String,
    pub token: CourseToken,
}

/// An inline `viewGo(...)` call that opens a lecture's player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumeScript {
    pub(crate) raw: String,
    pub(crate) param: String,
}

impl ResumeScript {
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The last `viewGo` argument. Locked lectures carry an empty one.
    pub fn param(&self) -> &str {
        &self.param
    }

    pub fn is_available(&self) -> bool {
        !self.param.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LectureUnit {
    pub week: u32,
    pub title: String,
    pub script: ResumeScript,
    /// 1-based rank among the week's lectures sharing this title.
    pub occurrence: u32,
}

impl LectureUnit {
    /// Name used for the lecture's folder and files. Repeated titles get a
    /// ` (n)` suffix so they never share output paths.
    pub fn output_name(&self) -> String {
        match self.occurrence {
            0 | 1 => self.title.clone(),
            n => format!("{} ({n})", self.title),
        }
    }
}

/// Available lectures of one subject keyed by week number.
pub type WeekLectures = BTreeMap<u32, Vec<LectureUnit>>;

#[derive(Debug, Clone, PartialEq)]
pub struct DownloadedSegment {
    pub url: String,
    pub path: PathBuf,
    pub duration_secs: u64,
}

/// Raw subject row scraped from the course list.
#[derive(Debug, Clone, Default)]
pub struct SubjectEntry {
    pub title: String,
    pub onclick: Option<String>,
}

/// Raw week container scraped from the weeks view.
#[derive(Debug, Clone, Default)]
pub struct WeekEntry {
    pub label: String,
    pub class: String,
}

/// Raw clickable row carrying a `viewGo(...)` handler.
#[derive(Debug, Clone, Default)]
pub struct LectureEntry {
    pub text: String,
    pub onclick: Option<String>,
}

#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubjectSelection {
    All,
    One(Subject),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeekSelection {
    All,
    Only(u32),
}

impl From<u32> for WeekSelection {
    /// `0` selects every week.
    fn from(week: u32) -> Self {
        match week {
            0 => WeekSelection::All,
            n => WeekSelection::Only(n),
        }
    }
}

impl WeekSelection {
    pub fn filter(&self, lectures: &WeekLectures) -> WeekLectures {
        match self {
            WeekSelection::All => lectures.clone(),
            WeekSelection::Only(week) => lectures
                .get_key_value(week)
                .map(|(week, units)| (*week, units.clone()))
                .into_iter()
                .collect(),
        }
    }
}

/// On-disk layout of one lecture: `<subject>/<n>주차/<lecture>/{mp4,mp3}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LectureDirs {
    pub base: PathBuf,
    pub mp4: PathBuf,
    pub mp3: PathBuf,
}

impl LectureDirs {
    pub fn new(download_dir: &Path, subject: &str, week: u32, lecture: &str) -> Self {
        let base = download_dir
            .join(sanitize_filename(subject))
            .join(format!("{week}주차"))
            .join(sanitize_filename(lecture));

        LectureDirs {
            mp4: base.join("mp4"),
            mp3: base.join("mp3"),
            base,
        }
    }

    pub async fn create(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.mp4).await?;
        tokio::fs::create_dir_all(&self.mp3).await
    }

    /// True when a previous run already produced an MP3 for this lecture.
    pub async fn has_audio(&self) -> bool {
        let Ok(mut entries) = tokio::fs::read_dir(&self.mp3).await else {
            return false;
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            if entry.path().extension().is_some_and(|ext| ext == "mp3") {
                return true;
            }
        }
        false
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LectureOutcome {
    /// Captured up to the announced duration.
    Complete { audio: Option<PathBuf> },
    /// The poll budget ran out before the announced duration was reached.
    Incomplete { audio: Option<PathBuf> },
    Skipped,
    Cancelled,
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct HarvestSummary {
    pub completed: usize,
    pub incomplete: usize,
    pub skipped: usize,
    pub failed: Vec<String>,
    pub cancelled: bool,
}

impl HarvestSummary {
    pub(crate) fn record(&mut self, outcome: &LectureOutcome) {
        match outcome {
            LectureOutcome::Complete { .. } => self.completed += 1,
            LectureOutcome::Incomplete { .. } => self.incomplete += 1,
            LectureOutcome::Skipped => self.skipped += 1,
            LectureOutcome::Cancelled => self.cancelled = true,
        }
    }
}
