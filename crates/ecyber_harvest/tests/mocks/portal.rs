use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex},
};

use ecyber_harvest::{
    portal::{Portal, VideoPlayer, VideoSlot},
    types::{CourseToken, Credentials, LectureEntry, LectureUnit, SubjectEntry, WeekEntry},
};

pub const INTRO_URL: &str = "https://mock.portal/intro.mp4";

pub fn subject_row(title: &str, token: &str) -> SubjectEntry {
    SubjectEntry {
        title: title.to_string(),
        onclick: Some(format!("eclassRoom('{token}')")),
    }
}

pub fn week_row(week: u32, disabled: bool) -> WeekEntry {
    WeekEntry {
        label: format!("{week}주"),
        class: if disabled { "wb-week disabled" } else { "wb-week" }.to_string(),
    }
}

pub fn lecture_row(title: &str, param: &str) -> LectureEntry {
    LectureEntry {
        text: title.to_string(),
        onclick: Some(format!("viewGo('1','2','3','4','{param}')")),
    }
}

/// Scripted portal. Video sources are served from a single queue shared by
/// every lecture; an empty queue reads as "no source".
pub struct MockPortal {
    pub calls: Arc<Mutex<Vec<String>>>,
    pub subjects: Vec<SubjectEntry>,
    pub weeks: HashMap<String, Vec<WeekEntry>>,
    pub lectures: HashMap<(String, String), Vec<LectureEntry>>,
    pub sources: Arc<Mutex<VecDeque<Option<String>>>>,
    pub synced_video: Option<String>,
    pub single_video: Option<String>,
    pub announced: Option<String>,
    pub auth_pending: bool,
    pub fail_subjects: bool,
    pub current_course: Mutex<Option<String>>,
}

impl Default for MockPortal {
    fn default() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            subjects: Vec::new(),
            weeks: HashMap::new(),
            lectures: HashMap::new(),
            sources: Arc::new(Mutex::new(VecDeque::new())),
            synced_video: Some("https://mock.portal/lecture.mp4".to_string()),
            single_video: None,
            announced: Some("30".to_string()),
            auth_pending: false,
            fail_subjects: false,
            current_course: Mutex::new(None),
        }
    }
}

impl MockPortal {
    pub fn with_subject(mut self, title: &str, token: &str) -> Self {
        self.subjects.push(subject_row(title, token));
        self
    }

    pub fn with_week(mut self, token: &str, week: u32, disabled: bool, rows: Vec<LectureEntry>) -> Self {
        let entry = week_row(week, disabled);
        self.lectures
            .insert((token.to_string(), entry.label.clone()), rows);
        self.weeks.entry(token.to_string()).or_default().push(entry);
        self
    }

    pub fn with_sources<'a>(self, sources: impl IntoIterator<Item = &'a str>) -> Self {
        self.sources
            .lock()
            .unwrap()
            .extend(sources.into_iter().map(|s| Some(s.to_string())));
        self
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }
}

impl Portal for MockPortal {
    async fn sign_in(&self, credentials: &Credentials) -> anyhow::Result<()> {
        self.record(format!("sign_in:{}", credentials.username));
        Ok(())
    }

    async fn open_regular_subjects(&self) -> anyhow::Result<()> {
        self.record("open_regular_subjects");
        Ok(())
    }

    async fn scrape_subjects(&self) -> anyhow::Result<Vec<SubjectEntry>> {
        self.record("scrape_subjects");
        if self.fail_subjects {
            anyhow::bail!("course list did not load");
        }
        Ok(self.subjects.clone())
    }

    async fn scrape_weeks(&self, token: &CourseToken) -> anyhow::Result<Vec<WeekEntry>> {
        self.record(format!("scrape_weeks:{token}"));
        *self.current_course.lock().unwrap() = Some(token.to_string());
        self.weeks
            .get(token.as_str())
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("unknown course {token}"))
    }

    async fn scrape_week_lectures(&self, week: &WeekEntry) -> anyhow::Result<Vec<LectureEntry>> {
        self.record(format!("scrape_week_lectures:{}", week.label));
        let course = self.current_course.lock().unwrap().clone().unwrap_or_default();
        Ok(self
            .lectures
            .get(&(course, week.label.clone()))
            .cloned()
            .unwrap_or_default())
    }

    async fn open_lecture(&self, token: &CourseToken, lecture: &LectureUnit) -> anyhow::Result<()> {
        self.record(format!("open_lecture:{token}:{}:{}", lecture.week, lecture.title));
        Ok(())
    }

    async fn secondary_auth_pending(&self) -> anyhow::Result<bool> {
        Ok(self.auth_pending)
    }

    async fn enter_player(&self) -> anyhow::Result<()> {
        self.record("enter_player");
        Ok(())
    }

    async fn show_message(&self, message: &str) -> anyhow::Result<()> {
        self.record(format!("show_message:{message}"));
        Ok(())
    }

    async fn quit(&self) -> anyhow::Result<()> {
        self.record("quit");
        Ok(())
    }
}

impl VideoPlayer for MockPortal {
    fn intro_video_url(&self) -> String {
        INTRO_URL.to_string()
    }

    async fn start_playback(&self) -> anyhow::Result<()> {
        self.record("start_playback");
        Ok(())
    }

    async fn locate_video(&self, slot: VideoSlot) -> anyhow::Result<Option<String>> {
        self.record(format!("locate_video:{slot:?}"));
        Ok(match slot {
            VideoSlot::Synced => self.synced_video.clone(),
            VideoSlot::Single => self.single_video.clone(),
        })
    }

    async fn current_source(&self) -> anyhow::Result<Option<String>> {
        Ok(self.sources.lock().unwrap().pop_front().flatten())
    }

    async fn announced_duration(&self) -> anyhow::Result<Option<String>> {
        Ok(self.announced.clone())
    }

    async fn seek_forward(&self) -> anyhow::Result<()> {
        self.record("seek_forward");
        Ok(())
    }

    async fn leave_player(&self) -> anyhow::Result<()> {
        self.record("leave_player");
        Ok(())
    }
}
