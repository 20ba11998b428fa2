//! # Portal Parser
//!
//! This module turns raw rows scraped from the e-cyber portal (link `onclick`
//! handlers, week labels, container classes) into subjects and lecture units.
//! Nothing here touches the browser, so the rules can be exercised directly.

use std::sync::LazyLock;

use regex::Regex;

use crate::{
    error::Error,
    types::{
        CourseToken, LectureEntry, LectureUnit, ResumeScript, Subject, SubjectEntry, WeekLectures,
    },
};

static ECLASS_ROOM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"eclassRoom\('(.+?)'\)").unwrap());

static VIEW_GO_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"viewGo\([^,]+,[^,]+,[^,]+,[^,]+,'(.*?)'\)").unwrap()
});

static RESERVED_FILENAME_CHARS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[\\/*?:"<>|]"#).unwrap());

pub const UNTITLED_LECTURE: &str = "Untitled lecture";

/// Extracts the course token from a subject link's `onclick` handler.
pub fn parse_course_token(onclick: &str) -> Option<CourseToken> {
    ECLASS_ROOM_RE
        .captures(onclick)
        .and_then(|cap| cap.get(1))
        .map(|m| CourseToken::new(m.as_str()))
}

impl ResumeScript {
    /// Parses a `viewGo(a, b, c, d, '<param>')` handler.
    ///
    /// # Returns
    /// * `Some(ResumeScript)` when the handler has the five-argument shape,
    ///   whether or not the final parameter is empty.
    /// * `None` for anything else.
    pub fn parse(onclick: &str) -> Option<Self> {
        VIEW_GO_RE
            .captures(onclick)
            .and_then(|cap| cap.get(1))
            .map(|m| ResumeScript {
                raw: onclick.to_string(),
                param: m.as_str().trim().to_string(),
            })
    }
}

/// Week containers carrying `disabled` or `unavail` in their class list are locked.
pub fn is_week_disabled(class: &str) -> bool {
    let class = class.to_lowercase();
    class.contains("disabled") || class.contains("unavail")
}

/// Parses a week label such as `3주` into its number.
pub fn parse_week_label(label: &str) -> Option<u32> {
    label.replace('주', "").trim().parse().ok()
}

/// Parses the announced total duration (seconds) from the player's meta tag.
pub fn parse_announced_duration(content: &str) -> Option<u64> {
    let content = content.trim();
    content.parse::<u64>().ok().or_else(|| {
        content
            .parse::<f64>()
            .ok()
            .filter(|secs| secs.is_finite() && *secs >= 0.0)
            .map(|secs| secs as u64)
    })
}

/// Replaces characters that are reserved in file names with `_`.
pub fn sanitize_filename(name: &str) -> String {
    RESERVED_FILENAME_CHARS_RE.replace_all(name, "_").into_owned()
}

impl TryFrom<SubjectEntry> for Subject {
    type Error = Error;

    /// Attempts to create a `Subject` from a course list row.
    ///
    /// # Returns
    /// * `Ok(Subject)` if the link handler carries an `eclassRoom('...')` call.
    /// * `Err(Error::ParseError)` otherwise.
    fn try_from(SubjectEntry { title, onclick }: SubjectEntry) -> Result<Self, Self::Error> {
        let onclick = onclick.ok_or(Error::ParseError(
            "Subject link has no 'onclick' attribute",
        ))?;
        let token = parse_course_token(&onclick).ok_or(Error::ParseError(
            "Failed to extract eclassRoom token from subject link",
        ))?;

        Ok(Subject {
            title: title.trim().to_string(),
            token,
        })
    }
}

/// Parses subjects from course list rows, skipping rows without a token.
#[tracing::instrument(skip_all, fields(rows = entries.len()))]
pub fn parse_subjects(entries: Vec<SubjectEntry>) -> Vec<Subject> {
    entries
        .into_iter()
        .filter_map(|entry| {
            let title = entry.title.clone();
            Subject::try_from(entry)
                .inspect(|subject| tracing::info!(title = %subject.title, token = %subject.token, "Found subject"))
                .inspect_err(|e| tracing::warn!(%title, error = %e, "Skipping subject"))
                .ok()
        })
        .collect()
}

/// Turns the rows of one week into lecture units, keeping unavailable ones.
pub fn parse_lecture_rows(week: u32, rows: Vec<LectureEntry>) -> Vec<LectureUnit> {
    rows.into_iter()
        .filter_map(|LectureEntry { text, onclick }| {
            let script = ResumeScript::parse(onclick.as_deref()?)?;
            let title = match text.trim() {
                "" => UNTITLED_LECTURE.to_string(),
                title => title.to_string(),
            };
            Some(LectureUnit {
                week,
                title,
                script,
                occurrence: 1,
            })
        })
        .collect()
}

/// Groups lecture units by week, dropping unavailable ones.
///
/// Weeks left without any available lecture are absent from the result.
/// Units sharing a title are all kept, in scrape order, and numbered
/// through [`LectureUnit::occurrence`].
pub fn group_lectures(units: impl IntoIterator<Item = LectureUnit>) -> WeekLectures {
    let mut lectures = WeekLectures::new();
    for mut unit in units.into_iter().filter(|u| u.script.is_available()) {
        let week = lectures.entry(unit.week).or_default();
        unit.occurrence = week.iter().filter(|u| u.title == unit.title).count() as u32 + 1;
        week.push(unit);
    }
    lectures
}
