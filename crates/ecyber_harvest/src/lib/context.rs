use std::collections::HashMap;

use crate::{
    error::Error,
    types::{CourseToken, Subject, WeekLectures},
};

/// Per-run discovery state: the subject list and the lectures scraped for
/// each course, keyed by course token.
#[derive(Debug, Default)]
pub struct HarvestContext {
    subjects: Vec<Subject>,
    lectures: HashMap<CourseToken, WeekLectures>,
}

impl HarvestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subjects(&self) -> &[Subject] {
        &self.subjects
    }

    pub(crate) fn set_subjects(&mut self, subjects: Vec<Subject>) {
        self.subjects = subjects;
    }

    /// Looks a subject up by exact title first, then by course token.
    pub fn find_subject(&self, query: &str) -> Result<&Subject, Error> {
        let query = query.trim();
        self.subjects
            .iter()
            .find(|s| s.title == query)
            .or_else(|| self.subjects.iter().find(|s| s.token.as_str() == query))
            .ok_or_else(|| Error::UnknownSubject(query.to_string()))
    }

    pub fn lectures(&self, token: &CourseToken) -> Option<&WeekLectures> {
        self.lectures.get(token)
    }

    pub(crate) fn insert_lectures(&mut self, token: CourseToken, lectures: WeekLectures) {
        self.lectures.insert(token, lectures);
    }

    /// Week numbers with at least one available lecture, ascending.
    pub fn available_weeks(&self, token: &CourseToken) -> Option<Vec<u32>> {
        self.lectures
            .get(token)
            .map(|lectures| lectures.keys().copied().collect())
    }
}
