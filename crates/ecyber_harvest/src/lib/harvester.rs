pub mod builder;

use std::path::PathBuf;

use anyhow::Context;
use tokio_util::sync::CancellationToken;

use crate::{
    auth::{AuthError, AuthGate},
    capture::{capture_segments, locate_lecture_video, CaptureOutcome},
    config::HarvestSettings,
    context::HarvestContext,
    parser::{
        group_lectures, is_week_disabled, parse_announced_duration, parse_lecture_rows,
        parse_subjects, parse_week_label, sanitize_filename,
    },
    portal::{MediaHandler, Portal, SegmentFetcher, VideoPlayer},
    types::{
        Credentials, DownloadedSegment, HarvestSummary, LectureDirs, LectureOutcome, LectureUnit,
        Subject, SubjectSelection, WeekLectures, WeekSelection,
    },
};

const SELECT_SUBJECT_MESSAGE: &str =
    "Choose a subject in the program. Please do not touch this page.";
const SECONDARY_AUTH_MESSAGE: &str =
    "Please complete the identity check. You may use this page now.";

/// Drives the portal through discovery, capture and post-processing of
/// lectures, one at a time.
pub struct LectureHarvester<P, F, M>
where
    P: Portal + VideoPlayer,
    F: SegmentFetcher,
    M: MediaHandler,
{
    settings: HarvestSettings,
    portal: P,
    fetcher: F,
    media: M,
    auth_gate: Option<AuthGate>,
    cancel: CancellationToken,
}

impl<P, F, M> LectureHarvester<P, F, M>
where
    P: Portal + VideoPlayer,
    F: SegmentFetcher,
    M: MediaHandler,
{
    pub fn settings(&self) -> &HarvestSettings {
        &self.settings
    }

    /// Token that force-stops the run when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Logs in and lands on the regular subjects tab.
    #[tracing::instrument(skip_all)]
    pub async fn sign_in(&self, credentials: &Credentials) -> anyhow::Result<()> {
        self.portal.sign_in(credentials).await?;
        self.portal.open_regular_subjects().await?;
        Ok(())
    }

    #[tracing::instrument(skip_all)]
    pub async fn load_subjects(&self, ctx: &mut HarvestContext) -> anyhow::Result<Vec<Subject>> {
        let entries = self
            .portal
            .scrape_subjects()
            .await
            .inspect_err(|e| tracing::error!(error = ?e, "Failed to load subjects"))?;

        let subjects = parse_subjects(entries);
        tracing::info!(count = subjects.len(), "Subjects loaded");
        ctx.set_subjects(subjects.clone());

        if let Err(e) = self.portal.show_message(SELECT_SUBJECT_MESSAGE).await {
            tracing::warn!(error = ?e, "Failed to update overlay message");
        }
        Ok(subjects)
    }

    /// Available week numbers of `subject`, scraping them on first use.
    #[tracing::instrument(skip(self, ctx), fields(subject = %subject.title))]
    pub async fn load_weeks(
        &self,
        ctx: &mut HarvestContext,
        subject: &Subject,
    ) -> anyhow::Result<Vec<u32>> {
        if let Some(weeks) = ctx.available_weeks(&subject.token) {
            tracing::info!(?weeks, "Weeks loaded from cache");
            return Ok(weeks);
        }

        let lectures = self.discover_lectures(subject).await?;
        let weeks = lectures.keys().copied().collect::<Vec<_>>();
        tracing::info!(?weeks, "Weeks loaded");
        ctx.insert_lectures(subject.token.clone(), lectures);
        Ok(weeks)
    }

    async fn discover_lectures(&self, subject: &Subject) -> anyhow::Result<WeekLectures> {
        let weeks = self.portal.scrape_weeks(&subject.token).await?;

        let mut units = Vec::new();
        for week in weeks {
            if is_week_disabled(&week.class) {
                tracing::debug!(week = %week.label, "Week is unavailable, skipping");
                continue;
            }
            let Some(week_no) = parse_week_label(&week.label) else {
                tracing::debug!(week = %week.label, "Week label is not numeric, skipping");
                continue;
            };

            let rows = self.portal.scrape_week_lectures(&week).await?;
            let week_units = parse_lecture_rows(week_no, rows);
            let available = week_units.iter().filter(|u| u.script.is_available()).count();
            tracing::info!(week = week_no, available, "Collected lectures");
            units.extend(week_units);
        }

        Ok(group_lectures(units))
    }

    /// Downloads the selected subjects' lectures in week order.
    ///
    /// Per-lecture failures are logged and counted, never fatal.
    #[tracing::instrument(skip(self, ctx))]
    pub async fn download(
        &self,
        ctx: &mut HarvestContext,
        selection: &SubjectSelection,
        weeks: WeekSelection,
    ) -> anyhow::Result<HarvestSummary> {
        let subjects = match selection {
            SubjectSelection::One(subject) => vec![subject.clone()],
            SubjectSelection::All if ctx.subjects().is_empty() => self.load_subjects(ctx).await?,
            SubjectSelection::All => ctx.subjects().to_vec(),
        };

        let mut summary = HarvestSummary::default();
        for subject in subjects {
            if self.cancel.is_cancelled() {
                summary.cancelled = true;
                break;
            }

            if let Err(e) = self.load_weeks(ctx, &subject).await {
                tracing::error!(subject = %subject.title, error = ?e, "Failed to load lectures");
                summary.failed.push(subject.title.clone());
                continue;
            }
            let lectures = ctx
                .lectures(&subject.token)
                .map(|lectures| weeks.filter(lectures))
                .unwrap_or_default();

            tracing::info!(
                subject = %subject.title,
                weeks = ?lectures.keys().collect::<Vec<_>>(),
                "Downloading subject"
            );
            self.harvest_subject(&subject, &lectures, &mut summary).await;
        }

        tracing::info!(?summary, "Download finished");
        Ok(summary)
    }

    async fn harvest_subject(
        &self,
        subject: &Subject,
        lectures: &WeekLectures,
        summary: &mut HarvestSummary,
    ) {
        for lecture in lectures.values().flatten() {
            if self.cancel.is_cancelled() {
                summary.cancelled = true;
                return;
            }

            match self.harvest_lecture(subject, lecture).await {
                Ok(outcome) => summary.record(&outcome),
                Err(e) => {
                    tracing::error!(
                        subject = %subject.title,
                        week = lecture.week,
                        lecture = %lecture.title,
                        error = ?e,
                        "Lecture failed, moving on"
                    );
                    if matches!(e.downcast_ref::<AuthError>(), Some(AuthError::Cancelled)) {
                        summary.cancelled = true;
                        return;
                    }
                    summary.failed.push(format!(
                        "{} / {}주 / {}",
                        subject.title,
                        lecture.week,
                        lecture.output_name()
                    ));
                }
            }
        }
    }

    #[tracing::instrument(skip_all, fields(subject = %subject.title, week = lecture.week, lecture = %lecture.title))]
    async fn harvest_lecture(
        &self,
        subject: &Subject,
        lecture: &LectureUnit,
    ) -> anyhow::Result<LectureOutcome> {
        let name = lecture.output_name();
        let dirs = LectureDirs::new(
            &self.settings.download_dir,
            &subject.title,
            lecture.week,
            &name,
        );
        if self.settings.skip_existing && dirs.has_audio().await {
            tracing::info!(path = %dirs.mp3.display(), "Audio already exists, skipping");
            return Ok(LectureOutcome::Skipped);
        }

        self.portal.open_lecture(&subject.token, lecture).await?;
        if self.portal.secondary_auth_pending().await? {
            self.confirm_secondary_auth().await?;
        }
        self.portal.enter_player().await?;

        dirs.create()
            .await
            .with_context(|| format!("Failed to create {}", dirs.base.display()))?;

        let capture = self.capture(&dirs, &name).await;
        if let Err(e) = self.portal.leave_player().await {
            tracing::warn!(error = ?e, "Failed to leave the player frame");
        }
        let report = capture?;

        let audio = match report.outcome {
            CaptureOutcome::Cancelled => return Ok(LectureOutcome::Cancelled),
            _ => self.finalize(&dirs, &name, &report.segments).await,
        };

        match report.outcome {
            CaptureOutcome::Complete => {
                tracing::info!(downloaded_secs = report.downloaded_secs, "Lecture downloaded");
                Ok(LectureOutcome::Complete { audio })
            }
            _ => {
                tracing::warn!(
                    downloaded_secs = report.downloaded_secs,
                    announced_secs = report.announced_secs,
                    "Lecture download stopped before the announced duration"
                );
                Ok(LectureOutcome::Incomplete { audio })
            }
        }
    }

    async fn confirm_secondary_auth(&self) -> anyhow::Result<()> {
        let gate = self.auth_gate.as_ref().ok_or(AuthError::NoConfirmer)?;

        if let Err(e) = self.portal.show_message(SECONDARY_AUTH_MESSAGE).await {
            tracing::warn!(error = ?e, "Failed to update overlay message");
        }
        tracing::info!("Secondary authentication dialog shown, waiting for the user");
        gate.request_confirmation(&self.cancel).await?;
        tracing::info!("Secondary authentication confirmed");
        Ok(())
    }

    async fn capture(
        &self,
        dirs: &LectureDirs,
        title: &str,
    ) -> anyhow::Result<crate::capture::CaptureReport> {
        let policy = &self.settings.capture;

        self.portal.start_playback().await?;
        locate_lecture_video(&self.portal, &self.portal.intro_video_url(), policy).await?;

        let announced_secs = self
            .portal
            .announced_duration()
            .await?
            .as_deref()
            .and_then(parse_announced_duration)
            .unwrap_or_else(|| {
                tracing::warn!(
                    fallback = policy.fallback_total_secs,
                    "No announced duration, using fallback"
                );
                policy.fallback_total_secs
            });
        tracing::info!(announced_secs, "Announced lecture duration");

        Ok(capture_segments(
            &self.portal,
            &self.fetcher,
            dirs,
            title,
            announced_secs,
            policy,
            &self.cancel,
        )
        .await?)
    }

    /// Merges the captured segments if needed and extracts the audio track.
    ///
    /// Returns the MP3 path, or `None` when nothing could be produced.
    async fn finalize(
        &self,
        dirs: &LectureDirs,
        title: &str,
        segments: &[DownloadedSegment],
    ) -> Option<PathBuf> {
        let video = match segments {
            [] => {
                tracing::warn!("No segments were downloaded");
                return None;
            }
            [single] => single.path.clone(),
            [first, ..] => {
                let merged = dirs
                    .mp4
                    .join(sanitize_filename(&format!("{title}_merged.mp4")));
                let paths = segments.iter().map(|s| s.path.clone()).collect::<Vec<_>>();

                match self.media.merge(&paths, &merged).await {
                    Ok(()) => {
                        tracing::info!(path = %merged.display(), count = paths.len(), "Segments merged");
                        for path in &paths {
                            if let Err(e) = tokio::fs::remove_file(path).await {
                                tracing::warn!(error = ?e, path = %path.display(), "Failed to remove segment");
                            }
                        }
                        merged
                    }
                    Err(e) => {
                        tracing::error!(error = ?e, "Failed to merge segments, using the first one");
                        first.path.clone()
                    }
                }
            }
        };

        let stem = video.file_stem()?.to_string_lossy().into_owned();
        let mp3 = dirs.mp3.join(format!("{stem}.mp3"));
        match self.media.extract_audio(&video, &mp3).await {
            Ok(()) => {
                tracing::info!(path = %mp3.display(), "Audio extracted");
                Some(mp3)
            }
            Err(e) => {
                tracing::error!(error = ?e, "Failed to extract audio");
                None
            }
        }
    }

    /// Tears down the browser session.
    pub async fn shutdown(&self) {
        if let Err(e) = self.portal.quit().await {
            tracing::warn!(error = ?e, "Failed to close the browser session");
        }
    }
}
