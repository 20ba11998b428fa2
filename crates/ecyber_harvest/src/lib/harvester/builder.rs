use std::path::PathBuf;

use tokio_util::sync::CancellationToken;

use crate::{
    auth::AuthGate,
    capture::CapturePolicy,
    config::HarvestSettings,
    portal::{MediaHandler, Portal, SegmentFetcher, VideoPlayer},
    LectureHarvester,
};

pub struct LectureHarvesterBuilder<P = (), F = (), M = ()> {
    settings: HarvestSettings,
    portal: P,
    fetcher: F,
    media: M,
    auth_gate: Option<AuthGate>,
    cancel: CancellationToken,
}

impl LectureHarvesterBuilder {
    pub fn new(download_dir: impl Into<PathBuf>) -> Self {
        Self {
            settings: HarvestSettings {
                download_dir: download_dir.into(),
                ..Default::default()
            },
            portal: (),
            fetcher: (),
            media: (),
            auth_gate: None,
            cancel: CancellationToken::new(),
        }
    }
}

impl<P, F, M> LectureHarvesterBuilder<P, F, M> {
    pub fn portal<P2: Portal + VideoPlayer>(self, portal: P2) -> LectureHarvesterBuilder<P2, F, M> {
        LectureHarvesterBuilder {
            settings: self.settings,
            portal,
            fetcher: self.fetcher,
            media: self.media,
            auth_gate: self.auth_gate,
            cancel: self.cancel,
        }
    }

    pub fn fetcher<F2: SegmentFetcher>(self, fetcher: F2) -> LectureHarvesterBuilder<P, F2, M> {
        LectureHarvesterBuilder {
            settings: self.settings,
            portal: self.portal,
            fetcher,
            media: self.media,
            auth_gate: self.auth_gate,
            cancel: self.cancel,
        }
    }

    pub fn media_handler<M2: MediaHandler>(self, media: M2) -> LectureHarvesterBuilder<P, F, M2> {
        LectureHarvesterBuilder {
            settings: self.settings,
            portal: self.portal,
            fetcher: self.fetcher,
            media,
            auth_gate: self.auth_gate,
            cancel: self.cancel,
        }
    }

    /// Without a gate, a lecture behind secondary authentication fails.
    pub fn auth_gate(mut self, gate: AuthGate) -> Self {
        self.auth_gate = Some(gate);
        self
    }

    pub fn cancellation_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn skip_existing(mut self, skip: bool) -> Self {
        self.settings.skip_existing = skip;
        self
    }

    pub fn capture_policy(mut self, policy: CapturePolicy) -> Self {
        self.settings.capture = policy;
        self
    }
}

impl<P, F, M> LectureHarvesterBuilder<P, F, M>
where
    P: Portal + VideoPlayer,
    F: SegmentFetcher,
    M: MediaHandler,
{
    pub fn build(self) -> LectureHarvester<P, F, M> {
        LectureHarvester {
            settings: self.settings,
            portal: self.portal,
            fetcher: self.fetcher,
            media: self.media,
            auth_gate: self.auth_gate,
            cancel: self.cancel,
        }
    }
}
