use std::{
    ops::Deref,
    path::{Path, PathBuf},
};

use ffmpeg_bindings::{Ffmpeg, MediaProcessor};

use crate::portal::MediaHandler;

#[derive(Debug, Clone, Default)]
pub struct FfmpegWrapper(pub Ffmpeg);

impl Deref for FfmpegWrapper {
    type Target = Ffmpeg;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl MediaHandler for FfmpegWrapper {
    async fn merge(&self, segments: &[PathBuf], output: &Path) -> anyhow::Result<()> {
        self.concat_videos(segments, output)
            .await
            .inspect_err(|e| tracing::error!(error = ?e, "Failed to merge segments"))?;
        Ok(())
    }

    async fn extract_audio(&self, video: &Path, output: &Path) -> anyhow::Result<()> {
        MediaProcessor::extract_audio(&self.0, video, output)
            .await
            .inspect_err(|e| tracing::error!(error = ?e, "Failed to extract audio"))?;
        Ok(())
    }
}
