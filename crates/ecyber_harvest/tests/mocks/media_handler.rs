use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use ecyber_harvest::portal::MediaHandler;

#[derive(Clone, Default)]
pub struct MockMediaHandler {
    pub merges: Arc<Mutex<Vec<(Vec<PathBuf>, PathBuf)>>>,
    pub extractions: Arc<Mutex<Vec<(PathBuf, PathBuf)>>>,
    pub fail_merge: bool,
}

impl MockMediaHandler {
    pub fn failing_merge() -> Self {
        Self {
            fail_merge: true,
            ..Default::default()
        }
    }
}

impl MediaHandler for MockMediaHandler {
    async fn merge(&self, segments: &[PathBuf], output: &Path) -> anyhow::Result<()> {
        self.merges
            .lock()
            .unwrap()
            .push((segments.to_vec(), output.to_path_buf()));
        if self.fail_merge {
            anyhow::bail!("ffmpeg exited with status 1");
        }
        tokio::fs::write(output, b"merged").await?;
        Ok(())
    }

    async fn extract_audio(&self, video: &Path, output: &Path) -> anyhow::Result<()> {
        self.extractions
            .lock()
            .unwrap()
            .push((video.to_path_buf(), output.to_path_buf()));
        tokio::fs::write(output, b"mp3").await?;
        Ok(())
    }
}
