use std::{
    collections::{HashMap, HashSet},
    path::Path,
    sync::{Arc, Mutex},
};

use ecyber_harvest::portal::SegmentFetcher;
use tokio_util::sync::CancellationToken;

/// Writes the segment URL into the destination file, so probing can map the
/// file back to its scripted duration.
#[derive(Clone, Default)]
pub struct MockSegmentFetcher {
    pub calls: Arc<Mutex<Vec<String>>>,
    pub durations: HashMap<String, f64>,
    pub failing: HashSet<String>,
    /// Cancelled right after the first successful fetch.
    pub cancel_after_first: Option<CancellationToken>,
}

impl MockSegmentFetcher {
    pub fn with_durations<'a>(durations: impl IntoIterator<Item = (&'a str, f64)>) -> Self {
        Self {
            durations: durations
                .into_iter()
                .map(|(url, secs)| (url.to_string(), secs))
                .collect(),
            ..Default::default()
        }
    }

    pub fn failing_on(mut self, url: &str) -> Self {
        self.failing.insert(url.to_string());
        self
    }
}

impl SegmentFetcher for MockSegmentFetcher {
    async fn fetch(&self, url: &str, dest: &Path) -> anyhow::Result<u64> {
        self.calls.lock().unwrap().push(url.to_string());
        if self.failing.contains(url) {
            anyhow::bail!("404 Not Found: {url}");
        }

        tokio::fs::write(dest, url).await?;
        if let Some(cancel) = &self.cancel_after_first {
            cancel.cancel();
        }
        Ok(url.len() as u64)
    }

    async fn probe_duration(&self, path: &Path) -> anyhow::Result<f64> {
        let url = tokio::fs::read_to_string(path).await?;
        self.durations
            .get(&url)
            .copied()
            .ok_or_else(|| anyhow::anyhow!("ffprobe found no duration in {}", path.display()))
    }
}
