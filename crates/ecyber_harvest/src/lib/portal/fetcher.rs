use std::{path::Path, time::Duration};

use anyhow::Context;
use ffmpeg_bindings::{Ffmpeg, MediaProcessor};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use tokio::io::AsyncWriteExt;

use crate::portal::SegmentFetcher;

/// Streams segments over HTTP and probes them with `ffprobe`.
#[derive(Clone)]
pub struct HttpSegmentFetcher {
    client: ClientWithMiddleware,
    ffmpeg: Ffmpeg,
}

impl HttpSegmentFetcher {
    const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
    const MAX_RETRIES: u32 = 3;

    pub fn new(ffmpeg: Ffmpeg) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Self::CONNECT_TIMEOUT)
            .build()?;
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(Self::MAX_RETRIES);
        let client = ClientBuilder::new(client)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self { client, ffmpeg })
    }
}

impl SegmentFetcher for HttpSegmentFetcher {
    #[tracing::instrument(skip(self, dest))]
    async fn fetch(&self, url: &str, dest: &Path) -> anyhow::Result<u64> {
        let mut resp = self
            .client
            .get(url)
            .send()
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Failed to make http request"))?
            .error_for_status()?;

        let total = resp.content_length().unwrap_or(0);
        let mut file = tokio::fs::File::create(dest)
            .await
            .with_context(|| format!("Failed to create {}", dest.display()))?;

        let mut written = 0u64;
        let mut last_reported = 0;
        while let Some(chunk) = resp.chunk().await? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;

            if total > 0 {
                let percent = written * 100 / total;
                if percent >= last_reported + 10 {
                    last_reported = percent - percent % 10;
                    tracing::debug!(percent, "Segment download progress");
                }
            }
        }
        file.flush().await?;

        tracing::info!(bytes = written, path = %dest.display(), "Segment downloaded");
        Ok(written)
    }

    async fn probe_duration(&self, path: &Path) -> anyhow::Result<f64> {
        Ok(self.ffmpeg.probe_duration(path).await?)
    }
}
