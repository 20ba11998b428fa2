//! # FFmpeg bindings
//!
//! Thin async wrappers around the `ffmpeg` and `ffprobe` binaries for the
//! three operations lecture post-processing needs: probing a file's
//! duration, joining segments and pulling the audio track out as MP3.

use std::{
    future::Future,
    path::{Path, PathBuf},
    process::Output,
};

use tokio::process::Command;

#[derive(Debug, thiserror::Error)]
pub enum FfmpegError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("`{program}` exited with {status}: {stderr}")]
    CommandFailed {
        program: String,
        status: std::process::ExitStatus,
        stderr: String,
    },
    #[error("Invalid output from `{program}`: {output}")]
    InvalidOutput { program: String, output: String },
    #[error("No input files given")]
    NoInputs,
}

pub type Result<T> = std::result::Result<T, FfmpegError>;

pub trait MediaProcessor {
    /// Duration of the media file in seconds, read from the container.
    fn probe_duration(&self, input: impl AsRef<Path>) -> impl Future<Output = Result<f64>>;

    /// Joins `inputs` in order into `output` without re-encoding.
    fn concat_videos(
        &self,
        inputs: &[PathBuf],
        output: impl AsRef<Path>,
    ) -> impl Future<Output = Result<()>>;

    /// Extracts the audio track of `input` into an MP3 file at `output`.
    fn extract_audio(
        &self,
        input: impl AsRef<Path>,
        output: impl AsRef<Path>,
    ) -> impl Future<Output = Result<()>>;
}

#[derive(Debug, Clone)]
pub struct Ffmpeg {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
}

impl Default for Ffmpeg {
    fn default() -> Self {
        Self {
            ffmpeg: "ffmpeg".into(),
            ffprobe: "ffprobe".into(),
        }
    }
}

impl Ffmpeg {
    pub fn new(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }

    async fn run(program: &Path, command: &mut Command) -> Result<Output> {
        let output = command.output().await?;
        if !output.status.success() {
            return Err(FfmpegError::CommandFailed {
                program: program.display().to_string(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(output)
    }
}

impl MediaProcessor for Ffmpeg {
    #[tracing::instrument(skip_all, fields(input = %input.as_ref().display()))]
    async fn probe_duration(&self, input: impl AsRef<Path>) -> Result<f64> {
        let output = Self::run(
            &self.ffprobe,
            Command::new(&self.ffprobe)
                .args(["-v", "error", "-show_entries", "format=duration"])
                .args(["-of", "default=noprint_wrappers=1:nokey=1"])
                .arg(input.as_ref()),
        )
        .await?;

        parse_duration_output(&String::from_utf8_lossy(&output.stdout)).ok_or_else(|| {
            FfmpegError::InvalidOutput {
                program: self.ffprobe.display().to_string(),
                output: String::from_utf8_lossy(&output.stdout).into_owned(),
            }
        })
    }

    #[tracing::instrument(skip_all, fields(count = inputs.len(), output = %output.as_ref().display()))]
    async fn concat_videos(&self, inputs: &[PathBuf], output: impl AsRef<Path>) -> Result<()> {
        if inputs.is_empty() {
            return Err(FfmpegError::NoInputs);
        }

        let output = output.as_ref();
        let manifest_path = output.with_extension("concat.txt");
        tokio::fs::write(&manifest_path, concat_manifest(inputs)?).await?;

        let result = Self::run(
            &self.ffmpeg,
            Command::new(&self.ffmpeg)
                .args(["-y", "-f", "concat", "-safe", "0", "-i"])
                .arg(&manifest_path)
                .args(["-c", "copy"])
                .arg(output),
        )
        .await;

        if let Err(e) = tokio::fs::remove_file(&manifest_path).await {
            tracing::warn!(error = ?e, path = ?manifest_path, "Failed to remove concat manifest");
        }

        result.map(|_| ())
    }

    #[tracing::instrument(skip_all, fields(input = %input.as_ref().display()))]
    async fn extract_audio(&self, input: impl AsRef<Path>, output: impl AsRef<Path>) -> Result<()> {
        Self::run(
            &self.ffmpeg,
            Command::new(&self.ffmpeg)
                .args(["-y", "-i"])
                .arg(input.as_ref())
                .args(["-vn", "-acodec", "libmp3lame", "-q:a", "2"])
                .arg(output.as_ref()),
        )
        .await?;
        Ok(())
    }
}

/// Parses the bare `format=duration` value printed by ffprobe.
fn parse_duration_output(stdout: &str) -> Option<f64> {
    stdout
        .lines()
        .next()
        .and_then(|line| line.trim().parse::<f64>().ok())
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
}

/// Renders an input list for ffmpeg's concat demuxer.
///
/// The demuxer resolves relative entries against the list's own folder, so
/// every entry is made absolute against the working directory first.
fn concat_manifest(inputs: &[PathBuf]) -> std::io::Result<String> {
    inputs
        .iter()
        .map(|path| {
            let path = std::path::absolute(path)?;
            let escaped = path.display().to_string().replace('\'', r"'\''");
            Ok(format!("file '{escaped}'\n"))
        })
        .collect()
}
