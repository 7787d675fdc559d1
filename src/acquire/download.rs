//! Streaming HTTP download with progress and cancellation.

use crate::install::{DownloadError, ProgressEvent, ProgressFn, SetupError};
use crate::{InstallerSettings, StepResult};
use futures::StreamExt;
use reqwest::Client;
use std::path::Path;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

/// Progress granularity: one event per this many bytes written.
pub const CHUNK_SIZE: usize = 8 * 1024;

/// Downloads files over HTTP.
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct Downloader {
    client: Client,
}

impl Downloader {
    /// Build a downloader with the configured timeout and user agent.
    pub fn new(settings: &InstallerSettings) -> Result<Self, SetupError> {
        let client = Client::builder()
            .timeout(settings.http_timeout())
            .user_agent(&settings.user_agent)
            .build()
            .map_err(SetupError::HttpClient)?;
        Ok(Self { client })
    }

    /// Download `url` to `dest`.
    ///
    /// Parent directories are created as needed. A progress event follows
    /// every [`CHUNK_SIZE`] bytes written. On cancellation the result is
    /// [`StepStatus::Cancelled`] with no details; on any other error it is a
    /// failure carrying the error text. A partially written file is removed
    /// in both cases.
    ///
    /// [`StepStatus::Cancelled`]: crate::StepStatus::Cancelled
    pub async fn download_file(
        &self,
        url: &str,
        dest: &Path,
        cancel: &CancellationToken,
        on_progress: ProgressFn<'_>,
    ) -> StepResult {
        tracing::info!("Downloading {} to {}", url, dest.display());

        match self.stream_to_file(url, dest, cancel, on_progress).await {
            Ok(size) => {
                tracing::info!("Downloaded {} ({})", dest.display(), crate::install::format_bytes(size));
                StepResult::success("Download completed successfully")
                    .with_path(dest)
                    .with_file_size(size)
            }
            Err(DownloadError::Cancelled) => {
                remove_partial(dest).await;
                tracing::info!("Download of {} was cancelled", url);
                StepResult::cancelled("Download was cancelled")
            }
            Err(e) => {
                remove_partial(dest).await;
                tracing::error!("Download of {} failed: {}", url, e);
                let message = match &e {
                    DownloadError::Status { status } => format!("Download failed with status: {}", status),
                    _ => "Download failed".to_string(),
                };
                StepResult::failure(message).with_details(e.to_string())
            }
        }
    }

    async fn stream_to_file(
        &self,
        url: &str,
        dest: &Path,
        cancel: &CancellationToken,
        on_progress: ProgressFn<'_>,
    ) -> Result<u64, DownloadError> {
        let io_err = |source: std::io::Error| DownloadError::Io {
            path: dest.to_path_buf(),
            source,
        };
        let request_err = |source: reqwest::Error| DownloadError::Request {
            url: url.to_string(),
            source,
        };

        if cancel.is_cancelled() {
            return Err(DownloadError::Cancelled);
        }

        if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(io_err)?;
        }

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(DownloadError::Cancelled),
            response = self.client.get(url).send() => response.map_err(request_err)?,
        };

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::Status { status });
        }

        let total = response.content_length().unwrap_or(0);
        let file_name = dest
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut file = fs::File::create(dest).await.map_err(io_err)?;
        let mut stream = response.bytes_stream();
        let mut received: u64 = 0;

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(DownloadError::Cancelled),
                next = stream.next() => next,
            };
            let Some(bytes) = next.transpose().map_err(request_err)? else {
                break;
            };

            for piece in bytes.chunks(CHUNK_SIZE) {
                if cancel.is_cancelled() {
                    return Err(DownloadError::Cancelled);
                }
                file.write_all(piece).await.map_err(io_err)?;
                received += piece.len() as u64;
                on_progress(ProgressEvent::download(&file_name, received, total));
            }
        }

        file.flush().await.map_err(io_err)?;
        Ok(received)
    }
}

async fn remove_partial(dest: &Path) {
    match fs::remove_file(dest).await {
        Ok(()) => tracing::debug!("Removed partial download {}", dest.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("Failed to remove partial download {}: {}", dest.display(), e),
    }
}
