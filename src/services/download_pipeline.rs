use std::path::Path;
use std::time::{Duration, Instant};

use futures_util::StreamExt;
use reqwest::Client;
use tokio::io::AsyncWriteExt;
use tokio::sync::watch;

use crate::errors::{LauncherError, Result};
use crate::models::DownloadProgress;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DownloadControl {
    Running,
    Cancelled,
}

/// Streams one HTTP resource to a file, reporting progress along the way. The file
/// either ends up complete or does not exist.
#[derive(Clone)]
pub struct DownloadPipeline {
    client: Client,
    progress_interval: Duration,
}

impl DownloadPipeline {
    pub fn with_client(client: Client, progress_interval: Duration) -> Self {
        Self {
            client,
            progress_interval,
        }
    }

    pub async fn download<F>(
        &self,
        url: &str,
        destination: &Path,
        cancel: Option<watch::Receiver<DownloadControl>>,
        on_progress: F,
    ) -> Result<DownloadProgress>
    where
        F: FnMut(DownloadProgress),
    {
        match self.stream_to_file(url, destination, cancel, on_progress).await {
            Ok(progress) => Ok(progress),
            Err(err) => {
                if let Err(remove_err) = tokio::fs::remove_file(destination).await {
                    if remove_err.kind() != std::io::ErrorKind::NotFound {
                        tracing::warn!(
                            "could not delete partial download {:?}: {}",
                            destination,
                            remove_err
                        );
                    }
                }
                Err(err)
            }
        }
    }

    async fn stream_to_file<F>(
        &self,
        url: &str,
        destination: &Path,
        mut cancel: Option<watch::Receiver<DownloadControl>>,
        mut on_progress: F,
    ) -> Result<DownloadProgress>
    where
        F: FnMut(DownloadProgress),
    {
        if is_cancelled(&cancel) {
            return Err(LauncherError::Cancelled);
        }

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| LauncherError::Connect(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(LauncherError::Server {
                status: status.as_u16(),
            });
        }

        let total_bytes = response.content_length();
        tracing::info!("download started url={} total={:?}", url, total_bytes);

        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::File::create(destination).await?;
        let mut stream = response.bytes_stream();
        let mut reporter = ProgressReporter::new(self.progress_interval, total_bytes);
        let mut downloaded = 0_u64;

        loop {
            tokio::select! {
                biased;
                _ = wait_for_cancel(&mut cancel) => {
                    tracing::info!("download cancelled url={} at={}", url, downloaded);
                    return Err(LauncherError::Cancelled);
                }
                next = stream.next() => {
                    let Some(next) = next else { break; };
                    let bytes = next.map_err(|err| LauncherError::Connect(err.to_string()))?;
                    file.write_all(&bytes).await?;
                    downloaded = downloaded.saturating_add(bytes.len() as u64);
                    if let Some(progress) = reporter.observe(downloaded) {
                        on_progress(progress);
                    }
                }
            }
        }
        file.flush().await?;
        drop(file);

        if let Some(total) = total_bytes {
            if downloaded < total {
                return Err(LauncherError::Connect(format!(
                    "connection closed after {} of {} bytes",
                    downloaded, total
                )));
            }
        }

        let progress = reporter.finish(downloaded);
        on_progress(progress);
        tracing::info!("download finished url={} bytes={}", url, downloaded);
        Ok(progress)
    }
}

fn is_cancelled(control: &Option<watch::Receiver<DownloadControl>>) -> bool {
    control
        .as_ref()
        .map(|rx| *rx.borrow() == DownloadControl::Cancelled)
        .unwrap_or(false)
}

/// Resolves once the control flips to `Cancelled`. Never resolves without a receiver
/// or after the sender is gone.
async fn wait_for_cancel(control: &mut Option<watch::Receiver<DownloadControl>>) {
    let Some(rx) = control.as_mut() else {
        return std::future::pending().await;
    };
    loop {
        if *rx.borrow_and_update() == DownloadControl::Cancelled {
            return;
        }
        if rx.changed().await.is_err() {
            return std::future::pending().await;
        }
    }
}

struct ProgressReporter {
    interval: Duration,
    total_bytes: Option<u64>,
    last_sent: Instant,
    last_downloaded: u64,
}

impl ProgressReporter {
    fn new(interval: Duration, total_bytes: Option<u64>) -> Self {
        Self {
            interval,
            total_bytes,
            last_sent: Instant::now(),
            last_downloaded: 0,
        }
    }

    fn observe(&mut self, downloaded: u64) -> Option<DownloadProgress> {
        if self.last_sent.elapsed() < self.interval {
            return None;
        }
        Some(self.snapshot(downloaded))
    }

    fn finish(&mut self, downloaded: u64) -> DownloadProgress {
        self.snapshot(downloaded)
    }

    fn snapshot(&mut self, downloaded: u64) -> DownloadProgress {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_sent).as_secs_f64().max(0.001);
        let delta = downloaded.saturating_sub(self.last_downloaded);
        self.last_sent = now;
        self.last_downloaded = downloaded;
        DownloadProgress {
            bytes_downloaded: downloaded,
            total_bytes: self.total_bytes,
            throughput_bps: delta as f64 / elapsed,
        }
    }
}
