use serde::{Deserialize, Serialize};

use crate::utils::format::format_bytes;

/// One installable application as announced by a catalog manifest.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ApplicationRecord {
    pub name: String,
    pub download_url: String,
    #[serde(rename = "website_url", alias = "info_url", default)]
    pub info_url: Option<String>,
    #[serde(default)]
    pub icon_url: Option<String>,
}

/// Contents of `app_info.json`, written into every completed install directory.
///
/// Older launcher builds wrote empty strings for missing links, so every optional field
/// is normalized through [`InstalledAppInfo::into_record`].
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct InstalledAppInfo {
    pub name: String,
    #[serde(default)]
    pub download_url: String,
    #[serde(default)]
    pub website_url: Option<String>,
    #[serde(default)]
    pub icon_url: Option<String>,
    #[serde(default)]
    pub installed_at: Option<String>,
}

impl InstalledAppInfo {
    pub fn from_record(app: &ApplicationRecord) -> Self {
        Self {
            name: app.name.clone(),
            download_url: app.download_url.clone(),
            website_url: app.info_url.clone(),
            icon_url: app.icon_url.clone(),
            installed_at: Some(chrono::Utc::now().to_rfc3339()),
        }
    }

    pub fn into_record(self) -> ApplicationRecord {
        ApplicationRecord {
            name: self.name,
            download_url: self.download_url,
            info_url: non_empty(self.website_url),
            icon_url: non_empty(self.icon_url),
        }
    }

    pub fn has_icon(&self) -> bool {
        self.icon_url
            .as_deref()
            .map(|value| !value.trim().is_empty())
            .unwrap_or(false)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|inner| inner.trim().to_string())
        .filter(|inner| !inner.is_empty())
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DownloadProgress {
    pub bytes_downloaded: u64,
    pub total_bytes: Option<u64>,
    pub throughput_bps: f64,
}

impl DownloadProgress {
    /// `None` while the server has not announced a length.
    pub fn percentage(&self) -> Option<f64> {
        match self.total_bytes {
            Some(0) => Some(100.0),
            Some(total) => Some((self.bytes_downloaded as f64 / total as f64 * 100.0).min(100.0)),
            None => None,
        }
    }

    pub fn info_text(&self) -> String {
        let rate = format!("{}/s", format_bytes(self.throughput_bps as u64));
        match self.total_bytes {
            Some(total) => format!(
                "{}  |  {} / {}",
                rate,
                format_bytes(self.bytes_downloaded),
                format_bytes(total)
            ),
            None => format!("{}  |  {}", rate, format_bytes(self.bytes_downloaded)),
        }
    }
}

/// The `(percentage, status, info)` triple handed to progress observers.
#[derive(Clone, Debug, PartialEq)]
pub struct ProgressUpdate {
    pub percentage: Option<f64>,
    pub status: String,
    pub info: String,
    pub progress: Option<DownloadProgress>,
}

impl ProgressUpdate {
    pub fn status(percentage: Option<f64>, status: impl Into<String>) -> Self {
        Self {
            percentage,
            status: status.into(),
            info: String::new(),
            progress: None,
        }
    }

    pub fn from_download(progress: DownloadProgress, status: impl Into<String>) -> Self {
        Self {
            percentage: progress.percentage(),
            status: status.into(),
            info: progress.info_text(),
            progress: Some(progress),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InstallPhase {
    Preparing,
    Downloading,
    Extracting,
    Finalizing,
    Complete,
}

impl InstallPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstallPhase::Preparing => "preparing",
            InstallPhase::Downloading => "downloading",
            InstallPhase::Extracting => "extracting",
            InstallPhase::Finalizing => "finalizing",
            InstallPhase::Complete => "complete",
        }
    }
}

/// Messages posted by worker tasks to whoever owns the UI state.
#[derive(Clone, Debug, PartialEq)]
pub enum InstallEvent {
    Progress { app: String, update: ProgressUpdate },
    Completed { app: String, message: String },
    Failed { app: String, operation: String, message: String },
}

impl InstallEvent {
    pub fn app(&self) -> &str {
        match self {
            InstallEvent::Progress { app, .. }
            | InstallEvent::Completed { app, .. }
            | InstallEvent::Failed { app, .. } => app,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, InstallEvent::Progress { .. })
    }
}
