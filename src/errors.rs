use std::io;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LauncherError {
    #[error("Could not load app library from {url}: {reason}")]
    Fetch { url: String, reason: String },
    #[error("Connection failed: {0}")]
    Connect(String),
    #[error("Server returned HTTP {status}")]
    Server { status: u16 },
    #[error("Filesystem error: {0}")]
    Filesystem(#[from] io::Error),
    #[error("Invalid archive: {0}")]
    Archive(String),
    #[error("{0} is already installed")]
    AlreadyInstalled(String),
    #[error("{0} is not installed")]
    NotInstalled(String),
    #[error("Failed to uninstall {name}: {reason}")]
    Uninstall { name: String, reason: String },
    #[error("Failed to launch {name}: {reason}")]
    Launch { name: String, reason: String },
    #[error("Another operation is in progress for {0}")]
    Busy(String),
    #[error("Operation cancelled")]
    Cancelled,
    #[error("Invalid application name: {0:?}")]
    InvalidName(String),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Config error: {0}")]
    Config(String),
    #[error("Update error: {0}")]
    Update(String),
}

impl LauncherError {
    /// Network-side failures are worth retrying; everything else needs the user to
    /// look at permissions, disk space or the package itself.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LauncherError::Fetch { .. } | LauncherError::Connect(_) | LauncherError::Server { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, LauncherError>;
