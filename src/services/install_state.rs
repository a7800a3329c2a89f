use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::{LauncherError, Result};
use crate::models::{ApplicationRecord, InstalledAppInfo};
use crate::services::catalog_service::Catalog;
use crate::utils::file::write_atomic;

pub const METADATA_FILE: &str = "app_info.json";
pub const INCOMPLETE_MARKER: &str = ".install-incomplete";

/// Rejects names that would resolve outside the install root.
pub fn is_safe_app_name(name: &str) -> bool {
    let trimmed = name.trim();
    if trimmed.is_empty() || trimmed == "." || trimmed == ".." {
        return false;
    }
    if name.contains(['/', '\\', '\0']) {
        return false;
    }
    // Drive-relative paths such as `c:evil` only exist on Windows.
    !(cfg!(windows) && name.contains(':'))
}

/// Answers "is this app installed?" from the filesystem alone. Nothing is cached, so
/// callers re-query after every install or uninstall.
#[derive(Clone, Debug)]
pub struct InstallStateTracker {
    install_root: PathBuf,
}

impl InstallStateTracker {
    pub fn new(install_root: PathBuf) -> Self {
        Self { install_root }
    }

    pub fn install_root(&self) -> &Path {
        &self.install_root
    }

    pub fn app_dir(&self, name: &str) -> Result<PathBuf> {
        if !is_safe_app_name(name) {
            return Err(LauncherError::InvalidName(name.to_string()));
        }
        Ok(self.install_root.join(name))
    }

    pub fn is_installed(&self, name: &str) -> bool {
        match self.app_dir(name) {
            Ok(dir) => dir.is_dir() && !dir.join(INCOMPLETE_MARKER).exists(),
            Err(_) => false,
        }
    }

    pub fn list_installed(&self, catalog: &Catalog) -> Vec<ApplicationRecord> {
        let mut installed: Vec<ApplicationRecord> = catalog
            .records()
            .iter()
            .filter(|record| self.is_installed(&record.name))
            .cloned()
            .collect();

        for local in self.scan_local() {
            if catalog.find(&local.name).is_none() {
                installed.push(local);
            }
        }
        installed
    }

    /// Complete installs with readable metadata, sorted by name. Used when the catalog
    /// cannot be reached.
    pub fn scan_local(&self) -> Vec<ApplicationRecord> {
        let entries = match fs::read_dir(&self.install_root) {
            Ok(entries) => entries,
            Err(_) => return Vec::new(),
        };

        let mut records = Vec::new();
        for entry in entries.flatten() {
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if !self.is_installed(&name) {
                continue;
            }
            match self.read_metadata(&name) {
                Ok(Some(info)) => {
                    let mut record = info.into_record();
                    record.name = name;
                    records.push(record);
                }
                Ok(None) => {}
                Err(err) => tracing::warn!("unreadable metadata for {}: {}", name, err),
            }
        }
        records.sort_by(|a, b| a.name.cmp(&b.name));
        records
    }

    pub fn read_metadata(&self, name: &str) -> Result<Option<InstalledAppInfo>> {
        let path = self.app_dir(name)?.join(METADATA_FILE);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        Ok(Some(serde_json::from_str(&raw)?))
    }

    pub fn write_metadata(&self, info: &InstalledAppInfo) -> Result<()> {
        let path = self.app_dir(&info.name)?.join(METADATA_FILE);
        let json = serde_json::to_string_pretty(info)?;
        write_atomic(&path, json.as_bytes())?;
        Ok(())
    }

    /// Rewrites missing or icon-less metadata from the catalog. Returns the number of
    /// files written.
    pub fn heal_metadata(&self, catalog: &Catalog) -> usize {
        let mut healed = 0;
        for record in catalog.records() {
            if !self.is_installed(&record.name) {
                continue;
            }
            let needs_repair = match self.read_metadata(&record.name) {
                Ok(Some(info)) => !info.has_icon() && record.icon_url.is_some(),
                Ok(None) | Err(_) => true,
            };
            if !needs_repair {
                continue;
            }
            let mut info = InstalledAppInfo::from_record(record);
            if let Ok(Some(previous)) = self.read_metadata(&record.name) {
                info.installed_at = previous.installed_at;
            }
            match self.write_metadata(&info) {
                Ok(()) => {
                    tracing::info!("metadata healed for {}", record.name);
                    healed += 1;
                }
                Err(err) => tracing::warn!("metadata heal failed for {}: {}", record.name, err),
            }
        }
        healed
    }

    /// Removes directories left behind by an interrupted install.
    pub fn sweep_incomplete(&self) -> Vec<String> {
        let entries = match fs::read_dir(&self.install_root) {
            Ok(entries) => entries,
            Err(_) => return Vec::new(),
        };

        let mut removed = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_dir() || !path.join(INCOMPLETE_MARKER).exists() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            match fs::remove_dir_all(&path) {
                Ok(()) => {
                    tracing::info!("removed interrupted install {}", name);
                    removed.push(name);
                }
                Err(err) => tracing::warn!("could not remove interrupted install {}: {}", name, err),
            }
        }
        removed.sort();
        removed
    }
}
