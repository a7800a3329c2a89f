use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use tokio::sync::watch;
use uuid::Uuid;
use zip::ZipArchive;

use crate::errors::{LauncherError, Result};
use crate::models::{ApplicationRecord, InstallPhase, InstalledAppInfo, ProgressUpdate};
use crate::services::download_pipeline::{DownloadControl, DownloadPipeline};
use crate::services::install_state::{is_safe_app_name, InstallStateTracker, INCOMPLETE_MARKER};
use crate::services::platform::PlatformAdapter;
use crate::utils::file::remove_dir_if_exists;

const DOWNLOAD_PREFIX: &str = ".tiwut-download-";
pub const SETUP_SCRIPT_FILE: &str = "module_py.tiwut";

fn is_safe_relative_path(path: &Path) -> bool {
    path.components().all(|component| {
        !matches!(
            component,
            Component::Prefix(_) | Component::RootDir | Component::ParentDir
        )
    })
}

/// Dependency commands shipped with an app, one per line. Blank lines and `#` comments
/// are dropped.
pub fn parse_setup_commands(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

#[derive(Clone)]
pub struct ArchiveInstaller {
    tracker: InstallStateTracker,
    pipeline: DownloadPipeline,
    platform: Arc<dyn PlatformAdapter>,
    run_setup_commands: bool,
}

impl ArchiveInstaller {
    pub fn new(
        tracker: InstallStateTracker,
        pipeline: DownloadPipeline,
        platform: Arc<dyn PlatformAdapter>,
    ) -> Self {
        Self {
            tracker,
            pipeline,
            platform,
            run_setup_commands: true,
        }
    }

    pub fn with_setup_commands(mut self, enabled: bool) -> Self {
        self.run_setup_commands = enabled;
        self
    }

    pub fn tracker(&self) -> &InstallStateTracker {
        &self.tracker
    }

    /// Downloads and unpacks `app` into its install directory.
    ///
    /// The directory carries the incomplete marker until the very last step, and any
    /// failure after the existing-install check (cancellation included) removes it
    /// again, so the app is either fully installed or absent.
    pub async fn install<F>(
        &self,
        app: &ApplicationRecord,
        cancel: Option<watch::Receiver<DownloadControl>>,
        mut on_progress: F,
    ) -> Result<PathBuf>
    where
        F: FnMut(ProgressUpdate) + Send,
    {
        log_phase(&app.name, InstallPhase::Preparing);
        let dir = self.tracker.app_dir(&app.name)?;
        if self.tracker.is_installed(&app.name) {
            return Err(LauncherError::AlreadyInstalled(app.name.clone()));
        }

        let result = match prepare_install_dir(&app.name, &dir) {
            Ok(()) => self.run_install(app, &dir, cancel, &mut on_progress).await,
            Err(err) => Err(err),
        };
        match result {
            Ok(()) => {
                tracing::info!("install complete app={} dir={:?}", app.name, dir);
                Ok(dir)
            }
            Err(err) => {
                tracing::warn!("install failed app={}: {}", app.name, err);
                if let Err(cleanup_err) = remove_dir_if_exists(&dir) {
                    tracing::error!(
                        "rollback could not remove {:?} for app={}: {}",
                        dir,
                        app.name,
                        cleanup_err
                    );
                }
                Err(err)
            }
        }
    }

    async fn run_install<F>(
        &self,
        app: &ApplicationRecord,
        dir: &Path,
        cancel: Option<watch::Receiver<DownloadControl>>,
        on_progress: &mut F,
    ) -> Result<()>
    where
        F: FnMut(ProgressUpdate) + Send,
    {
        on_progress(ProgressUpdate::status(Some(0.0), "Connecting..."));

        log_phase(&app.name, InstallPhase::Downloading);
        let archive = dir.join(download_file_name());
        let label = format!("Downloading {}...", app.name);
        self.pipeline
            .download(&app.download_url, &archive, cancel.clone(), |progress| {
                on_progress(ProgressUpdate::from_download(progress, label.as_str()))
            })
            .await?;

        if cancel
            .as_ref()
            .map(|rx| *rx.borrow() == DownloadControl::Cancelled)
            .unwrap_or(false)
        {
            return Err(LauncherError::Cancelled);
        }

        log_phase(&app.name, InstallPhase::Extracting);
        on_progress(ProgressUpdate::status(None, "Extracting files..."));
        let archive_path = archive.clone();
        let target_dir = dir.to_path_buf();
        let extracted = tokio::task::spawn_blocking(move || {
            extract_zip_archive(&archive_path, &target_dir)
        })
        .await
        .map_err(|err| LauncherError::Archive(format!("extraction task failed: {err}")))??;
        tracing::info!("extracted app={} files={}", app.name, extracted);

        log_phase(&app.name, InstallPhase::Finalizing);
        tokio::fs::remove_file(&archive).await?;

        let entry_point = dir.join(self.platform.entry_point_name());
        if entry_point.is_file() {
            self.platform.mark_executable(&entry_point)?;
        } else {
            tracing::warn!(
                "package for app={} has no {}",
                app.name,
                self.platform.entry_point_name()
            );
        }

        if self.run_setup_commands {
            self.run_setup_script(app, dir);
        }

        self.tracker
            .write_metadata(&InstalledAppInfo::from_record(app))?;
        fs::remove_file(dir.join(INCOMPLETE_MARKER))?;

        log_phase(&app.name, InstallPhase::Complete);
        on_progress(ProgressUpdate::status(Some(100.0), "Installation Complete"));
        Ok(())
    }

    fn run_setup_script(&self, app: &ApplicationRecord, dir: &Path) {
        let script = dir.join(SETUP_SCRIPT_FILE);
        let raw = match fs::read_to_string(&script) {
            Ok(raw) => raw,
            Err(_) => return,
        };
        let commands = parse_setup_commands(&raw);
        if commands.is_empty() {
            return;
        }
        tracing::info!(
            "running {} setup commands for app={}",
            commands.len(),
            app.name
        );
        if let Err(err) = self.platform.open_setup_terminal(dir, &commands) {
            tracing::warn!("setup commands for app={} not started: {}", app.name, err);
        }
    }

    /// Removes the install directory, then the shortcut. If the tree cannot be removed
    /// the shortcut is left alone and the app stays installed.
    pub fn uninstall(&self, name: &str) -> Result<()> {
        if !is_safe_app_name(name) {
            return Err(LauncherError::InvalidName(name.to_string()));
        }
        let dir = self.tracker.app_dir(name)?;
        if !dir.exists() {
            return Err(LauncherError::NotInstalled(name.to_string()));
        }

        fs::remove_dir_all(&dir).map_err(|err| LauncherError::Uninstall {
            name: name.to_string(),
            reason: err.to_string(),
        })?;
        self.platform
            .remove_shortcut(name)
            .map_err(|err| LauncherError::Uninstall {
                name: name.to_string(),
                reason: format!("files removed but shortcut remains: {err}"),
            })?;
        tracing::info!("uninstalled app={} dir={:?}", name, dir);
        Ok(())
    }
}

/// Wipes a leftover interrupted install and creates the marked directory.
fn prepare_install_dir(name: &str, dir: &Path) -> Result<()> {
    if dir.is_dir() {
        tracing::info!("wiping interrupted install app={} dir={:?}", name, dir);
        fs::remove_dir_all(dir)?;
    } else if dir.exists() {
        fs::remove_file(dir)?;
    }
    create_marked_dir(dir)
}

/// A directory without its marker would count as installed, so it is removed again
/// when the marker cannot be written.
fn create_marked_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)?;
    if let Err(err) = fs::write(dir.join(INCOMPLETE_MARKER), chrono::Utc::now().to_rfc3339()) {
        let _ = remove_dir_if_exists(dir);
        return Err(err.into());
    }
    Ok(())
}

/// Hidden per-install name for the downloaded package, so it never collides with a file
/// shipped inside the package.
fn download_file_name() -> String {
    format!("{}{}.zip", DOWNLOAD_PREFIX, Uuid::new_v4())
}

fn log_phase(app: &str, phase: InstallPhase) {
    tracing::info!("install phase app={} phase={}", app, phase.as_str());
}

/// Extracts every safe entry of `archive_path` below `install_dir`. Returns the number of
/// files written.
fn extract_zip_archive(archive_path: &Path, install_dir: &Path) -> Result<usize> {
    let file = File::open(archive_path)?;
    let mut archive =
        ZipArchive::new(file).map_err(|err| LauncherError::Archive(err.to_string()))?;
    let mut written = 0;
    let mut buffer = vec![0_u8; 64 * 1024];

    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|err| LauncherError::Archive(err.to_string()))?;
        let name = entry.name().replace('\\', "/");
        if name.is_empty() {
            continue;
        }
        let entry_path = Path::new(&name);
        if install_dir.join(entry_path) == archive_path {
            tracing::warn!("skipping archive entry that shadows the download {:?}", name);
            continue;
        }
        if !is_safe_relative_path(entry_path) {
            tracing::warn!("skipping unsafe archive entry {:?}", name);
            continue;
        }
        let out_path = install_dir.join(entry_path);
        if entry.is_dir() {
            fs::create_dir_all(&out_path)?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut outfile = File::create(&out_path)?;
        loop {
            let read = entry
                .read(&mut buffer)
                .map_err(|err| LauncherError::Archive(format!("{}: {}", name, err)))?;
            if read == 0 {
                break;
            }
            outfile.write_all(&buffer[..read])?;
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = entry.unix_mode().filter(|mode| mode & 0o111 != 0) {
                let _ = fs::set_permissions(&out_path, fs::Permissions::from_mode(mode & 0o777));
            }
        }
        written += 1;
    }
    Ok(written)
}
