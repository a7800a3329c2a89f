use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::errors::{LauncherError, Result};
use crate::models::{ApplicationRecord, InstallEvent};
use crate::services::archive_installer::ArchiveInstaller;
use crate::services::download_pipeline::DownloadControl;

#[derive(Clone)]
struct InstallHandle {
    control: watch::Sender<DownloadControl>,
}

/// Runs installs on worker tasks and reports back over an event channel. Only one
/// install may be in flight at a time.
#[derive(Clone)]
pub struct InstallManager {
    installer: ArchiveInstaller,
    events: mpsc::UnboundedSender<InstallEvent>,
    registry: Arc<Mutex<HashMap<String, InstallHandle>>>,
}

impl InstallManager {
    pub fn new(installer: ArchiveInstaller, events: mpsc::UnboundedSender<InstallEvent>) -> Self {
        Self {
            installer,
            events,
            registry: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn channel(installer: ArchiveInstaller) -> (Self, mpsc::UnboundedReceiver<InstallEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(installer, tx), rx)
    }

    pub fn installer(&self) -> &ArchiveInstaller {
        &self.installer
    }

    pub fn active_install(&self) -> Option<String> {
        self.lock().keys().next().cloned()
    }

    pub fn is_busy(&self, name: &str) -> bool {
        self.lock().contains_key(name)
    }

    pub fn start_install(&self, app: ApplicationRecord) -> Result<JoinHandle<()>> {
        let (control_tx, control_rx) = watch::channel(DownloadControl::Running);
        {
            let mut registry = self.lock();
            if let Some(current) = registry.keys().next() {
                return Err(LauncherError::Busy(current.clone()));
            }
            registry.insert(
                app.name.clone(),
                InstallHandle {
                    control: control_tx,
                },
            );
        }

        tracing::info!("install queued app={} url={}", app.name, app.download_url);
        let manager = self.clone();
        Ok(tokio::spawn(async move {
            let worker = {
                let installer = manager.installer.clone();
                let events = manager.events.clone();
                let app = app.clone();
                tokio::spawn(async move {
                    let name = app.name.clone();
                    installer
                        .install(&app, Some(control_rx), |update| {
                            let _ = events.send(InstallEvent::Progress {
                                app: name.clone(),
                                update,
                            });
                        })
                        .await
                })
            };
            let result = worker.await;

            // The registry entry goes away however the worker ended, panics included.
            manager.lock().remove(&app.name);
            let terminal = match result {
                Ok(Ok(_)) => InstallEvent::Completed {
                    app: app.name.clone(),
                    message: format!("{} installed successfully", app.name),
                },
                Ok(Err(err)) => {
                    tracing::error!(
                        "install worker failed app={} retryable={}: {}",
                        app.name,
                        err.is_retryable(),
                        err
                    );
                    InstallEvent::Failed {
                        app: app.name.clone(),
                        operation: "install".to_string(),
                        message: err.to_string(),
                    }
                }
                Err(join_err) => {
                    tracing::error!("install worker aborted app={}: {}", app.name, join_err);
                    InstallEvent::Failed {
                        app: app.name.clone(),
                        operation: "install".to_string(),
                        message: "install stopped unexpectedly".to_string(),
                    }
                }
            };
            let _ = manager.events.send(terminal);
        }))
    }

    /// Returns `false` when no install of `name` is running.
    pub fn cancel_install(&self, name: &str) -> bool {
        let registry = self.lock();
        match registry.get(name) {
            Some(handle) => {
                let _ = handle.control.send(DownloadControl::Cancelled);
                tracing::info!("install cancel requested app={}", name);
                true
            }
            None => false,
        }
    }

    /// Refused while an install of the same app is running.
    pub async fn uninstall(&self, name: &str) -> Result<()> {
        if self.is_busy(name) {
            return Err(LauncherError::Busy(name.to_string()));
        }
        let installer = self.installer.clone();
        let owned = name.to_string();
        tokio::task::spawn_blocking(move || installer.uninstall(&owned))
            .await
            .map_err(|err| LauncherError::Uninstall {
                name: name.to_string(),
                reason: err.to_string(),
            })?
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, InstallHandle>> {
        match self.registry.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
