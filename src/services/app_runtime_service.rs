use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::Serialize;

use crate::errors::{LauncherError, Result};
use crate::services::install_state::InstallStateTracker;
use crate::services::platform::PlatformAdapter;

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct RunningApp {
    pub name: String,
    pub pid: u32,
    pub started_at: i64,
    pub exe_path: String,
}

/// Starts installed apps and remembers which ones are still running.
#[derive(Clone)]
pub struct AppRuntimeService {
    inner: Arc<Mutex<HashMap<String, RunningApp>>>,
    tracker: InstallStateTracker,
    platform: Arc<dyn PlatformAdapter>,
}

impl AppRuntimeService {
    pub fn new(tracker: InstallStateTracker, platform: Arc<dyn PlatformAdapter>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
            tracker,
            platform,
        }
    }

    pub fn launch(&self, name: &str) -> Result<RunningApp> {
        if !self.tracker.is_installed(name) {
            return Err(LauncherError::NotInstalled(name.to_string()));
        }
        let working_dir = self.tracker.app_dir(name)?;
        let exe_path = working_dir.join(self.platform.entry_point_name());
        let mut child = self.platform.launch(&exe_path, &working_dir)?;
        let pid = child.id();

        let running = RunningApp {
            name: name.to_string(),
            pid,
            started_at: chrono::Utc::now().timestamp(),
            exe_path: exe_path.to_string_lossy().to_string(),
        };
        self.register(running.clone());
        tracing::info!("launched app={} pid={}", name, pid);

        let runtime = self.clone();
        let app_name = name.to_string();
        std::thread::spawn(move || {
            let status = child.wait();
            let exit_code = status.ok().and_then(|s| s.code());
            if runtime.take_if_pid_matches(&app_name, pid).is_some() {
                tracing::info!("app exited app={} pid={} code={:?}", app_name, pid, exit_code);
            }
        });
        Ok(running)
    }

    pub fn list(&self) -> Vec<RunningApp> {
        let map = self.lock();
        let mut items: Vec<RunningApp> = map.values().cloned().collect();
        items.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        items
    }

    pub fn get(&self, name: &str) -> Option<RunningApp> {
        self.lock().get(name).cloned()
    }

    pub fn is_running(&self, name: &str) -> bool {
        self.lock().contains_key(name)
    }

    fn register(&self, running: RunningApp) {
        self.lock().insert(running.name.clone(), running);
    }

    fn take_if_pid_matches(&self, name: &str, pid: u32) -> Option<RunningApp> {
        let mut map = self.lock();
        match map.get(name) {
            Some(running) if running.pid == pid => map.remove(name),
            _ => None,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, RunningApp>> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
