use tokio::task::JoinHandle;

use crate::errors::LauncherError;
use crate::AppState;

/// Queues the install of a catalog entry. Progress and the outcome arrive on the
/// state's event channel.
pub fn install_app(state: &AppState, name: &str) -> Result<JoinHandle<()>, String> {
    let catalog = state.catalog();
    let record = catalog
        .find(name)
        .cloned()
        .ok_or_else(|| format!("{} is not in the app library", name))?;
    if state.tracker.is_installed(&record.name) {
        return Err(LauncherError::AlreadyInstalled(record.name).to_string());
    }
    state
        .installs
        .start_install(record)
        .map_err(|err| err.to_string())
}

pub async fn uninstall_app(state: &AppState, name: &str) -> Result<(), String> {
    if state.runtime.is_running(name) {
        return Err(LauncherError::Busy(name.to_string()).to_string());
    }
    state
        .installs
        .uninstall(name)
        .await
        .map_err(|err| err.to_string())
}
