use std::path::PathBuf;

use crate::errors::LauncherError;
use crate::services::RunningApp;
use crate::AppState;

pub fn launch_app(state: &AppState, name: &str) -> Result<RunningApp, String> {
    state.runtime.launch(name).map_err(|err| err.to_string())
}

/// Icon to show for `name`: the package's bundled icon, otherwise the cached catalog
/// icon. `None` when neither is available.
pub async fn resolve_icon(state: &AppState, name: &str) -> Result<Option<PathBuf>, String> {
    let dir = state.tracker.app_dir(name).map_err(|err| err.to_string())?;
    let catalog = state.catalog();
    let icon_url = match catalog.find(name) {
        Some(record) => record.icon_url.clone(),
        None => state
            .tracker
            .read_metadata(name)
            .ok()
            .flatten()
            .and_then(|info| info.icon_url),
    };
    Ok(state.icons.resolve_for_app(&dir, icon_url.as_deref()).await)
}

/// Creates a desktop shortcut pointing at the installed entry point.
pub async fn create_shortcut(state: &AppState, name: &str) -> Result<PathBuf, String> {
    if !state.tracker.is_installed(name) {
        return Err(LauncherError::NotInstalled(name.to_string()).to_string());
    }
    let dir = state.tracker.app_dir(name).map_err(|err| err.to_string())?;
    let target = dir.join(state.platform.entry_point_name());
    let icon = resolve_icon(state, name).await?;
    state
        .platform
        .create_shortcut(name, &target, icon.as_deref())
        .map_err(|err| err.to_string())
}
