pub mod install;
pub mod library;
pub mod sources;
pub mod system;

#[cfg(test)]
pub(crate) fn test_state(
    label: &str,
    sources: Vec<String>,
) -> (
    crate::AppState,
    tokio::sync::mpsc::UnboundedReceiver<crate::models::InstallEvent>,
    std::path::PathBuf,
) {
    use std::sync::Arc;

    use crate::config::LauncherConfig;
    use crate::services::platform::PosixPlatform;
    use crate::test_support::{http_client, temp_dir};

    let root = temp_dir(label);
    let mut config = LauncherConfig::with_root(root.clone());
    config.install_dir = Some(root.join("apps"));
    config.library_urls = sources;
    config.progress_interval_ms = 5;
    let platform = Arc::new(PosixPlatform::with_applications_dir(root.join("applications")));
    let (state, events) = crate::AppState::assemble(config, platform, http_client(), http_client());
    (state, events, root)
}
