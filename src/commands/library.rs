use serde::Serialize;

use crate::models::ApplicationRecord;
use crate::utils::file::dir_size;
use crate::AppState;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AppListing {
    pub name: String,
    pub installed: bool,
    pub running: bool,
    pub info_url: Option<String>,
    pub icon_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AppInstallInfo {
    pub name: String,
    pub installed: bool,
    pub install_path: Option<String>,
    pub size_bytes: Option<u64>,
    pub installed_at: Option<String>,
    pub installing: bool,
}

fn listing(state: &AppState, record: &ApplicationRecord) -> AppListing {
    AppListing {
        name: record.name.clone(),
        installed: state.tracker.is_installed(&record.name),
        running: state.runtime.is_running(&record.name),
        info_url: record.info_url.clone(),
        icon_url: record.icon_url.clone(),
    }
}

/// Every catalog entry with its local state, in catalog order.
pub fn list_apps(state: &AppState) -> Result<Vec<AppListing>, String> {
    let catalog = state.catalog();
    Ok(catalog
        .records()
        .iter()
        .map(|record| listing(state, record))
        .collect())
}

pub fn installed_apps(state: &AppState) -> Result<Vec<AppListing>, String> {
    let catalog = state.catalog();
    Ok(state
        .tracker
        .list_installed(&catalog)
        .iter()
        .map(|record| listing(state, record))
        .collect())
}

pub fn app_install_info(state: &AppState, name: &str) -> Result<AppInstallInfo, String> {
    let dir = state.tracker.app_dir(name).map_err(|err| err.to_string())?;
    let installed = state.tracker.is_installed(name);
    let metadata = if installed {
        state.tracker.read_metadata(name).map_err(|err| err.to_string())?
    } else {
        None
    };

    Ok(AppInstallInfo {
        name: name.to_string(),
        installed,
        install_path: installed.then(|| dir.to_string_lossy().to_string()),
        size_bytes: if installed { dir_size(&dir).ok() } else { None },
        installed_at: metadata.and_then(|info| info.installed_at),
        installing: state.installs.is_busy(name),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_state;
    use crate::test_support::{FixtureServer, Route};

    #[tokio::test]
    async fn listings_reflect_install_state() {
        let server = FixtureServer::start();
        server.route(
            "/library.tiwut",
            Route::Body(b"Foo;https://x/foo.zip;https://x/foo;https://x/foo.png\nBar;https://x/bar.zip;\n".to_vec()),
        );
        let (state, _events, root) = test_state("cmd-library", vec![server.url("/library.tiwut")]);
        state.refresh_catalog().await;
        std::fs::create_dir_all(root.join("apps").join("Bar")).expect("create Bar");
        std::fs::write(root.join("apps").join("Bar").join("main.py"), b"print(1)\n")
            .expect("write entry point");

        let all = list_apps(&state).expect("list apps");
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].name, "Foo");
        assert!(!all[0].installed);
        assert_eq!(all[0].icon_url.as_deref(), Some("https://x/foo.png"));
        assert!(all[1].installed);

        let installed = installed_apps(&state).expect("installed apps");
        assert_eq!(installed.iter().map(|a| a.name.as_str()).collect::<Vec<_>>(), vec!["Bar"]);

        let info = app_install_info(&state, "Bar").expect("install info");
        assert!(info.installed);
        assert_eq!(info.size_bytes, Some(9));
        assert!(!info.installing);
        let missing = app_install_info(&state, "Foo").expect("install info");
        assert_eq!(missing.install_path, None);
        assert!(app_install_info(&state, "../etc").is_err());
        let _ = std::fs::remove_dir_all(root);
    }
}
