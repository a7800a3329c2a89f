use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use reqwest::Client;

use crate::errors::{LauncherError, Result};
use crate::services::install_state::is_safe_app_name;
use crate::utils::file::write_atomic;

const BUNDLED_ICON: &str = "main.png";

/// Cache file name for an icon URL: the decoded basename of its path.
pub fn icon_file_name(url: &str) -> Option<String> {
    let without_fragment = url.split('#').next().unwrap_or(url);
    let path = without_fragment.split('?').next().unwrap_or(without_fragment);
    let raw = path.trim_end_matches('/').rsplit('/').next()?;
    let decoded = urlencoding::decode(raw).ok()?.into_owned();
    if is_safe_app_name(&decoded) {
        Some(decoded)
    } else {
        None
    }
}

/// Blob cache for catalog icons under `<root>/icon_cache`. Entries are never evicted.
#[derive(Clone)]
pub struct IconCache {
    client: Client,
    cache_dir: PathBuf,
    inflight: Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>,
}

impl IconCache {
    pub fn with_client(client: Client, cache_dir: PathBuf) -> Self {
        Self {
            client,
            cache_dir,
            inflight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn cached_path(&self, url: &str) -> Option<PathBuf> {
        let path = self.cache_dir.join(icon_file_name(url)?);
        path.is_file().then_some(path)
    }

    /// Returns the cached file, downloading it first when missing. Concurrent requests
    /// for the same icon share one download.
    pub async fn fetch(&self, url: &str) -> Result<PathBuf> {
        let name = icon_file_name(url).ok_or_else(|| LauncherError::InvalidName(url.to_string()))?;
        let path = self.cache_dir.join(&name);
        if path.is_file() {
            return Ok(path);
        }

        let gate = self.gate_for(&name);
        let fetched = {
            let _guard = gate.lock().await;
            if path.is_file() {
                Ok(path)
            } else {
                self.download(url, path).await
            }
        };
        self.release_gate(&name, gate);
        fetched
    }

    async fn download(&self, url: &str, path: PathBuf) -> Result<PathBuf> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| LauncherError::Connect(err.to_string()))?;
        if !response.status().is_success() {
            return Err(LauncherError::Server {
                status: response.status().as_u16(),
            });
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|err| LauncherError::Connect(err.to_string()))?;
        if image::guess_format(&bytes).is_err() {
            return Err(LauncherError::Fetch {
                url: url.to_string(),
                reason: "response is not an image".to_string(),
            });
        }

        write_atomic(&path, &bytes)?;
        tracing::debug!("icon cached url={} path={:?}", url, path);
        Ok(path)
    }

    /// Icon for an installed app: the package's own `main.png` first, then the catalog
    /// icon.
    pub async fn resolve_for_app(&self, app_dir: &Path, icon_url: Option<&str>) -> Option<PathBuf> {
        let bundled = app_dir.join(BUNDLED_ICON);
        if bundled.is_file() {
            return Some(bundled);
        }
        let url = icon_url?;
        match self.fetch(url).await {
            Ok(path) => Some(path),
            Err(err) => {
                tracing::warn!("icon unavailable url={}: {}", url, err);
                None
            }
        }
    }

    fn gate_for(&self, name: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut inflight = match self.inflight.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        inflight
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Drops the gate once nobody else is waiting on it.
    fn release_gate(&self, name: &str, gate: Arc<tokio::sync::Mutex<()>>) {
        let mut inflight = match self.inflight.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let idle = inflight
            .get(name)
            .map(|current| Arc::ptr_eq(current, &gate) && Arc::strong_count(&gate) == 2)
            .unwrap_or(false);
        if idle {
            inflight.remove(name);
        }
    }

    #[cfg(test)]
    fn inflight_len(&self) -> usize {
        match self.inflight.lock() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{http_client, temp_dir, FixtureServer, Route};

    const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

    #[test]
    fn file_name_is_the_decoded_basename() {
        assert_eq!(
            icon_file_name("https://x/icons/My%20App.png?v=3#top").as_deref(),
            Some("My App.png")
        );
        assert_eq!(icon_file_name("https://x/a/b/logo.webp").as_deref(), Some("logo.webp"));
        assert_eq!(icon_file_name("https://x/icons/%2E%2E"), None);
        assert_eq!(icon_file_name("https://x/icons/a%2Fb.png"), None);
    }

    #[tokio::test]
    async fn icons_are_downloaded_once() {
        let server = FixtureServer::start();
        server.route("/icons/foo.png", Route::Body(PNG_BYTES.to_vec()));
        let dir = temp_dir("icons");
        let cache = IconCache::with_client(http_client(), dir.clone());
        let url = server.url("/icons/foo.png");

        assert_eq!(cache.cached_path(&url), None);
        let first = cache.fetch(&url).await.expect("fetch icon");
        let second = cache.fetch(&url).await.expect("cached icon");
        assert_eq!(first, dir.join("foo.png"));
        assert_eq!(first, second);
        assert_eq!(server.hits("/icons/foo.png"), 1);
        assert_eq!(cache.cached_path(&url), Some(first));
        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn gates_are_dropped_after_each_fetch() {
        let server = FixtureServer::start();
        let dir = temp_dir("icons-gates");
        let cache = IconCache::with_client(http_client(), dir.clone());
        for index in 0..5 {
            server.route(&format!("/icons/{index}.png"), Route::Body(PNG_BYTES.to_vec()));
        }
        server.route("/icons/gone.png", Route::Status(404));

        let fetches: Vec<_> = (0..5)
            .flat_map(|index| [index, index])
            .map(|index| {
                let cache = cache.clone();
                let url = server.url(&format!("/icons/{index}.png"));
                tokio::spawn(async move { cache.fetch(&url).await })
            })
            .collect();
        for fetch in fetches {
            fetch.await.expect("fetch task").expect("icon fetched");
        }
        assert!(cache.fetch(&server.url("/icons/gone.png")).await.is_err());

        assert_eq!(cache.inflight_len(), 0);
        for index in 0..5 {
            assert_eq!(server.hits(&format!("/icons/{index}.png")), 1);
        }
        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn non_image_payloads_are_not_cached() {
        let server = FixtureServer::start();
        server.route("/icons/bad.png", Route::Body(b"<html>404</html>".to_vec()));
        let dir = temp_dir("icons-bad");
        let cache = IconCache::with_client(http_client(), dir.clone());

        let err = cache
            .fetch(&server.url("/icons/bad.png"))
            .await
            .expect_err("html is not an icon");
        assert!(matches!(err, LauncherError::Fetch { .. }));
        assert!(!dir.join("bad.png").exists());
        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn bundled_icon_wins_over_catalog_icon() {
        let dir = temp_dir("icons-bundled");
        let app_dir = dir.join("Foo");
        std::fs::create_dir_all(&app_dir).expect("create app dir");
        std::fs::write(app_dir.join(BUNDLED_ICON), PNG_BYTES).expect("write bundled icon");
        let cache = IconCache::with_client(http_client(), dir.join("cache"));

        let icon = cache
            .resolve_for_app(&app_dir, Some("http://127.0.0.1:9/never.png"))
            .await;
        assert_eq!(icon, Some(app_dir.join(BUNDLED_ICON)));
        assert_eq!(cache.resolve_for_app(&dir.join("Bar"), None).await, None);
        let _ = std::fs::remove_dir_all(dir);
    }
}
