use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{LauncherError, Result};
use crate::utils::file::write_atomic;
use crate::utils::paths::{resolve_cache_dir, resolve_install_dir, resolve_log_dir};

const CONFIG_FILE: &str = "config.json";

#[cfg(target_os = "windows")]
const DEFAULT_LIBRARY_URL: &str = "https://launcher.tiwut.de/library.tiwut";
#[cfg(not(target_os = "windows"))]
const DEFAULT_LIBRARY_URL: &str = "https://launcher.tiwut.de/Linux/library.tiwut";

fn default_library_urls() -> Vec<String> {
    vec![DEFAULT_LIBRARY_URL.to_string()]
}

fn default_request_timeout() -> u64 {
    3600
}

fn default_connect_timeout() -> u64 {
    15
}

fn default_catalog_timeout() -> u64 {
    10
}

fn default_progress_interval() -> u64 {
    200
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct LauncherConfig {
    #[serde(default = "default_library_urls")]
    pub library_urls: Vec<String>,
    #[serde(default)]
    pub install_dir: Option<PathBuf>,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,
    #[serde(default = "default_catalog_timeout")]
    pub catalog_timeout_seconds: u64,
    #[serde(default = "default_progress_interval")]
    pub progress_interval_ms: u64,
    #[serde(skip)]
    pub root_dir: PathBuf,
}

impl LauncherConfig {
    pub fn with_root(root_dir: PathBuf) -> Self {
        Self {
            library_urls: default_library_urls(),
            install_dir: None,
            request_timeout_seconds: default_request_timeout(),
            connect_timeout_seconds: default_connect_timeout(),
            catalog_timeout_seconds: default_catalog_timeout(),
            progress_interval_ms: default_progress_interval(),
            root_dir,
        }
    }

    /// Reads `config.json` from `root_dir`, writing defaults when it is missing.
    /// A corrupt file is replaced by defaults rather than aborting startup.
    pub fn load(root_dir: &Path) -> Result<Self> {
        let path = root_dir.join(CONFIG_FILE);
        let mut config = match fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<LauncherConfig>(&raw) {
                Ok(parsed) => parsed,
                Err(err) => {
                    tracing::warn!("invalid config at {:?}, using defaults: {}", path, err);
                    let defaults = Self::with_root(root_dir.to_path_buf());
                    defaults.save_to(&path)?;
                    defaults
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                let defaults = Self::with_root(root_dir.to_path_buf());
                defaults.save_to(&path)?;
                defaults
            }
            Err(err) => return Err(err.into()),
        };
        config.root_dir = root_dir.to_path_buf();
        config.normalize();
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&self.config_path())
    }

    fn save_to(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        write_atomic(path, json.as_bytes())?;
        Ok(())
    }

    pub fn config_path(&self) -> PathBuf {
        self.root_dir.join(CONFIG_FILE)
    }

    pub fn install_root(&self) -> PathBuf {
        self.install_dir.clone().unwrap_or_else(resolve_install_dir)
    }

    pub fn cache_dir(&self) -> PathBuf {
        resolve_cache_dir(&self.root_dir)
    }

    pub fn log_dir(&self) -> PathBuf {
        resolve_log_dir(&self.root_dir)
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }

    /// Returns `false` if the URL was already configured.
    pub fn add_library_url(&mut self, url: &str) -> bool {
        let url = url.trim();
        if url.is_empty() || self.library_urls.iter().any(|existing| existing == url) {
            return false;
        }
        self.library_urls.push(url.to_string());
        true
    }

    pub fn remove_library_url(&mut self, url: &str) -> bool {
        let before = self.library_urls.len();
        self.library_urls.retain(|existing| existing != url.trim());
        self.library_urls.len() != before
    }

    pub fn http_client(&self, timeout: Duration) -> Result<reqwest::Client> {
        build_http_client(timeout, Duration::from_secs(self.connect_timeout_seconds))
    }

    fn normalize(&mut self) {
        let mut seen = Vec::new();
        for url in self.library_urls.drain(..) {
            let url = url.trim().to_string();
            if !url.is_empty() && !seen.contains(&url) {
                seen.push(url);
            }
        }
        self.library_urls = seen;
    }

    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(urls) = lookup("TIWUT_LIBRARY_URLS") {
            let parsed: Vec<String> = urls
                .split(',')
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .collect();
            if !parsed.is_empty() {
                self.library_urls = parsed;
            }
        }
        if let Some(dir) = lookup("TIWUT_INSTALL_DIR").filter(|value| !value.trim().is_empty()) {
            self.install_dir = Some(PathBuf::from(dir.trim()));
        }
        if let Some(value) = parse_u64(&lookup, "TIWUT_HTTP_TIMEOUT_SECONDS") {
            self.request_timeout_seconds = value.clamp(30, 7200);
        }
        if let Some(value) = parse_u64(&lookup, "TIWUT_HTTP_CONNECT_TIMEOUT_SECONDS") {
            self.connect_timeout_seconds = value.clamp(3, 120);
        }
        if let Some(value) = parse_u64(&lookup, "TIWUT_PROGRESS_INTERVAL_MS") {
            self.progress_interval_ms = value.clamp(50, 5000);
        }
    }
}

/// HTTP client shared by the launcher and the updater, honoring `TIWUT_PROXY`.
pub fn build_http_client(timeout: Duration, connect_timeout: Duration) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(connect_timeout)
        .user_agent(concat!("tiwut-launcher/", env!("CARGO_PKG_VERSION")));

    if let Some(proxy_url) = std::env::var("TIWUT_PROXY")
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
    {
        match reqwest::Proxy::all(&proxy_url) {
            Ok(proxy) => {
                builder = builder.proxy(proxy);
                tracing::info!("using launcher proxy: {}", proxy_url);
            }
            Err(err) => tracing::warn!("invalid TIWUT_PROXY '{}': {}", proxy_url, err),
        }
    }

    builder
        .build()
        .map_err(|err| LauncherError::Config(format!("http client: {err}")))
}

fn parse_u64<F>(lookup: &F, key: &str) -> Option<u64>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).and_then(|value| value.trim().parse::<u64>().ok())
}
