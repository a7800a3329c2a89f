use std::path::{Path, PathBuf};

pub const APP_DIR_NAME: &str = "TiwutLauncher";
pub const INSTALL_SUBDIR: &str = "TiwutApps";
const PORTABLE_MARKER: &str = "portable.config.json";

fn ensure_dir(path: &Path) -> Option<PathBuf> {
    if path.as_os_str().is_empty() {
        return None;
    }
    if std::fs::create_dir_all(path).is_ok() {
        return Some(path.to_path_buf());
    }
    None
}

fn is_portable_root(path: &Path) -> bool {
    path.join(PORTABLE_MARKER).exists()
}

fn non_empty_path(value: &str) -> Option<PathBuf> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(PathBuf::from(trimmed))
    }
}

fn env_dir(key: &str) -> Option<PathBuf> {
    std::env::var(key)
        .ok()
        .and_then(|value| non_empty_path(&value))
        .and_then(|path| ensure_dir(&path))
}

fn portable_exe_dir() -> Option<PathBuf> {
    let exe = std::env::current_exe().ok()?;
    let dir = exe.parent()?;
    if is_portable_root(dir) {
        Some(dir.to_path_buf())
    } else {
        None
    }
}

/// Data root holding `config.json`, the icon cache and logs.
pub fn resolve_root_dir() -> PathBuf {
    if let Some(dir) = env_dir("TIWUT_ROOT_DIR") {
        return dir;
    }

    if let Some(dir) = portable_exe_dir() {
        return dir;
    }

    if let Some(config) = dirs::config_dir() {
        if let Some(found) = ensure_dir(&config.join(APP_DIR_NAME)) {
            return found;
        }
    }

    if let Some(home) = dirs::home_dir() {
        if let Some(found) = ensure_dir(&home.join(format!(".{}", APP_DIR_NAME))) {
            return found;
        }
    }

    PathBuf::from(".")
}

/// Default install root: `~/Documents/TiwutApps`, or next to the executable in
/// portable mode.
pub fn resolve_install_dir() -> PathBuf {
    if let Some(dir) = env_dir("TIWUT_INSTALL_DIR") {
        return dir;
    }

    if let Some(dir) = portable_exe_dir() {
        return dir.join(INSTALL_SUBDIR);
    }

    let documents = dirs::document_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join("Documents")));
    if let Some(documents) = documents {
        return documents.join(INSTALL_SUBDIR);
    }

    resolve_root_dir().join(INSTALL_SUBDIR)
}

pub fn resolve_cache_dir(root: &Path) -> PathBuf {
    let dir = root.join("icon_cache");
    ensure_dir(&dir).unwrap_or(dir)
}

pub fn resolve_log_dir(root: &Path) -> PathBuf {
    if let Some(dir) = env_dir("TIWUT_LOG_DIR") {
        return dir;
    }
    let logs = root.join("logs");
    ensure_dir(&logs).unwrap_or(logs)
}

/// `~/.local/share/applications`, where desktop entries are picked up by menus.
pub fn resolve_applications_dir() -> PathBuf {
    dirs::data_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".local").join("share")))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("applications")
}

pub fn resolve_desktop_dir() -> PathBuf {
    dirs::desktop_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join("Desktop")))
        .unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn blank_overrides_are_ignored() {
        assert_eq!(non_empty_path("   "), None);
        assert_eq!(non_empty_path(" /tmp/apps "), Some(PathBuf::from("/tmp/apps")));
    }

    #[test]
    fn portable_marker_is_detected() {
        let dir = std::env::temp_dir().join(format!("tiwut-portable-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).expect("create dir");
        assert!(!is_portable_root(&dir));
        std::fs::write(dir.join(PORTABLE_MARKER), b"{}").expect("write marker");
        assert!(is_portable_root(&dir));
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn cache_dir_lives_under_root() {
        let root = std::env::temp_dir().join(format!("tiwut-root-{}", Uuid::new_v4()));
        let cache = resolve_cache_dir(&root);
        assert_eq!(cache, root.join("icon_cache"));
        assert!(cache.is_dir());
        let _ = std::fs::remove_dir_all(root);
    }
}
