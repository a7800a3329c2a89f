use crate::config::LauncherConfig;

pub fn list_sources(config: &LauncherConfig) -> Vec<String> {
    config.library_urls.clone()
}

/// Adds a library manifest URL and persists the config. `Ok(false)` if it was already
/// present.
pub fn add_source(config: &mut LauncherConfig, url: &str) -> Result<bool, String> {
    let url = url.trim();
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(format!("not an http(s) URL: {}", url));
    }
    if !config.add_library_url(url) {
        return Ok(false);
    }
    config.save().map_err(|err| err.to_string())?;
    tracing::info!("library source added url={}", url);
    Ok(true)
}

pub fn remove_source(config: &mut LauncherConfig, url: &str) -> Result<bool, String> {
    if !config.remove_library_url(url) {
        return Ok(false);
    }
    config.save().map_err(|err| err.to_string())?;
    tracing::info!("library source removed url={}", url.trim());
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::temp_dir;

    #[test]
    fn sources_are_persisted() {
        let root = temp_dir("cmd-sources");
        let mut config = LauncherConfig::with_root(root.clone());
        let initial = list_sources(&config).len();

        assert!(add_source(&mut config, "ftp://nope").is_err());
        assert_eq!(add_source(&mut config, " https://mirror.example/library.tiwut "), Ok(true));
        assert_eq!(add_source(&mut config, "https://mirror.example/library.tiwut"), Ok(false));

        let saved: LauncherConfig =
            serde_json::from_str(&std::fs::read_to_string(config.config_path()).expect("saved"))
                .expect("parse saved config");
        assert_eq!(saved.library_urls.len(), initial + 1);

        assert_eq!(remove_source(&mut config, "https://mirror.example/library.tiwut"), Ok(true));
        assert_eq!(remove_source(&mut config, "https://mirror.example/library.tiwut"), Ok(false));
        assert_eq!(list_sources(&config).len(), initial);
        let _ = std::fs::remove_dir_all(root);
    }
}
