use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Child;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::build_http_client;
use crate::errors::{LauncherError, Result};
use crate::services::archive_installer::parse_setup_commands;
use crate::services::download_pipeline::DownloadPipeline;
use crate::services::platform::PlatformAdapter;
use crate::utils::crypto::{sha256_file, sha256_hex};
use crate::utils::file::write_atomic;

pub const UPDATER_CONFIG_FILE: &str = "updater.json";

/// How the remote marker is compared against the local one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FingerprintMode {
    /// SHA-256 of the remote marker body against SHA-256 of the local marker file.
    ContentHash,
    /// Trimmed marker text; the artifact is published under the version name.
    Version,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SetupMode {
    Inline,
    Terminal,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct UpdaterConfig {
    pub mode: FingerprintMode,
    pub fingerprint_url: String,
    pub artifact_url: Option<String>,
    pub artifact_base_url: Option<String>,
    pub commands_url: Option<String>,
    pub marker_path: PathBuf,
    pub artifact_path: PathBuf,
    pub setup_mode: SetupMode,
    pub wait_for_exit: bool,
    pub request_timeout_seconds: u64,
    pub connect_timeout_seconds: u64,
    #[serde(skip)]
    pub work_dir: PathBuf,
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        #[cfg(target_os = "windows")]
        {
            Self::windows_defaults(PathBuf::from("."))
        }
        #[cfg(not(target_os = "windows"))]
        {
            Self::posix_defaults(PathBuf::from("."))
        }
    }
}

impl UpdaterConfig {
    pub fn posix_defaults(work_dir: PathBuf) -> Self {
        Self {
            mode: FingerprintMode::ContentHash,
            fingerprint_url: "https://launcher.tiwut.de/Linux/sys.tiwut".to_string(),
            artifact_url: Some("https://launcher.tiwut.de/Linux/Launcher/main.py".to_string()),
            artifact_base_url: None,
            commands_url: Some("https://launcher.tiwut.de/Linux/Updater/sys_modul.tiwut".to_string()),
            marker_path: PathBuf::from("sys.tiwut"),
            artifact_path: PathBuf::from("Launcher").join("main.py"),
            setup_mode: SetupMode::Inline,
            wait_for_exit: true,
            request_timeout_seconds: 600,
            connect_timeout_seconds: 15,
            work_dir,
        }
    }

    pub fn windows_defaults(work_dir: PathBuf) -> Self {
        Self {
            mode: FingerprintMode::Version,
            fingerprint_url: "https://launcher.tiwut.de/Launcher/sys.tiwut".to_string(),
            artifact_url: None,
            artifact_base_url: Some("https://launcher.tiwut.de/Launcher/".to_string()),
            commands_url: None,
            marker_path: PathBuf::from("sys.tiwut"),
            artifact_path: PathBuf::from("Tiwut_Launcher.exe"),
            setup_mode: SetupMode::Inline,
            wait_for_exit: false,
            request_timeout_seconds: 600,
            connect_timeout_seconds: 15,
            work_dir,
        }
    }

    /// Reads `explicit`, or `updater.json` in `work_dir` when present, over the platform
    /// defaults. An explicit path that does not exist is an error.
    pub fn load(explicit: Option<&Path>, work_dir: &Path) -> Result<Self> {
        let path = explicit
            .map(Path::to_path_buf)
            .unwrap_or_else(|| work_dir.join(UPDATER_CONFIG_FILE));
        let mut config = match fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str::<UpdaterConfig>(&raw)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound && explicit.is_none() => {
                UpdaterConfig::default()
            }
            Err(err) => {
                return Err(LauncherError::Config(format!(
                    "cannot read updater config {:?}: {}",
                    path, err
                )))
            }
        };
        config.work_dir = work_dir.to_path_buf();
        Ok(config)
    }

    pub fn marker_file(&self) -> PathBuf {
        self.work_dir.join(&self.marker_path)
    }

    pub fn artifact_file(&self) -> PathBuf {
        self.work_dir.join(&self.artifact_path)
    }

    pub fn artifact_url_for(&self, fingerprint: &str) -> Result<String> {
        if let Some(url) = self.artifact_url.as_ref().filter(|url| !url.trim().is_empty()) {
            return Ok(url.clone());
        }
        match (self.mode, self.artifact_base_url.as_deref()) {
            (FingerprintMode::Version, Some(base)) => Ok(format!(
                "{}/{}",
                base.trim_end_matches('/'),
                urlencoding::encode(fingerprint)
            )),
            _ => Err(LauncherError::Config(
                "updater has no artifact URL configured".to_string(),
            )),
        }
    }
}

/// Remote marker as fetched: the comparable fingerprint plus the raw body to persist.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteMarker {
    pub fingerprint: String,
    pub body: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UpdateDecision {
    RunLocal,
    UpdateThenRun { remote: String },
    FatalNoLocal,
}

/// Pure decision step. `remote` is `None` when the update server could not be reached.
pub fn decide(remote: Option<&str>, local: Option<&str>, artifact_present: bool) -> UpdateDecision {
    match remote {
        None if artifact_present => UpdateDecision::RunLocal,
        None => UpdateDecision::FatalNoLocal,
        Some(remote) if local == Some(remote) && artifact_present => UpdateDecision::RunLocal,
        Some(remote) => UpdateDecision::UpdateThenRun {
            remote: remote.to_string(),
        },
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SetupOutcome {
    pub executed: usize,
    pub failed: usize,
}

#[derive(Debug)]
pub struct UpdateOutcome {
    pub decision: UpdateDecision,
    pub updated: bool,
    pub setup: Option<SetupOutcome>,
    pub child: Child,
}

pub struct UpdateChecker {
    config: UpdaterConfig,
    client: Client,
    platform: Arc<dyn PlatformAdapter>,
}

impl UpdateChecker {
    pub fn new(config: UpdaterConfig, platform: Arc<dyn PlatformAdapter>) -> Result<Self> {
        let client = build_http_client(
            Duration::from_secs(config.request_timeout_seconds),
            Duration::from_secs(config.connect_timeout_seconds),
        )?;
        Ok(Self::with_client(config, client, platform))
    }

    pub fn with_client(config: UpdaterConfig, client: Client, platform: Arc<dyn PlatformAdapter>) -> Self {
        Self {
            config,
            client,
            platform,
        }
    }

    pub async fn fetch_remote(&self) -> Result<RemoteMarker> {
        let url = &self.config.fingerprint_url;
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
        let body = response
            .bytes()
            .await
            .map_err(|err| LauncherError::Connect(err.to_string()))?
            .to_vec();
        let fingerprint = match self.config.mode {
            FingerprintMode::ContentHash => sha256_hex(&body),
            FingerprintMode::Version => String::from_utf8_lossy(&body).trim().to_string(),
        };
        if fingerprint.is_empty() {
            return Err(LauncherError::Update("remote version marker is empty".to_string()));
        }
        Ok(RemoteMarker { fingerprint, body })
    }

    pub fn local_fingerprint(&self) -> Result<Option<String>> {
        let marker = self.config.marker_file();
        match self.config.mode {
            FingerprintMode::ContentHash => Ok(sha256_file(&marker)?),
            FingerprintMode::Version => match fs::read_to_string(&marker) {
                Ok(raw) => Ok(Some(raw.trim().to_string()).filter(|value| !value.is_empty())),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
                Err(err) => Err(err.into()),
            },
        }
    }

    /// Replaces the artifact, then records the new marker. The marker is written last so
    /// a failed download is retried on the next start.
    pub async fn apply_update<F>(&self, marker: &RemoteMarker, on_status: &mut F) -> Result<()>
    where
        F: FnMut(String) + Send,
    {
        let url = self.config.artifact_url_for(&marker.fingerprint)?;
        let artifact = self.config.artifact_file();
        let partial = partial_path(&artifact);
        let pipeline = DownloadPipeline::with_client(self.client.clone(), Duration::from_millis(200));

        pipeline
            .download(&url, &partial, None, |progress| {
                on_status(format!("Downloading update  {}", progress.info_text()))
            })
            .await?;
        fs::rename(&partial, &artifact)?;
        self.platform.mark_executable(&artifact)?;

        let marker_contents = match self.config.mode {
            FingerprintMode::ContentHash => marker.body.clone(),
            FingerprintMode::Version => marker.fingerprint.clone().into_bytes(),
        };
        write_atomic(&self.config.marker_file(), &marker_contents)?;
        tracing::info!("updater artifact replaced url={} path={:?}", url, artifact);
        Ok(())
    }

    /// Downloads and runs the post-update command list. Never fails: problems are logged
    /// and counted.
    pub async fn run_setup_commands(&self) -> SetupOutcome {
        let Some(url) = self.config.commands_url.as_deref() else {
            return SetupOutcome::default();
        };
        let raw = match self.fetch_text(url).await {
            Ok(raw) => raw,
            Err(err) => {
                tracing::warn!("setup commands unavailable url={}: {}", url, err);
                return SetupOutcome::default();
            }
        };
        let commands = parse_setup_commands(&raw);
        if commands.is_empty() {
            return SetupOutcome::default();
        }

        match self.config.setup_mode {
            SetupMode::Terminal => match self
                .platform
                .open_setup_terminal(&self.config.work_dir, &commands)
            {
                Ok(()) => SetupOutcome {
                    executed: commands.len(),
                    failed: 0,
                },
                Err(err) => {
                    tracing::warn!("setup terminal failed: {}", err);
                    SetupOutcome {
                        executed: 0,
                        failed: commands.len(),
                    }
                }
            },
            SetupMode::Inline => {
                let mut outcome = SetupOutcome::default();
                for command in &commands {
                    let mut process =
                        tokio::process::Command::from(self.platform.shell_command(command));
                    process.current_dir(&self.config.work_dir);
                    outcome.executed += 1;
                    match process.status().await {
                        Ok(status) if status.success() => {
                            tracing::info!("setup command ok: {}", command);
                        }
                        Ok(status) => {
                            tracing::warn!("setup command failed code={:?}: {}", status.code(), command);
                            outcome.failed += 1;
                        }
                        Err(err) => {
                            tracing::warn!("setup command not started: {}: {}", command, err);
                            outcome.failed += 1;
                        }
                    }
                }
                outcome
            }
        }
    }

    pub fn launch(&self) -> Result<Child> {
        self.platform
            .launch(&self.config.artifact_file(), &self.config.work_dir)
    }

    /// Full check-update-launch sequence.
    pub async fn run<F>(&self, mut on_status: F) -> Result<UpdateOutcome>
    where
        F: FnMut(String) + Send,
    {
        on_status("Checking for updates...".to_string());
        let remote = match self.fetch_remote().await {
            Ok(marker) => Some(marker),
            Err(err) => {
                tracing::warn!("update server unreachable: {}", err);
                on_status("Could not reach the update server.".to_string());
                None
            }
        };
        let local = match self.local_fingerprint() {
            Ok(local) => local,
            Err(err) => {
                tracing::warn!("local marker unreadable: {}", err);
                None
            }
        };
        let artifact_present = self.config.artifact_file().is_file();
        let decision = decide(
            remote.as_ref().map(|marker| marker.fingerprint.as_str()),
            local.as_deref(),
            artifact_present,
        );
        tracing::info!("update decision {:?}", decision);

        let mut updated = false;
        let mut setup = None;
        match (&decision, remote.as_ref()) {
            (UpdateDecision::FatalNoLocal, _) => {
                return Err(LauncherError::Update(
                    "launcher is not installed and the update server is unreachable".to_string(),
                ));
            }
            (UpdateDecision::UpdateThenRun { .. }, Some(marker)) => {
                on_status(if artifact_present {
                    "A new version is available. Updating...".to_string()
                } else {
                    "Application not found. Starting download...".to_string()
                });
                match self.apply_update(marker, &mut on_status).await {
                    Ok(()) => {
                        updated = true;
                        setup = Some(self.run_setup_commands().await);
                    }
                    Err(err) if artifact_present => {
                        tracing::warn!("update failed, starting installed version: {}", err);
                        on_status("Update failed. Starting the installed version.".to_string());
                    }
                    Err(err) => {
                        return Err(LauncherError::Update(format!(
                            "download of the launcher failed: {err}"
                        )))
                    }
                }
            }
            _ => on_status("You have the latest version.".to_string()),
        }

        let child = self.launch()?;
        Ok(UpdateOutcome {
            decision,
            updated,
            setup,
            child,
        })
    }

    async fn fetch_text(&self, url: &str) -> Result<String> {
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
        response
            .text()
            .await
            .map_err(|err| LauncherError::Connect(err.to_string()))
    }
}

fn partial_path(artifact: &Path) -> PathBuf {
    let mut name: OsString = artifact
        .file_name()
        .map(|value| value.to_os_string())
        .unwrap_or_else(|| OsString::from("artifact"));
    name.push(".part");
    artifact.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decision_table() {
        assert_eq!(decide(None, Some("a"), true), UpdateDecision::RunLocal);
        assert_eq!(decide(None, None, false), UpdateDecision::FatalNoLocal);
        assert_eq!(decide(Some("a"), Some("a"), true), UpdateDecision::RunLocal);
        assert_eq!(
            decide(Some("b"), Some("a"), true),
            UpdateDecision::UpdateThenRun {
                remote: "b".to_string()
            }
        );
        assert_eq!(
            decide(Some("a"), None, true),
            UpdateDecision::UpdateThenRun {
                remote: "a".to_string()
            }
        );
        assert_eq!(
            decide(Some("a"), Some("a"), false),
            UpdateDecision::UpdateThenRun {
                remote: "a".to_string()
            }
        );
    }

    #[test]
    fn version_mode_builds_artifact_url_from_base() {
        let config = UpdaterConfig::windows_defaults(PathBuf::from("."));
        assert_eq!(
            config.artifact_url_for("Tiwut Launcher 3.2.exe").expect("artifact url"),
            "https://launcher.tiwut.de/Launcher/Tiwut%20Launcher%203.2.exe"
        );

        let mut explicit = config.clone();
        explicit.artifact_url = Some("https://mirror.example/launcher.exe".to_string());
        assert_eq!(
            explicit.artifact_url_for("3.2").expect("artifact url"),
            "https://mirror.example/launcher.exe"
        );

        let mut broken = UpdaterConfig::posix_defaults(PathBuf::from("."));
        broken.artifact_url = None;
        assert!(broken.artifact_url_for("abc").is_err());
    }

    #[test]
    fn partial_file_sits_next_to_the_artifact() {
        assert_eq!(
            partial_path(Path::new("/opt/tiwut/Launcher/main.py")),
            PathBuf::from("/opt/tiwut/Launcher/main.py.part")
        );
    }

    #[test]
    fn config_file_overrides_defaults() {
        let dir = crate::test_support::temp_dir("updater-config");
        fs::write(
            dir.join(UPDATER_CONFIG_FILE),
            br#"{"mode": "version", "fingerprint_url": "http://mirror/sys.tiwut", "setup_mode": "terminal"}"#,
        )
        .expect("write updater config");

        let config = UpdaterConfig::load(None, &dir).expect("load updater config");
        assert_eq!(config.mode, FingerprintMode::Version);
        assert_eq!(config.fingerprint_url, "http://mirror/sys.tiwut");
        assert_eq!(config.setup_mode, SetupMode::Terminal);
        assert_eq!(config.marker_file(), dir.join("sys.tiwut"));

        let missing = UpdaterConfig::load(Some(&dir.join("nope.json")), &dir);
        assert!(matches!(missing, Err(LauncherError::Config(_))));
        let _ = fs::remove_dir_all(dir);
    }

    #[cfg(unix)]
    mod runs {
        use super::*;
        use std::process::Command;
        use std::sync::Mutex;

        use crate::test_support::{http_client, temp_dir, FixtureServer, Route};

        /// Records launch requests and spawns `true` in place of the launcher.
        #[derive(Default)]
        struct RecordingPlatform {
            launched: Mutex<Vec<PathBuf>>,
        }

        impl PlatformAdapter for RecordingPlatform {
            fn entry_point_name(&self) -> &'static str {
                "main.py"
            }

            fn launch(&self, exe: &Path, working_dir: &Path) -> Result<Child> {
                if !exe.is_file() {
                    return Err(LauncherError::Launch {
                        name: exe.to_string_lossy().to_string(),
                        reason: "missing".to_string(),
                    });
                }
                self.launched.lock().expect("launch log").push(exe.to_path_buf());
                Command::new("true")
                    .current_dir(working_dir)
                    .spawn()
                    .map_err(LauncherError::from)
            }

            fn shell_command(&self, line: &str) -> Command {
                let mut command = Command::new("sh");
                command.arg("-c").arg(line);
                command
            }

            fn shortcut_path(&self, name: &str) -> PathBuf {
                PathBuf::from(name)
            }

            fn create_shortcut(&self, _: &str, _: &Path, _: Option<&Path>) -> Result<PathBuf> {
                Err(LauncherError::Config("unused".to_string()))
            }

            fn open_setup_terminal(&self, _: &Path, _: &[String]) -> Result<()> {
                Ok(())
            }

            fn mark_executable(&self, _: &Path) -> Result<()> {
                Ok(())
            }
        }

        struct Fixture {
            server: FixtureServer,
            dir: PathBuf,
            platform: Arc<RecordingPlatform>,
        }

        impl Fixture {
            fn new(label: &str) -> Self {
                Self {
                    server: FixtureServer::start(),
                    dir: temp_dir(label),
                    platform: Arc::new(RecordingPlatform::default()),
                }
            }

            fn hash_config(&self) -> UpdaterConfig {
                let mut config = UpdaterConfig::posix_defaults(self.dir.clone());
                config.fingerprint_url = self.server.url("/Linux/sys.tiwut");
                config.artifact_url = Some(self.server.url("/Linux/Launcher/main.py"));
                config.commands_url = Some(self.server.url("/Linux/Updater/sys_modul.tiwut"));
                config
            }

            fn checker(&self, config: UpdaterConfig) -> UpdateChecker {
                UpdateChecker::with_client(config, http_client(), self.platform.clone())
            }

            fn launches(&self) -> usize {
                self.platform.launched.lock().expect("launch log").len()
            }
        }

        impl Drop for Fixture {
            fn drop(&mut self) {
                let _ = fs::remove_dir_all(&self.dir);
            }
        }

        #[tokio::test]
        async fn first_run_downloads_sets_up_and_launches() {
            let fx = Fixture::new("updater-first");
            fx.server.route("/Linux/sys.tiwut", Route::Body(b"build 42\n".to_vec()));
            fx.server
                .route("/Linux/Launcher/main.py", Route::Body(b"print('launcher')\n".to_vec()));
            fx.server.route(
                "/Linux/Updater/sys_modul.tiwut",
                Route::Body(b"# deps\necho ready > setup.txt\n\nexit 3\n".to_vec()),
            );
            let checker = fx.checker(fx.hash_config());

            let mut statuses = Vec::new();
            let mut outcome = checker
                .run(|status| statuses.push(status))
                .await
                .expect("updater run");
            let _ = outcome.child.wait();

            assert!(matches!(outcome.decision, UpdateDecision::UpdateThenRun { .. }));
            assert!(outcome.updated);
            assert_eq!(outcome.setup, Some(SetupOutcome { executed: 2, failed: 1 }));
            assert_eq!(
                fs::read(fx.dir.join("Launcher/main.py")).expect("artifact"),
                b"print('launcher')\n"
            );
            assert_eq!(fs::read(fx.dir.join("sys.tiwut")).expect("marker"), b"build 42\n");
            assert!(fx.dir.join("setup.txt").is_file());
            assert!(!fx.dir.join("Launcher/main.py.part").exists());
            assert_eq!(fx.launches(), 1);
            assert!(statuses.iter().any(|s| s.starts_with("Application not found")));
        }

        #[tokio::test]
        async fn matching_fingerprint_runs_local_without_download() {
            let fx = Fixture::new("updater-current");
            fx.server.route("/Linux/sys.tiwut", Route::Body(b"build 42\n".to_vec()));
            fx.server
                .route("/Linux/Launcher/main.py", Route::Body(b"print('new')\n".to_vec()));
            fs::create_dir_all(fx.dir.join("Launcher")).expect("launcher dir");
            fs::write(fx.dir.join("Launcher/main.py"), b"print('old')\n").expect("artifact");
            fs::write(fx.dir.join("sys.tiwut"), b"build 42\n").expect("marker");

            let mut outcome = fx
                .checker(fx.hash_config())
                .run(|_| {})
                .await
                .expect("updater run");
            let _ = outcome.child.wait();

            assert_eq!(outcome.decision, UpdateDecision::RunLocal);
            assert!(!outcome.updated);
            assert_eq!(fx.server.hits("/Linux/Launcher/main.py"), 0);
            assert_eq!(fx.launches(), 1);
        }

        #[tokio::test]
        async fn unreachable_server_falls_back_or_fails() {
            let fx = Fixture::new("updater-offline");
            fx.server.route("/Linux/sys.tiwut", Route::Status(503));
            let checker = fx.checker(fx.hash_config());

            let err = checker.run(|_| {}).await.expect_err("nothing to run");
            assert!(matches!(err, LauncherError::Update(_)));
            assert_eq!(fx.launches(), 0);

            fs::create_dir_all(fx.dir.join("Launcher")).expect("launcher dir");
            fs::write(fx.dir.join("Launcher/main.py"), b"print('old')\n").expect("artifact");
            let mut outcome = checker.run(|_| {}).await.expect("run local");
            let _ = outcome.child.wait();
            assert_eq!(outcome.decision, UpdateDecision::RunLocal);
            assert_eq!(fx.launches(), 1);
        }

        #[tokio::test]
        async fn failed_artifact_download_keeps_the_old_version() {
            let fx = Fixture::new("updater-keep");
            fx.server.route("/Linux/sys.tiwut", Route::Body(b"build 43\n".to_vec()));
            fx.server.route("/Linux/Launcher/main.py", Route::Status(404));
            fs::create_dir_all(fx.dir.join("Launcher")).expect("launcher dir");
            fs::write(fx.dir.join("Launcher/main.py"), b"print('old')\n").expect("artifact");
            fs::write(fx.dir.join("sys.tiwut"), b"build 42\n").expect("marker");

            let mut outcome = fx
                .checker(fx.hash_config())
                .run(|_| {})
                .await
                .expect("fallback run");
            let _ = outcome.child.wait();

            assert!(!outcome.updated);
            assert_eq!(
                fs::read(fx.dir.join("Launcher/main.py")).expect("artifact"),
                b"print('old')\n"
            );
            assert_eq!(fs::read(fx.dir.join("sys.tiwut")).expect("marker"), b"build 42\n");
            assert_eq!(fx.launches(), 1);
        }

        #[tokio::test]
        async fn version_mode_fetches_the_named_artifact() {
            let fx = Fixture::new("updater-version");
            fx.server.route("/Launcher/sys.tiwut", Route::Body(b" 3.2.1 \n".to_vec()));
            fx.server.route("/Launcher/3.2.1", Route::Body(b"binary".to_vec()));
            fs::write(fx.dir.join("sys.tiwut"), b"3.2.0").expect("old marker");
            fs::write(fx.dir.join("Tiwut_Launcher.exe"), b"old binary").expect("old artifact");

            let mut config = UpdaterConfig::windows_defaults(fx.dir.clone());
            config.fingerprint_url = fx.server.url("/Launcher/sys.tiwut");
            config.artifact_base_url = Some(fx.server.url("/Launcher/"));
            let mut outcome = fx.checker(config).run(|_| {}).await.expect("update run");
            let _ = outcome.child.wait();

            assert_eq!(
                outcome.decision,
                UpdateDecision::UpdateThenRun {
                    remote: "3.2.1".to_string()
                }
            );
            assert_eq!(outcome.setup, Some(SetupOutcome::default()));
            assert_eq!(fs::read(fx.dir.join("Tiwut_Launcher.exe")).expect("artifact"), b"binary");
            assert_eq!(
                fs::read_to_string(fx.dir.join("sys.tiwut")).expect("marker"),
                "3.2.1"
            );
        }
    }
}
