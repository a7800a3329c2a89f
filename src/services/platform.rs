use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Child, Command};
use std::sync::Arc;

use crate::errors::{LauncherError, Result};
use crate::utils::paths::{resolve_applications_dir, resolve_desktop_dir};

#[cfg(target_os = "windows")]
const CREATE_NO_WINDOW: u32 = 0x08000000;

#[inline]
fn hide_console_window(command: &mut Command) {
    #[cfg(target_os = "windows")]
    {
        use std::os::windows::process::CommandExt;
        command.creation_flags(CREATE_NO_WINDOW);
    }
    #[cfg(not(target_os = "windows"))]
    let _ = command;
}

/// Everything the launcher needs from the host desktop.
pub trait PlatformAdapter: Send + Sync {
    /// File expected at the top of an extracted package.
    fn entry_point_name(&self) -> &'static str;

    fn launch(&self, exe: &Path, working_dir: &Path) -> Result<Child>;

    /// Builds a command that runs one shell line.
    fn shell_command(&self, line: &str) -> Command;

    fn shortcut_path(&self, name: &str) -> PathBuf;

    fn create_shortcut(&self, name: &str, target: &Path, icon: Option<&Path>) -> Result<PathBuf>;

    /// `Ok(false)` when there was nothing to remove.
    fn remove_shortcut(&self, name: &str) -> Result<bool> {
        let path = self.shortcut_path(name);
        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::info!("shortcut removed {:?}", path);
                Ok(true)
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    /// Runs setup commands in a visible terminal so the user can follow along.
    fn open_setup_terminal(&self, working_dir: &Path, commands: &[String]) -> Result<()>;

    fn mark_executable(&self, path: &Path) -> Result<()>;
}

pub fn current() -> Arc<dyn PlatformAdapter> {
    #[cfg(target_os = "windows")]
    {
        Arc::new(WindowsPlatform::new())
    }
    #[cfg(not(target_os = "windows"))]
    {
        Arc::new(PosixPlatform::new())
    }
}

fn launch_error(exe: &Path, reason: impl ToString) -> LauncherError {
    LauncherError::Launch {
        name: exe
            .file_name()
            .map(|value| value.to_string_lossy().to_string())
            .unwrap_or_else(|| exe.to_string_lossy().to_string()),
        reason: reason.to_string(),
    }
}

fn is_python_script(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("py"))
        .unwrap_or(false)
}

fn find_in_path(program: &str) -> Option<PathBuf> {
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
}

#[derive(Clone, Debug)]
pub struct PosixPlatform {
    applications_dir: PathBuf,
    interpreter: String,
}

impl PosixPlatform {
    pub fn new() -> Self {
        Self::with_applications_dir(resolve_applications_dir())
    }

    pub fn with_applications_dir(applications_dir: PathBuf) -> Self {
        Self {
            applications_dir,
            interpreter: std::env::var("TIWUT_PYTHON")
                .ok()
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| "python3".to_string()),
        }
    }

    /// Python entry points go through the interpreter so a missing shebang or exec bit
    /// does not stop the launch.
    fn command_for(&self, exe: &Path) -> Command {
        if is_python_script(exe) {
            let mut command = Command::new(&self.interpreter);
            command.arg(exe);
            command
        } else {
            Command::new(exe)
        }
    }

    fn setup_script(commands: &[String]) -> String {
        format!(
            "{}; echo; echo 'Setup finished. Press Enter to close.'; read _",
            commands.join(" && ")
        )
    }
}

impl Default for PosixPlatform {
    fn default() -> Self {
        Self::new()
    }
}

/// `.desktop` file contents for an installed app.
pub fn desktop_entry(name: &str, target: &Path, icon: Option<&Path>) -> String {
    let working_dir = target.parent().unwrap_or_else(|| Path::new("."));
    let entry = target
        .file_name()
        .map(|value| value.to_string_lossy().to_string())
        .unwrap_or_default();
    let mut content = format!(
        "[Desktop Entry]\nVersion=1.0\nType=Application\nName={}\nExec=sh -c 'cd \"{}\" && \"./{}\"'\n",
        name,
        working_dir.display(),
        entry
    );
    if let Some(icon) = icon {
        content.push_str(&format!("Icon={}\n", icon.display()));
    }
    content.push_str("Terminal=false\nCategories=Utility;\n");
    content
}

impl PlatformAdapter for PosixPlatform {
    fn entry_point_name(&self) -> &'static str {
        "main.py"
    }

    fn launch(&self, exe: &Path, working_dir: &Path) -> Result<Child> {
        if !exe.is_file() {
            return Err(launch_error(exe, "entry point not found"));
        }
        let mut command = self.command_for(exe);
        command.current_dir(working_dir);
        command.spawn().map_err(|err| launch_error(exe, err))
    }

    fn shell_command(&self, line: &str) -> Command {
        let mut command = Command::new("sh");
        command.arg("-c").arg(line);
        command
    }

    fn shortcut_path(&self, name: &str) -> PathBuf {
        let compact: String = name.chars().filter(|c| !c.is_whitespace()).collect();
        self.applications_dir.join(format!("tiwut-{}.desktop", compact))
    }

    fn create_shortcut(&self, name: &str, target: &Path, icon: Option<&Path>) -> Result<PathBuf> {
        fs::create_dir_all(&self.applications_dir)?;
        let path = self.shortcut_path(name);
        fs::write(&path, desktop_entry(name, target, icon))?;
        self.mark_executable(&path)?;
        tracing::info!("desktop entry written for {} at {:?}", name, path);
        Ok(path)
    }

    fn open_setup_terminal(&self, working_dir: &Path, commands: &[String]) -> Result<()> {
        if commands.is_empty() {
            return Ok(());
        }
        let script = Self::setup_script(commands);
        let candidates: [(&str, &[&str]); 4] = [
            ("gnome-terminal", &["--", "bash", "-c"]),
            ("konsole", &["-e", "bash", "-c"]),
            ("xfce4-terminal", &["-x", "bash", "-c"]),
            ("xterm", &["-e", "bash", "-c"]),
        ];
        for (terminal, prefix) in candidates {
            let Some(program) = find_in_path(terminal) else {
                continue;
            };
            Command::new(program)
                .args(prefix)
                .arg(&script)
                .current_dir(working_dir)
                .spawn()
                .map_err(|err| launch_error(Path::new(terminal), err))?;
            tracing::info!("setup commands opened in {}", terminal);
            return Ok(());
        }
        Err(LauncherError::Launch {
            name: "terminal".to_string(),
            reason: "no supported terminal emulator found".to_string(),
        })
    }

    fn mark_executable(&self, path: &Path) -> Result<()> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(path, fs::Permissions::from_mode(0o755))?;
        }
        #[cfg(not(unix))]
        let _ = path;
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct WindowsPlatform {
    desktop_dir: PathBuf,
}

impl WindowsPlatform {
    pub fn new() -> Self {
        Self::with_desktop_dir(resolve_desktop_dir())
    }

    pub fn with_desktop_dir(desktop_dir: PathBuf) -> Self {
        Self { desktop_dir }
    }
}

impl Default for WindowsPlatform {
    fn default() -> Self {
        Self::new()
    }
}

fn vbs_quote(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

/// WScript that writes a `.lnk` file when run through `cscript`.
pub fn shortcut_script(link: &Path, target: &Path, icon: Option<&Path>) -> String {
    let working_dir = target.parent().unwrap_or_else(|| Path::new("."));
    let mut script = String::new();
    script.push_str("Set oWS = WScript.CreateObject(\"WScript.Shell\")\r\n");
    script.push_str(&format!(
        "Set oLink = oWS.CreateShortcut({})\r\n",
        vbs_quote(&link.to_string_lossy())
    ));
    script.push_str(&format!(
        "oLink.TargetPath = {}\r\n",
        vbs_quote(&target.to_string_lossy())
    ));
    script.push_str(&format!(
        "oLink.WorkingDirectory = {}\r\n",
        vbs_quote(&working_dir.to_string_lossy())
    ));
    if let Some(icon) = icon {
        script.push_str(&format!(
            "oLink.IconLocation = {}\r\n",
            vbs_quote(&icon.to_string_lossy())
        ));
    }
    script.push_str("oLink.Save\r\n");
    script
}

impl PlatformAdapter for WindowsPlatform {
    fn entry_point_name(&self) -> &'static str {
        "main.exe"
    }

    fn launch(&self, exe: &Path, working_dir: &Path) -> Result<Child> {
        if !exe.is_file() {
            return Err(launch_error(exe, "entry point not found"));
        }
        Command::new(exe)
            .current_dir(working_dir)
            .spawn()
            .map_err(|err| launch_error(exe, err))
    }

    fn shell_command(&self, line: &str) -> Command {
        let mut command = Command::new("cmd");
        command.arg("/C").arg(line);
        hide_console_window(&mut command);
        command
    }

    fn shortcut_path(&self, name: &str) -> PathBuf {
        self.desktop_dir.join(format!("{}.lnk", name))
    }

    fn create_shortcut(&self, name: &str, target: &Path, icon: Option<&Path>) -> Result<PathBuf> {
        let link = self.shortcut_path(name);
        let script_path =
            std::env::temp_dir().join(format!("tiwut-shortcut-{}.vbs", uuid::Uuid::new_v4()));
        fs::write(&script_path, shortcut_script(&link, target, icon))?;

        let mut command = Command::new("cscript");
        command.arg("//Nologo").arg(&script_path);
        hide_console_window(&mut command);
        let output = command.output();
        let _ = fs::remove_file(&script_path);

        let output = output.map_err(|err| LauncherError::Launch {
            name: "cscript".to_string(),
            reason: err.to_string(),
        })?;
        if !output.status.success() {
            return Err(LauncherError::Launch {
                name: "cscript".to_string(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        tracing::info!("shortcut written for {} at {:?}", name, link);
        Ok(link)
    }

    fn open_setup_terminal(&self, working_dir: &Path, commands: &[String]) -> Result<()> {
        if commands.is_empty() {
            return Ok(());
        }
        let script = format!("{} & pause", commands.join(" && "));
        Command::new("cmd")
            .args(["/C", "start", "Tiwut Setup", "cmd", "/C"])
            .arg(script)
            .current_dir(working_dir)
            .spawn()
            .map_err(|err| launch_error(Path::new("cmd"), err))?;
        Ok(())
    }

    fn mark_executable(&self, _path: &Path) -> Result<()> {
        Ok(())
    }
}
