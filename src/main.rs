use std::io::{self, BufRead, Write};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tokio::sync::mpsc;

use tiwut_launcher::commands::{install, library, sources, system};
use tiwut_launcher::config::LauncherConfig;
use tiwut_launcher::models::InstallEvent;
use tiwut_launcher::utils::paths::resolve_root_dir;
use tiwut_launcher::{logging, AppState, CatalogOrigin};

#[derive(Parser, Debug)]
#[command(name = "tiwut-launcher", version, about = "Browse, install and launch Tiwut apps")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show every app in the library
    List,
    /// Show installed apps
    Installed,
    /// Download and install an app
    Install { name: String },
    /// Remove an installed app and its shortcut
    Uninstall {
        name: String,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Start an installed app
    Launch { name: String },
    /// Create a desktop shortcut for an installed app
    Shortcut { name: String },
    /// Print the icon file used for an app
    Icon { name: String },
    /// Show or edit the library manifest URLs
    Sources {
        #[command(subcommand)]
        action: Option<SourceAction>,
    },
}

#[derive(Subcommand, Debug)]
enum SourceAction {
    Add { url: String },
    Remove { url: String },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("error: {}", message);
            ExitCode::from(1)
        }
    }
}

async fn run(cli: Cli) -> Result<(), String> {
    let root = resolve_root_dir();
    let mut config = LauncherConfig::load(&root).map_err(|err| err.to_string())?;
    if let Err(err) = logging::init(&config.log_dir(), "launcher.log") {
        eprintln!("logging disabled: {}", err);
    }
    tracing::info!("launcher started root={:?} install_root={:?}", root, config.install_root());

    if let Command::Sources { action } = &cli.command {
        return run_sources(&mut config, action.as_ref());
    }

    let (state, events) = AppState::new(config).map_err(|err| err.to_string())?;
    for name in state.recover_interrupted() {
        println!("Removed unfinished install of {}", name);
    }
    if state.refresh_catalog().await == CatalogOrigin::Offline {
        println!("Library unavailable. Showing installed apps only.");
    }

    match cli.command {
        Command::List => {
            for app in library::list_apps(&state)? {
                println!(
                    "{:<32} {}{}",
                    app.name,
                    if app.installed { "installed" } else { "available" },
                    app.info_url.map(|url| format!("  {}", url)).unwrap_or_default()
                );
            }
            Ok(())
        }
        Command::Installed => {
            for app in library::installed_apps(&state)? {
                let info = library::app_install_info(&state, &app.name)?;
                println!(
                    "{:<32} {}",
                    app.name,
                    info.install_path.unwrap_or_default()
                );
            }
            Ok(())
        }
        Command::Install { name } => run_install(&state, events, &name).await,
        Command::Uninstall { name, yes } => {
            if !yes && !confirm(&format!("Uninstall {}?", name))? {
                println!("Cancelled.");
                return Ok(());
            }
            install::uninstall_app(&state, &name).await?;
            println!("{} has been uninstalled.", name);
            Ok(())
        }
        Command::Launch { name } => {
            let running = system::launch_app(&state, &name)?;
            println!("Started {} (pid {})", running.name, running.pid);
            Ok(())
        }
        Command::Shortcut { name } => {
            let path = system::create_shortcut(&state, &name).await?;
            println!("Shortcut created at {}", path.display());
            Ok(())
        }
        Command::Icon { name } => {
            match system::resolve_icon(&state, &name).await? {
                Some(path) => println!("{}", path.display()),
                None => println!("No icon available for {}", name),
            }
            Ok(())
        }
        Command::Sources { .. } => Ok(()),
    }
}

async fn run_install(
    state: &AppState,
    mut events: mpsc::UnboundedReceiver<InstallEvent>,
    name: &str,
) -> Result<(), String> {
    let worker = install::install_app(state, name)?;
    let mut outcome = Err(format!("install of {} ended without a result", name));

    while let Some(event) = events.recv().await {
        match event {
            InstallEvent::Progress { update, .. } => {
                let pct = update
                    .percentage
                    .map(|value| format!("{:>5.1}%", value))
                    .unwrap_or_else(|| "  ...".to_string());
                if update.info.is_empty() {
                    println!("{} {}", pct, update.status);
                } else {
                    println!("{} {}  {}", pct, update.status, update.info);
                }
            }
            InstallEvent::Completed { message, .. } => {
                println!("{}", message);
                outcome = Ok(());
                break;
            }
            InstallEvent::Failed {
                operation, message, ..
            } => {
                outcome = Err(format!("{} failed: {}", operation, message));
                break;
            }
        }
    }

    if let Err(err) = worker.await {
        tracing::error!("install worker panicked app={}: {}", name, err);
    }
    outcome
}

fn run_sources(config: &mut LauncherConfig, action: Option<&SourceAction>) -> Result<(), String> {
    match action {
        None => {
            for url in sources::list_sources(config) {
                println!("{}", url);
            }
        }
        Some(SourceAction::Add { url }) => {
            if sources::add_source(config, url)? {
                println!("Added {}", url);
            } else {
                println!("{} is already configured", url);
            }
        }
        Some(SourceAction::Remove { url }) => {
            if sources::remove_source(config, url)? {
                println!("Removed {}", url);
            } else {
                println!("{} was not configured", url);
            }
        }
    }
    Ok(())
}

fn confirm(question: &str) -> Result<bool, String> {
    print!("{} [y/N] ", question);
    io::stdout().flush().map_err(|err| err.to_string())?;
    let mut answer = String::new();
    io::stdin()
        .lock()
        .read_line(&mut answer)
        .map_err(|err| err.to_string())?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}
