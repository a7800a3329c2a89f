use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use tiwut_launcher::logging;
use tiwut_launcher::services::platform;
use tiwut_launcher::services::update_checker::{UpdateChecker, UpdaterConfig};
use tiwut_launcher::utils::paths::resolve_log_dir;

#[derive(Parser, Debug)]
#[command(name = "tiwut-updater", version, about = "Keeps the Tiwut launcher up to date and starts it")]
struct Cli {
    /// Updater settings (defaults to `updater.json` in the working directory)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let work_dir = match std::env::current_dir() {
        Ok(dir) => dir,
        Err(err) => {
            eprintln!("error: cannot determine working directory: {}", err);
            return ExitCode::from(1);
        }
    };
    if let Err(err) = logging::init(&resolve_log_dir(&work_dir), "updater.log") {
        eprintln!("logging disabled: {}", err);
    }

    let config = match UpdaterConfig::load(cli.config.as_deref(), &work_dir) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: {}", err);
            return ExitCode::from(1);
        }
    };
    let wait_for_exit = config.wait_for_exit;
    let checker = match UpdateChecker::new(config, platform::current()) {
        Ok(checker) => checker,
        Err(err) => {
            eprintln!("error: {}", err);
            return ExitCode::from(1);
        }
    };

    let mut last_line = String::new();
    let outcome = checker
        .run(|status| {
            if status != last_line {
                println!("{}", status);
                last_line = status;
            }
        })
        .await;

    match outcome {
        Ok(mut outcome) => {
            if let Some(setup) = outcome.setup.filter(|setup| setup.failed > 0) {
                println!(
                    "{} of {} setup commands failed, see the updater log.",
                    setup.failed, setup.executed
                );
            }
            println!("Starting launcher...");
            if wait_for_exit {
                if let Err(err) = outcome.child.wait() {
                    tracing::warn!("waiting for launcher failed: {}", err);
                }
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::error!("updater failed: {}", err);
            eprintln!("error: {}", err);
            ExitCode::from(1)
        }
    }
}
