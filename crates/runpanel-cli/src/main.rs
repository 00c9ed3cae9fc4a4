use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use clap::Subcommand;
use runpanel_core::config::AppMode;

mod headless;
mod logging;
mod settings;
mod ui;

/// Trigger workflow and completion runs and watch them stream in.
#[derive(Parser)]
#[command(name = "runpanel")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the config file (default: <config dir>/runpanel/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the interactive panel (default)
    Tui {
        /// Override the app mode instead of asking the app info endpoint
        #[arg(long)]
        mode: Option<AppMode>,
    },
    /// Trigger one run and print its results
    Run {
        /// Input value as key=value, or key=@path to upload a file; repeatable
        #[arg(short, long = "input", value_name = "KEY=VALUE")]
        inputs: Vec<String>,

        /// Override the app mode (workflow or completion)
        #[arg(long)]
        mode: Option<AppMode>,

        /// Print only the outputs JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the app info and its input form
    Params,
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = settings::load(cli.config.as_deref())?;
    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;

    match cli.command.unwrap_or(Commands::Tui { mode: None }) {
        Commands::Tui { mode } => {
            let _guard = logging::init_file()?;
            ui::run(&runtime, &config, mode.or(config.app.mode))?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Run { inputs, mode, json } => {
            logging::init_stderr()?;
            let inputs = inputs
                .iter()
                .map(|raw| settings::parse_input(raw))
                .collect::<Result<Vec<_>>>()?;
            let finished = headless::run_once(
                &runtime,
                &config,
                headless::RunOptions { inputs, mode, json },
            )?;
            Ok(if finished {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Commands::Params => {
            logging::init_stderr()?;
            headless::show_params(&runtime, &config)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
