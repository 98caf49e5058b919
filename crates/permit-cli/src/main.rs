//! permit CLI
//!
//! Asks for runtime permissions on a simulated device.

use std::io;
use std::path::PathBuf;

use clap::Parser;
use tracing::info;

use permit_cli::commands::{self, Command};
use permit_cli::prompt::{DialogAnswer, ScriptedAnswers};
use permit_cli::session::{Session, StatePaths};
use permit_core::config::load_config;
use permit_core::tracing_init::init_tracing;

#[derive(Parser, Debug)]
#[command(name = "permit")]
#[command(version, about = "Runtime permission prompts on a simulated device", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Rationale flag file
    #[arg(long, global = true)]
    flags: Option<PathBuf>,

    /// Device state file (defaults to device.json next to the flag file)
    #[arg(long, global = true, env = "PERMIT_DEVICE_PATH")]
    device: Option<PathBuf>,

    /// Answer every platform dialog without prompting
    #[arg(long, global = true, value_enum)]
    answer: Option<DialogAnswer>,

    /// Answer every rationale prompt without prompting
    #[arg(long, global = true)]
    confirm_rationale: Option<bool>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let project_dir = std::env::current_dir().ok();
    let mut config = load_config(project_dir.as_deref())?;
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    init_tracing("permit", &config.logging);

    info!(version = env!("CARGO_PKG_VERSION"), "Starting permit CLI");

    let paths = StatePaths::resolve(&config, cli.flags, cli.device)?;
    let answers = ScriptedAnswers {
        dialog: cli.answer,
        rationale: cli.confirm_rationale,
    };
    let session = Session::start(config, &paths, answers)?;

    commands::run(&session, cli.command, &mut io::stdout()).await
}
