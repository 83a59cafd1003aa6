mod app;
mod config;
mod db;
mod error;
mod extractor;
mod fetcher;
mod logger;
mod models;
mod notify;
mod telegram;
mod utils;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use log::{debug, error, info};

use crate::config::{Config, RunOptions};
use crate::logger::init_logger;
use crate::telegram::TelegramNotifier;
use crate::utils::now_shanghai;

#[derive(Parser)]
#[command(name = "dramaradar")]
#[command(about = "Announce shows that newly appear on the Maoyan web-heat ranking")]
struct Cli {
    /// Report what would happen without touching the ledger or sending anything
    #[arg(long)]
    dry_run: bool,

    /// Update the ledger but skip the Telegram message
    #[arg(long, alias = "no-notify")]
    no_telegram: bool,

    /// Debug-level logging
    #[arg(long)]
    verbose: bool,

    /// Ledger location (overrides DRAMARADAR_DB_PATH and the config file)
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Write a config template to the XDG config directory and exit
    #[arg(long)]
    init_config: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let line = error_line(&e);
            // stderr always gets the line, whether or not the logger came up
            eprintln!("{line}");
            error!("{line}");
            ExitCode::FAILURE
        }
    }
}

fn error_line(e: &anyhow::Error) -> String {
    format!("[ERR] {e:#}")
}

async fn run(cli: Cli) -> Result<()> {
    init_logger(cli.verbose)?;

    if cli.init_config {
        let outcome = Config::ensure_user_config()?;
        if outcome.created {
            info!("Config template written to {}", outcome.path.display());
        } else {
            info!("Config already exists at {}", outcome.path.display());
        }
        return Ok(());
    }

    let cfg = Config::load(cli.db_path)?;
    debug!("Config resolved: db at {}, top {}", cfg.db_path.display(), cfg.top_n);

    let opts = RunOptions {
        dry_run: cli.dry_run,
        no_notify: cli.no_telegram,
        verbose: cli.verbose,
    };

    let notifier = TelegramNotifier::from_config(&cfg);
    let outcome = app::run_monitor(&cfg, opts, &notifier, now_shanghai()).await?;
    debug!("Run finished: {outcome:?}");

    Ok(())
}
