// wpa/src/main.rs
use std::env;
use std::process;
use std::sync::Arc;

use clap::Parser;
use colored::Colorize;
use tracing::level_filters::LevelFilter;
use tracing::{debug, error, warn};
use tracing_subscriber::EnvFilter;
use wpa_common::config::Config;
use wpa_common::error::{Result, WpaError};
use wpa_common::{CancelToken, RunContext};
use wpa_core::{teardown_scratch, Analyzer};

mod cli;
mod progress;
mod report;

use cli::CliArgs;
use progress::ProgressReporter;
use report::{render_json, render_report};

const LOG_ENV_VAR: &str = "WPA_LOG";

fn init_logging(verbose: u8) {
    let level_filter = match verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    let mut env_filter = EnvFilter::builder()
        .with_default_directive(level_filter.into())
        .with_env_var(LOG_ENV_VAR)
        .from_env_lossy();
    // Quiet libraries, but keep the run summary from our own crates.
    if verbose == 0 && env::var_os(LOG_ENV_VAR).is_none() {
        if let Ok(directive) = "wpa=info".parse() {
            env_filter = env_filter.add_directive(directive);
        }
    }

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .without_time()
        .try_init();
}

fn spawn_interrupt_handler(cancel: CancelToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling downloads");
            cancel.cancel();
        }
    });
}

async fn run(cli_args: &CliArgs) -> Result<()> {
    let mut config = Config::load()?;
    cli_args.apply(&mut config)?;

    if cli_args.teardown {
        let removed = teardown_scratch(&config)?;
        let status = if removed { "Removed" } else { "Nothing to remove at" };
        eprintln!(
            "{}{} {}",
            "==> ".bold().blue(),
            status,
            config.scratch_dir().display()
        );
        return Ok(());
    }

    let live_root = cli_args
        .wordpress_path
        .clone()
        .ok_or_else(|| WpaError::Config("WORDPRESS_PATH is required".to_string()))?;

    let cancel = CancelToken::new();
    spawn_interrupt_handler(cancel.clone());

    let reporter = Arc::new(ProgressReporter::new());
    let ctx = RunContext::new(config.clone())
        .with_observer(reporter.clone())
        .with_cancel_token(cancel);
    let outcome = Analyzer::new(ctx)?
        .run(&live_root, cli_args.reference_source())
        .await;
    reporter.finish();
    let report = outcome?;

    if cli_args.json {
        print!("{}", render_json(&report)?);
    } else {
        print!("{}", render_report(&report));
    }
    eprintln!(
        "{}{} {} (reference: {})",
        "==> ".bold().blue(),
        "Analysed".bold(),
        report.live_root.display(),
        report.reference_root.display()
    );

    if cli_args.tidy_up && cli_args.other_wordpress_path.is_none() {
        teardown_scratch(&config)?;
        debug!("Tidied up {}", config.scratch_dir().display());
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli_args = CliArgs::parse();
    init_logging(cli_args.verbose);

    if let Err(e) = run(&cli_args).await {
        error!("Analysis failed: {:#}", e);
        eprintln!("{}: {:#}", "Error".red().bold(), e);
        process::exit(1);
    }
    debug!("Analysis completed successfully.");
}
