//! avbag-validate - batch validation entry point
//!
//! Validates one or more bags and prints a per-bag report plus a run
//! summary. Exits non-zero when any bag is invalid or errored, so
//! wrapping scripts can gate deliveries on the exit code.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use avbag_common::config::{Config, ConfigOverrides};
use avbag_common::{BagReport, BagStatus, RunSummary};
use avbag_validate::runner::{RunOptions, Runner};

/// Command-line arguments for avbag-validate
#[derive(Parser, Debug)]
#[command(name = "avbag-validate")]
#[command(about = "Validate BagIt preservation packages: structure, checksums, metadata")]
#[command(version)]
struct Args {
    /// Bag directory to validate (repeatable)
    #[arg(short = 'b', long = "bag", value_name = "BAG")]
    bags: Vec<PathBuf>,

    /// Directory whose immediate subdirectories are bags (repeatable)
    #[arg(short = 'd', long = "directory", value_name = "DIR")]
    directories: Vec<PathBuf>,

    /// Deep metadata mode: probe media files and compare against sidecars
    #[arg(long)]
    metadata: bool,

    /// Recompute payload checksums (entry-set and oxum checks only otherwise)
    #[arg(long)]
    slow: bool,

    /// Console shows warnings and errors only
    #[arg(short, long)]
    quiet: bool,

    /// Append the detail log to this file
    #[arg(long = "log", value_name = "FILE", env = "AVBAG_LOG")]
    log_file: Option<PathBuf>,

    /// Emit reports and summary as JSON on stdout
    #[arg(long)]
    json: bool,

    /// Worker pool size (default: CPU count, clamped to 2..=8)
    #[arg(long, env = "AVBAG_WORKERS")]
    workers: Option<usize>,

    /// Directory holding audio.json/video.json/film.json schemas
    #[arg(long, value_name = "DIR", env = "AVBAG_SCHEMA_DIR")]
    schema_dir: Option<PathBuf>,

    /// Configuration file (default: ~/.config/avbag/avbag.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let overrides = ConfigOverrides {
        schema_dir: args.schema_dir.clone(),
        workers: args.workers,
        log_level: None,
        log_file: args.log_file.clone(),
    };
    let config = Config::load(args.config.as_deref(), overrides)?;

    init_tracing(&config, args.quiet)?;
    info!(version = env!("CARGO_PKG_VERSION"), "avbag-validate starting");

    let bags = Runner::discover_bags(&args.bags, &args.directories)?;
    if bags.is_empty() {
        bail!("no bags to validate; pass -b <BAG> or -d <DIR>");
    }

    let runner = Runner::new(
        &config,
        RunOptions {
            slow: args.slow,
            deep: args.metadata,
        },
    )?;
    let (reports, summary) = runner.run(bags).await?;

    if args.json {
        let payload = serde_json::json!({ "bags": reports, "summary": summary });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        print_reports(&reports, args.quiet);
        print_summary(&summary);
    }

    for kind in &summary.systemic {
        warn!(kind = %kind, "Same defect across most of this run; likely a vendor-side process error");
    }

    if !summary.all_valid() {
        std::process::exit(1);
    }
    Ok(())
}

/// Console layer honors RUST_LOG, then the configured level, with
/// `--quiet` flooring the console at warnings. Logs go to stderr so
/// reports and `--json` output own stdout. The file layer always logs
/// at the configured level so a quiet console run still leaves a full
/// record.
fn init_tracing(config: &Config, quiet: bool) -> Result<()> {
    let console_level = if quiet {
        "warn".to_string()
    } else {
        config.logging.level.clone()
    };
    let console = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&console_level)),
        );

    let file_layer = match &config.logging.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("cannot open log file {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(Arc::new(file))
                    .with_ansi(false)
                    .with_filter(EnvFilter::new(&config.logging.level)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file_layer)
        .init();
    Ok(())
}

fn print_reports(reports: &[BagReport], quiet: bool) {
    for report in reports {
        match report.status {
            BagStatus::Valid => {
                if !quiet {
                    println!("VALID    {} ({} ms)", report.bag, report.elapsed_ms);
                }
            }
            BagStatus::Invalid => {
                println!("INVALID  {}: {} defects", report.bag, report.defect_count());
                for defect in report.defects() {
                    println!("    {}", defect);
                }
            }
            BagStatus::Error => {
                println!(
                    "ERROR    {}: {}",
                    report.bag,
                    report.error.as_deref().unwrap_or("unknown failure")
                );
            }
        }
    }
}

fn print_summary(summary: &RunSummary) {
    println!();
    println!(
        "{} bags checked: {} valid, {} invalid, {} errored",
        summary.bags_checked, summary.bags_valid, summary.bags_invalid, summary.bags_errored
    );
    for (kind, count) in &summary.defect_counts {
        println!("    {:<34} {}", kind.to_string(), count);
    }
    for kind in &summary.systemic {
        println!(
            "SYSTEMIC {}: affects most of this run; stop and notify the vendor before per-bag repair",
            kind
        );
    }
}
