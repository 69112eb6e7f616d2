//! avbag-repair - directed bag repair entry point
//!
//! Applies the requested repairs to one or more bags, re-validates
//! each, and prints what changed plus the post-repair verdict. Exits
//! non-zero when a repair is refused or a repaired bag still fails
//! validation.

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
use avbag_common::BagStatus;
use avbag_repair::{Directives, RepairEngine, RepairOutcome};

/// Command-line arguments for avbag-repair
#[derive(Parser, Debug)]
#[command(name = "avbag-repair")]
#[command(about = "Repair correctable defects in BagIt preservation packages")]
#[command(version)]
struct Args {
    /// Bag directory to repair (repeatable)
    #[arg(short = 'b', long = "bag", value_name = "BAG", required = true)]
    bags: Vec<PathBuf>,

    /// Delete hidden files and directories anywhere under the bag
    #[arg(long)]
    hidden: bool,

    /// Rewrite payload manifests from the files on disk
    #[arg(long)]
    manifest: bool,

    /// Recount and rewrite Payload-Oxum and Bag-Size in bag-info.txt
    #[arg(long)]
    oxum: bool,

    /// Rewrite tag manifests from the tag files on disk
    #[arg(long)]
    tagmanifest: bool,

    /// Apply every repair
    #[arg(long)]
    all: bool,

    /// Console shows warnings and errors only
    #[arg(short, long)]
    quiet: bool,

    /// Append the detail log to this file
    #[arg(long = "log", value_name = "FILE", env = "AVBAG_LOG")]
    log_file: Option<PathBuf>,

    /// Emit repair outcomes as JSON on stdout
    #[arg(long)]
    json: bool,

    /// Directory holding audio.json/video.json/film.json schemas
    #[arg(long, value_name = "DIR", env = "AVBAG_SCHEMA_DIR")]
    schema_dir: Option<PathBuf>,

    /// Configuration file (default: ~/.config/avbag/avbag.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

impl Args {
    fn directives(&self) -> Directives {
        if self.all {
            Directives::all()
        } else {
            Directives {
                hidden: self.hidden,
                manifest: self.manifest,
                oxum: self.oxum,
                tagmanifest: self.tagmanifest,
            }
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let directives = args.directives();
    if !directives.any() {
        bail!("no repair directives given; pass --hidden, --manifest, --oxum, --tagmanifest or --all");
    }

    let overrides = ConfigOverrides {
        schema_dir: args.schema_dir.clone(),
        workers: None,
        log_level: None,
        log_file: args.log_file.clone(),
    };
    let config = Config::load(args.config.as_deref(), overrides)?;

    init_tracing(&config, args.quiet)?;
    info!(version = env!("CARGO_PKG_VERSION"), "avbag-repair starting");

    // Repair mutates the bag, so bags are processed one at a time in
    // the order given; a refused bag never stops the rest of the run
    let engine = RepairEngine::new(&config)?;
    let mut outcomes: Vec<RepairOutcome> = Vec::new();
    let mut refusals: Vec<(PathBuf, String)> = Vec::new();
    for path in &args.bags {
        match engine.repair(path, directives) {
            Ok(outcome) => outcomes.push(outcome),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Repair refused");
                refusals.push((path.clone(), e.to_string()));
            }
        }
    }

    if args.json {
        let refused: Vec<_> = refusals
            .iter()
            .map(|(path, error)| {
                serde_json::json!({ "bag": path.display().to_string(), "error": error })
            })
            .collect();
        let payload = serde_json::json!({ "repairs": outcomes, "refused": refused });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        for outcome in &outcomes {
            print_outcome(outcome, args.quiet);
        }
        for (path, error) in &refusals {
            println!("REFUSED  {}: {}", path.display(), error);
        }
        print_totals(&outcomes, refusals.len());
    }

    let all_valid = refusals.is_empty()
        && outcomes.iter().all(|o| o.report.status == BagStatus::Valid);
    if !all_valid {
        std::process::exit(1);
    }
    Ok(())
}

/// Console layer honors RUST_LOG, then the configured level, with
/// `--quiet` flooring the console at warnings. Logs go to stderr so
/// outcome lines and `--json` output own stdout. The file layer always
/// logs at the configured level so a quiet console run still leaves a
/// full record.
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

fn print_outcome(outcome: &RepairOutcome, quiet: bool) {
    if !quiet {
        println!("REPAIRED {}", outcome.bag);
        for step in &outcome.steps {
            if step.changed.is_empty() {
                println!("    {:<22} nothing to change", step.step);
            } else {
                println!("    {:<22} {}", step.step, step.changed.join(", "));
            }
        }
    }
    match outcome.report.status {
        BagStatus::Valid => {
            if !quiet {
                println!(
                    "VALID    {} after repair ({} ms)",
                    outcome.bag, outcome.report.elapsed_ms
                );
            }
        }
        BagStatus::Invalid => {
            println!(
                "INVALID  {} after repair: {} defects",
                outcome.bag,
                outcome.report.defect_count()
            );
            for defect in outcome.report.defects() {
                println!("    {}", defect);
            }
        }
        BagStatus::Error => {
            println!(
                "ERROR    {}: {}",
                outcome.bag,
                outcome.report.error.as_deref().unwrap_or("unknown failure")
            );
        }
    }
}

fn print_totals(outcomes: &[RepairOutcome], refused: usize) {
    let valid = outcomes
        .iter()
        .filter(|o| o.report.status == BagStatus::Valid)
        .count();
    println!();
    println!(
        "{} bags repaired: {} valid after repair, {} still failing, {} refused",
        outcomes.len(),
        valid,
        outcomes.len() - valid,
        refused
    );
}
