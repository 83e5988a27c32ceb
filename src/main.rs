//! CLI entry point for sds-finder.

use std::path::Path;

use anyhow::{Context, Result, bail};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use sds_core::nfpa::{RuleTable, TemperatureScale};
use sds_core::service::{BatchFetchRequest, SdsService};
use sds_core::source::build_source_set;
use sds_core::Settings;
use tracing::{debug, info, warn};

mod cli;

use cli::{Args, Command};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();
    let dotenv = dotenvy::dotenv();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match dotenv {
        Ok(path) => debug!(path = %path.display(), "loaded environment file"),
        Err(error) if error.not_found() => {}
        Err(error) => warn!(error = %error, "ignoring unreadable environment file"),
    }
    debug!(?args, "CLI arguments parsed");

    let mut settings = Settings::load(args.config.as_deref()).context("loading settings")?;
    if let Some(dir) = args.sds_dir {
        settings.sds_dir = dir;
    }
    if let Some(database) = args.database {
        settings.database_path = database;
    }

    match args.command {
        Command::Classify {
            category,
            flash_point,
            boiling_point,
            celsius,
        } => {
            let rules = RuleTable::load(settings.nfpa_rules_path.as_deref())
                .context("loading NFPA rules")?;
            let scale = if celsius {
                TemperatureScale::Celsius
            } else {
                TemperatureScale::Fahrenheit
            };
            print_json(&rules.classify(&category, flash_point, boiling_point, scale))
        }
        Command::Sources => print_json(&build_source_set(&settings).describe()),
        command => {
            let service = SdsService::open(settings)
                .await
                .context("opening SDS store")?;
            let result = run(&service, command, args.quiet).await;
            service.close().await;
            result
        }
    }
}

async fn run(service: &SdsService, command: Command, quiet: bool) -> Result<()> {
    match command {
        Command::Fetch {
            identifiers,
            pool_size,
        } => {
            let summary = service
                .batch_fetch(BatchFetchRequest {
                    identifiers,
                    pool_size: pool_size.map(usize::from),
                })
                .await?;
            info!(
                downloaded = summary.downloaded,
                already_exists = summary.already_exists,
                failed = summary.failed,
                "fetch complete"
            );
            print_json(&summary)
        }
        Command::Import {
            file,
            pool_size,
            chunk_size,
        } => {
            let progress = import_progress(quiet);
            let summary = service
                .import(
                    &file,
                    pool_size.map(usize::from),
                    chunk_size.map(usize::from),
                    |processed, total| {
                        progress.set_length(total as u64);
                        progress.set_position(processed as u64);
                    },
                )
                .await
                .with_context(|| format!("importing {}", file.display()));
            progress.finish_and_clear();
            print_json(&summary?)
        }
        Command::Status { identifier } => print_json(&service.status(&identifier).await?),
        Command::Document { identifier, output } => {
            let (file_name, bytes) = service.read_document(&identifier).await?;
            let path = output.join(file_name);
            write_document(&path, &bytes).await?;
            println!("{}", path.display());
            Ok(())
        }
        Command::Validate { identifier } => print_json(&service.validate(&identifier).await?),
        Command::Extract { identifier } => print_json(&service.extract(&identifier).await?),
        Command::Hazards { identifier } => match service.hazards(&identifier).await? {
            Some(record) => print_json(&record),
            None => bail!("no hazard record for {identifier}; run extract first"),
        },
        Command::Stats => print_json(&service.stats().await?),
        Command::Remove { identifier } => print_json(&service.remove(&identifier).await?),
        Command::Classify { .. } | Command::Sources => Ok(()),
    }
}

fn import_progress(quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::with_template("{bar:40} {pos}/{len} identifiers")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    bar
}

async fn write_document(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    tokio::fs::write(path, bytes)
        .await
        .with_context(|| format!("writing {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
