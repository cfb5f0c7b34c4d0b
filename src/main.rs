mod config;
mod error;
mod merge;
mod model;
mod payload;
mod pipeline;
mod resolve;
mod scraper;
mod sources;
mod store;
mod validate;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use clap::{Parser, Subcommand};

use crate::config::Settings;
use crate::pipeline::Outcome;
use crate::scraper::SourceKind;

#[derive(Parser)]
#[command(name = "ardb_scraper", about = "ardb.tools item database builder")]
struct Cli {
    /// Settings file (TOML); ARDB_* env vars override it
    #[arg(long, global = true, default_value = "ardb.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Backup, scrape all sources, merge, validate and save
    Update {
        /// Stop after scraping
        #[arg(long)]
        scrape_only: bool,
    },
    /// Scrape one source and print its normalized records
    Scrape {
        source: SourceKind,
        /// Records to print
        #[arg(short = 'n', long, default_value = "3")]
        limit: usize,
    },
    /// Validate a snapshot on disk
    Validate {
        /// Snapshot path (default: configured data path)
        #[arg(long)]
        path: Option<PathBuf>,
    },
    /// List backups, newest first
    Backups,
    /// Restore the newest backup, or the newest matching TARGET
    Rollback { target: Option<String> },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let settings = Settings::load(&cli.config)?;

    let result = match cli.command {
        Commands::Update { scrape_only } => {
            match pipeline::run_update(&settings, scrape_only).await? {
                Outcome::Saved { items } => {
                    println!("Saved {} items to {}", items, settings.data_path.display());
                    Ok(ExitCode::SUCCESS)
                }
                Outcome::Rejected(report) => {
                    println!(
                        "Validation failed with {} errors; existing data kept.",
                        report.errors.len()
                    );
                    Ok(ExitCode::FAILURE)
                }
                Outcome::ScrapedOnly => Ok(ExitCode::SUCCESS),
            }
        }
        Commands::Scrape { source, limit } => {
            let preview = scraper::scrape_source(&settings, source, limit).await?;
            println!("{}", serde_json::to_string_pretty(&preview)?);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Validate { path } => {
            let path = path.unwrap_or_else(|| settings.data_path.clone());
            let snapshot = store::load_snapshot(&path)?;
            let report = validate::validate(&snapshot);
            report.log();
            println!(
                "{}: {} errors, {} warnings",
                if report.valid { "VALID" } else { "INVALID" },
                report.errors.len(),
                report.warnings.len()
            );
            Ok(if report.valid {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Commands::Backups => {
            let backups = store::list_backups(&settings.backup_dir)?;
            if backups.is_empty() {
                println!("No backups in {}", settings.backup_dir.display());
            }
            for (i, b) in backups.iter().enumerate() {
                println!("{:>3}. {}", i + 1, b);
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Rollback { target } => {
            let file = store::rollback(&settings.data_path, &settings.backup_dir, target.as_deref())?;
            println!("Restored {} from {}", settings.data_path.display(), file);
            Ok(ExitCode::SUCCESS)
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
