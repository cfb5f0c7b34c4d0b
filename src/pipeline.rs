use anyhow::Result;
use tracing::{error, info};

use crate::config::Settings;
use crate::merge;
use crate::model::Sources;
use crate::scraper;
use crate::store;
use crate::validate::{self, ValidationReport};

#[derive(Debug)]
pub enum Outcome {
    /// Snapshot validated and written.
    Saved { items: usize },
    /// Validation failed; the live snapshot was left untouched.
    Rejected(ValidationReport),
    ScrapedOnly,
}

/// backup → scrape → merge → validate → persist.
pub async fn run_update(settings: &Settings, scrape_only: bool) -> Result<Outcome> {
    info!("[update] Starting data update pipeline...");
    store::backup(&settings.data_path, &settings.backup_dir)?;

    info!("[update] Scraping data sources...");
    let sources = scraper::scrape_all(settings).await?;

    if scrape_only {
        info!("[update] Scrape-only mode, skipping merge");
        return Ok(Outcome::ScrapedOnly);
    }

    merge_and_persist(settings, &sources)
}

pub fn merge_and_persist(settings: &Settings, sources: &Sources) -> Result<Outcome> {
    info!("[update] Merging data...");
    let snapshot = merge::merge(sources, &settings.workshop_overrides);

    info!("[update] Validating...");
    let report = validate::validate(&snapshot);
    report.log();

    if !report.valid {
        error!("[update] Validation failed, keeping existing data");
        return Ok(Outcome::Rejected(report));
    }

    info!("[update] Validation passed, saving data...");
    store::save_snapshot(&settings.data_path, &snapshot)?;
    Ok(Outcome::Saved {
        items: snapshot.items.len(),
    })
}
