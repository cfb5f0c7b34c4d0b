use anyhow::{Context, Result};
use clap::ValueEnum;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::info;

use crate::config::Settings;
use crate::error::ExtractionError;
use crate::model::Sources;
use crate::payload;
use crate::sources::{crafting, items, quests, recycling, workshop};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SourceKind {
    Items,
    Crafting,
    Recycling,
    Workshop,
    Quests,
}

impl SourceKind {
    pub fn path(self) -> &'static str {
        match self {
            SourceKind::Items => items::PATH,
            SourceKind::Crafting => crafting::PATH,
            SourceKind::Recycling => recycling::PATH,
            SourceKind::Workshop => workshop::PATH,
            SourceKind::Quests => quests::PATH,
        }
    }
}

pub fn client(settings: &Settings) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(&settings.user_agent)
        .build()
        .context("Failed to build HTTP client")
}

/// Fetch one page and run its parser. Any failure is fatal for the source.
async fn scrape<T>(
    client: reqwest::Client,
    url: String,
    parse: fn(&str) -> Result<Vec<T>, ExtractionError>,
    pb: ProgressBar,
) -> Result<Vec<T>> {
    let data = payload::fetch(&client, &url).await?;
    let records = parse(&data).with_context(|| format!("Failed to extract {}", url))?;
    pb.inc(1);
    pb.set_message(format!("{} ({})", url, records.len()));
    Ok(records)
}

async fn joined<T>(handle: JoinHandle<Result<T>>) -> Result<T> {
    handle.await.context("Scrape task panicked")?
}

/// Scrape all five sources concurrently. The first failure aborts the run.
pub async fn scrape_all(settings: &Settings) -> Result<Sources> {
    let client = client(settings)?;

    let pb = ProgressBar::new(5);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} {msg}")?
            .progress_chars("=> "),
    );

    let spawn = |kind: SourceKind| (client.clone(), settings.source_url(kind.path()), pb.clone());

    let (c, u, p) = spawn(SourceKind::Items);
    let items_task = tokio::spawn(scrape(c, u, items::parse, p));
    let (c, u, p) = spawn(SourceKind::Crafting);
    let crafting_task = tokio::spawn(scrape(c, u, crafting::parse, p));
    let (c, u, p) = spawn(SourceKind::Recycling);
    let recycling_task = tokio::spawn(scrape(c, u, recycling::parse, p));
    let (c, u, p) = spawn(SourceKind::Workshop);
    let workshop_task = tokio::spawn(scrape(c, u, workshop::parse, p));
    let (c, u, p) = spawn(SourceKind::Quests);
    let quests_task = tokio::spawn(scrape(c, u, quests::parse, p));

    let results = tokio::try_join!(
        joined(items_task),
        joined(crafting_task),
        joined(recycling_task),
        joined(workshop_task),
        joined(quests_task),
    );
    pb.finish_and_clear();
    let (items, crafting, recycling, workshop, quests) = results?;

    info!(
        "Scraped {} items, {} recipes, {} recycling entries, {} stations, {} quests",
        items.len(),
        crafting.len(),
        recycling.len(),
        workshop.len(),
        quests.len()
    );

    Ok(Sources {
        items,
        crafting,
        recycling,
        workshop,
        quests,
    })
}

fn to_json<T: Serialize>(records: Vec<T>, limit: usize) -> Result<serde_json::Value> {
    let shown: Vec<T> = records.into_iter().take(limit).collect();
    Ok(serde_json::to_value(shown)?)
}

/// Scrape a single source and return up to `limit` normalized records.
pub async fn scrape_source(settings: &Settings, kind: SourceKind, limit: usize) -> Result<serde_json::Value> {
    let client = client(settings)?;
    let url = settings.source_url(kind.path());
    let pb = ProgressBar::hidden();

    match kind {
        SourceKind::Items => to_json(scrape(client, url, items::parse, pb).await?, limit),
        SourceKind::Crafting => to_json(scrape(client, url, crafting::parse, pb).await?, limit),
        SourceKind::Recycling => to_json(scrape(client, url, recycling::parse, pb).await?, limit),
        SourceKind::Workshop => to_json(scrape(client, url, workshop::parse, pb).await?, limit),
        SourceKind::Quests => to_json(scrape(client, url, quests::parse, pb).await?, limit),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_urls() {
        let settings = Settings::default();
        assert_eq!(
            settings.source_url(SourceKind::Workshop.path()),
            "https://ardb.tools/workshop"
        );
        assert_eq!(SourceKind::from_str("quests", true).unwrap(), SourceKind::Quests);
    }

    #[test]
    fn json_preview_is_limited() {
        let v = to_json(vec![1, 2, 3], 2).unwrap();
        assert_eq!(v, serde_json::json!([1, 2]));
    }
}
