use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use tracing::debug;

/// Runtime settings: optional TOML file, overridden by `ARDB_*` env vars.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub base_url: String,
    pub user_agent: String,
    pub data_path: PathBuf,
    pub backup_dir: PathBuf,
    pub workshop_overrides: WorkshopOverrides,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            base_url: "https://ardb.tools".to_string(),
            user_agent: concat!("ardb_scraper/", env!("CARGO_PKG_VERSION")).to_string(),
            data_path: PathBuf::from("data/items.json"),
            backup_dir: PathBuf::from("data/backups"),
            workshop_overrides: WorkshopOverrides::default(),
        }
    }
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self> {
        let settings: Settings = Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(Environment::with_prefix("ARDB"))
            .build()
            .with_context(|| format!("Failed to read settings from {}", path.display()))?
            .try_deserialize()
            .context("Invalid settings")?;

        debug!(
            base_url = %settings.base_url,
            overrides = settings.workshop_overrides.len(),
            "Settings loaded"
        );
        Ok(settings)
    }

    pub fn source_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ItemRef {
    pub id: String,
    pub name: String,
}

/// Hand-verified identities for workshop costs whose reference cannot be
/// resolved, keyed `<stationId>-l<level>-<index>`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct WorkshopOverrides(BTreeMap<String, ItemRef>);

impl WorkshopOverrides {
    pub fn key(station_id: &str, level: u32, index: usize) -> String {
        format!("{}-l{}-{}", station_id, level, index)
    }

    pub fn lookup(&self, station_id: &str, level: u32, index: usize) -> Option<&ItemRef> {
        self.0.get(&Self::key(station_id, level, index))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl FromIterator<(String, ItemRef)> for WorkshopOverrides {
    fn from_iter<I: IntoIterator<Item = (String, ItemRef)>>(iter: I) -> Self {
        WorkshopOverrides(iter.into_iter().collect())
    }
}
