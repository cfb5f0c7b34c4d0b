use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use tracing::info;

use crate::model::Snapshot;

pub fn load_snapshot(path: &Path) -> Result<Snapshot> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let snapshot = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(snapshot)
}

/// Write pretty JSON next to `path`, then rename it into place.
pub fn save_snapshot(path: &Path, snapshot: &Snapshot) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    }

    let json = serde_json::to_string_pretty(snapshot)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).with_context(|| format!("Failed to write {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("Failed to replace {}", path.display()))?;

    info!("Saved {} items to {}", snapshot.items.len(), path.display());
    Ok(())
}

/// `items-2026-01-31T12-00-00-000Z.json`
pub fn backup_file_name(at: DateTime<Utc>) -> String {
    let stamp = at
        .to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-");
    format!("items-{}.json", stamp)
}

/// Copy the live snapshot into `backup_dir`. Returns `None` if there is
/// nothing to back up.
pub fn backup(data_path: &Path, backup_dir: &Path) -> Result<Option<PathBuf>> {
    if !data_path.exists() {
        info!("No existing data to back up");
        return Ok(None);
    }

    fs::create_dir_all(backup_dir)
        .with_context(|| format!("Failed to create {}", backup_dir.display()))?;
    let target = backup_dir.join(backup_file_name(Utc::now()));
    fs::copy(data_path, &target)
        .with_context(|| format!("Failed to back up to {}", target.display()))?;

    info!("Backed up to {}", target.display());
    Ok(Some(target))
}

/// Backup file names, newest first.
pub fn list_backups(backup_dir: &Path) -> Result<Vec<String>> {
    if !backup_dir.exists() {
        return Ok(Vec::new());
    }

    let mut names = Vec::new();
    for entry in fs::read_dir(backup_dir)? {
        let name = entry?.file_name().to_string_lossy().into_owned();
        if name.starts_with("items-") && name.ends_with(".json") {
            names.push(name);
        }
    }
    names.sort_unstable_by(|a, b| b.cmp(a));
    Ok(names)
}

/// Restore the newest backup, or the newest whose name contains `target`.
pub fn rollback(data_path: &Path, backup_dir: &Path, target: Option<&str>) -> Result<String> {
    let backups = list_backups(backup_dir)?;
    if backups.is_empty() {
        bail!("No backups available in {}", backup_dir.display());
    }

    let chosen = match target {
        Some(t) => backups.iter().find(|b| b.contains(t)),
        None => backups.first(),
    };
    let Some(file) = chosen else {
        bail!("No backup matching \"{}\"", target.unwrap_or_default());
    };

    fs::copy(backup_dir.join(file), data_path)
        .with_context(|| format!("Failed to restore {}", file))?;
    info!("Restored from {}", file);
    Ok(file.clone())
}
