use serde_json::Value;
use tracing::info;

use super::{count_field, str_field, title_case};
use crate::error::ExtractionError;
use crate::model::RawItem;
use crate::payload;

pub const PATH: &str = "/items";

/// Keys that identify the item array: the leading object must carry all of them.
const REQUIRED_KEYS: &[&str] = &["id", "name", "description", "rarity", "price"];

pub fn parse(data: &str) -> Result<Vec<RawItem>, ExtractionError> {
    let entries = payload::first_array_with_keys(data, REQUIRED_KEYS)
        .filter(|a| !a.is_empty())
        .ok_or(ExtractionError::MissingData {
            domain: "items",
            what: "item array",
        })?;
    info!("[items] Extracted {} items", entries.len());

    let items = normalize(&entries);
    info!("[items] Normalized {} items", items.len());
    Ok(items)
}

pub fn normalize(entries: &[Value]) -> Vec<RawItem> {
    entries.iter().filter_map(normalize_one).collect()
}

fn normalize_one(entry: &Value) -> Option<RawItem> {
    let id = str_field(entry, "id")?;
    let name = str_field(entry, "name")?;

    let sell_value = entry
        .get("price")
        .and_then(Value::as_f64)
        .filter(|p| *p > 0.0)
        .map_or(0, |p| p.round() as u32);

    let weight = entry.get("weight").and_then(Value::as_f64).unwrap_or(0.0);

    let modifiers = entry
        .get("modifiers")
        .and_then(Value::as_array)
        .map(|mods| mods.iter().map(modifier_text).collect())
        .unwrap_or_default();

    Some(RawItem {
        id: id.to_string(),
        name: name.to_string(),
        description: str_field(entry, "description").unwrap_or("").to_string(),
        category: title_case(str_field(entry, "category").unwrap_or("")),
        rarity: str_field(entry, "rarity").unwrap_or("common").to_lowercase(),
        sell_value,
        stack: count_field(entry, "stack").unwrap_or(1),
        weight,
        modifiers,
    })
}

fn modifier_text(m: &Value) -> String {
    match m {
        Value::String(s) => s.clone(),
        other => str_field(other, "description")
            .map(str::to_string)
            .unwrap_or_else(|| other.to_string()),
    }
}
