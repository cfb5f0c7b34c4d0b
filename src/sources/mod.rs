pub mod crafting;
pub mod items;
pub mod quests;
pub mod recycling;
pub mod workshop;

use serde_json::Value;

use crate::model::ItemQuantity;

const STATION_NAMES: &[(&str, &str)] = &[
    ("workbench", "Workbench"),
    ("medical-bench", "Medical Lab"),
    ("medical-lab", "Medical Lab"),
    ("gunsmith", "Gunsmith"),
    ("gear-bench", "Gear Bench"),
    ("explosive-bench", "Explosives Station"),
    ("explosives-station", "Explosives Station"),
    ("utility-station", "Utility Station"),
    ("refiner", "Refiner"),
];

/// `"gear-bench"` → `"Gear Bench"`.
pub fn title_case(id: &str) -> String {
    id.split('-')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Display name for a crafting station id.
pub fn station_name(id: &str) -> String {
    STATION_NAMES
        .iter()
        .find(|(key, _)| *key == id)
        .map(|(_, name)| name.to_string())
        .unwrap_or_else(|| title_case(id))
}

pub(crate) fn str_field<'a>(v: &'a Value, key: &str) -> Option<&'a str> {
    v.get(key)?.as_str().filter(|s| !s.is_empty())
}

/// Positive integer field; absent, zero or non-numeric values give `None`.
pub(crate) fn count_field(v: &Value, key: &str) -> Option<u32> {
    let n = v.get(key)?.as_u64()?;
    u32::try_from(n).ok().filter(|&n| n > 0)
}

/// `{ "item": {id, name}, "quantity": n }` after resolution. Entries whose
/// item is still a token or lacks an id are dropped.
pub(crate) fn item_quantity(entry: &Value) -> Option<ItemQuantity> {
    let item = entry.get("item").filter(|v| v.is_object())?;
    Some(ItemQuantity {
        item_id: str_field(item, "id")?.to_string(),
        item_name: str_field(item, "name").map(str::to_string),
        quantity: count_field(entry, "quantity").unwrap_or(1),
    })
}

pub(crate) fn item_quantities(entry: &Value, list: &str) -> Vec<ItemQuantity> {
    entry
        .get(list)
        .and_then(Value::as_array)
        .map(|xs| xs.iter().filter_map(item_quantity).collect())
        .unwrap_or_default()
}
