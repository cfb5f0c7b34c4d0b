use serde_json::Value;
use tracing::info;

use super::{item_quantities, str_field};
use crate::error::ExtractionError;
use crate::model::RecyclingEntry;
use crate::payload;
use crate::resolve::{self, Pat, RefRules, Slot};

pub const PATH: &str = "/recycling";

const RULES: RefRules = RefRules {
    patterns: &[
        &[Pat::Name("recycling"), Pat::Index, Pat::Name("outputs"), Pat::Index, Pat::Name("item")],
        &[Pat::Name("recycling"), Pat::Index, Pat::Name("item")],
    ],
};

const SLOTS: &[Slot] = &[
    Slot::Field("item"),
    Slot::Nested {
        list: "outputs",
        field: "item",
    },
];

pub fn parse(data: &str) -> Result<Vec<RecyclingEntry>, ExtractionError> {
    let mut entries = payload::named_array(data, "recycling")
        .filter(|a| !a.is_empty())
        .ok_or(ExtractionError::MissingData {
            domain: "recycling",
            what: "recycling array",
        })?;
    info!("[recycling] Extracted {} recycling entries", entries.len());

    resolve::resolve_in_place(&mut entries, &RULES, SLOTS).log("recycling");

    let normalized = normalize(&entries);
    info!("[recycling] Normalized {} entries", normalized.len());
    Ok(normalized)
}

pub fn normalize(entries: &[Value]) -> Vec<RecyclingEntry> {
    entries
        .iter()
        .filter_map(|entry| {
            let input = entry.get("item").filter(|v| v.is_object())?;
            Some(RecyclingEntry {
                input_id: str_field(input, "id")?.to_string(),
                input_name: str_field(input, "name").map(str::to_string),
                outputs: item_quantities(entry, "outputs"),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixture_page_end_to_end() {
        let html = std::fs::read_to_string("tests/fixtures/recycling.html").unwrap();
        let data = payload::reconstruct(&html).unwrap();
        let entries = parse(&data).unwrap();

        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].input_id, "gear");
        assert_eq!(entries[0].outputs.len(), 2);

        // output ref resolved against entry 0, dangling ref excluded
        let radio = &entries[1];
        assert_eq!(radio.input_id, "broken-radio");
        assert_eq!(radio.outputs.len(), 1);
        assert_eq!(radio.outputs[0].item_id, "wires");
        assert_eq!(radio.outputs[0].quantity, 3);

        assert_eq!(entries[2].input_id, "gear");
        assert!(entries[2].outputs.is_empty());
    }

    #[test]
    fn resolution_counts() {
        let html = std::fs::read_to_string("tests/fixtures/recycling.html").unwrap();
        let data = payload::reconstruct(&html).unwrap();
        let mut raw = payload::named_array(&data, "recycling").unwrap();
        let stats = resolve::resolve_in_place(&mut raw, &RULES, SLOTS);
        assert_eq!(stats.resolved, 2);
        assert_eq!(stats.unresolved, 2);
    }
}
