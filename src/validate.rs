use std::collections::{BTreeMap, BTreeSet, HashSet};

use tracing::{error, info, warn};

use crate::model::{MergedItem, Snapshot};

const MIN_ITEMS: usize = 400;
const EXPECTED_ITEMS: usize = 490;

const KNOWN_ITEMS: &[&str] = &[
    "chemicals",
    "metal-parts",
    "plastic-parts",
    "fabric",
    "rubber-parts",
    "adrenaline-shot",
    "bandage",
    "arc-alloy",
];

const STATION_IDS: &[&str] = &[
    "workbench",
    "gunsmith",
    "gear-bench",
    "medical-lab",
    "explosives-station",
    "utility-station",
    "refiner",
    "scrappy",
];

const STATION_NAMES: &[&str] = &[
    "Workbench",
    "Gunsmith",
    "Gear Bench",
    "Medical Lab",
    "Explosives Station",
    "Utility Station",
    "Refiner",
    "Scrappy",
];

const WORKSHOP_ITEMS: &[&str] = &["fabric", "arc-alloy", "plastic-parts", "metal-parts"];

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn log(&self) {
        info!(
            "[validate] Errors: {}, warnings: {}",
            self.errors.len(),
            self.warnings.len()
        );
        for e in &self.errors {
            error!("ERROR: {}", e);
        }
        for w in &self.warnings {
            warn!("WARN: {}", w);
        }
    }
}

#[derive(Default)]
struct RefCount {
    total: usize,
    broken: usize,
}

/// Check a snapshot. Only errors make it invalid; warnings are reported.
pub fn validate(snapshot: &Snapshot) -> ValidationReport {
    info!("[validate] Checking data integrity...");
    let items = &snapshot.items;
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    check_structure(snapshot, &mut errors, &mut warnings);
    check_references(items, &mut warnings);
    check_workshop(items, &mut warnings);
    check_quests(items, &mut warnings);
    spot_check(items, &mut warnings);

    ValidationReport {
        valid: errors.is_empty(),
        errors,
        warnings,
    }
}

fn check_structure(snapshot: &Snapshot, errors: &mut Vec<String>, warnings: &mut Vec<String>) {
    if snapshot.version.is_empty() {
        errors.push("Missing version".to_string());
    }
    if snapshot.timestamp.is_empty() {
        errors.push("Missing timestamp".to_string());
    }

    let count = snapshot.items.len();
    info!("[validate] Items: {}", count);
    if count < MIN_ITEMS {
        errors.push(format!("Too few items: {} (expected {}+)", count, MIN_ITEMS));
    }
    if count < EXPECTED_ITEMS {
        warnings.push(format!(
            "Item count lower than expected: {} (expected {}+)",
            count, EXPECTED_ITEMS
        ));
    }

    for id in KNOWN_ITEMS {
        if !snapshot.items.contains_key(*id) {
            errors.push(format!("Missing known item: {}", id));
        }
    }
}

fn check_references(items: &BTreeMap<String, MergedItem>, warnings: &mut Vec<String>) {
    let mut crafting = RefCount::default();
    let mut recycling = RefCount::default();

    let mut check = |count: &mut RefCount, target: &str, message: String| {
        count.total += 1;
        if !items.contains_key(target) {
            count.broken += 1;
            warnings.push(message);
        }
    };

    for item in items.values() {
        for req in item.crafting.recipe.iter().flat_map(|r| &r.requirements) {
            let msg = format!("Broken craft ref: {} requires {}", item.name, req.item_id);
            check(&mut crafting, &req.item_id, msg);
        }
        for used in &item.crafting.used_in {
            let msg = format!("Broken usedIn ref: {} -> {}", item.name, used.output_id);
            check(&mut crafting, &used.output_id, msg);
        }
        for out in item.recycling.recycles_into.iter().flatten() {
            let msg = format!("Broken recycle ref: {} -> {}", item.name, out.item_id);
            check(&mut recycling, &out.item_id, msg);
        }
        for src in &item.recycling.output_of {
            let msg = format!("Broken outputOf ref: {} <- {}", item.name, src.source_id);
            check(&mut recycling, &src.source_id, msg);
        }
    }

    info!(
        "[validate] Crafting refs: {} ({} broken)",
        crafting.total, crafting.broken
    );
    info!(
        "[validate] Recycling refs: {} ({} broken)",
        recycling.total, recycling.broken
    );
}

fn check_workshop(items: &BTreeMap<String, MergedItem>, warnings: &mut Vec<String>) {
    let mut refs = 0usize;
    let mut name_issues = 0usize;
    let mut variants = BTreeSet::new();

    for item in items.values() {
        for w in &item.workshop {
            refs += 1;
            variants.insert(w.station.as_str());
            if !STATION_IDS.contains(&w.station_id.as_str()) {
                warnings.push(format!(
                    "Invalid workshop stationId: {} -> {}",
                    item.name, w.station_id
                ));
            }
            if !STATION_NAMES.contains(&w.station.as_str()) {
                name_issues += 1;
                warnings.push(format!(
                    "Non-canonical workshop station name: \"{}\" on {}",
                    w.station, item.name
                ));
            }
        }
    }

    for id in WORKSHOP_ITEMS {
        if items.get(*id).is_some_and(|i| i.workshop.is_empty()) {
            warnings.push(format!("Expected workshop data on {} but found none", id));
        }
    }

    info!("[validate] Workshop refs: {} ({} name issues)", refs, name_issues);
    info!(
        "[validate] Station name variants: {}",
        variants.into_iter().collect::<Vec<_>>().join(", ")
    );
}

fn check_quests(items: &BTreeMap<String, MergedItem>, warnings: &mut Vec<String>) {
    for item in items.values() {
        let mut seen = HashSet::new();
        for q in &item.quests {
            if !seen.insert((q.quest_id.as_str(), q.quantity)) {
                warnings.push(format!(
                    "Duplicate quest entry: {} -> {} (x{})",
                    item.name, q.quest_name, q.quantity
                ));
            }
        }
    }
}

fn spot_check(items: &BTreeMap<String, MergedItem>, warnings: &mut Vec<String>) {
    if let Some(chem) = items.get("chemicals") {
        if chem.sell_value != 50 {
            warnings.push(format!("Chemicals sell value: {} (expected 50)", chem.sell_value));
        }
        if chem.rarity != "common" {
            warnings.push(format!("Chemicals rarity: {} (expected common)", chem.rarity));
        }
        if chem.crafting.used_in.is_empty() {
            warnings.push("Chemicals has no usedIn entries".to_string());
        }
    }

    if let Some(adren) = items.get("adrenaline-shot") {
        if adren.sell_value != 300 {
            warnings.push(format!(
                "Adrenaline Shot sell value: {} (expected 300)",
                adren.sell_value
            ));
        }
        if adren.crafting.recipe.is_none() {
            warnings.push("Adrenaline Shot has no recipe".to_string());
        }
    }
}
