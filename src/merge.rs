//! Folds the five normalized sources into one item-keyed graph.
//!
//! Every relationship is written from a single source record to both of its
//! ends, so `usedIn` mirrors `recipe.requirements` and `outputOf` mirrors
//! `recyclesInto`. Any id referenced by a relationship is synthesized if the
//! items source did not provide it.

use std::collections::BTreeMap;

use chrono::{SecondsFormat, Utc};
use tracing::{info, warn};

use crate::config::WorkshopOverrides;
use crate::model::{
    CraftingRecipe, MaterialLine, MergedItem, OutputOf, QuestEntry, QuestRequirement, Recipe,
    RecyclingEntry, Snapshot, Sources, UsedIn, ValueTier, WorkshopRequirement, WorkshopStation,
    SNAPSHOT_VERSION,
};

const TOP_TIER: &[&str] = &[
    "metal-parts",
    "medium-gun-parts",
    "heavy-gun-parts",
    "simple-gun-parts",
    "mechanical-components",
    "advanced-mechanical-components",
    "light-gun-parts",
    "steel-spring",
];

const MID_TIER: &[&str] = &[
    "magnetic-accelerator",
    "complex-gun-parts",
    "advanced-electrical-components",
    "mod-components",
    "electrical-components",
    "duct-tape",
    "crude-explosives",
    "durable-cloth",
    "arc-alloy",
    "sensors",
    "explosive-compound",
    "wires",
];

const ALIASES: &[(&str, &[&str])] = &[
    ("chemicals", &["chems"]),
    ("metal-parts", &["metal", "mp"]),
    ("plastic-parts", &["plastic", "pp"]),
    ("rubber-parts", &["rubber", "rp"]),
    ("fabric", &["cloth"]),
    ("scrap-metal", &["scrap", "sm"]),
    ("electrical-components", &["elec", "ec"]),
    ("mechanical-components", &["mech", "mc"]),
    ("arc-alloy", &["alloy"]),
    ("arc-powercell", &["powercell", "apc"]),
    ("arc-circuitry", &["circuitry"]),
    ("adrenaline-shot", &["adren", "adrenaline"]),
    ("durable-cloth", &["dc"]),
    ("crude-explosives", &["crude", "ce"]),
    ("explosive-compound", &["ec", "compound"]),
    ("advanced-electrical-components", &["aec", "adv elec"]),
    ("advanced-mechanical-components", &["amc", "adv mech"]),
    ("arc-coolant", &["coolant"]),
    ("arc-flex-rubber", &["flex rubber", "afr"]),
    ("arc-motion-core", &["motion core", "amc"]),
    ("arc-performance-steel", &["perf steel", "aps"]),
    ("arc-synthetic-resin", &["resin", "asr"]),
    ("arc-thermo-lining", &["thermo", "atl"]),
    ("antiseptic", &["anti"]),
    ("bandage", &["band"]),
    ("barricade-kit", &["barricade"]),
    ("coins", &["cr", "credits", "money"]),
];

#[derive(Default)]
struct Graph {
    items: BTreeMap<String, MergedItem>,
}

impl Graph {
    /// Insert a placeholder for `id` unless it is already present.
    fn ensure(&mut self, id: &str, name: Option<&str>) -> &mut MergedItem {
        self.items
            .entry(id.to_string())
            .or_insert_with(|| MergedItem::placeholder(id, name))
    }

    fn name_of(&self, id: &str) -> String {
        self.items
            .get(id)
            .map_or_else(|| id.to_string(), |item| item.name.clone())
    }

    fn add_crafting(&mut self, recipe: &CraftingRecipe) {
        let output_id = recipe.output_id.as_str();
        self.ensure(output_id, recipe.output_name.as_deref());
        for req in &recipe.requirements {
            self.ensure(&req.item_id, req.item_name.as_deref());
        }

        // a later recipe for the same output replaces the earlier one, edges included
        let previous = self.ensure(output_id, None).crafting.recipe.take();
        for line in previous.iter().flat_map(|r| &r.requirements) {
            if let Some(item) = self.items.get_mut(&line.item_id) {
                item.crafting.used_in.retain(|u| u.output_id != output_id);
            }
        }

        let output_name = recipe
            .output_name
            .clone()
            .unwrap_or_else(|| self.name_of(output_id));

        let mut requirements = Vec::with_capacity(recipe.requirements.len());
        for req in &recipe.requirements {
            requirements.push(MaterialLine {
                item_id: req.item_id.clone(),
                item_name: req.item_name.clone().unwrap_or_else(|| self.name_of(&req.item_id)),
                quantity: req.quantity,
            });
            self.ensure(&req.item_id, None).crafting.used_in.push(UsedIn {
                output: output_name.clone(),
                output_id: output_id.to_string(),
                quantity: req.quantity,
                station: recipe.station.clone(),
            });
        }

        self.ensure(output_id, None).crafting.recipe = Some(Recipe {
            requirements,
            station: recipe.station.clone(),
            station_level: recipe.station_level,
            blueprint: recipe.blueprint.clone(),
        });
    }

    fn add_recycling(&mut self, entry: &RecyclingEntry) {
        let input_id = entry.input_id.as_str();
        self.ensure(input_id, entry.input_name.as_deref());
        for out in &entry.outputs {
            self.ensure(&out.item_id, out.item_name.as_deref());
        }

        let previous = self.ensure(input_id, None).recycling.recycles_into.take();
        for line in previous.iter().flatten() {
            if let Some(item) = self.items.get_mut(&line.item_id) {
                item.recycling.output_of.retain(|o| o.source_id != input_id);
            }
        }

        let source = entry
            .input_name
            .clone()
            .unwrap_or_else(|| self.name_of(input_id));

        let mut lines = Vec::with_capacity(entry.outputs.len());
        for out in &entry.outputs {
            lines.push(MaterialLine {
                item_id: out.item_id.clone(),
                item_name: out.item_name.clone().unwrap_or_else(|| self.name_of(&out.item_id)),
                quantity: out.quantity,
            });
            self.ensure(&out.item_id, None).recycling.output_of.push(OutputOf {
                source: source.clone(),
                source_id: input_id.to_string(),
                quantity: out.quantity,
            });
        }

        self.ensure(input_id, None).recycling.recycles_into = Some(lines);
    }

    /// Returns the number of requirements dropped for lack of an identity.
    fn add_workshop(&mut self, station: &WorkshopStation, overrides: &WorkshopOverrides) -> usize {
        let mut dropped = 0;
        for level in &station.levels {
            for (index, req) in level.requirements.iter().enumerate() {
                let (id, name) = match &req.item_id {
                    Some(id) => (id.clone(), req.item_name.clone()),
                    None => match overrides.lookup(&station.id, level.level, index) {
                        Some(known) => (known.id.clone(), Some(known.name.clone())),
                        None => {
                            warn!(
                                "[merge] Unresolved workshop ref: {} L{} req #{}",
                                station.name, level.level, index
                            );
                            dropped += 1;
                            continue;
                        }
                    },
                };

                let item = self.ensure(&id, name.as_deref());
                let exists = item
                    .workshop
                    .iter()
                    .any(|w| w.station == station.name && w.level == level.level);
                if !exists {
                    item.workshop.push(WorkshopRequirement {
                        station: station.name.clone(),
                        station_id: station.id.clone(),
                        level: level.level,
                        quantity: req.quantity,
                    });
                }
            }
        }
        dropped
    }

    fn add_quest(&mut self, quest: &QuestEntry) {
        for req in &quest.required_items {
            self.ensure(&req.item_id, req.item_name.as_deref())
                .quests
                .push(QuestRequirement {
                    quest_name: quest.quest_name.clone(),
                    quest_id: quest.quest_id.clone(),
                    quantity: req.quantity,
                });
        }
    }

    fn assign_value_tiers(&mut self) -> (usize, usize) {
        let (mut top, mut mid) = (0, 0);
        for item in self.items.values_mut() {
            if TOP_TIER.contains(&item.id.as_str()) {
                item.value_tier = Some(ValueTier::Top);
                top += 1;
            } else if MID_TIER.contains(&item.id.as_str()) {
                item.value_tier = Some(ValueTier::Mid);
                mid += 1;
            }
        }
        (top, mid)
    }

    fn assign_aliases(&mut self) {
        for (id, aliases) in ALIASES {
            if let Some(item) = self.items.get_mut(*id) {
                item.aliases = aliases.iter().map(|a| a.to_string()).collect();
            }
        }
    }
}

/// Coverage counts logged after a merge.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub items: usize,
    pub with_crafting: usize,
    pub with_recycling: usize,
    pub with_workshop: usize,
    pub with_quests: usize,
    pub with_modifiers: usize,
}

impl MergeStats {
    pub fn collect(items: &BTreeMap<String, MergedItem>) -> Self {
        let count = |f: fn(&MergedItem) -> bool| items.values().filter(|i| f(i)).count();
        MergeStats {
            items: items.len(),
            with_crafting: count(|i| i.crafting.recipe.is_some() || !i.crafting.used_in.is_empty()),
            with_recycling: count(|i| {
                i.recycling.recycles_into.is_some() || !i.recycling.output_of.is_empty()
            }),
            with_workshop: count(|i| !i.workshop.is_empty()),
            with_quests: count(|i| !i.quests.is_empty()),
            with_modifiers: count(|i| !i.modifiers.is_empty()),
        }
    }

    pub fn log(&self) {
        info!("[merge] Final item count: {}", self.items);
        info!("[merge]   With crafting data: {}", self.with_crafting);
        info!("[merge]   With recycling data: {}", self.with_recycling);
        info!("[merge]   With workshop data: {}", self.with_workshop);
        info!("[merge]   With quest data: {}", self.with_quests);
        info!("[merge]   With modifiers: {}", self.with_modifiers);
    }
}

/// Build a snapshot from scratch out of the five sources.
pub fn merge(sources: &Sources, overrides: &WorkshopOverrides) -> Snapshot {
    info!(
        items = sources.items.len(),
        crafting = sources.crafting.len(),
        recycling = sources.recycling.len(),
        workshop = sources.workshop.len(),
        quests = sources.quests.len(),
        "[merge] Starting merge"
    );

    let mut graph = Graph::default();

    for raw in &sources.items {
        graph.items.insert(raw.id.clone(), MergedItem::from_raw(raw));
    }
    for recipe in &sources.crafting {
        graph.add_crafting(recipe);
    }
    for entry in &sources.recycling {
        graph.add_recycling(entry);
    }
    let dropped: usize = sources
        .workshop
        .iter()
        .map(|station| graph.add_workshop(station, overrides))
        .sum();
    if dropped > 0 {
        warn!("[merge] Dropped {} unresolved workshop requirements", dropped);
    }
    for quest in &sources.quests {
        graph.add_quest(quest);
    }

    let (top, mid) = graph.assign_value_tiers();
    info!("[merge]   Value tiers: {} top, {} mid", top, mid);
    graph.assign_aliases();

    MergeStats::collect(&graph.items).log();

    Snapshot {
        version: SNAPSHOT_VERSION.to_string(),
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        items: graph.items,
    }
}
