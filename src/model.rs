use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const SNAPSHOT_VERSION: &str = "1.0.0";

// ── Normalized source records ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawItem {
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: String,
    pub rarity: String,
    pub sell_value: u32,
    pub stack: u32,
    pub weight: f64,
    pub modifiers: Vec<String>,
}

/// An item reference with a count, as it appears in recipes, recycling
/// outputs and quest objectives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemQuantity {
    pub item_id: String,
    pub item_name: Option<String>,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blueprint {
    pub id: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CraftingRecipe {
    pub output_id: String,
    pub output_name: Option<String>,
    pub requirements: Vec<ItemQuantity>,
    pub station: String,
    pub station_level: u32,
    pub blueprint: Option<Blueprint>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecyclingEntry {
    pub input_id: String,
    pub input_name: Option<String>,
    pub outputs: Vec<ItemQuantity>,
}

/// Workshop cost; identity stays `None` when the reference could not be
/// resolved so that the slot index is preserved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkshopCost {
    pub item_id: Option<String>,
    pub item_name: Option<String>,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkshopLevel {
    pub level: u32,
    pub requirements: Vec<WorkshopCost>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkshopStation {
    pub id: String,
    pub name: String,
    pub levels: Vec<WorkshopLevel>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestEntry {
    pub quest_id: String,
    pub quest_name: String,
    pub required_items: Vec<ItemQuantity>,
}

/// Output of the five scrapers, consumed by the merge stage.
#[derive(Debug, Clone, Default)]
pub struct Sources {
    pub items: Vec<RawItem>,
    pub crafting: Vec<CraftingRecipe>,
    pub recycling: Vec<RecyclingEntry>,
    pub workshop: Vec<WorkshopStation>,
    pub quests: Vec<QuestEntry>,
}

// ── Merged snapshot ──

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterialLine {
    pub item_id: String,
    pub item_name: String,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipe {
    pub requirements: Vec<MaterialLine>,
    pub station: String,
    pub station_level: u32,
    pub blueprint: Option<Blueprint>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsedIn {
    pub output: String,
    pub output_id: String,
    pub quantity: u32,
    pub station: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputOf {
    pub source: String,
    pub source_id: String,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkshopRequirement {
    pub station: String,
    pub station_id: String,
    pub level: u32,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestRequirement {
    pub quest_name: String,
    pub quest_id: String,
    pub quantity: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueTier {
    Mid,
    Top,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CraftingInfo {
    pub recipe: Option<Recipe>,
    pub used_in: Vec<UsedIn>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecyclingInfo {
    pub recycles_into: Option<Vec<MaterialLine>>,
    pub output_of: Vec<OutputOf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MergedItem {
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: String,
    pub rarity: String,
    pub sell_value: u32,
    pub stack: u32,
    pub weight: f64,
    pub aliases: Vec<String>,
    pub modifiers: Vec<String>,
    pub quests: Vec<QuestRequirement>,
    pub value_tier: Option<ValueTier>,
    pub crafting: CraftingInfo,
    pub recycling: RecyclingInfo,
    pub workshop: Vec<WorkshopRequirement>,
}

impl MergedItem {
    pub fn from_raw(item: &RawItem) -> Self {
        MergedItem {
            id: item.id.clone(),
            name: item.name.clone(),
            description: item.description.clone(),
            category: item.category.clone(),
            rarity: item.rarity.clone(),
            sell_value: item.sell_value,
            stack: item.stack,
            weight: item.weight,
            modifiers: item.modifiers.clone(),
            ..Default::default()
        }
    }

    /// Stand-in for an item that is only known through a relationship.
    pub fn placeholder(id: &str, name: Option<&str>) -> Self {
        MergedItem {
            id: id.to_string(),
            name: name.unwrap_or(id).to_string(),
            rarity: "common".to_string(),
            stack: 1,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    pub version: String,
    pub timestamp: String,
    pub items: BTreeMap<String, MergedItem>,
}
