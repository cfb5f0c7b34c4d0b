use serde_json::Value;
use tracing::info;

use super::{count_field, item_quantities, station_name, str_field};
use crate::error::ExtractionError;
use crate::model::{Blueprint, CraftingRecipe};
use crate::payload;
use crate::resolve::{self, Pat, RefRules, Slot};

pub const PATH: &str = "/crafting";

const RULES: RefRules = RefRules {
    patterns: &[
        &[Pat::Name("recipes"), Pat::Index, Pat::Name("requirements"), Pat::Index, Pat::Name("item")],
        &[Pat::Name("recipes"), Pat::Index, Pat::Name("item")],
        &[Pat::Name("recipes"), Pat::Index, Pat::Name("recipe")],
    ],
};

const SLOTS: &[Slot] = &[
    Slot::Field("item"),
    Slot::Nested {
        list: "requirements",
        field: "item",
    },
    Slot::Field("recipe"),
];

pub fn parse(data: &str) -> Result<Vec<CraftingRecipe>, ExtractionError> {
    let mut recipes = payload::named_array(data, "recipes")
        .filter(|a| !a.is_empty())
        .ok_or(ExtractionError::MissingData {
            domain: "crafting",
            what: "recipes array",
        })?;
    info!("[crafting] Extracted {} recipes", recipes.len());

    resolve::resolve_in_place(&mut recipes, &RULES, SLOTS).log("crafting");

    let normalized = normalize(&recipes);
    info!("[crafting] Normalized {} recipes", normalized.len());
    Ok(normalized)
}

pub fn normalize(recipes: &[Value]) -> Vec<CraftingRecipe> {
    recipes.iter().filter_map(normalize_one).collect()
}

fn normalize_one(recipe: &Value) -> Option<CraftingRecipe> {
    let output = recipe.get("item").filter(|v| v.is_object())?;
    let output_id = str_field(output, "id")?;

    let workbench = recipe.get("workbench").unwrap_or(&Value::Null);
    let blueprint = recipe
        .get("recipe")
        .filter(|v| v.is_object())
        .and_then(|bp| {
            Some(Blueprint {
                id: str_field(bp, "id")?.to_string(),
                name: str_field(bp, "name").map(str::to_string),
            })
        });

    Some(CraftingRecipe {
        output_id: output_id.to_string(),
        output_name: str_field(output, "name").map(str::to_string),
        requirements: item_quantities(recipe, "requirements"),
        station: station_name(str_field(workbench, "id").unwrap_or("workbench")),
        station_level: count_field(workbench, "level").unwrap_or(1),
        blueprint,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAYLOAD: &str = r#"7:["$","$L8",null,{"recipes":[{"item":{"id":"gear","name":"Gear"},"requirements":[{"item":{"id":"scrap-metal","name":"Scrap Metal"},"quantity":3},{"item":{"id":"wires","name":"Wires"},"quantity":1}],"workbench":{"id":"refiner","level":1},"recipe":null},{"item":{"id":"gear-mk2","name":"Gear Mk2"},"requirements":[{"item":"$7:props:recipes:0:item","quantity":2},{"item":"$7:props:recipes:0:requirements:1:item","quantity":4},{"item":"$7:props:recipes:9:item","quantity":1}],"workbench":{"id":"gear-bench","level":2},"recipe":{"id":"gear-mk2-blueprint","name":"Gear Mk2 Blueprint"}},{"item":"$7:props:recipes:1:item","requirements":[{"item":"$7:props:recipes:40:requirements:0:item","quantity":1}],"recipe":"$7:props:recipes:1:recipe"},{"item":"$7:props:recipes:7:item","requirements":[{"item":{"id":"wires","name":"Wires"},"quantity":1}]}]}]"#;

    #[test]
    fn resolves_and_normalizes() {
        let recipes = parse(PAYLOAD).unwrap();
        assert_eq!(recipes.len(), 3, "unresolvable output must be dropped");

        let gear = &recipes[0];
        assert_eq!(gear.output_id, "gear");
        assert_eq!(gear.station, "Refiner");
        assert_eq!(gear.station_level, 1);
        assert!(gear.blueprint.is_none());

        let mk2 = &recipes[1];
        let ids: Vec<&str> = mk2.requirements.iter().map(|r| r.item_id.as_str()).collect();
        assert_eq!(ids, vec!["gear", "wires"]);
        assert_eq!(mk2.requirements[1].quantity, 4);
        assert_eq!(mk2.station, "Gear Bench");
        assert_eq!(mk2.station_level, 2);
    }

    #[test]
    fn recipe_with_no_resolved_requirements_is_kept() {
        let recipes = parse(PAYLOAD).unwrap();
        let dup = &recipes[2];
        assert_eq!(dup.output_id, "gear-mk2");
        assert!(dup.requirements.is_empty());
        assert_eq!(dup.station, "Workbench");
        assert_eq!(dup.blueprint.as_ref().map(|b| b.id.as_str()), Some("gear-mk2-blueprint"));
    }

    #[test]
    fn normalize_is_pure() {
        let mut raw = payload::named_array(PAYLOAD, "recipes").unwrap();
        resolve::resolve_in_place(&mut raw, &RULES, SLOTS);
        assert_eq!(normalize(&raw), normalize(&raw));
    }

    #[test]
    fn missing_recipes_is_an_error() {
        assert!(parse(r#"{"other":[1]}"#).is_err());
    }
}
