use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::{debug, info};

use super::{count_field, str_field, title_case};
use crate::error::ExtractionError;
use crate::model::{WorkshopCost, WorkshopLevel, WorkshopStation};
use crate::payload::{self, LocatedArray};
use crate::resolve::{Pat, RefRules, ResolveStats, SiblingIndex, Slot};

pub const PATH: &str = "/workshop";

static ID_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#""id":"([^"]+)""#).unwrap());
static NAME_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#""name":"([^"]+)""#).unwrap());

const RULES: RefRules = RefRules {
    patterns: &[&[
        Pat::Name("levels"),
        Pat::Index,
        Pat::Name("requirements"),
        Pat::Index,
        Pat::Name("item"),
    ]],
};

const REQUIREMENT_ITEM: Slot = Slot::Nested {
    list: "requirements",
    field: "item",
};

pub fn parse(data: &str) -> Result<Vec<WorkshopStation>, ExtractionError> {
    let arrays = payload::all_named_arrays(data, "levels");
    if arrays.is_empty() {
        return Err(ExtractionError::MissingData {
            domain: "workshop",
            what: "levels arrays",
        });
    }
    info!("[workshop] Found {} station level arrays", arrays.len());

    let stations = normalize(&arrays);
    for station in &stations {
        info!("[workshop]   {}: {} levels", station.name, station.levels.len());
    }
    Ok(stations)
}

/// Normalize every station. References in one station's levels may point
/// into any other station's levels, so all arrays are resolved together.
pub fn normalize(arrays: &[LocatedArray]) -> Vec<WorkshopStation> {
    let index = SiblingIndex::build(
        arrays.iter().map(|a| a.entries.as_slice()).collect(),
        REQUIREMENT_ITEM,
    );
    let mut stats = ResolveStats::default();
    let mut stations = Vec::with_capacity(arrays.len());

    for (n, located) in arrays.iter().enumerate() {
        let (id, name) = station_identity(&located.context, n);
        let mut levels = Vec::with_capacity(located.entries.len());

        for (i, level) in located.entries.iter().enumerate() {
            let reqs = level.get("requirements").and_then(Value::as_array);
            let requirements = reqs
                .into_iter()
                .flatten()
                .map(|req| requirement(req, &index, &mut stats))
                .collect();

            levels.push(WorkshopLevel {
                level: count_field(level, "level").unwrap_or(i as u32 + 1),
                requirements,
            });
        }

        stations.push(WorkshopStation { id, name, levels });
    }

    stats.log("workshop");
    stations
}

fn requirement(req: &Value, index: &SiblingIndex<'_>, stats: &mut ResolveStats) -> WorkshopCost {
    let item = match req.get("item") {
        Some(Value::String(token)) => {
            let hit = index.resolve(token, &RULES);
            match hit {
                Some(_) => stats.resolved += 1,
                None => {
                    debug!(token = %token, "Unresolved reference");
                    stats.unresolved += 1;
                }
            }
            hit
        }
        Some(v) if v.is_object() => Some(v),
        _ => None,
    };

    WorkshopCost {
        item_id: item.and_then(|i| str_field(i, "id")).map(str::to_string),
        item_name: item.and_then(|i| str_field(i, "name")).map(str::to_string),
        quantity: count_field(req, "quantity").unwrap_or(1),
    }
}

/// Station id and name from the text preceding its `levels` array.
///
/// The station is the object still open at the end of the window; its own
/// top-level `"id"` and `"name"` keys are used, so ids of nested objects
/// (images, earlier stations' items) never win. When no such object is
/// visible, the last `"id"` in the window and the first `"name"` after it
/// are used instead.
pub fn station_identity(context: &str, n: usize) -> (String, String) {
    if let Some(start) = enclosing_object(context) {
        let object = &context[start..];
        let depth = depths(object);
        if let Some(id) = top_level(object, &depth, &ID_RE) {
            let name = top_level(object, &depth, &NAME_RE)
                .map(str::to_string)
                .unwrap_or_else(|| title_case(id));
            return (id.to_string(), name);
        }
    }

    let Some(id) = ID_RE.captures_iter(context).last().and_then(|c| c.get(1)) else {
        return (format!("unknown-{}", n), "Unknown".to_string());
    };

    let name = NAME_RE
        .captures(&context[id.end()..])
        .map(|c| c[1].to_string())
        .unwrap_or_else(|| title_case(id.as_str()));

    (id.as_str().to_string(), name)
}

/// Offset of the `{` left unclosed at the end of `text`. Scans backwards
/// because the window may start inside a string.
fn enclosing_object(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;

    for i in (0..bytes.len()).rev() {
        let b = bytes[i];
        if b == b'"' && !escaped_at(bytes, i) {
            in_string = !in_string;
            continue;
        }
        if in_string {
            continue;
        }
        match b {
            b'}' => depth += 1,
            b'{' if depth == 0 => return Some(i),
            b'{' => depth -= 1,
            _ => {}
        }
    }

    None
}

/// Whether the byte at `i` is preceded by an odd run of backslashes.
fn escaped_at(bytes: &[u8], i: usize) -> bool {
    bytes[..i].iter().rev().take_while(|&&b| b == b'\\').count() % 2 == 1
}

/// Object nesting depth before each byte of `text`.
fn depths(text: &str) -> Vec<u32> {
    let mut out = Vec::with_capacity(text.len());
    let mut depth = 0u32;
    let mut in_string = false;
    let mut escaped = false;

    for b in text.bytes() {
        out.push(depth);
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }

    out
}

fn top_level<'c>(object: &'c str, depth: &[u32], re: &Regex) -> Option<&'c str> {
    re.captures_iter(object)
        .find(|c| c.get(0).is_some_and(|m| depth[m.start()] == 1))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAYLOAD: &str = r#"22:["$","$L23",null,{"stations":[{"id":"gear-bench","name":"Gear Bench","levels":[{"level":1,"requirements":[{"item":{"id":"fabric","name":"Fabric"},"quantity":20},{"item":{"id":"rubber-parts","name":"Rubber Parts"},"quantity":10}]},{"level":2,"requirements":[{"item":"$22:props:bench:levels:0:requirements:1:item","quantity":15}]}]},{"id":"refiner","name":"Refiner","levels":[{"level":1,"requirements":[{"item":"$22:props:bench:levels:0:requirements:0:item","quantity":30},{"item":"$22:props:bench:levels:7:requirements:0:item","quantity":5}]},{"requirements":[]}]}]}]"#;

    #[test]
    fn stations_named_from_context() {
        let stations = parse(PAYLOAD).unwrap();
        assert_eq!(stations.len(), 2);
        assert_eq!(stations[0].id, "gear-bench");
        assert_eq!(stations[0].name, "Gear Bench");
        // preceding station's item ids must not win
        assert_eq!(stations[1].id, "refiner");
        assert_eq!(stations[1].name, "Refiner");
    }

    #[test]
    fn cross_station_reference_resolves() {
        let stations = parse(PAYLOAD).unwrap();
        let l1 = &stations[1].levels[0];
        assert_eq!(l1.requirements[0].item_id.as_deref(), Some("fabric"));
        assert_eq!(l1.requirements[0].item_name.as_deref(), Some("Fabric"));
        assert_eq!(l1.requirements[0].quantity, 30);

        let gear_l2 = &stations[0].levels[1];
        assert_eq!(gear_l2.requirements[0].item_id.as_deref(), Some("rubber-parts"));
    }

    #[test]
    fn unresolved_requirement_keeps_its_slot() {
        let stations = parse(PAYLOAD).unwrap();
        let reqs = &stations[1].levels[0].requirements;
        assert_eq!(reqs.len(), 2);
        assert_eq!(reqs[1].item_id, None);
        assert_eq!(reqs[1].item_name, None);
        assert_eq!(reqs[1].quantity, 5);
    }

    #[test]
    fn missing_level_number_uses_position() {
        let stations = parse(PAYLOAD).unwrap();
        assert_eq!(stations[1].levels[1].level, 2);
        assert!(stations[1].levels[1].requirements.is_empty());
    }

    #[test]
    fn identity_fallbacks() {
        assert_eq!(
            station_identity(r#"{"id":"utility-station","levels":"#, 0),
            ("utility-station".to_string(), "Utility Station".to_string())
        );
        assert_eq!(
            station_identity("no identity here", 3),
            ("unknown-3".to_string(), "Unknown".to_string())
        );
    }

    #[test]
    fn nested_ids_do_not_shadow_the_station() {
        let data = concat!(
            r#"7:{"stations":[{"id":"gear-bench","name":"Gear Bench","levels":[{"level":1,"#,
            r#""requirements":[{"item":{"id":"fabric","name":"Fabric"},"quantity":20}]}]},"#,
            r#"{"id":"refiner","image":{"id":"refiner-icon","name":"Refiner Icon","src":"/img/{r}.webp"},"#,
            r#""name":"Refiner","unlock":{"quest":{"id":"q-12"}},"levels":[{"level":1,"#,
            r#""requirements":[{"item":"$7:props:bench:levels:0:requirements:0:item","quantity":30}]}]}]}"#
        );
        let stations = parse(data).unwrap();
        assert_eq!(stations[1].id, "refiner");
        assert_eq!(stations[1].name, "Refiner");
        assert_eq!(
            stations[1].levels[0].requirements[0].item_id.as_deref(),
            Some("fabric")
        );
    }

    #[test]
    fn no_levels_is_an_error() {
        assert!(parse(r#"{"stations":[]}"#).is_err());
    }
}
