use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info};

use crate::error::ExtractionError;
use crate::model::{ItemQuantity, QuestEntry};

pub const PATH: &str = "/quests";

/// Bytes after an objective searched for the item's display name.
const NAME_WINDOW: usize = 500;

static QUEST_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\{"id":"([^"]+)","name":"([^"]+)","description":"[^"]*","image":"/quests/"#).unwrap()
});
static OBJECTIVE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""type":"item","itemId":"([^"]+)","quantity":(\d+)"#).unwrap());
static ITEM_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""item":\{"id":"[^"]+","name":"([^"]+)""#).unwrap());

struct Anchor<'a> {
    id: &'a str,
    name: &'a str,
    pos: usize,
}

/// Quests are not held in one array; each one is found by its header and
/// owns the text up to the next header.
pub fn parse(data: &str) -> Result<Vec<QuestEntry>, ExtractionError> {
    let anchors: Vec<Anchor> = QUEST_RE
        .captures_iter(data)
        .filter_map(|c| {
            Some(Anchor {
                pos: c.get(0)?.start(),
                id: c.get(1)?.as_str(),
                name: c.get(2)?.as_str(),
            })
        })
        .collect();

    if anchors.is_empty() {
        return Err(ExtractionError::MissingData {
            domain: "quests",
            what: "quest headers",
        });
    }
    info!("[quests] Found {} quests", anchors.len());

    let mut quests = Vec::new();
    for (i, anchor) in anchors.iter().enumerate() {
        let end = anchors.get(i + 1).map_or(data.len(), |next| next.pos);
        let required_items = objectives(&data[anchor.pos..end]);
        if required_items.is_empty() {
            continue;
        }
        quests.push(QuestEntry {
            quest_id: anchor.id.to_string(),
            quest_name: anchor.name.to_string(),
            required_items,
        });
    }

    let total: usize = quests.iter().map(|q| q.required_items.len()).sum();
    info!(
        "[quests] Extracted {} quests with {} item requirements",
        quests.len(),
        total
    );
    Ok(quests)
}

fn objectives(window: &str) -> Vec<ItemQuantity> {
    OBJECTIVE_RE
        .captures_iter(window)
        .filter_map(|c| {
            let whole = c.get(0)?;
            let item_id = c.get(1)?.as_str();
            let quantity = match c[2].parse::<u32>() {
                Ok(0) => 1,
                Ok(q) => q,
                Err(e) => {
                    debug!(item = item_id, raw = &c[2], "Objective quantity out of range: {}", e);
                    u32::MAX
                }
            };

            let mut tail_end = (whole.start() + NAME_WINDOW).min(window.len());
            while !window.is_char_boundary(tail_end) {
                tail_end -= 1;
            }
            let item_name = ITEM_NAME_RE
                .captures(&window[whole.start()..tail_end])
                .map_or_else(|| item_id.to_string(), |n| n[1].to_string());

            Some(ItemQuantity {
                item_id: item_id.to_string(),
                item_name: Some(item_name),
                quantity,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAYLOAD: &str = concat!(
        r#"9:{"quests":[{"id":"q1","name":"Supply Run","description":"Bring things","image":"/quests/q1.webp","objectives":["#,
        r#"{"type":"item","itemId":"fabric","quantity":5,"item":{"id":"fabric","name":"Fabric"}},"#,
        r#"{"type":"item","itemId":"rubber-parts","quantity":0}]},"#,
        r#"{"id":"q2","name":"Scout","description":"","image":"/quests/q2.webp","objectives":[{"type":"location","zone":"dam"}]},"#,
        r#"{"id":"q3","name":"Hoarder","description":"Stockpile","image":"/quests/q3.webp","objectives":["#,
        r#"{"type":"item","itemId":"fabric","quantity":2}]}]}"#
    );

    #[test]
    fn quests_with_item_objectives() {
        let quests = parse(PAYLOAD).unwrap();
        let ids: Vec<&str> = quests.iter().map(|q| q.quest_id.as_str()).collect();
        assert_eq!(ids, vec!["q1", "q3"], "quest without item objectives is dropped");

        let q1 = &quests[0];
        assert_eq!(q1.quest_name, "Supply Run");
        assert_eq!(q1.required_items.len(), 2);
        assert_eq!(q1.required_items[0].item_name.as_deref(), Some("Fabric"));
        assert_eq!(q1.required_items[0].quantity, 5);
    }

    #[test]
    fn name_falls_back_to_id() {
        let quests = parse(PAYLOAD).unwrap();
        let rubber = &quests[0].required_items[1];
        assert_eq!(rubber.item_name.as_deref(), Some("rubber-parts"));
        assert_eq!(rubber.quantity, 1);

        // the name lookup does not leak into the next quest's window
        let q3 = &quests[1].required_items[0];
        assert_eq!(q3.item_name.as_deref(), Some("fabric"));
        assert_eq!(q3.quantity, 2);
    }

    #[test]
    fn oversized_quantity_saturates() {
        let data = concat!(
            r#"{"id":"q9","name":"Bulk","description":"","image":"/quests/q9.webp","objectives":["#,
            r#"{"type":"item","itemId":"wires","quantity":99999999999}]}"#
        );
        let quests = parse(data).unwrap();
        assert_eq!(quests[0].required_items[0].quantity, u32::MAX);
    }

    #[test]
    fn no_headers_is_an_error() {
        let err = parse(r#"{"quests":[]}"#).unwrap_err();
        assert!(matches!(err, ExtractionError::MissingData { domain: "quests", .. }));
    }
}
