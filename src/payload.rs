use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::ExtractionError;

static CHUNK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?s)self\.__next_f\.push\(\[\d+,"(.*?)"\]\)"#).unwrap());

/// Bytes of text captured before each array by [`all_named_arrays`].
pub const CONTEXT_WINDOW: usize = 500;

/// An array found by property name, with the text that preceded it.
#[derive(Debug, Clone)]
pub struct LocatedArray {
    pub context: String,
    pub entries: Vec<Value>,
}

/// Fetch a page and return its reconstructed stream payload.
pub async fn fetch(client: &reqwest::Client, url: &str) -> Result<String> {
    info!("Fetching {}", url);
    let html = client
        .get(url)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await
        .with_context(|| format!("Failed to read body of {}", url))?;

    let payload = reconstruct(&html).with_context(|| format!("No stream data at {}", url))?;
    Ok(payload)
}

/// Join every `self.__next_f.push([n,"…"])` fragment in document order and
/// undo the transport's quote escaping.
pub fn reconstruct(html: &str) -> Result<String, ExtractionError> {
    let mut joined = String::with_capacity(html.len() / 2);
    let mut chunks = 0usize;

    for caps in CHUNK_RE.captures_iter(html) {
        joined.push_str(&caps[1]);
        chunks += 1;
    }

    if chunks == 0 {
        return Err(ExtractionError::NoChunks);
    }

    debug!(chunks, bytes = joined.len(), "Reconstructed payload");
    Ok(joined.replace("\\\"", "\""))
}

/// First array whose leading object carries every one of `keys`.
pub fn first_array_with_keys(data: &str, keys: &[&str]) -> Option<Vec<Value>> {
    let markers: Vec<String> = keys.iter().map(|k| format!("\"{}\":", k)).collect();

    let mut from = 0;
    while let Some(offset) = data[from..].find("[{") {
        let start = from + offset;
        let object_start = start + 1;
        if let Some(object_end) = balanced_end(data, object_start, b'{', b'}') {
            let first = &data[object_start..object_end];
            if markers.iter().all(|m| first.contains(m.as_str())) {
                return array_at(data, start);
            }
        }
        from = start + 1;
    }

    None
}

/// Array opened by the first `"prop":[` in the payload.
pub fn named_array(data: &str, prop: &str) -> Option<Vec<Value>> {
    let marker = format!("\"{}\":[", prop);
    let idx = data.find(&marker)?;
    array_at(data, idx + marker.len() - 1)
}

/// Every array opened by `"prop":[`, each with the preceding context window.
/// Occurrences that fail to parse are skipped.
pub fn all_named_arrays(data: &str, prop: &str) -> Vec<LocatedArray> {
    let marker = format!("\"{}\":[", prop);
    let mut found = Vec::new();
    let mut from = 0;

    while let Some(offset) = data[from..].find(&marker) {
        let idx = from + offset;
        let context_start = floor_char_boundary(data, idx.saturating_sub(CONTEXT_WINDOW));

        if let Some(entries) = array_at(data, idx + marker.len() - 1) {
            found.push(LocatedArray {
                context: data[context_start..idx].to_string(),
                entries,
            });
        }

        from = idx + 1;
    }

    found
}

/// Parse the balanced array that opens at `start` (which must be a `[`).
pub fn array_at(data: &str, start: usize) -> Option<Vec<Value>> {
    let Some(end) = balanced_end(data, start, b'[', b']') else {
        warn!("Unterminated array at index {}", start);
        return None;
    };

    match serde_json::from_str(&data[start..end]) {
        Ok(entries) => Some(entries),
        Err(e) => {
            warn!("Failed to parse array at index {}: {}", start, e);
            None
        }
    }
}

/// Index one past the delimiter that closes the one opened at `start`.
/// Delimiters inside JSON string literals are ignored.
fn balanced_end(data: &str, start: usize, open: u8, close: u8) -> Option<usize> {
    let bytes = data.as_bytes();
    if bytes.get(start) != Some(&open) {
        return None;
    }

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
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

        if b == b'"' {
            in_string = true;
        } else if b == open {
            depth += 1;
        } else if b == close {
            depth -= 1;
            if depth == 0 {
                return Some(i + 1);
            }
        }
    }

    None
}

fn floor_char_boundary(s: &str, mut idx: usize) -> usize {
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reconstruct_joins_chunks_in_order() {
        let html = r#"<script>self.__next_f.push([1,"0:{\"a\":"])</script>
<script>self.__next_f.push([1,"[1,2]}"])</script>"#;
        let payload = reconstruct(html).unwrap();
        assert_eq!(payload, r#"0:{"a":[1,2]}"#);
    }

    #[test]
    fn reconstruct_without_chunks_fails() {
        let err = reconstruct("<html><body>nothing here</body></html>").unwrap_err();
        assert!(matches!(err, ExtractionError::NoChunks));
    }

    #[test]
    fn reconstruct_fixture_page() {
        let html = std::fs::read_to_string("tests/fixtures/recycling.html").unwrap();
        let payload = reconstruct(&html).unwrap();
        assert!(payload.contains(r#""recycling":[{"item":{"id":"gear""#));
        assert!(!payload.contains(r#"\""#));
    }

    #[test]
    fn named_array_with_nested_arrays() {
        let data = r#"xx"recipes":[{"a":[1,[2,[3]]]},{"b":[]}],"other":[9]"#;
        let arr = named_array(data, "recipes").unwrap();
        assert_eq!(arr.len(), 2);
        assert_eq!(arr[0]["a"][1][1][0], 3);
    }

    #[test]
    fn brackets_inside_strings_do_not_desync() {
        let data = r#"{"tags":["a]b","[c","d\"]"],"after":[1]}"#;
        let arr = named_array(data, "tags").unwrap();
        assert_eq!(arr, vec![
            Value::from("a]b"),
            Value::from("[c"),
            Value::from("d\"]"),
        ]);
    }

    #[test]
    fn named_array_missing() {
        assert!(named_array(r#"{"recipes":null}"#, "recipes").is_none());
    }

    #[test]
    fn malformed_array_is_not_found() {
        let data = r#""recipes":[{"a":1,,}]"#;
        assert!(named_array(data, "recipes").is_none());
    }

    #[test]
    fn unterminated_array_is_not_found() {
        assert!(named_array(r#""recipes":[[1,2]"#, "recipes").is_none());
    }

    #[test]
    fn first_array_skips_arrays_missing_keys() {
        let data = r#"[{"id":"nav","name":"Home"}],"items":[{"id":"x","name":"X","price":5,"description":"d"}]"#;
        let arr = first_array_with_keys(data, &["id", "name", "description", "price"]).unwrap();
        assert_eq!(arr.len(), 1);
        assert_eq!(arr[0]["id"], "x");
    }

    #[test]
    fn first_array_keys_must_be_in_first_object() {
        // keys spread across two objects do not count
        let data = r#"[{"id":"a"},{"price":1}]"#;
        assert!(first_array_with_keys(data, &["id", "price"]).is_none());
    }

    #[test]
    fn all_named_arrays_captures_context() {
        let data = r#"{"id":"gear-bench","levels":[{"level":1}]},{"id":"refiner","levels":[{"level":1},{"level":2}]}"#;
        let found = all_named_arrays(data, "levels");
        assert_eq!(found.len(), 2);
        assert!(found[0].context.ends_with(r#""id":"gear-bench","#));
        assert!(found[1].context.ends_with(r#""id":"refiner","#));
        assert_eq!(found[1].entries.len(), 2);
    }

    #[test]
    fn context_window_is_bounded() {
        let padding = "é".repeat(400);
        let data = format!(r#"{}"levels":[1]"#, padding);
        let found = all_named_arrays(&data, "levels");
        assert_eq!(found.len(), 1);
        assert!(found[0].context.len() <= CONTEXT_WINDOW);
    }
}
