//! Resolution of stream deduplication references.
//!
//! The stream serializer replaces an object it has already emitted with a
//! string token such as `$5:props:recipes:3:requirements:0:item`. The tail of
//! that path, read from the container name onwards, is a walk into the
//! container's array that ends at the original object.

use std::collections::HashMap;

use serde_json::Value;
use tracing::{debug, info};

/// One segment of a reference path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Field(String),
    Index(usize),
}

/// A parsed `$<chunk>:<segment>:…` token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefPath {
    pub chunk: String,
    pub segments: Vec<Segment>,
}

impl RefPath {
    /// Tokens without path segments (`$undefined`, `$L1`, `$Sreact.fragment`)
    /// are not object references and yield `None`.
    pub fn parse(token: &str) -> Option<Self> {
        let rest = token.strip_prefix('$')?;
        let mut parts = rest.split(':');
        let chunk = parts.next()?.to_string();

        let segments: Vec<Segment> = parts
            .map(|p| match p.parse::<usize>() {
                Ok(n) => Segment::Index(n),
                Err(_) => Segment::Field(p.to_string()),
            })
            .collect();

        let has_blank = segments
            .iter()
            .any(|s| matches!(s, Segment::Field(f) if f.is_empty()));
        if segments.is_empty() || has_blank {
            return None;
        }

        Some(RefPath { chunk, segments })
    }

    /// Trailing field name, e.g. `item` or `recipe`.
    pub fn terminal(&self) -> Option<&str> {
        match self.segments.last()? {
            Segment::Field(f) => Some(f.as_str()),
            Segment::Index(_) => None,
        }
    }
}

/// Element of a suffix pattern.
#[derive(Debug, Clone, Copy)]
pub enum Pat {
    Name(&'static str),
    Index,
}

/// Path tail patterns accepted for one source. Every pattern starts with the
/// container name; what follows it is walked into the container.
pub struct RefRules {
    pub patterns: &'static [&'static [Pat]],
}

impl RefRules {
    /// The part of `path` after the container name, if a pattern matches.
    pub fn walk_path<'p>(&self, path: &'p RefPath) -> Option<&'p [Segment]> {
        let terminal = path.terminal()?;
        self.patterns
            .iter()
            .filter(|pat| matches!(pat.last(), Some(Pat::Name(n)) if *n == terminal))
            .find_map(|pat| match_suffix(pat, &path.segments))
            .map(|tail| &tail[1..])
    }
}

fn match_suffix<'p>(pattern: &[Pat], segments: &'p [Segment]) -> Option<&'p [Segment]> {
    if segments.len() < pattern.len() {
        return None;
    }
    let tail = &segments[segments.len() - pattern.len()..];
    let matched = pattern.iter().zip(tail).all(|(p, s)| match (p, s) {
        (Pat::Name(n), Segment::Field(f)) => f == n,
        (Pat::Index, Segment::Index(_)) => true,
        _ => false,
    });
    matched.then_some(tail)
}

/// Slot kinds that may hold a token, visited in declaration order.
#[derive(Debug, Clone, Copy)]
pub enum Slot {
    /// `entries[i].<field>`
    Field(&'static str),
    /// `entries[i].<list>[j].<field>`
    Nested {
        list: &'static str,
        field: &'static str,
    },
}

impl Slot {
    fn paths(&self, entries: &[Value]) -> Vec<Vec<Segment>> {
        match *self {
            Slot::Field(field) => (0..entries.len())
                .map(|i| vec![Segment::Index(i), Segment::Field(field.to_string())])
                .collect(),
            Slot::Nested { list, field } => entries
                .iter()
                .enumerate()
                .flat_map(|(i, entry)| {
                    let len = entry.get(list).and_then(Value::as_array).map_or(0, Vec::len);
                    (0..len).map(move |j| {
                        vec![
                            Segment::Index(i),
                            Segment::Field(list.to_string()),
                            Segment::Index(j),
                            Segment::Field(field.to_string()),
                        ]
                    })
                })
                .collect(),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ResolveStats {
    pub resolved: usize,
    pub unresolved: usize,
}

impl ResolveStats {
    pub fn log(&self, domain: &str) {
        info!(
            "[{}] Resolved {} refs, {} unresolved",
            domain, self.resolved, self.unresolved
        );
    }
}

fn walk<'v>(entries: &'v [Value], path: &[Segment]) -> Option<&'v Value> {
    let (first, rest) = path.split_first()?;
    let Segment::Index(i) = first else {
        return None;
    };
    rest.iter().try_fold(entries.get(*i)?, |v, seg| match seg {
        Segment::Index(j) => v.get(*j),
        Segment::Field(f) => v.get(f.as_str()),
    })
}

fn walk_mut<'v>(entries: &'v mut [Value], path: &[Segment]) -> Option<&'v mut Value> {
    let (first, rest) = path.split_first()?;
    let Segment::Index(i) = first else {
        return None;
    };
    rest.iter().try_fold(entries.get_mut(*i)?, |v, seg| match seg {
        Segment::Index(j) => v.get_mut(*j),
        Segment::Field(f) => v.get_mut(f.as_str()),
    })
}

/// Resolve tokens inside `entries` against `entries` itself.
///
/// Slots are processed in the order given, and each substitution is visible to
/// later lookups, so primary slots must come first.
pub fn resolve_in_place(entries: &mut [Value], rules: &RefRules, slots: &[Slot]) -> ResolveStats {
    let mut stats = ResolveStats::default();

    for slot in slots {
        for path in slot.paths(entries) {
            let token = match walk(entries, &path) {
                Some(Value::String(s)) => s.clone(),
                _ => continue,
            };

            let found = RefPath::parse(&token)
                .and_then(|p| rules.walk_path(&p).and_then(|tail| walk(entries, tail)).cloned())
                .filter(Value::is_object);

            match found {
                Some(object) => {
                    if let Some(dst) = walk_mut(entries, &path) {
                        *dst = object;
                    }
                    stats.resolved += 1;
                }
                None => {
                    debug!(token = %token, "Unresolved reference");
                    stats.unresolved += 1;
                }
            }
        }
    }

    stats
}

/// Lookup context spanning several sibling arrays of the same shape.
///
/// Tokens are walked against each sibling in turn; the first materialized
/// object wins and is returned in its canonical (first-seen) form by `id`.
pub struct SiblingIndex<'a> {
    siblings: Vec<&'a [Value]>,
    by_id: HashMap<&'a str, &'a Value>,
}

impl<'a> SiblingIndex<'a> {
    pub fn build(siblings: Vec<&'a [Value]>, slot: Slot) -> Self {
        let mut by_id = HashMap::new();
        for entries in siblings.iter().copied() {
            for path in slot.paths(entries) {
                let Some(object) = walk(entries, &path).filter(|v| v.is_object()) else {
                    continue;
                };
                if let Some(id) = object.get("id").and_then(Value::as_str) {
                    by_id.entry(id).or_insert(object);
                }
            }
        }
        debug!(siblings = siblings.len(), ids = by_id.len(), "Built sibling index");
        SiblingIndex { siblings, by_id }
    }

    pub fn resolve(&self, token: &str, rules: &RefRules) -> Option<&'a Value> {
        let path = RefPath::parse(token)?;
        let tail = rules.walk_path(&path)?;

        let hit = self
            .siblings
            .iter()
            .copied()
            .find_map(|entries| walk(entries, tail).filter(|v| v.is_object()))?;

        let canonical = hit
            .get("id")
            .and_then(Value::as_str)
            .and_then(|id| self.by_id.get(id).copied());
        Some(canonical.unwrap_or(hit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const RULES: RefRules = RefRules {
        patterns: &[
            &[Pat::Name("recipes"), Pat::Index, Pat::Name("requirements"), Pat::Index, Pat::Name("item")],
            &[Pat::Name("recipes"), Pat::Index, Pat::Name("item")],
        ],
    };

    #[test]
    fn parse_typed_segments() {
        let p = RefPath::parse("$1f:props:children:recipes:3:requirements:0:item").unwrap();
        assert_eq!(p.chunk, "1f");
        assert_eq!(p.segments[2], Segment::Field("recipes".into()));
        assert_eq!(p.segments[3], Segment::Index(3));
        assert_eq!(p.segments.len(), 7);
        assert_eq!(p.terminal(), Some("item"));
    }

    #[test]
    fn parse_rejects_non_paths() {
        assert!(RefPath::parse("$undefined").is_none());
        assert!(RefPath::parse("$L1").is_none());
        assert!(RefPath::parse("scrap-metal").is_none());
    }

    #[test]
    fn dispatch_by_terminal_and_suffix() {
        let long = RefPath::parse("$0:x:recipes:4:requirements:2:item").unwrap();
        assert_eq!(
            RULES.walk_path(&long).unwrap(),
            &[
                Segment::Index(4),
                Segment::Field("requirements".into()),
                Segment::Index(2),
                Segment::Field("item".into()),
            ]
        );

        let short = RefPath::parse("$0:x:recipes:4:item").unwrap();
        assert_eq!(RULES.walk_path(&short).unwrap().len(), 2);

        let unknown = RefPath::parse("$0:x:recipes:4:recipe").unwrap();
        assert!(RULES.walk_path(&unknown).is_none());

        let wrong_container = RefPath::parse("$0:x:recycling:4:item").unwrap();
        assert!(RULES.walk_path(&wrong_container).is_none());
    }

    #[test]
    fn resolves_primary_before_nested() {
        let mut entries = vec![
            json!({"item": "$0:recipes:1:requirements:0:item", "requirements": []}),
            json!({"item": {"id": "gear"}, "requirements": [{"item": {"id": "wires"}}]}),
            json!({"item": {"id": "pipe"}, "requirements": [{"item": "$0:recipes:0:item"}]}),
        ];
        let stats = resolve_in_place(
            &mut entries,
            &RULES,
            &[Slot::Field("item"), Slot::Nested { list: "requirements", field: "item" }],
        );

        // entry 0 resolved in the primary pass, so entry 2 sees an object
        assert_eq!(entries[0]["item"]["id"], "wires");
        assert_eq!(entries[2]["requirements"][0]["item"]["id"], "wires");
        assert_eq!(stats, ResolveStats { resolved: 2, unresolved: 0 });
    }

    #[test]
    fn reference_to_reference_stays_unresolved() {
        let mut entries = vec![
            json!({"item": "$0:recipes:5:item"}),
            json!({"item": "$0:recipes:0:item"}),
        ];
        let stats = resolve_in_place(&mut entries, &RULES, &[Slot::Field("item")]);
        assert!(entries[0]["item"].is_string());
        assert!(entries[1]["item"].is_string());
        assert_eq!(stats, ResolveStats { resolved: 0, unresolved: 2 });
    }

    #[test]
    fn sibling_index_canonicalizes_by_id() {
        const LEVELS: RefRules = RefRules {
            patterns: &[&[Pat::Name("levels"), Pat::Index, Pat::Name("requirements"), Pat::Index, Pat::Name("item")]],
        };
        let a = vec![json!({"requirements": [{"item": {"id": "fabric", "name": "Fabric"}}]})];
        let b = vec![json!({"requirements": [{"item": "$22:bench:levels:0:requirements:0:item"}]})];
        let index = SiblingIndex::build(
            vec![a.as_slice(), b.as_slice()],
            Slot::Nested { list: "requirements", field: "item" },
        );
        let found = index.resolve("$22:bench:levels:0:requirements:0:item", &LEVELS).unwrap();
        assert_eq!(found["name"], "Fabric");
        assert!(index.resolve("$22:bench:levels:3:requirements:0:item", &LEVELS).is_none());
    }
}
