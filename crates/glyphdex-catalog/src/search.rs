//! Deterministic search ranking over the loaded tiers.
//!
//! Three passes, each deterministic for a fixed catalog state:
//!
//! 1. Override table: a handful of pinned results for queries the generic
//!    ranking historically got wrong. An exact natural-key hit here
//!    short-circuits everything else.
//! 2. Exact pass: entries whose natural key or external code equals the
//!    query, in ascending tier order; within a tier, discovery order.
//! 3. Substring pass: case-insensitive containment over the descriptive
//!    fields, appended after the exact hits, deduplicated by id.

use crate::{CatalogEntry, Tier};
use std::collections::BTreeMap;

/// Rank `query` against the loaded tiers. Empty or whitespace-only queries
/// yield no results rather than the whole catalog.
pub fn rank(
    query: &str,
    tiers: &BTreeMap<u32, Tier>,
    overrides: &[CatalogEntry],
) -> Vec<CatalogEntry> {
    let query = query.trim();
    if query.is_empty() {
        return Vec::new();
    }

    if let Some(pinned) = overrides.iter().find(|entry| entry.natural_key == query) {
        return vec![pinned.clone()];
    }

    let needle = query.to_lowercase();
    let mut exact = Vec::new();
    let mut partial = Vec::new();

    // BTreeMap iteration gives ascending tier order for free.
    for tier in tiers.values() {
        for entry in &tier.entries {
            if entry.natural_key == query || entry.external_code == query {
                exact.push(entry.clone());
            } else if entry
                .display_fields
                .values()
                .any(|value| value.to_lowercase().contains(&needle))
            {
                partial.push(entry.clone());
            }
        }
    }

    let mut results = exact;
    for entry in partial {
        if !results.iter().any(|hit| hit.id == entry.id) {
            results.push(entry);
        }
    }
    results
}

/// The pinned results shipped by default. Kept tiny on purpose; callers with
/// their own corrections inject a replacement table.
pub fn builtin_overrides() -> Vec<CatalogEntry> {
    vec![
        pinned("過", "8FC6", 7, "to pass, to cross", "과"),
        pinned("愛", "611B", 6, "love, affection", "애"),
    ]
}

fn pinned(
    key: &str,
    code: &str,
    tier: u32,
    meaning: &str,
    pronunciation: &str,
) -> CatalogEntry {
    let mut display_fields = BTreeMap::new();
    display_fields.insert("meaning".to_string(), meaning.to_string());
    display_fields.insert("pronunciation".to_string(), pronunciation.to_string());
    CatalogEntry {
        id: format!("GX-{tier:02}-{code}"),
        natural_key: key.to_string(),
        external_code: code.to_string(),
        display_fields,
        tier,
        order_in_tier: 0,
    }
}

#[cfg(test)]
mod search_tests {
    use super::*;

    fn entry(id: &str, key: &str, code: &str, tier: u32, order: u32, meaning: &str) -> CatalogEntry {
        let mut display_fields = BTreeMap::new();
        display_fields.insert("meaning".to_string(), meaning.to_string());
        CatalogEntry {
            id: id.to_string(),
            natural_key: key.to_string(),
            external_code: code.to_string(),
            display_fields,
            tier,
            order_in_tier: order,
        }
    }

    fn tiers(entries: Vec<CatalogEntry>) -> BTreeMap<u32, Tier> {
        let mut map: BTreeMap<u32, Tier> = BTreeMap::new();
        for e in entries {
            map.entry(e.tier)
                .or_insert_with(|| Tier {
                    number: e.tier,
                    name: format!("Tier {}", e.tier),
                    description: String::new(),
                    entries: Vec::new(),
                })
                .entries
                .push(e);
        }
        map
    }

    #[test]
    fn exact_hits_come_before_substring_hits() {
        let catalog = tiers(vec![
            entry("a", "水", "6C34", 1, 0, "water"),
            entry("b", "氷", "6C37", 2, 0, "ice, related to water"),
        ]);
        let hits = rank("水", &catalog, &[]);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "a");

        let hits = rank("water", &catalog, &[]);
        assert_eq!(
            hits.iter().map(|h| h.id.as_str()).collect::<Vec<_>>(),
            ["a", "b"]
        );
    }

    #[test]
    fn exact_matches_keep_tier_then_discovery_order() {
        let catalog = tiers(vec![
            entry("t2", "火", "706B", 2, 0, "fire"),
            entry("t1", "火", "706B", 1, 0, "fire"),
        ]);
        let hits = rank("火", &catalog, &[]);
        assert_eq!(
            hits.iter().map(|h| h.id.as_str()).collect::<Vec<_>>(),
            ["t1", "t2"]
        );
    }

    #[test]
    fn external_code_is_an_exact_key() {
        let catalog = tiers(vec![entry("a", "水", "6C34", 1, 0, "water")]);
        let hits = rank("6C34", &catalog, &[]);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "a");
    }

    #[test]
    fn substring_matching_ignores_case() {
        let catalog = tiers(vec![entry("a", "水", "6C34", 1, 0, "Water")]);
        assert_eq!(rank("wAtEr", &catalog, &[]).len(), 1);
    }

    #[test]
    fn override_short_circuits_the_catalog() {
        let catalog = tiers(vec![entry("wrong", "過", "0000", 1, 0, "bogus")]);
        let hits = rank("過", &catalog, &builtin_overrides());
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].external_code, "8FC6");
    }

    #[test]
    fn blank_queries_match_nothing() {
        let catalog = tiers(vec![entry("a", "水", "6C34", 1, 0, "water")]);
        assert!(rank("", &catalog, &[]).is_empty());
        assert!(rank("   ", &catalog, &[]).is_empty());
    }
}
