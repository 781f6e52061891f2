//! Property-based tests for normalization and synthesis.
//!
//! Uses proptest to pin the invariants downstream renderers rely on:
//! 1. Synthesis is total and deterministic for any key.
//! 2. Normalized records always carry aligned, non-empty geometry.
//! 3. Legacy and canonical renditions of the same geometry agree.

use glyphdex_strokes::normalize::{derive_points, normalize};
use glyphdex_strokes::synthetic::synthesize;
use proptest::prelude::*;
use serde_json::json;

fn key_strategy() -> impl Strategy<Value = String> {
    // Empty keys, ASCII, and multi-codepoint CJK all included.
    prop_oneof![
        Just(String::new()),
        "[a-z]{1,4}",
        proptest::collection::vec(0x4E00u32..0x9FFF, 1..4).prop_map(|cps| {
            cps.into_iter().filter_map(char::from_u32).collect()
        }),
    ]
}

proptest! {
    #[test]
    fn synthesis_is_total_and_well_formed(key in key_strategy()) {
        let record = synthesize(&key);
        prop_assert_eq!(&record.key, &key);
        prop_assert!(record.is_synthetic);
        prop_assert!(!record.segments.is_empty());
        prop_assert_eq!(record.segments.len(), record.point_series.len());
        prop_assert!(record.point_series.iter().all(|p| p.len() >= 2));
    }

    #[test]
    fn synthesis_is_deterministic(key in key_strategy()) {
        prop_assert_eq!(synthesize(&key), synthesize(&key));
    }

    #[test]
    fn derived_points_always_form_a_line(path in ".{0,40}") {
        let points = derive_points(&path);
        prop_assert!(points.len() >= 2);
    }

    #[test]
    fn legacy_paths_normalize_aligned(
        key in "[a-z]{1,4}",
        coords in proptest::collection::vec((0i32..500, 0i32..500, 0i32..500, 0i32..500), 1..8),
    ) {
        let segments: Vec<String> = coords
            .iter()
            .map(|(x1, y1, x2, y2)| format!("M {x1} {y1} L {x2} {y2}"))
            .collect();
        let raw = json!({ "character": key, "strokes": segments });

        let record = normalize(&raw, Some(&key)).expect("legacy shape must normalize");
        prop_assert_eq!(record.segments.len(), coords.len());
        prop_assert_eq!(record.segments.len(), record.point_series.len());
        for (series, (x1, y1, x2, y2)) in record.point_series.iter().zip(&coords) {
            prop_assert_eq!(series[0], [*x1 as f64, *y1 as f64]);
            prop_assert_eq!(series[1], [*x2 as f64, *y2 as f64]);
        }
    }
}
