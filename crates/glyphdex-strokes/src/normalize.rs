//! Record validation and shape normalization.
//!
//! Stroke data arrives in several shapes depending on which source produced
//! it: the canonical mirror shape, a legacy shape carrying only path strings,
//! and an index shape whose entries are segment objects with an embedded
//! `path` field. Shape sniffing happens exactly once, in [`classify`]; each
//! variant then has a single normalization path into [`StrokeRecord`].

use crate::{Point, StrokeRecord};
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

// ============================================================================
// Raw shapes
// ============================================================================

/// The record shapes accepted from heterogeneous sources.
#[derive(Debug, Clone)]
pub enum RawRecord {
    /// Full mirror shape: key + path strings + aligned point paths.
    Canonical {
        key: String,
        segments: Vec<String>,
        point_series: Vec<Vec<Point>>,
    },
    /// Legacy shape: path strings only, point paths must be derived.
    PathsOnly {
        key: Option<String>,
        segments: Vec<String>,
    },
    /// Index shape: each entry is an object carrying an embedded `path`.
    SegmentObjects {
        key: Option<String>,
        paths: Vec<String>,
    },
}

/// Classify a candidate JSON value into one of the accepted shapes.
///
/// Returns `None` when the value resembles none of them; the caller treats
/// that as a source miss.
pub fn classify(raw: &Value) -> Option<RawRecord> {
    let obj = raw.as_object()?;
    let key = obj
        .get("character")
        .or_else(|| obj.get("char"))
        .and_then(Value::as_str)
        .map(str::to_owned);

    let segments = obj.get("strokes").and_then(Value::as_array)?;
    if segments.is_empty() {
        return None;
    }

    // Segment-object entries carry the path on a field rather than being
    // plain strings.
    if segments.iter().all(|s| s.is_object()) {
        let paths: Vec<String> = segments
            .iter()
            .filter_map(|s| s.get("path").and_then(Value::as_str))
            .map(str::to_owned)
            .collect();
        if paths.is_empty() {
            return None;
        }
        return Some(RawRecord::SegmentObjects { key, paths });
    }

    let segments: Vec<String> = segments
        .iter()
        .filter_map(Value::as_str)
        .map(str::to_owned)
        .collect();
    if segments.is_empty() {
        return None;
    }

    match (key, parse_point_series(obj.get("medians"))) {
        (Some(key), Some(point_series)) => Some(RawRecord::Canonical {
            key,
            segments,
            point_series,
        }),
        (key, _) => Some(RawRecord::PathsOnly { key, segments }),
    }
}

fn parse_point_series(medians: Option<&Value>) -> Option<Vec<Vec<Point>>> {
    let series: Vec<Vec<Point>> = serde_json::from_value(medians?.clone()).ok()?;
    if series.is_empty() || series.iter().any(Vec::is_empty) {
        return None;
    }
    Some(series)
}

// ============================================================================
// Normalization
// ============================================================================

/// Validate and coerce a candidate record into the canonical shape.
///
/// Returns `None` when the value matches no accepted shape, when the
/// sequences cannot be brought to equal non-empty length, or when the
/// embedded key contradicts `expected_key`. Pure: the caller is responsible
/// for forcing `key = expected_key` before caching.
pub fn normalize(raw: &Value, expected_key: Option<&str>) -> Option<StrokeRecord> {
    let shape = match classify(raw) {
        Some(shape) => shape,
        None => {
            tracing::warn!(expected_key, "candidate record matches no known shape");
            return None;
        }
    };

    let mut record = match shape {
        RawRecord::Canonical {
            key,
            segments,
            point_series,
        } => StrokeRecord {
            key,
            segments,
            point_series,
            is_synthetic: false,
        },
        RawRecord::PathsOnly { key, segments } => {
            let point_series = segments.iter().map(|p| derive_points(p)).collect();
            StrokeRecord {
                key: key.unwrap_or_default(),
                segments,
                point_series,
                is_synthetic: false,
            }
        }
        RawRecord::SegmentObjects { key, paths } => {
            let point_series = paths.iter().map(|p| derive_points(p)).collect();
            StrokeRecord {
                key: key.unwrap_or_default(),
                segments: paths,
                point_series,
                is_synthetic: false,
            }
        }
    };

    // Self-heal a record whose point paths fell out of step with its
    // segments: re-derive the missing tail from the path strings.
    if record.point_series.len() < record.segments.len() {
        tracing::warn!(
            key = %record.key,
            segments = record.segments.len(),
            points = record.point_series.len(),
            "point series shorter than segments, re-deriving tail"
        );
        for path in &record.segments[record.point_series.len()..] {
            record.point_series.push(derive_points(path));
        }
    }

    if record.segments.is_empty() || record.point_series.is_empty() {
        tracing::warn!(key = %record.key, "record has empty stroke geometry");
        return None;
    }
    if record.segments.len() != record.point_series.len() {
        tracing::warn!(
            key = %record.key,
            segments = record.segments.len(),
            points = record.point_series.len(),
            "segment/point-series length mismatch"
        );
        return None;
    }
    if let Some(expected) = expected_key {
        if !record.key.is_empty() && record.key != expected {
            tracing::warn!(key = %record.key, expected, "record key does not match request");
            return None;
        }
    }

    Some(record)
}

// ============================================================================
// Path parsing
// ============================================================================

fn number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"-?\d+(?:\.\d+)?").expect("valid number regex"))
}

/// Parse a straight-line path string (`M x y L x y …`, comma or whitespace
/// separated) into discrete coordinate pairs.
///
/// Always yields at least two points: a segment that fails to parse degrades
/// to a 2-point diagonal line so renderers still receive usable geometry.
pub fn derive_points(path: &str) -> Vec<Point> {
    let numbers: Vec<f64> = number_re()
        .find_iter(path)
        .filter_map(|m| m.as_str().parse().ok())
        .collect();

    let mut points: Vec<Point> = numbers.chunks_exact(2).map(|c| [c[0], c[1]]).collect();
    if points.len() < 2 {
        tracing::debug!(path, "unparseable path segment, degrading to 2-point line");
        points = vec![[20.0, 20.0], [80.0, 80.0]];
    }
    points
}

// ============================================================================
// Tests
// ============================================================================
