//! Glyphdex stroke-record resolution
//!
//! Turns a requested glyph key into a validated [`StrokeRecord`], drawing from
//! an ordered list of heterogeneous sources:
//!
//! ```text
//!   resolve(key)
//!      │
//!      ├─► record cache ──────────────── hit? return
//!      ├─► partitioned local files ───── {dir}/{key}.json
//!      ├─► consolidated local indices ── one big map/array for many keys
//!      ├─► remote primary mirror ─────── HTTP GET, time-boxed
//!      ├─► remote secondary mirror ───── HTTP GET, time-boxed
//!      └─► synthetic generator ───────── deterministic placeholder
//! ```
//!
//! The pipeline never fails: every miss falls through to the next source and
//! the synthetic generator guarantees a structurally valid record for any key.
//! Successful resolutions (real or synthetic) are cached for the life of the
//! process, so the fallback chain runs at most once per key.

pub mod normalize;
pub mod resolver;
pub mod source;
pub mod synthetic;

use serde::{Deserialize, Serialize};

pub use resolver::{ResolverConfig, StrokeResolver};
pub use source::{
    ConsolidatedIndexSource, PartitionedDirSource, RemoteMirrorSource, SourceError, StrokeSource,
};

// ============================================================================
// Core Types
// ============================================================================

/// A 2-D point on the stroke grid.
pub type Point = [f64; 2];

/// A validated per-glyph stroke record.
///
/// Wire compatibility: serializes to the shape the stroke-data mirrors use
/// (`character` / `strokes` / `medians`), and accepts the same aliases when
/// deserializing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrokeRecord {
    /// The glyph this record describes. Always the *requested* key, never a
    /// stale key inherited from a template record.
    #[serde(rename = "character", alias = "char")]
    pub key: String,
    /// SVG-style path strings, one per stroke, in drawing order.
    #[serde(rename = "strokes")]
    pub segments: Vec<String>,
    /// Discrete point paths aligned 1:1 with `segments`.
    #[serde(rename = "medians")]
    pub point_series: Vec<Vec<Point>>,
    /// True when the record was fabricated because no real data resolved.
    #[serde(rename = "isPlaceholder", default, skip_serializing_if = "is_false")]
    pub is_synthetic: bool,
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl StrokeRecord {
    /// Structural invariant: non-empty key, non-empty equal-length sequences.
    pub fn is_well_formed(&self) -> bool {
        !self.key.is_empty()
            && !self.segments.is_empty()
            && self.segments.len() == self.point_series.len()
    }

    /// Number of strokes in the record.
    pub fn stroke_count(&self) -> usize {
        self.segments.len()
    }
}
