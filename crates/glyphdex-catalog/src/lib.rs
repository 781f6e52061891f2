//! Glyphdex catalog layer
//!
//! The catalog of learnable glyphs is organized by tier (grade/level) and
//! shipped in transfer-sized chunks, each chunk covering a contiguous range
//! of tiers. This crate loads chunks lazily, merges them into a growing
//! partial catalog, projects lookup indices over whatever has arrived, and
//! answers free-text searches with deterministic ranking:
//!
//! ```text
//!  ensure_tier(n) ──► tier→chunk table ──► ensure_chunk(c)
//!                                              │  per-chunk state machine
//!                                              │  idle → loading → {success|error}
//!                                              ▼
//!                                      deep merge by tier
//!                                              │
//!                        ┌─────────────────────┼──────────────────┐
//!                        ▼                     ▼                  ▼
//!                     by_id           by_natural_key       by_external_code
//! ```
//!
//! The state machine is the loader's core correctness property: concurrent
//! callers for one chunk share a single in-flight fetch. Errors are retained
//! per chunk, never auto-retried; a later explicit `ensure_chunk` retries.

pub mod chunks;
pub mod index;
pub mod loader;
pub mod search;


use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

pub use chunks::{ChunkFetcher, ChunkPayload, HttpChunkFetcher, SectionMeta};
pub use index::{CatalogIndex, CollisionPolicy};
pub use loader::{CatalogConfig, CatalogMetadata, CatalogService, TierSummary};

// ============================================================================
// Core Types
// ============================================================================

/// One learnable unit in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Opaque id, unique across the whole catalog.
    pub id: String,
    /// Human-meaningful key (the glyph itself); unique within a tier.
    pub natural_key: String,
    /// External numeric code as an uppercase hex string (e.g. `6C34`).
    pub external_code: String,
    /// Descriptive fields for display and substring search.
    pub display_fields: BTreeMap<String, String>,
    /// Tier (grade/level) this entry belongs to.
    pub tier: u32,
    /// Position within the tier's teaching order.
    pub order_in_tier: u32,
}

impl CatalogEntry {
    /// A descriptive field by name, if present.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.display_fields.get(name).map(String::as_str)
    }
}

/// A grade/level grouping of catalog entries, merged from one or more chunks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tier {
    pub number: u32,
    pub name: String,
    pub description: String,
    pub entries: Vec<CatalogEntry>,
}

/// Load state of one chunk. Transitions `Idle → Loading → {Success | Error}`
/// only; `Error` persists until a caller explicitly retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChunkLoadState {
    Idle,
    Loading,
    Success,
    Error,
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("chunk endpoint returned {status}: {message}")]
    Endpoint { status: u16, message: String },
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("chunk {chunk} timed out after {after:?}")]
    Timeout { chunk: u32, after: Duration },
    #[error("chunk {chunk} failed to load: {message}")]
    ChunkFailed { chunk: u32, message: String },
}
