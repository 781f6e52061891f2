//! Lazy chunk loading and the merged partial catalog.
//!
//! `CatalogService` owns everything mutable: the per-chunk state machine,
//! retained error messages, the tier map built up by deep-merging chunk
//! payloads, and the derived lookup indices. Concurrent `ensure_chunk` calls
//! for one chunk share a single fetch; waiters park on a `Notify` and
//! re-check state when the owning task finishes.

use crate::chunks::{ChunkFetcher, ChunkPayload, HttpChunkFetcher, SectionMeta};
use crate::index::{CatalogIndex, CollisionPolicy};
use crate::search;
use crate::{CatalogEntry, CatalogError, ChunkLoadState, Tier};
use ahash::AHashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

// ============================================================================
// Configuration
// ============================================================================

/// Tunables for the catalog service. The tier→chunk table mirrors how the
/// authoring pipeline splits the catalog: early tiers ship together in small
/// chunks, the long tail in one.
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    /// Chunk endpoint; the chunk id goes in a `chunk` query parameter.
    pub endpoint: String,
    /// Upper bound on a single chunk fetch.
    pub fetch_timeout_secs: u64,
    /// Which chunk serves which tiers.
    pub assignments: Vec<(RangeInclusive<u32>, u32)>,
    /// How the lookup indices resolve duplicate keys across chunks.
    pub collision_policy: CollisionPolicy,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            endpoint: "/api/catalog-chunks".to_string(),
            fetch_timeout_secs: 10,
            assignments: vec![(1..=3, 1), (4..=6, 2), (7..=12, 3)],
            collision_policy: CollisionPolicy::default(),
        }
    }
}

// ============================================================================
// Service
// ============================================================================

/// Everything loaded so far. Tiers accumulate across chunks; sections keep
/// the latest metadata a chunk carried for them.
#[derive(Debug, Default)]
struct PartialCatalog {
    sections: BTreeMap<String, SectionMeta>,
    tiers: BTreeMap<u32, Tier>,
}

/// Shape of `metadata()`: what has loaded, without the entries themselves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogMetadata {
    pub sections: Vec<SectionMeta>,
    pub tiers: Vec<TierSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierSummary {
    pub number: u32,
    pub name: String,
    pub entry_count: usize,
}

/// The catalog service. Construct once, share via `Arc`.
///
/// Locks are `parking_lot` and are never held across an await point: the
/// fetch happens between two short critical sections, and waiters hold no
/// lock while parked.
pub struct CatalogService {
    fetcher: Arc<dyn ChunkFetcher>,
    assignments: Vec<(RangeInclusive<u32>, u32)>,
    overrides: Vec<CatalogEntry>,
    states: RwLock<AHashMap<u32, ChunkLoadState>>,
    errors: RwLock<AHashMap<u32, String>>,
    catalog: RwLock<PartialCatalog>,
    index: RwLock<CatalogIndex>,
    notify: Notify,
}

impl CatalogService {
    pub fn new(config: CatalogConfig) -> Self {
        let timeout = Duration::from_secs(config.fetch_timeout_secs);
        let fetcher = Arc::new(HttpChunkFetcher::new(&config.endpoint, timeout));
        Self::with_fetcher(config, fetcher)
    }

    /// Build with an injected fetcher. Tests use this to count fetches and
    /// simulate failures.
    pub fn with_fetcher(config: CatalogConfig, fetcher: Arc<dyn ChunkFetcher>) -> Self {
        Self {
            fetcher,
            assignments: config.assignments,
            overrides: search::builtin_overrides(),
            states: RwLock::new(AHashMap::new()),
            errors: RwLock::new(AHashMap::new()),
            catalog: RwLock::new(PartialCatalog::default()),
            index: RwLock::new(CatalogIndex::new(config.collision_policy)),
            notify: Notify::new(),
        }
    }

    /// Replace the pinned search results.
    pub fn with_overrides(mut self, overrides: Vec<CatalogEntry>) -> Self {
        self.overrides = overrides;
        self
    }

    /// The chunk that serves `tier`, if any chunk does.
    pub fn chunk_for_tier(&self, tier: u32) -> Option<u32> {
        self.assignments
            .iter()
            .find(|(range, _)| range.contains(&tier))
            .map(|(_, chunk)| *chunk)
    }

    // ------------------------------------------------------------------------
    // Chunk state machine
    // ------------------------------------------------------------------------

    /// Load `chunk` unless it already loaded. Exactly one caller performs the
    /// fetch; the rest wait for its outcome. A call that finds the chunk in
    /// `Error` retries, but a waiter that wakes to `Error` reports the
    /// retained failure without starting another attempt.
    pub async fn ensure_chunk(&self, chunk: u32) -> Result<(), CatalogError> {
        let mut waited = false;
        loop {
            // Register for wakeups before reading state, so a transition
            // between the read and the await cannot be missed.
            let wait = self.notify.notified();
            {
                let mut states = self.states.write();
                match states.get(&chunk).copied().unwrap_or(ChunkLoadState::Idle) {
                    ChunkLoadState::Success => return Ok(()),
                    ChunkLoadState::Error if waited => {
                        let message = self
                            .errors
                            .read()
                            .get(&chunk)
                            .cloned()
                            .unwrap_or_default();
                        return Err(CatalogError::ChunkFailed { chunk, message });
                    }
                    ChunkLoadState::Idle | ChunkLoadState::Error => {
                        states.insert(chunk, ChunkLoadState::Loading);
                        break;
                    }
                    ChunkLoadState::Loading => {}
                }
            }
            waited = true;
            wait.await;
        }

        // This task owns the load.
        match self.fetcher.fetch_chunk(chunk).await {
            Ok(payload) => {
                let merged = self.merge(payload);
                tracing::debug!(chunk, entries = merged, "chunk merged");
                self.errors.write().remove(&chunk);
                self.states.write().insert(chunk, ChunkLoadState::Success);
                self.notify.notify_waiters();
                Ok(())
            }
            Err(err) => {
                tracing::warn!(chunk, error = %err, "chunk load failed");
                self.errors.write().insert(chunk, err.to_string());
                self.states.write().insert(chunk, ChunkLoadState::Error);
                self.notify.notify_waiters();
                Err(err)
            }
        }
    }

    /// Load the chunk serving `tier` and return the tier's entries. A tier no
    /// chunk serves, or whose chunk failed, yields an empty list; the failure
    /// stays observable through `chunk_state`/`chunk_error`.
    pub async fn ensure_tier(&self, tier: u32) -> Vec<CatalogEntry> {
        let Some(chunk) = self.chunk_for_tier(tier) else {
            tracing::warn!(tier, "no chunk serves this tier");
            return Vec::new();
        };
        if let Err(err) = self.ensure_chunk(chunk).await {
            tracing::warn!(tier, chunk, error = %err, "tier unavailable");
        }
        self.catalog
            .read()
            .tiers
            .get(&tier)
            .map(|t| t.entries.clone())
            .unwrap_or_default()
    }

    /// Kick off background loads for `chunks` without waiting on them.
    pub fn preload(self: Arc<Self>, chunks: &[u32]) {
        for &chunk in chunks {
            let service = Arc::clone(&self);
            tokio::spawn(async move {
                let _ = service.ensure_chunk(chunk).await;
            });
        }
    }

    pub fn chunk_state(&self, chunk: u32) -> ChunkLoadState {
        self.states
            .read()
            .get(&chunk)
            .copied()
            .unwrap_or(ChunkLoadState::Idle)
    }

    /// The retained failure message for `chunk`, if its last load failed.
    pub fn chunk_error(&self, chunk: u32) -> Option<String> {
        self.errors.read().get(&chunk).cloned()
    }

    // ------------------------------------------------------------------------
    // Merge
    // ------------------------------------------------------------------------

    /// Deep-merge one chunk payload into the partial catalog and fold the
    /// touched entries into the indices. Within a tier, an incoming entry
    /// replaces an existing one with the same natural key; everything else
    /// appends, then the tier is re-sorted by teaching order.
    fn merge(&self, payload: ChunkPayload) -> usize {
        let (sections, tiers) = payload.into_parts();
        let mut touched: Vec<CatalogEntry> = Vec::new();
        {
            let mut catalog = self.catalog.write();
            for section in sections {
                catalog.sections.insert(section.key.clone(), section);
            }
            for tier in tiers {
                touched.extend(tier.entries.iter().cloned());
                let slot = catalog.tiers.entry(tier.number).or_insert_with(|| Tier {
                    number: tier.number,
                    name: String::new(),
                    description: String::new(),
                    entries: Vec::new(),
                });
                if !tier.name.is_empty() {
                    slot.name = tier.name;
                }
                if !tier.description.is_empty() {
                    slot.description = tier.description;
                }
                for entry in tier.entries {
                    match slot
                        .entries
                        .iter_mut()
                        .find(|e| e.natural_key == entry.natural_key)
                    {
                        Some(existing) => *existing = entry,
                        None => slot.entries.push(entry),
                    }
                }
                slot.entries.sort_by_key(|e| e.order_in_tier);
            }
        }
        self.index.write().extend(touched.iter());
        touched.len()
    }

    // ------------------------------------------------------------------------
    // Queries over what has loaded
    // ------------------------------------------------------------------------

    pub fn lookup_id(&self, id: &str) -> Option<CatalogEntry> {
        self.index.read().get_by_id(id).cloned()
    }

    pub fn lookup_natural_key(&self, key: &str) -> Option<CatalogEntry> {
        self.index.read().get_by_natural_key(key).cloned()
    }

    pub fn lookup_external_code(&self, code: &str) -> Option<CatalogEntry> {
        self.index.read().get_by_external_code(code).cloned()
    }

    /// Rank `query` against everything loaded so far.
    pub fn search(&self, query: &str) -> Vec<CatalogEntry> {
        let catalog = self.catalog.read();
        search::rank(query, &catalog.tiers, &self.overrides)
    }

    /// Section and tier shape of the loaded catalog, entries elided.
    pub fn metadata(&self) -> CatalogMetadata {
        let catalog = self.catalog.read();
        CatalogMetadata {
            sections: catalog.sections.values().cloned().collect(),
            tiers: catalog
                .tiers
                .values()
                .map(|tier| TierSummary {
                    number: tier.number,
                    name: tier.name.clone(),
                    entry_count: tier.entries.len(),
                })
                .collect(),
        }
    }

    pub fn indexed_len(&self) -> usize {
        self.index.read().len()
    }
}
