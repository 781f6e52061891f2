//! Multi-index projection over the loaded catalog.
//!
//! Three derived maps, rebuilt incrementally as chunks merge in: only the
//! entries a new chunk introduced are touched, never the whole catalog. The
//! maps are lookup conveniences, not authoritative state, and are never
//! persisted.

use crate::CatalogEntry;
use ahash::AHashMap;
use serde::{Deserialize, Serialize};

/// What to do when two entries share a natural key or external code.
///
/// The catalog's chunks can legitimately overlap, and a later chunk may carry
/// a corrected entry for a key an earlier chunk already supplied, so the
/// default lets the last write win. `KeepFirst` is available for callers that
/// want load order to be irrelevant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CollisionPolicy {
    #[default]
    LastWriteWins,
    KeepFirst,
}

/// The derived lookup maps. Ids are unique by invariant, so `by_id` always
/// overwrites; the other two maps apply the collision policy.
#[derive(Debug, Default)]
pub struct CatalogIndex {
    policy: CollisionPolicy,
    by_id: AHashMap<String, CatalogEntry>,
    by_natural_key: AHashMap<String, CatalogEntry>,
    by_external_code: AHashMap<String, CatalogEntry>,
}

impl CatalogIndex {
    pub fn new(policy: CollisionPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    /// Fold freshly merged entries into the maps.
    pub fn extend<'a>(&mut self, entries: impl IntoIterator<Item = &'a CatalogEntry>) {
        for entry in entries {
            self.by_id.insert(entry.id.clone(), entry.clone());
            Self::project(
                self.policy,
                &mut self.by_natural_key,
                &entry.natural_key,
                entry,
            );
            Self::project(
                self.policy,
                &mut self.by_external_code,
                &entry.external_code,
                entry,
            );
        }
    }

    fn project(
        policy: CollisionPolicy,
        map: &mut AHashMap<String, CatalogEntry>,
        key: &str,
        entry: &CatalogEntry,
    ) {
        match map.get(key) {
            Some(existing) if existing.id != entry.id => {
                let kept = match policy {
                    CollisionPolicy::LastWriteWins => &entry.id,
                    CollisionPolicy::KeepFirst => &existing.id,
                };
                tracing::debug!(key, kept = %kept, "index collision");
                if policy == CollisionPolicy::LastWriteWins {
                    map.insert(key.to_string(), entry.clone());
                }
            }
            _ => {
                map.insert(key.to_string(), entry.clone());
            }
        }
    }

    pub fn get_by_id(&self, id: &str) -> Option<&CatalogEntry> {
        self.by_id.get(id)
    }

    pub fn get_by_natural_key(&self, key: &str) -> Option<&CatalogEntry> {
        self.by_natural_key.get(key)
    }

    pub fn get_by_external_code(&self, code: &str) -> Option<&CatalogEntry> {
        self.by_external_code.get(code)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}
