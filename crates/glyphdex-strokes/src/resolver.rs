//! The per-key resolution pipeline.
//!
//! [`StrokeResolver`] is a long-lived service object constructed once at
//! startup and shared by `Arc`; each test constructs its own instance from
//! mock sources. The cache is authoritative for the process lifetime and is
//! never invalidated, so the fallback chain runs at most once per key.
//!
//! Two concurrent `resolve` calls for the same key are deliberately *not*
//! deduplicated: both may run the chain and both write the same final value
//! (resolution is pure given the same sources, so last write wins harmlessly).

use crate::normalize::normalize;
use crate::source::{
    ConsolidatedIndexSource, PartitionedDirSource, RemoteMirrorSource, StrokeSource,
};
use crate::synthetic::synthesize;
use crate::StrokeRecord;
use dashmap::DashMap;
use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Configuration
// ============================================================================

/// Where the pipeline looks for stroke data, in fallback order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Candidate directories holding one JSON file per key.
    pub partition_dirs: Vec<PathBuf>,
    /// Candidate consolidated index files covering many keys at once.
    pub index_files: Vec<PathBuf>,
    /// Primary mirror URL template with a `{key}` placeholder.
    pub primary_mirror: Option<String>,
    /// Secondary mirror tried when the primary fails or times out.
    pub secondary_mirror: Option<String>,
    /// Per-attempt timeout for remote fetches.
    pub fetch_timeout_secs: u64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            partition_dirs: vec![
                PathBuf::from("data/stroke_data"),
                PathBuf::from("public/data/stroke_data"),
                PathBuf::from("data/strokes"),
                PathBuf::from("public/data/strokes"),
            ],
            index_files: vec![
                PathBuf::from("data/stroke_index.json"),
                PathBuf::from("data/strokes.json"),
                PathBuf::from("strokes.json"),
            ],
            primary_mirror: Some(
                "https://cdn.jsdelivr.net/npm/hanzi-writer-data@latest/{key}.json".to_string(),
            ),
            secondary_mirror: Some(
                "https://raw.githubusercontent.com/chanind/hanzi-writer-data/master/{key}.json"
                    .to_string(),
            ),
            fetch_timeout_secs: 5,
        }
    }
}

// ============================================================================
// Resolver
// ============================================================================

/// Resolves glyph keys to stroke records through the ordered fallback chain.
pub struct StrokeResolver {
    local_sources: Vec<Box<dyn StrokeSource>>,
    remote_sources: Vec<Box<dyn StrokeSource>>,
    cache: DashMap<String, Arc<StrokeRecord>>,
    decoded_keys: DashMap<String, String>,
}

impl StrokeResolver {
    pub fn new(config: ResolverConfig) -> Self {
        let timeout = Duration::from_secs(config.fetch_timeout_secs);

        let mut local_sources: Vec<Box<dyn StrokeSource>> = Vec::new();
        if !config.partition_dirs.is_empty() {
            local_sources.push(Box::new(PartitionedDirSource::new(config.partition_dirs)));
        }
        if !config.index_files.is_empty() {
            local_sources.push(Box::new(ConsolidatedIndexSource::new(config.index_files)));
        }

        let mut remote_sources: Vec<Box<dyn StrokeSource>> = Vec::new();
        if let Some(template) = &config.primary_mirror {
            remote_sources.push(Box::new(RemoteMirrorSource::new(
                "primary-mirror",
                template,
                timeout,
            )));
        }
        if let Some(template) = &config.secondary_mirror {
            remote_sources.push(Box::new(RemoteMirrorSource::new(
                "secondary-mirror",
                template,
                timeout,
            )));
        }

        Self::from_sources(local_sources, remote_sources)
    }

    /// Build a resolver from explicit sources. Tests use this to inject mocks.
    pub fn from_sources(
        local_sources: Vec<Box<dyn StrokeSource>>,
        remote_sources: Vec<Box<dyn StrokeSource>>,
    ) -> Self {
        Self {
            local_sources,
            remote_sources,
            cache: DashMap::new(),
            decoded_keys: DashMap::new(),
        }
    }

    /// Resolve `key` to a stroke record. Never fails; the synthetic generator
    /// backstops the chain, and every result is cached under the requested key.
    pub async fn resolve(&self, key: &str) -> Arc<StrokeRecord> {
        let key = self.decode_key(key);

        if let Some(record) = self.cache.get(&key) {
            return Arc::clone(&record);
        }

        for source in self.local_sources.iter().chain(&self.remote_sources) {
            match source.fetch(&key).await {
                Ok(Some(raw)) => {
                    if let Some(mut record) = normalize(&raw, Some(&key)) {
                        // Downstream consumers key by request, not by whatever
                        // the source embedded.
                        record.key = key.clone();
                        return self.cache_record(key, record);
                    }
                    tracing::warn!(key = %key, source = source.name(), "candidate failed validation");
                }
                Ok(None) => {
                    tracing::debug!(key = %key, source = source.name(), "source miss");
                }
                Err(err) => {
                    tracing::warn!(key = %key, source = source.name(), error = %err, "source failed");
                }
            }
        }

        tracing::info!(key = %key, "no source answered, synthesizing placeholder");
        let record = synthesize(&key);
        self.cache_record(key, record)
    }

    /// Cheap existence probe: true when the key is already cached or present
    /// in a local source. Never touches the remote mirrors.
    pub async fn has_record(&self, key: &str) -> bool {
        let key = self.decode_key(key);
        if self.cache.contains_key(&key) {
            return true;
        }
        for source in &self.local_sources {
            if matches!(source.fetch(&key).await, Ok(Some(_))) {
                return true;
            }
        }
        false
    }

    /// Number of records currently memoized.
    pub fn cached_records(&self) -> usize {
        self.cache.len()
    }

    fn cache_record(&self, key: String, record: StrokeRecord) -> Arc<StrokeRecord> {
        let record = Arc::new(record);
        self.cache.insert(key, Arc::clone(&record));
        record
    }

    /// Keys arrive from URL paths and may still be percent-encoded; decode
    /// once and memoize the mapping.
    fn decode_key(&self, key: &str) -> String {
        if !looks_percent_encoded(key) {
            return key.to_string();
        }
        if let Some(decoded) = self.decoded_keys.get(key) {
            return decoded.clone();
        }
        let decoded = percent_decode_str(key)
            .decode_utf8()
            .map(|s| s.into_owned())
            .unwrap_or_else(|_| key.to_string());
        self.decoded_keys.insert(key.to_string(), decoded.clone());
        decoded
    }
}

fn looks_percent_encoded(key: &str) -> bool {
    let bytes = key.as_bytes();
    bytes.windows(3).any(|w| {
        w[0] == b'%' && w[1].is_ascii_hexdigit() && w[2].is_ascii_hexdigit()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_encoding_detection() {
        assert!(looks_percent_encoded("%E6%B0%B4"));
        assert!(!looks_percent_encoded("水"));
        assert!(!looks_percent_encoded("100%"));
    }
}
