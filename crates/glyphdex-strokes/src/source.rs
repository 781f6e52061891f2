//! Stroke-record sources.
//!
//! Each source answers "do you have raw data for this key?" — it returns the
//! candidate JSON as-is and leaves validation to the normalizer. The pipeline
//! treats both `Ok(None)` and `Err(_)` as "this source had no answer"; the
//! distinction only affects logging.

use async_trait::async_trait;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;

/// Errors a single source attempt can produce. Never propagated past the
/// resolution pipeline.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("HTTP status {0}")]
    Status(u16),
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// One place stroke data can come from.
#[async_trait]
pub trait StrokeSource: Send + Sync {
    /// Short name used in log lines.
    fn name(&self) -> &str;

    /// Fetch the raw candidate record for `key`, if this source has one.
    async fn fetch(&self, key: &str) -> Result<Option<Value>, SourceError>;
}

// ============================================================================
// Partitioned local files
// ============================================================================

/// One small JSON file per key, looked up across a fixed priority list of
/// candidate directories.
pub struct PartitionedDirSource {
    dirs: Vec<PathBuf>,
}

impl PartitionedDirSource {
    pub fn new(dirs: Vec<PathBuf>) -> Self {
        Self { dirs }
    }
}

#[async_trait]
impl StrokeSource for PartitionedDirSource {
    fn name(&self) -> &str {
        "partitioned-dirs"
    }

    async fn fetch(&self, key: &str) -> Result<Option<Value>, SourceError> {
        for dir in &self.dirs {
            let path = dir.join(format!("{key}.json"));
            match tokio::fs::read_to_string(&path).await {
                Ok(contents) => {
                    let value: Value = serde_json::from_str(&contents)?;
                    tracing::debug!(key, path = %path.display(), "partitioned file hit");
                    return Ok(Some(value));
                }
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
                Err(err) => {
                    tracing::warn!(key, path = %path.display(), error = %err, "partitioned file unreadable");
                }
            }
        }
        Ok(None)
    }
}

// ============================================================================
// Consolidated local indices
// ============================================================================

/// Large JSON files covering many keys at once, either an object keyed by
/// glyph or an array whose entries carry a `character`/`char` field.
pub struct ConsolidatedIndexSource {
    files: Vec<PathBuf>,
}

impl ConsolidatedIndexSource {
    pub fn new(files: Vec<PathBuf>) -> Self {
        Self { files }
    }

    fn lookup(index: &Value, key: &str) -> Option<Value> {
        match index {
            Value::Object(map) => map.get(key).cloned().map(|mut entry| {
                // Map entries often omit the key field; stamp it so the
                // normalizer can classify the shape.
                if let Value::Object(obj) = &mut entry {
                    obj.entry("character".to_string())
                        .or_insert_with(|| Value::String(key.to_string()));
                }
                entry
            }),
            Value::Array(entries) => entries
                .iter()
                .find(|e| {
                    e.get("character")
                        .or_else(|| e.get("char"))
                        .and_then(Value::as_str)
                        == Some(key)
                })
                .cloned(),
            _ => None,
        }
    }
}

#[async_trait]
impl StrokeSource for ConsolidatedIndexSource {
    fn name(&self) -> &str {
        "consolidated-index"
    }

    async fn fetch(&self, key: &str) -> Result<Option<Value>, SourceError> {
        for file in &self.files {
            let contents = match tokio::fs::read_to_string(file).await {
                Ok(contents) => contents,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
                Err(err) => {
                    tracing::warn!(key, file = %file.display(), error = %err, "index file unreadable");
                    continue;
                }
            };
            let index: Value = match serde_json::from_str(&contents) {
                Ok(index) => index,
                Err(err) => {
                    tracing::warn!(key, file = %file.display(), error = %err, "index file unparseable");
                    continue;
                }
            };
            if let Some(entry) = Self::lookup(&index, key) {
                tracing::debug!(key, file = %file.display(), "consolidated index hit");
                return Ok(Some(entry));
            }
        }
        Ok(None)
    }
}

// ============================================================================
// Remote mirrors
// ============================================================================

/// HTTP mirror serving one record per key from a templated URL. A single
/// time-boxed attempt, no retry; timeout cancels the in-flight request.
pub struct RemoteMirrorSource {
    name: String,
    url_template: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl RemoteMirrorSource {
    /// `url_template` must contain a `{key}` placeholder; the key is
    /// percent-encoded before substitution.
    pub fn new(name: &str, url_template: &str, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");
        Self {
            name: name.to_string(),
            url_template: url_template.to_string(),
            client,
            timeout,
        }
    }

    fn url_for(&self, key: &str) -> String {
        let encoded = utf8_percent_encode(key, NON_ALPHANUMERIC).to_string();
        self.url_template.replace("{key}", &encoded)
    }
}

#[async_trait]
impl StrokeSource for RemoteMirrorSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, key: &str) -> Result<Option<Value>, SourceError> {
        let url = self.url_for(key);
        let request = async {
            let response = self.client.get(&url).send().await?;
            if !response.status().is_success() {
                return Err(SourceError::Status(response.status().as_u16()));
            }
            let value: Value = response.json().await?;
            Ok(Some(value))
        };
        match tokio::time::timeout(self.timeout, request).await {
            Ok(result) => result,
            Err(_) => Err(SourceError::Timeout(self.timeout)),
        }
    }
}
