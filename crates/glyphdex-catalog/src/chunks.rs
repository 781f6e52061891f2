//! Chunk payloads and the fetcher boundary.
//!
//! The chunk endpoint returns a JSON object with `basic`/`advanced`-style
//! top-level sections, each holding a map of tier-name → tier object. Wire
//! field names follow the authoring scripts (`levels`, `characters`,
//! `stroke_count`, …); they are converted into the internal model here, in
//! one place.

use crate::{CatalogEntry, CatalogError, Tier};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

// ============================================================================
// Wire shapes
// ============================================================================

/// One chunk as served by the endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChunkPayload {
    pub basic: Option<SectionPayload>,
    pub advanced: Option<SectionPayload>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SectionPayload {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(alias = "total_characters")]
    pub total: Option<u32>,
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(alias = "levels", default)]
    pub tiers: BTreeMap<String, TierPayload>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TierPayload {
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(alias = "characters", default)]
    pub entries: Vec<EntryPayload>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EntryPayload {
    pub id: Option<String>,
    #[serde(alias = "char")]
    pub character: String,
    pub unicode: Option<String>,
    pub meaning: Option<String>,
    pub pronunciation: Option<String>,
    pub radical: Option<String>,
    #[serde(alias = "strokes")]
    pub stroke_count: Option<u32>,
    #[serde(alias = "grade")]
    pub level: Option<u32>,
    pub order: Option<u32>,
}

/// Section metadata retained after the entries are merged away.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionMeta {
    pub key: String,
    pub name: String,
    pub description: String,
    pub total: Option<u32>,
    pub last_updated: Option<DateTime<Utc>>,
}

// ============================================================================
// Wire → model conversion
// ============================================================================

impl ChunkPayload {
    /// Split the payload into section metadata and fully converted tiers.
    pub fn into_parts(self) -> (Vec<SectionMeta>, Vec<Tier>) {
        let mut sections = Vec::new();
        let mut tiers = Vec::new();
        for (key, section) in [("basic", self.basic), ("advanced", self.advanced)] {
            let Some(section) = section else { continue };
            sections.push(SectionMeta {
                key: key.to_string(),
                name: section.name.clone(),
                description: section.description.clone(),
                total: section.total,
                last_updated: section.last_updated,
            });
            for (tier_name, payload) in section.tiers {
                match tier_number(&tier_name) {
                    Some(number) => tiers.push(payload.into_tier(number)),
                    None => {
                        tracing::warn!(tier_name, "tier name carries no number, skipping");
                    }
                }
            }
        }
        (sections, tiers)
    }
}

impl TierPayload {
    fn into_tier(self, number: u32) -> Tier {
        let entries = self
            .entries
            .into_iter()
            .enumerate()
            .map(|(position, entry)| entry.into_entry(number, position as u32))
            .collect();
        Tier {
            number,
            name: self.name.unwrap_or_else(|| format!("Tier {number}")),
            description: self.description.unwrap_or_default(),
            entries,
        }
    }
}

impl EntryPayload {
    fn into_entry(self, tier: u32, position: u32) -> CatalogEntry {
        let external_code = self
            .unicode
            .map(|u| u.trim_start_matches("U+").to_uppercase())
            .unwrap_or_else(|| {
                self.character
                    .chars()
                    .next()
                    .map(|c| format!("{:X}", u32::from(c)))
                    .unwrap_or_default()
            });
        let id = self
            .id
            .unwrap_or_else(|| format!("GX-{tier:02}-{external_code}"));

        let mut display_fields = BTreeMap::new();
        if let Some(meaning) = self.meaning {
            display_fields.insert("meaning".to_string(), meaning);
        }
        if let Some(pronunciation) = self.pronunciation {
            display_fields.insert("pronunciation".to_string(), pronunciation);
        }
        if let Some(radical) = self.radical {
            display_fields.insert("radical".to_string(), radical);
        }
        if let Some(stroke_count) = self.stroke_count {
            display_fields.insert("stroke_count".to_string(), stroke_count.to_string());
        }

        CatalogEntry {
            id,
            natural_key: self.character,
            external_code,
            display_fields,
            tier: self.level.unwrap_or(tier),
            order_in_tier: self.order.unwrap_or(position),
        }
    }
}

/// Extract the trailing number from a tier-name key like `level7`.
pub fn tier_number(name: &str) -> Option<u32> {
    let digits: String = name
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

// ============================================================================
// Fetcher boundary
// ============================================================================

/// Where chunks come from. The HTTP implementation is the production path;
/// tests inject mocks that count calls or fail on demand.
#[async_trait]
pub trait ChunkFetcher: Send + Sync {
    async fn fetch_chunk(&self, chunk_id: u32) -> Result<ChunkPayload, CatalogError>;
}

/// GETs `{endpoint}?chunk={id}` with a bounded timeout. Non-2xx responses
/// carry an error object with a `message` field rather than a payload.
pub struct HttpChunkFetcher {
    endpoint: String,
    client: reqwest::Client,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

impl HttpChunkFetcher {
    pub fn new(endpoint: &str, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");
        Self {
            endpoint: endpoint.to_string(),
            client,
            timeout,
        }
    }
}

#[async_trait]
impl ChunkFetcher for HttpChunkFetcher {
    async fn fetch_chunk(&self, chunk_id: u32) -> Result<ChunkPayload, CatalogError> {
        let url = format!("{}?chunk={}", self.endpoint, chunk_id);
        let request = async {
            let response = self.client.get(&url).send().await?;
            let status = response.status();
            if !status.is_success() {
                let body: ErrorBody = response.json().await.unwrap_or(ErrorBody {
                    message: String::new(),
                });
                return Err(CatalogError::Endpoint {
                    status: status.as_u16(),
                    message: body.message,
                });
            }
            Ok(response.json::<ChunkPayload>().await?)
        };
        match tokio::time::timeout(self.timeout, request).await {
            Ok(result) => result,
            Err(_) => Err(CatalogError::Timeout {
                chunk: chunk_id,
                after: self.timeout,
            }),
        }
    }
}
