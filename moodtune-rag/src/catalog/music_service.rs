//! Music service HTTP client
//!
//! Endpoints:
//! - `POST /catalog/resolve-batch` `{items: [{title, artist}], per_item_limit}`
//!   → `{items: [{items: [track, ...]}, ...]}` (one group per input pair)
//! - `POST /catalog/audio-features` `{ids}` → `{items: {id: {valence, energy}}}`
//! - `GET /catalog/emotions` → `{items: {label: {valence: [lo, hi], energy: [lo, hi]}}}`
//!
//! Requests share one token-bucket rate limiter.

use super::{AudioDescriptor, CatalogError, CatalogResolver, CatalogResult, ResolvedTrack};
use crate::emotion::EmotionTable;
use crate::types::SongPair;
use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use moodtune_common::config::{CatalogConfig, EmotionRangeConfig};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::num::NonZeroU32;
use std::time::Duration;

#[derive(Debug, Serialize)]
struct ResolveBatchRequest<'a> {
    items: &'a [SongPair],
    per_item_limit: usize,
}

#[derive(Debug, Deserialize)]
struct ResolveBatchResponse {
    #[serde(default)]
    items: Vec<ResolveGroup>,
}

#[derive(Debug, Default, Deserialize)]
struct ResolveGroup {
    #[serde(default)]
    items: Vec<ResolvedTrack>,
}

#[derive(Debug, Serialize)]
struct FeaturesRequest<'a> {
    ids: &'a [String],
}

#[derive(Debug, Deserialize)]
struct FeaturesResponse {
    #[serde(default)]
    items: HashMap<String, Option<RawFeatures>>,
}

/// Descriptor entries may be partial or null
#[derive(Debug, Default, Deserialize)]
struct RawFeatures {
    #[serde(default)]
    valence: Option<f64>,
    #[serde(default)]
    energy: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct EmotionsResponse {
    #[serde(default)]
    items: BTreeMap<String, EmotionRangeConfig>,
}

/// Music service client
pub struct MusicServiceClient {
    http_client: Client,
    base_url: String,
    rate_limiter: RateLimiter<
        governor::state::direct::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
}

impl MusicServiceClient {
    pub fn new(config: &CatalogConfig) -> CatalogResult<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| CatalogError::Network(e.to_string()))?;

        let per_second = NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = RateLimiter::direct(Quota::per_second(per_second));

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            rate_limiter,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/catalog/{}", self.base_url, path)
    }

    async fn check(response: reqwest::Response) -> CatalogResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(CatalogError::Api(status.as_u16(), body))
    }

    async fn post_json<B: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &B,
    ) -> CatalogResult<R> {
        self.rate_limiter.until_ready().await;

        let response = self
            .http_client
            .post(self.endpoint(path))
            .json(body)
            .send()
            .await
            .map_err(|e| CatalogError::Network(e.to_string()))?;

        Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| CatalogError::Parse(e.to_string()))
    }
}

fn first_per_group(response: ResolveBatchResponse) -> Vec<ResolvedTrack> {
    response
        .items
        .into_iter()
        .filter_map(|group| group.items.into_iter().next())
        .filter(|track| !track.title.is_empty() && !track.artist.is_empty())
        .collect()
}

fn unit_interval(value: Option<f64>) -> Option<f64> {
    value.filter(|v| (0.0..=1.0).contains(v))
}

/// Complete in-range descriptors only; the rest fall back to emotion midpoints
fn descriptors_from(response: FeaturesResponse) -> HashMap<String, AudioDescriptor> {
    response
        .items
        .into_iter()
        .filter_map(|(id, raw)| {
            let raw = raw?;
            Some((
                id,
                AudioDescriptor {
                    valence: unit_interval(raw.valence)?,
                    energy: unit_interval(raw.energy)?,
                },
            ))
        })
        .collect()
}

fn table_from(response: EmotionsResponse) -> CatalogResult<EmotionTable> {
    if response.items.is_empty() {
        return Err(CatalogError::Parse("catalog published no emotions".to_string()));
    }
    EmotionTable::from_config(&response.items).map_err(|e| CatalogError::Parse(e.to_string()))
}

#[async_trait]
impl CatalogResolver for MusicServiceClient {
    async fn resolve_batch(
        &self,
        pairs: &[SongPair],
        per_item_limit: usize,
    ) -> CatalogResult<Vec<ResolvedTrack>> {
        if pairs.is_empty() {
            return Ok(Vec::new());
        }
        let request = ResolveBatchRequest {
            items: pairs,
            per_item_limit: per_item_limit.max(1),
        };
        let response: ResolveBatchResponse = self.post_json("resolve-batch", &request).await?;
        let resolved = first_per_group(response);

        tracing::debug!(requested = pairs.len(), resolved = resolved.len(), "Catalog batch resolved");
        Ok(resolved)
    }

    async fn audio_descriptors(
        &self,
        ids: &[String],
    ) -> CatalogResult<HashMap<String, AudioDescriptor>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let response: FeaturesResponse = self
            .post_json("audio-features", &FeaturesRequest { ids })
            .await?;
        Ok(descriptors_from(response))
    }

    async fn emotion_table(&self) -> CatalogResult<EmotionTable> {
        self.rate_limiter.until_ready().await;

        let response = self
            .http_client
            .get(self.endpoint("emotions"))
            .send()
            .await
            .map_err(|e| CatalogError::Network(e.to_string()))?;

        let parsed: EmotionsResponse = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| CatalogError::Parse(e.to_string()))?;
        table_from(parsed)
    }
}
