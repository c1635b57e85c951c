//! OpenSearch track store
//!
//! Talks to the OpenSearch REST API directly:
//! - `POST /{index}/_search` for filtered and title/artist queries
//! - `PUT /{index}/_doc/{id}` for id-addressed upserts, then `POST /{index}/_refresh`
//! - `GET /{index}/_count`, `HEAD|PUT|DELETE /{index}` for collection management
//!
//! A 404 on search means the index does not exist yet: it is created and the
//! search returns no hits.

use super::{MoodQuery, StoreError, StoreResult, TrackStore};
use crate::types::TrackCandidate;
use async_trait::async_trait;
use moodtune_common::config::StoreConfig;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Fields returned by search queries (embeddings are never read back)
const SOURCE_FIELDS: &[&str] = &[
    "id",
    "external_id",
    "provider",
    "source",
    "title",
    "artist",
    "preview_url",
    "uri",
    "valence",
    "energy",
    "mood",
    "image_url",
    "thumbnail_url",
    "llm_text",
    "created_at",
];

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    hits: HitsEnvelope,
}

#[derive(Debug, Default, Deserialize)]
struct HitsEnvelope {
    #[serde(default)]
    hits: Vec<Hit>,
}

#[derive(Debug, Deserialize)]
struct Hit {
    #[serde(rename = "_source", default)]
    source: TrackCandidate,
}

#[derive(Debug, Deserialize)]
struct CountResponse {
    #[serde(default)]
    count: u64,
}

/// OpenSearch-backed track store
pub struct OpenSearchStore {
    http_client: Client,
    base_url: Url,
    index: String,
    user: String,
    password: String,
    embedding_dim: usize,
}

impl OpenSearchStore {
    /// Create a store client from configuration
    pub fn new(config: &StoreConfig, embedding_dim: usize) -> StoreResult<Self> {
        let base_url = Url::parse(&config.base_url())
            .map_err(|e| StoreError::Parse(format!("invalid OpenSearch URL: {}", e)))?;

        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(5))
            .danger_accept_invalid_certs(!config.verify_certs)
            .build()
            .map_err(|e| StoreError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url,
            index: config.index.clone(),
            user: config.user.clone(),
            password: config.password.clone(),
            embedding_dim,
        })
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    /// `{base}/{segments...}` with each segment percent-encoded
    fn url(&self, segments: &[&str]) -> StoreResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| StoreError::Parse("OpenSearch URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> StoreResult<reqwest::Response> {
        request
            .basic_auth(&self.user, Some(&self.password))
            .send()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))
    }

    async fn error_from(response: reqwest::Response) -> StoreError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        StoreError::Api(status, body)
    }

    async fn run_search(&self, body: &Value) -> StoreResult<Option<Vec<TrackCandidate>>> {
        let url = self.url(&[self.index.as_str(), "_search"])?;
        let response = self.send(self.http_client.post(url).json(body)).await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| StoreError::Parse(e.to_string()))?;
        Ok(Some(parsed.hits.hits.into_iter().map(|h| h.source).collect()))
    }

    async fn refresh(&self) -> StoreResult<()> {
        let url = self.url(&[self.index.as_str(), "_refresh"])?;
        let response = self.send(self.http_client.post(url)).await?;
        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }
        Ok(())
    }
}

/// Bool query: exact mood term plus inclusive valence/energy ranges
pub(crate) fn build_search_body(query: &MoodQuery) -> Value {
    json!({
        "size": query.limit,
        "query": {
            "bool": {
                "must": [
                    { "range": { "valence": { "gte": query.valence.lo, "lte": query.valence.hi } } },
                    { "range": { "energy": { "gte": query.energy.lo, "lte": query.energy.hi } } },
                    { "term": { "mood": query.mood } }
                ]
            }
        },
        "_source": SOURCE_FIELDS,
    })
}

/// Approximate title/artist match, every term required in both fields
pub(crate) fn build_match_body(title: &str, artist: &str, limit: usize) -> Value {
    json!({
        "size": limit.max(1),
        "query": {
            "bool": {
                "must": [
                    { "match": { "title": { "query": title, "operator": "and" } } },
                    { "match": { "artist": { "query": artist, "operator": "and" } } }
                ]
            }
        },
        "_source": SOURCE_FIELDS,
    })
}

/// Index settings and mapping (folding analyzer, knn embedding field)
pub(crate) fn index_definition(embedding_dim: usize) -> Value {
    let folded_text = json!({
        "type": "text",
        "analyzer": "folding",
        "fields": { "raw": { "type": "keyword", "ignore_above": 256 } }
    });
    json!({
        "settings": {
            "index": {
                "number_of_shards": 1,
                "number_of_replicas": 0,
                "knn": true,
                "analysis": {
                    "analyzer": {
                        "folding": { "tokenizer": "standard", "filter": ["lowercase", "asciifolding"] }
                    }
                }
            }
        },
        "mappings": {
            "properties": {
                "id": { "type": "keyword" },
                "external_id": { "type": "keyword" },
                "provider": { "type": "keyword" },
                "source": { "type": "keyword" },
                "image_url": { "type": "keyword" },
                "thumbnail_url": { "type": "keyword" },
                "llm_text": { "type": "text", "analyzer": "folding" },
                "embedding": {
                    "type": "knn_vector",
                    "dimension": embedding_dim,
                    "method": { "engine": "lucene", "space_type": "cosinesimil", "name": "hnsw" }
                },
                "title": folded_text.clone(),
                "artist": folded_text,
                "uri": { "type": "keyword" },
                "preview_url": { "type": "keyword" },
                "mood": { "type": "keyword" },
                "valence": { "type": "float" },
                "energy": { "type": "float" },
                "created_at": { "type": "date", "format": "strict_date_optional_time||epoch_millis" }
            }
        }
    })
}

#[async_trait]
impl TrackStore for OpenSearchStore {
    fn name(&self) -> &'static str {
        "opensearch"
    }

    async fn search(&self, query: &MoodQuery) -> StoreResult<Vec<TrackCandidate>> {
        let body = build_search_body(query);
        debug!(index = %self.index, mood = %query.mood, limit = query.limit, "OpenSearch mood query");

        match self.run_search(&body).await? {
            Some(hits) => Ok(hits),
            None => {
                info!(index = %self.index, "Index not found on search, creating it");
                if let Err(e) = self.ensure_collection().await {
                    warn!(index = %self.index, error = %e, "Lazy index creation failed");
                }
                Ok(Vec::new())
            }
        }
    }

    async fn upsert_many(&self, docs: &[TrackCandidate]) -> StoreResult<usize> {
        if docs.is_empty() {
            return Ok(0);
        }
        self.ensure_collection().await?;

        let mut written = 0;
        for doc in docs {
            let Some(id) = doc.id.as_deref() else {
                continue;
            };
            let url = self.url(&[self.index.as_str(), "_doc", id])?;
            match self.send(self.http_client.put(url).json(doc)).await {
                Ok(response) if response.status().is_success() => written += 1,
                Ok(response) => {
                    let err = Self::error_from(response).await;
                    warn!(id, error = %err, "OpenSearch upsert rejected");
                }
                Err(e) => warn!(id, error = %e, "OpenSearch upsert failed"),
            }
        }

        if let Err(e) = self.refresh().await {
            warn!(index = %self.index, error = %e, "Index refresh failed");
        }

        debug!(index = %self.index, written, total = docs.len(), "OpenSearch upsert finished");
        Ok(written)
    }

    async fn find_by_title_artist(
        &self,
        title: &str,
        artist: &str,
        limit: usize,
    ) -> StoreResult<Vec<TrackCandidate>> {
        let body = build_match_body(title, artist, limit);
        Ok(self.run_search(&body).await?.unwrap_or_default())
    }

    async fn count(&self) -> StoreResult<u64> {
        let url = self.url(&[self.index.as_str(), "_count"])?;
        let response = self.send(self.http_client.get(url)).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(0);
        }
        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }
        let parsed: CountResponse = response
            .json()
            .await
            .map_err(|e| StoreError::Parse(e.to_string()))?;
        Ok(parsed.count)
    }

    async fn ensure_collection(&self) -> StoreResult<()> {
        let url = self.url(&[self.index.as_str()])?;
        let exists = self.send(self.http_client.head(url.clone())).await?;
        if exists.status().is_success() {
            return Ok(());
        }

        let response = self
            .send(self.http_client.put(url).json(&index_definition(self.embedding_dim)))
            .await?;
        let status = response.status();
        if status.is_success() {
            info!(index = %self.index, "OpenSearch index created");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        // Another request created it between HEAD and PUT
        if status == StatusCode::BAD_REQUEST && body.contains("resource_already_exists_exception") {
            return Ok(());
        }
        Err(StoreError::Api(status.as_u16(), body))
    }

    async fn recreate_collection(&self) -> StoreResult<()> {
        let url = self.url(&[self.index.as_str()])?;
        let response = self.send(self.http_client.delete(url)).await?;
        let status = response.status();
        if !status.is_success() && status != StatusCode::NOT_FOUND {
            return Err(Self::error_from(response).await);
        }
        info!(index = %self.index, "OpenSearch index deleted");
        self.ensure_collection().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emotion::ValueRange;

    fn store() -> OpenSearchStore {
        OpenSearchStore::new(&StoreConfig::default(), 1536).unwrap()
    }

    #[test]
    fn test_url_construction_encodes_ids() {
        let store = store();
        let url = store.url(&["moodtune_tracks", "_doc", "llm-sad-a b/c"]).unwrap();
        assert_eq!(
            url.as_str(),
            "http://opensearch:9200/moodtune_tracks/_doc/llm-sad-a%20b%2Fc"
        );
    }

    #[test]
    fn test_search_body_filters() {
        let query = MoodQuery::new(
            "happy",
            ValueRange { lo: 0.6, hi: 1.0 },
            ValueRange { lo: 0.5, hi: 1.0 },
            50,
        );
        let body = build_search_body(&query);
        assert_eq!(body["size"], 50);
        let must = body["query"]["bool"]["must"].as_array().unwrap();
        assert_eq!(must.len(), 3);
        assert_eq!(must[0]["range"]["valence"]["gte"], 0.6);
        assert_eq!(must[1]["range"]["energy"]["lte"], 1.0);
        assert_eq!(must[2]["term"]["mood"], "happy");
        assert!(!body["_source"]
            .as_array()
            .unwrap()
            .iter()
            .any(|f| f == "embedding"));
    }

    #[test]
    fn test_match_body_uses_and_operator() {
        let body = build_match_body("Hey Jude", "The Beatles", 0);
        assert_eq!(body["size"], 1);
        let must = body["query"]["bool"]["must"].as_array().unwrap();
        assert_eq!(must[0]["match"]["title"]["operator"], "and");
        assert_eq!(must[1]["match"]["artist"]["query"], "The Beatles");
    }

    #[test]
    fn test_index_definition_dimension() {
        let def = index_definition(384);
        assert_eq!(def["mappings"]["properties"]["embedding"]["dimension"], 384);
        assert_eq!(def["mappings"]["properties"]["mood"]["type"], "keyword");
    }

    #[test]
    fn test_hit_with_partial_source_parses() {
        let raw = r#"{"hits":{"hits":[{"_source":{"id":"a","title":"T","artist":"A","mood":"sad","valence":0.2,"energy":0.3}},{"_source":{}}]}}"#;
        let parsed: SearchResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.hits.hits.len(), 2);
        assert_eq!(parsed.hits.hits[0].source.title, "T");
        assert!(parsed.hits.hits[1].source.key().is_none());
    }
}
