//! OpenAI-compatible curator client
//!
//! Uses `POST {base}/chat/completions` for suggestions, metadata and answers,
//! and `POST {base}/embeddings` for vectors. Any server speaking the same
//! protocol works (set `[curator] base_url`).

use super::parse::{format_context, parse_playlist_meta, parse_song_list};
use super::{
    Curator, CuratorError, CuratorResult, PlaylistMeta, ANSWER_CONTEXT_LIMIT,
};
use crate::types::{SongPair, TrackCandidate};
use async_trait::async_trait;
use moodtune_common::config::{resolve_openai_api_key, CuratorConfig};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    data: Vec<EmbeddingItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingItem {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

pub struct OpenAiCurator {
    http_client: Client,
    base_url: String,
    api_key: String,
    model: String,
    embedding_model: String,
}

impl OpenAiCurator {
    /// Build the client; fails with a configuration error when no API key is set
    pub fn new(config: &CuratorConfig) -> moodtune_common::Result<Self> {
        let api_key = resolve_openai_api_key(config)?;

        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                moodtune_common::Error::Config(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
            embedding_model: config.embedding_model.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn post_json<B: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &B,
    ) -> CuratorResult<R> {
        let response = self
            .http_client
            .post(self.endpoint(path))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| CuratorError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CuratorError::Api(status.as_u16(), body));
        }

        response
            .json()
            .await
            .map_err(|e| CuratorError::Parse(e.to_string()))
    }

    async fn chat(
        &self,
        system: &str,
        user: String,
        temperature: f32,
        max_tokens: u32,
    ) -> CuratorResult<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature,
            max_tokens,
        };

        let response: ChatResponse = self.post_json("chat/completions", &request).await?;
        let text = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .unwrap_or_default();

        if text.is_empty() {
            return Err(CuratorError::EmptyCompletion);
        }
        Ok(text)
    }
}

fn curate_prompt(emotion: &str, count: usize, avoid: &[SongPair], guidance: &str) -> String {
    let mut prompt = format!(
        "Target emotion: {}. Return a JSON array of {} objects with exactly the keys 'title' and 'artist'. \
         No comments or text outside the JSON. Example: [{{\"title\":\"...\",\"artist\":\"...\"}}]",
        emotion, count
    );
    if !guidance.is_empty() {
        prompt.push_str("\nGuidance: ");
        prompt.push_str(guidance);
    }
    if !avoid.is_empty() {
        prompt.push_str("\nDo not suggest any of these (title - artist):");
        for pair in avoid {
            prompt.push_str(&format!("\n{} - {}", pair.title, pair.artist));
        }
    }
    prompt
}

#[async_trait]
impl Curator for OpenAiCurator {
    async fn curate(
        &self,
        emotion: &str,
        count: usize,
        avoid: &[SongPair],
        guidance: &str,
    ) -> CuratorResult<Vec<SongPair>> {
        if count == 0 {
            return Ok(Vec::new());
        }
        let system = "You are a music curator suggesting songs in English and Spanish. \
                      Return ONLY valid JSON: a list of songs suited to the given emotion.";
        let text = self
            .chat(system, curate_prompt(emotion, count, avoid, guidance), 0.6, 600)
            .await?;

        let songs = parse_song_list(&text, count);
        debug!(emotion, requested = count, parsed = songs.len(), "Curator suggestions parsed");
        Ok(songs)
    }

    async fn embed(&self, texts: &[String]) -> CuratorResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let request = EmbeddingRequest {
            model: &self.embedding_model,
            input: texts,
        };
        let mut response: EmbeddingResponse = self.post_json("embeddings", &request).await?;
        response.data.sort_by_key(|item| item.index);
        Ok(response.data.into_iter().map(|item| item.embedding).collect())
    }

    async fn short_metadata(&self, emotion: &str) -> CuratorResult<PlaylistMeta> {
        let system = "You write titles and descriptions for music playlists. Be concise and catchy.";
        let user = format!(
            "Write a title and a short description (1-2 lines) for a playlist based on the emotion '{}'. \
             Put the title on the first line and the description on the second. No emojis.",
            emotion
        );
        let text = self.chat(system, user, 0.7, 120).await?;
        Ok(parse_playlist_meta(&text, emotion))
    }

    async fn answer(
        &self,
        emotion: &str,
        prompt: &str,
        context: &[TrackCandidate],
    ) -> CuratorResult<String> {
        let system = "You are a music assistant. Use the track context (title, artist and their \
                      metrics) to answer briefly and usefully, focused on the given emotion. If the \
                      context does not cover something, answer generally without inventing details.";
        let user = format!(
            "Emotion: {}\nContext (tracks):\n{}\n\nQuestion: {}",
            emotion,
            format_context(context, ANSWER_CONTEXT_LIMIT),
            prompt
        );
        self.chat(system, user, 0.6, 300).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_key() -> CuratorConfig {
        CuratorConfig {
            api_key: Some("sk-test".to_string()),
            base_url: "http://localhost:1234/v1/".to_string(),
            ..CuratorConfig::default()
        }
    }

    #[test]
    fn test_new_requires_api_key() {
        let result = OpenAiCurator::new(&CuratorConfig::default());
        assert!(matches!(result, Err(moodtune_common::Error::Config(_))));
    }

    #[test]
    fn test_endpoint_construction() {
        let curator = OpenAiCurator::new(&config_with_key()).unwrap();
        assert_eq!(
            curator.endpoint("chat/completions"),
            "http://localhost:1234/v1/chat/completions"
        );
    }

    #[test]
    fn test_curate_prompt_lists_avoided_pairs() {
        let prompt = curate_prompt(
            "sad",
            8,
            &[SongPair::new("hurt", "johnny cash")],
            "valence~0.0-0.4, energy~0.0-0.5",
        );
        assert!(prompt.contains("JSON array of 8 objects"));
        assert!(prompt.contains("Guidance: valence~0.0-0.4"));
        assert!(prompt.contains("\nhurt - johnny cash"));
    }

    #[test]
    fn test_embedding_response_reordered_by_index() {
        let raw = r#"{"data":[{"index":1,"embedding":[2.0]},{"index":0,"embedding":[1.0]}]}"#;
        let mut parsed: EmbeddingResponse = serde_json::from_str(raw).unwrap();
        parsed.data.sort_by_key(|item| item.index);
        assert_eq!(parsed.data[0].embedding, vec![1.0]);
    }
}
