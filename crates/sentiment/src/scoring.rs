//! LLM scoring backend.

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

use crate::error::{Result, SourceError};

/// Chutes chat-completions endpoint.
pub const DEFAULT_URL: &str = "https://llm.chutes.ai/v1/chat/completions";

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "unsloth/Llama-3.2-3B-Instruct";

/// Instruction placed before the tweet texts.
pub const PROMPT_HEADER: &str = "I'll pass you several Bittensor-related tweets. Return a number between -100 and 100 that represents the overall sentiment. Where -100 is very negative, 0 is indifferent or unrelated, and 100 is very positive. The response should only contain that number.";

/// Header, a blank line, then one text per line.
pub fn build_prompt(texts: &[String]) -> String {
    format!("{}\n\n{}", PROMPT_HEADER, texts.join("\n"))
}

/// Chat-completion style text generation.
#[async_trait]
pub trait ScoringBackend: Send + Sync {
    /// Reply text for a single user prompt.
    async fn complete(&self, prompt: &str) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    stream: bool,
    max_tokens: u32,
    temperature: f32,
}

/// Chutes chat-completions client.
#[derive(Clone)]
pub struct ChutesClient {
    client: Client,
    url: String,
    api_key: String,
    model: String,
}

impl ChutesClient {
    /// Create a client authenticating with a bearer token.
    pub fn new(
        url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build scoring HTTP client")?;

        Ok(Self {
            client,
            url: url.into(),
            api_key: api_key.into(),
            model: model.into(),
        })
    }
}

/// `choices[0].message.content` of a chat-completion response.
fn reply_content(body: &Value) -> Result<String> {
    body.pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| SourceError::Malformed("missing choices[0].message.content".to_string()))
}

#[async_trait]
impl ScoringBackend for ChutesClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            stream: false,
            max_tokens: 1024,
            temperature: 0.7,
        };

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| SourceError::Malformed(e.to_string()))?;
        reply_content(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::HeaderMap, routing::post, Json, Router};
    use serde_json::json;

    #[test]
    fn test_build_prompt() {
        let prompt = build_prompt(&["first".to_string(), "second".to_string()]);
        assert!(prompt.starts_with("I'll pass you several Bittensor-related tweets."));
        assert!(prompt.ends_with("should only contain that number.\n\nfirst\nsecond"));
    }

    #[test]
    fn test_reply_content() {
        let body = json!({"choices": [{"message": {"content": "42"}}]});
        assert_eq!(reply_content(&body).unwrap(), "42");

        let body = json!({"choices": []});
        assert!(reply_content(&body).unwrap_err().is_malformed());

        let body = json!({"choices": [{"message": {"content": 42}}]});
        assert!(reply_content(&body).unwrap_err().is_malformed());
    }

    async fn handle(headers: HeaderMap, Json(body): Json<Value>) -> Json<Value> {
        let authorized =
            headers.get("authorization").and_then(|v| v.to_str().ok()) == Some("Bearer chutes-key");
        let content = if !authorized {
            "unauthorized".to_string()
        } else {
            format!(
                "{}|{}|{}",
                body["model"].as_str().unwrap_or_default(),
                body["messages"][0]["role"].as_str().unwrap_or_default(),
                body["stream"]
            )
        };
        Json(json!({"choices": [{"message": {"role": "assistant", "content": content}}]}))
    }

    #[tokio::test]
    async fn test_complete_sends_chat_request() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, Router::new().route("/v1/chat/completions", post(handle)))
                .await
                .unwrap();
        });

        let client = ChutesClient::new(
            format!("http://{}/v1/chat/completions", addr),
            "chutes-key",
            "unsloth/Llama-3.2-3B-Instruct",
            Duration::from_secs(5),
        )
        .unwrap();

        let reply = client.complete("rate this").await.unwrap();
        assert_eq!(reply, "unsloth/Llama-3.2-3B-Instruct|user|false");
    }
}
