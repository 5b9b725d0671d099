//! Tweet search.

use anyhow::Context;
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use reqwest::{header::AUTHORIZATION, Client};
use serde_json::Value;
use std::time::Duration;
use taodiv_core::Netuid;

use crate::error::{Result, SourceError};

/// Datura Twitter search endpoint.
pub const DEFAULT_URL: &str = "https://apis.datura.ai/twitter";

/// Source of recent tweet texts about a subnet.
#[async_trait]
pub trait TweetSource: Send + Sync {
    /// Texts of recent tweets mentioning `netuid`, in the order the source ranks them.
    async fn search(&self, netuid: Netuid) -> Result<Vec<String>>;
}

/// Datura Twitter search client.
#[derive(Clone)]
pub struct DaturaClient {
    client: Client,
    url: String,
    api_key: String,
    tweet_count: u32,
}

impl DaturaClient {
    /// Create a client. `api_key` is sent verbatim in the `Authorization` header.
    pub fn new(
        url: impl Into<String>,
        api_key: impl Into<String>,
        tweet_count: u32,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build tweet search HTTP client")?;

        Ok(Self {
            client,
            url: url.into(),
            api_key: api_key.into(),
            tweet_count,
        })
    }
}

fn search_params(netuid: Netuid, end_date: NaiveDate, count: u32) -> Vec<(&'static str, String)> {
    vec![
        ("query", format!("netuid:{}", netuid)),
        ("blue_verified", "false".to_string()),
        ("end_date", end_date.format("%Y-%m-%d").to_string()),
        ("is_image", "false".to_string()),
        ("is_quote", "false".to_string()),
        ("is_video", "false".to_string()),
        ("lang", "en".to_string()),
        ("min_likes", "0".to_string()),
        ("min_replies", "0".to_string()),
        ("min_retweets", "0".to_string()),
        ("sort", "Top".to_string()),
        ("count", count.to_string()),
    ]
}

/// Keep the `text` field of every item that has one.
fn tweet_texts(items: Vec<Value>) -> Vec<String> {
    items
        .into_iter()
        .filter_map(|item| match item.get("text") {
            Some(Value::String(text)) => Some(text.clone()),
            _ => None,
        })
        .collect()
}

#[async_trait]
impl TweetSource for DaturaClient {
    async fn search(&self, netuid: Netuid) -> Result<Vec<String>> {
        let params = search_params(netuid, Utc::now().date_naive(), self.tweet_count);
        let response = self
            .client
            .get(&self.url)
            .header(AUTHORIZATION, self.api_key.as_str())
            .query(&params)
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

        let items: Vec<Value> = response
            .json()
            .await
            .map_err(|e| SourceError::Malformed(e.to_string()))?;
        Ok(tweet_texts(items))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::Query, http::HeaderMap, http::StatusCode, routing::get, Json, Router};
    use serde_json::json;
    use std::collections::HashMap;

    async fn handle(
        headers: HeaderMap,
        Query(params): Query<HashMap<String, String>>,
    ) -> (StatusCode, Json<Value>) {
        if headers.get("authorization").and_then(|v| v.to_str().ok()) != Some("datura-key") {
            return (StatusCode::UNAUTHORIZED, Json(json!({"detail": "bad key"})));
        }
        if params.get("query").map(String::as_str) != Some("netuid:18")
            || params.get("count").map(String::as_str) != Some("10")
            || params.get("sort").map(String::as_str) != Some("Top")
        {
            return (StatusCode::BAD_REQUEST, Json(json!({"detail": "bad params"})));
        }
        (
            StatusCode::OK,
            Json(json!([
                { "id": "1", "text": "subnet 18 is shipping" },
                { "id": "2" },
                { "id": "3", "text": "not impressed" }
            ])),
        )
    }

    async fn spawn_source() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, Router::new().route("/twitter", get(handle)))
                .await
                .unwrap();
        });
        format!("http://{}/twitter", addr)
    }

    #[test]
    fn test_search_params() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 9).unwrap();
        let params = search_params(7, date, 10);
        assert_eq!(params[0], ("query", "netuid:7".to_string()));
        assert_eq!(params[2], ("end_date", "2025-03-09".to_string()));
        assert_eq!(params.last(), Some(&("count", "10".to_string())));
    }

    #[tokio::test]
    async fn test_search_keeps_texts_in_order() {
        let url = spawn_source().await;
        let client = DaturaClient::new(url, "datura-key", 10, Duration::from_secs(5)).unwrap();

        let texts = client.search(18).await.unwrap();
        assert_eq!(texts, vec!["subnet 18 is shipping", "not impressed"]);
    }

    #[tokio::test]
    async fn test_search_status_error() {
        let url = spawn_source().await;
        let client = DaturaClient::new(url, "wrong", 10, Duration::from_secs(5)).unwrap();

        let err = client.search(18).await.unwrap_err();
        assert!(matches!(err, SourceError::Status { status: 401, .. }));
    }
}
