//! Tweet search and scoring with bounded retries.

use std::sync::Arc;
use taodiv_core::{Netuid, SentimentScore};
use tracing::{debug, error};

use crate::{
    error::{Result, SourceError},
    extract::extract_score,
    retry::RetryPolicy,
    scoring::{build_prompt, ScoringBackend},
    source::TweetSource,
};

/// Sentiment for a subnet from recent tweets.
#[derive(Clone)]
pub struct SentimentPipeline {
    source: Arc<dyn TweetSource>,
    scorer: Arc<dyn ScoringBackend>,
    retry: RetryPolicy,
}

impl SentimentPipeline {
    /// Both stages share `retry`.
    pub fn new(
        source: Arc<dyn TweetSource>,
        scorer: Arc<dyn ScoringBackend>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            source,
            scorer,
            retry,
        }
    }

    /// Recent tweet texts for `netuid`.
    ///
    /// Network failures and error statuses are retried; the last error surfaces once
    /// attempts are exhausted. Malformed responses surface immediately.
    pub async fn search_source(&self, netuid: Netuid) -> Result<Vec<String>> {
        let texts = self
            .retry
            .run(
                "tweet search",
                |e: &SourceError| e.is_transport() || e.is_status(),
                || self.source.search(netuid),
            )
            .await?;
        debug!(netuid, count = texts.len(), "Fetched tweets");
        Ok(texts)
    }

    /// Score `texts` in one prompt. Never fails: empty input and any error that outlives
    /// the retries score neutral.
    pub async fn score(&self, texts: &[String]) -> SentimentScore {
        if texts.is_empty() {
            return SentimentScore::NEUTRAL;
        }

        let prompt = build_prompt(texts);
        let reply = self
            .retry
            .run(
                "sentiment scoring",
                |e: &SourceError| e.is_transport() || e.is_malformed(),
                || self.scorer.complete(&prompt),
            )
            .await;

        match reply {
            Ok(reply) => {
                let score = extract_score(&reply);
                debug!(%score, "Scored tweets");
                score
            }
            Err(e) => {
                error!("Sentiment scoring failed: {}", e);
                SentimentScore::NEUTRAL
            }
        }
    }
}
