//! Sentiment analysis followed by a stake adjustment, for one work item.

use async_trait::async_trait;
use taodiv_core::{Hotkey, Netuid, SentimentScore};
use taodiv_sentiment::SentimentPipeline;
use tracing::{info, warn};

use crate::{
    queue::{ItemProcessor, WorkItem},
    workflow::StakeAdjuster,
};

/// Search tweets, score them, adjust stake.
#[derive(Clone)]
pub struct AnalyzeAndStake {
    pipeline: SentimentPipeline,
    adjuster: StakeAdjuster,
}

impl AnalyzeAndStake {
    /// Combine a pipeline and an adjuster.
    pub fn new(pipeline: SentimentPipeline, adjuster: StakeAdjuster) -> Self {
        Self { pipeline, adjuster }
    }

    /// Returns the sentiment that drove the adjustment. A failed tweet search returns
    /// neutral without touching the chain.
    pub async fn run(&self, netuid: Netuid, hotkey: &Hotkey) -> SentimentScore {
        let texts = match self.pipeline.search_source(netuid).await {
            Ok(texts) => texts,
            Err(e) => {
                warn!(netuid, hotkey = %hotkey, "Tweet search failed: {}", e);
                return SentimentScore::NEUTRAL;
            }
        };

        let sentiment = self.pipeline.score(&texts).await;
        self.adjuster
            .submit_stake_adjustment(netuid, hotkey, sentiment)
            .await;
        sentiment
    }
}

#[async_trait]
impl ItemProcessor for AnalyzeAndStake {
    async fn process(&self, item: WorkItem) {
        let sentiment = self.run(item.netuid, &item.hotkey).await;
        info!(netuid = item.netuid, hotkey = %item.hotkey, %sentiment, "analyze_and_stake finished");
    }
}
