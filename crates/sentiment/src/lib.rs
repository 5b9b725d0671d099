//! Sentiment signal for stake adjustments.
//!
//! Tweets mentioning a subnet are fetched from a [`TweetSource`], sent as one prompt to a
//! [`ScoringBackend`], and the first number in the reply becomes a [`SentimentScore`].
//!
//! [`SentimentScore`]: taodiv_core::SentimentScore

#![warn(missing_docs)]

pub mod error;
pub mod extract;
pub mod pipeline;
pub mod retry;
pub mod scoring;
pub mod source;

pub use error::SourceError;
pub use extract::extract_score;
pub use pipeline::SentimentPipeline;
pub use retry::RetryPolicy;
pub use scoring::{build_prompt, ChutesClient, ScoringBackend, PROMPT_HEADER};
pub use source::{DaturaClient, TweetSource};
