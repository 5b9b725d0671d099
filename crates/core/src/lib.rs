//! # taodiv core
//!
//! Shared building blocks for the TAO dividend service: subnet/hotkey identifiers,
//! dividend records, cache keys, stake-action enums, the sentiment score type, and the
//! SS58 address codec used to move between on-chain account ids and hotkey strings.
//!
//! ## Contents
//!
//! - **Corpus**: netuid grouping and scoped lookups over the full dividend corpus
//! - **Types**: `Ss58Address` (`Hotkey`/`Coldkey`), `DividendRecord`, `NetuidGroup`,
//!   `CacheKey`, `StakeType`, `StakeStatus`, `Balance`
//! - **Score**: `SentimentScore`, clamped to `[-100, 100]`
//! - **SS58**: encode/decode with the `SS58PRE` blake2b checksum
//! - **Constants**: chain storage coordinates and cache key prefixes

#![warn(missing_docs)]

pub mod constants;
pub mod corpus;
pub mod error;
pub mod score;
pub mod ss58;
pub mod types;

pub use constants::*;
pub use corpus::CorpusBuilder;
pub use error::{CoreError, Result};
pub use score::SentimentScore;
pub use types::*;
