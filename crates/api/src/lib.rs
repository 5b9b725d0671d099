//! # taodiv API
//!
//! HTTP surface of the TAO dividend service.
//!
//! - `GET /api/v1/tao_dividends?netuid=&hotkey=&trade=` - dividends for a subnet, a
//!   hotkey, a pair, or the whole corpus; `trade=true` on a pair queues a
//!   sentiment-driven stake adjustment
//! - `GET /health` - liveness
//!
//! Lookups go through [`resolver::DividendResolver`], which serves from the cache when it
//! can and falls back to the chain.

#![warn(missing_docs)]

pub mod cache;
pub mod config;
pub mod resolver;
/// Router, app wiring and the serve loop.
pub mod server;

pub use cache::{CacheBackend, CacheError, CachedDividends, MemoryCache, RedisCache};
pub use config::Config;
pub use resolver::{DividendResolver, ResolveError, Resolved};
pub use server::{build_app, router, App, AppState};
