//! Chain access for the TAO dividend service.
//!
//! This crate provides:
//! - [`StorageReader`] / [`StakeOperator`]: the boundary the rest of the service talks to
//! - [`RpcGateway`]: JSON-RPC client for a chain gateway that owns codec and signing
//! - [`MemoryChain`]: in-process chain state for tests and local runs
//! - [`DividendAggregator`]: decodes raw `TaoDividendsPerSubnet` rows into grouped dividends

#![warn(missing_docs)]

pub mod aggregator;
pub mod client;
pub mod error;
pub mod memory;
pub mod provider;

pub use aggregator::DividendAggregator;
pub use client::{BlockHash, RawEntry, RawEntryStream, StakeOperator, StorageParam, StorageReader};
pub use error::ChainError;
pub use memory::{CallCounts, MemoryChain};
pub use provider::RpcGateway;
