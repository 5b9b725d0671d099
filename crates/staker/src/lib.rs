//! Stake adjustment for the TAO dividend service.
//!
//! This crate provides:
//! - [`Ledger`]: append-only SQLite audit trail of stake actions
//! - [`StakeAdjuster`]: registration, sufficiency checks and the stake extrinsic
//! - [`StakeQueue`] / [`WorkerPool`]: bounded work queue drained by a fixed set of workers
//! - [`AnalyzeAndStake`]: tweet search, scoring and adjustment for one work item

#![warn(missing_docs)]

pub mod ledger;
pub mod queue;
pub mod task;
pub mod workflow;

pub use ledger::{Ledger, LedgerSink, LedgerStats, MemoryLedger, NewStakeAction, StakeAction};
pub use queue::{ItemProcessor, QueueError, StakeQueue, WorkItem, WorkerPool};
pub use task::AnalyzeAndStake;
pub use workflow::{StakeAdjuster, StakeSettings};
