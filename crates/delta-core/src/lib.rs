//! # delta-core
//!
//! Core synchronization framework for Delta Sync.
//!
//! Delta Sync mirrors records from a source directory service into a
//! destination directory service. This crate holds everything that is
//! independent of the wire protocol: the entry model, the
//! [`DirectoryClient`] capability consumed by the engine, the per-entry
//! [`ReconciliationEngine`], the pluggable [`MappingEvaluator`] seam, the
//! [`FailureRegistry`] and the [`Poller`] driving the whole loop.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod client;
pub mod entry;
pub mod error;
pub mod evaluate;
pub mod poller;
pub mod reconcile;
pub mod registry;

#[cfg(test)]
pub(crate) mod testutil;

pub use client::{DirectoryClient, Modification, SyncWindow};
pub use entry::{AttributeMap, AttributeValue, DirectoryEntry};
pub use error::{SyncError, SyncResult};
pub use evaluate::{EvaluationContext, MappingEvaluator, RuleSet};
pub use poller::{Clock, Poller, ScheduleConfig, ShutdownHandle, SystemClock};
pub use reconcile::{CycleStats, ReconciliationEngine};
pub use registry::FailureRegistry;
