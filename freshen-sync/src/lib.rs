//! # freshen-sync
//!
//! Per-client record reconciliation.
//!
//! For every (client, category) group the engine looks up the stored records,
//! allocates one generation identifier for the round, and decides per watched
//! fingerprint whether the existing record is fresh or must be superseded.
//! Call [`pipeline::run`] to reconcile a whole roster into a [`RunSummary`].

pub mod allocator;
pub mod config;
pub mod engine;
pub mod error;
pub mod freshness;
pub mod pipeline;
pub mod resolver;
pub mod sink;

pub use config::{ConfigOptions, FingerprintMode, ReconcileConfig};
pub use engine::{Decision, GroupOutcome, GroupPlan, ReconciliationEngine};
pub use error::ReconcileError;
pub use freshness::TimestampPolicy;
pub use pipeline::{FailureReport, RunSummary};
pub use resolver::{GroupResolver, ResolvedGroup};
pub use sink::ApplyResult;
