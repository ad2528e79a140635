//! Error types for freshen-sync.

use thiserror::Error;

use freshen_core::{Category, ClientId, Fingerprint, RosterError, StoreError};

/// All errors that can arise from a reconciliation run.
///
/// `RosterUnavailable` and `ConfigInvalid` abort the run. The per-group and
/// per-write variants are recovered locally and surface in the run summary.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The roster could not be fetched or decoded.
    #[error("roster unavailable: {0}")]
    RosterUnavailable(#[from] RosterError),

    /// A configuration value could not be parsed or is out of range.
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    /// The secondary-index query for one group failed.
    #[error("query failed for client '{client}' category '{category}': {source}")]
    GroupQueryFailed {
        client: ClientId,
        category: Category,
        #[source]
        source: StoreError,
    },

    /// A single upsert failed.
    #[error(
        "write failed for client '{client}' category '{category}' fingerprint '{fingerprint}': {source}"
    )]
    WriteFailed {
        client: ClientId,
        category: Category,
        fingerprint: Fingerprint,
        #[source]
        source: StoreError,
    },
}

/// Convenience constructor for [`ReconcileError::ConfigInvalid`].
pub(crate) fn config_err(message: impl Into<String>) -> ReconcileError {
    ReconcileError::ConfigInvalid(message.into())
}
