//! Applying write intents to a [`RecordSink`].
//!
//! One upsert per intent, no batching and no retries. In dry-run mode the
//! intent is logged and reported as [`ApplyResult::WouldWrite`] instead.

use freshen_core::{RecordSink, WriteIntent};

use crate::error::ReconcileError;

/// Outcome of an individual intent.
#[derive(Debug)]
pub enum ApplyResult {
    /// The record was upserted.
    Written { intent: WriteIntent },
    /// `--dry-run` mode: the record *would* have been upserted.
    WouldWrite { intent: WriteIntent },
    /// The upsert failed; always a [`ReconcileError::WriteFailed`].
    Failed {
        intent: WriteIntent,
        error: ReconcileError,
    },
}

impl ApplyResult {
    pub fn intent(&self) -> &WriteIntent {
        match self {
            ApplyResult::Written { intent }
            | ApplyResult::WouldWrite { intent }
            | ApplyResult::Failed { intent, .. } => intent,
        }
    }
}

/// Apply a single intent.
pub fn apply<K: RecordSink + ?Sized>(
    sink: &mut K,
    intent: WriteIntent,
    dry_run: bool,
) -> ApplyResult {
    if dry_run {
        tracing::info!(
            client = %intent.client,
            category = %intent.category,
            fingerprint = %intent.fingerprint,
            generation = %intent.generation,
            "[dry-run] would write"
        );
        return ApplyResult::WouldWrite { intent };
    }

    match sink.upsert(intent.to_record()) {
        Ok(()) => {
            tracing::info!(
                client = %intent.client,
                category = %intent.category,
                fingerprint = %intent.fingerprint,
                generation = %intent.generation,
                "wrote record"
            );
            ApplyResult::Written { intent }
        }
        Err(source) => {
            let error = ReconcileError::WriteFailed {
                client: intent.client.clone(),
                category: intent.category.clone(),
                fingerprint: intent.fingerprint.clone(),
                source,
            };
            tracing::warn!("{error}");
            ApplyResult::Failed { intent, error }
        }
    }
}
