//! Shared reconciliation entrypoint: roster → engine → sink → summary.
//!
//! Per group the sequence is resolve → allocate → decide → upsert, and each
//! group's writes land before the next group is resolved.
//!
//! # Concurrent runs
//!
//! Two runs against the same (client, category) group can both see no
//! matched record and allocate the same new identifier. Callers must
//! serialize runs that share a store (one scheduled job, or an external lock).

use chrono::{DateTime, Utc};
use serde::Serialize;

use freshen_core::{
    Category, ClientId, Fingerprint, GenerationId, RecordSink, RecordStore, RosterSource,
    WriteIntent,
};

use crate::config::ReconcileConfig;
use crate::engine::ReconciliationEngine;
use crate::error::ReconcileError;
use crate::sink::{self, ApplyResult};

/// Status of a reported write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteStatus {
    Written,
    WouldWrite,
}

/// A write that was applied or, in dry-run mode, would have been.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WriteReport {
    pub client: ClientId,
    pub category: Category,
    pub fingerprint: Fingerprint,
    pub generation: GenerationId,
    pub timestamp: i64,
    pub status: WriteStatus,
}

impl WriteReport {
    fn new(intent: &WriteIntent, status: WriteStatus) -> Self {
        Self {
            client: intent.client.clone(),
            category: intent.category.clone(),
            fingerprint: intent.fingerprint.clone(),
            generation: intent.generation,
            timestamp: intent.timestamp,
            status,
        }
    }
}

/// Kind of locally recovered failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    GroupQuery,
    Write,
}

/// A recovered failure, flattened for reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureReport {
    pub kind: FailureKind,
    pub client: ClientId,
    pub category: Category,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<Fingerprint>,
    pub message: String,
}

impl FailureReport {
    /// Report for a per-group or per-write error; `None` for fatal variants.
    pub fn from_error(error: &ReconcileError) -> Option<Self> {
        match error {
            ReconcileError::GroupQueryFailed {
                client, category, ..
            } => Some(Self {
                kind: FailureKind::GroupQuery,
                client: client.clone(),
                category: category.clone(),
                fingerprint: None,
                message: error.to_string(),
            }),
            ReconcileError::WriteFailed {
                client,
                category,
                fingerprint,
                ..
            } => Some(Self {
                kind: FailureKind::Write,
                client: client.clone(),
                category: category.clone(),
                fingerprint: Some(fingerprint.clone()),
                message: error.to_string(),
            }),
            ReconcileError::RosterUnavailable(_) | ReconcileError::ConfigInvalid(_) => None,
        }
    }
}

/// Structured result of a run. Produced even when some groups or writes failed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub dry_run: bool,
    pub policy: String,
    pub clients: usize,
    pub groups: usize,
    /// Groups where every watched fingerprint was fresh.
    pub groups_fresh: usize,
    /// Groups where at least one write landed (or would have, in dry-run).
    pub groups_written: usize,
    pub intents: usize,
    pub writes_applied: usize,
    pub writes_dry_run: usize,
    pub group_failures: usize,
    pub write_failures: usize,
    pub writes: Vec<WriteReport>,
    pub failures: Vec<FailureReport>,
}

impl RunSummary {
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    fn record_failure(&mut self, error: &ReconcileError) {
        match error {
            ReconcileError::GroupQueryFailed { .. } => self.group_failures += 1,
            ReconcileError::WriteFailed { .. } => self.write_failures += 1,
            _ => {}
        }
        if let Some(report) = FailureReport::from_error(error) {
            self.failures.push(report);
        }
    }
}

/// Load the roster and reconcile every client.
///
/// Only an unavailable roster aborts; per-group and per-write failures are
/// counted in the returned summary.
pub fn run<R, S>(
    roster: &R,
    store: &mut S,
    config: &ReconcileConfig,
    now: DateTime<Utc>,
) -> Result<RunSummary, ReconcileError>
where
    R: RosterSource + ?Sized,
    S: RecordStore + RecordSink + ?Sized,
{
    let clients = roster.load().map_err(|err| {
        tracing::error!(roster = %roster.location(), "roster unavailable: {err}");
        ReconcileError::RosterUnavailable(err)
    })?;
    tracing::info!(
        roster = %roster.location(),
        clients = clients.len(),
        categories = config.categories.len(),
        fingerprints = config.watched.len(),
        policy = %config.policy,
        dry_run = config.dry_run,
        "loaded roster"
    );
    Ok(reconcile_clients(&clients, store, config, now))
}

/// Reconcile an already-loaded list of clients.
pub fn reconcile_clients<S>(
    clients: &[ClientId],
    store: &mut S,
    config: &ReconcileConfig,
    now: DateTime<Utc>,
) -> RunSummary
where
    S: RecordStore + RecordSink + ?Sized,
{
    let engine = ReconciliationEngine::new(config);
    let mut summary = RunSummary {
        dry_run: config.dry_run,
        policy: config.policy.to_string(),
        clients: clients.len(),
        ..RunSummary::default()
    };

    for client in clients {
        for category in &config.categories {
            summary.groups += 1;
            let plan = match engine.plan_group(&*store, client, category, now) {
                Ok(plan) => plan,
                Err(err) => {
                    tracing::warn!("{err}; skipping group this round");
                    summary.record_failure(&err);
                    continue;
                }
            };

            if plan.is_fresh() {
                summary.groups_fresh += 1;
                continue;
            }
            summary.intents += plan.intents.len();

            let mut landed = 0;
            for intent in plan.intents {
                match sink::apply(&mut *store, intent, config.dry_run) {
                    ApplyResult::Written { intent } => {
                        landed += 1;
                        summary.writes_applied += 1;
                        summary
                            .writes
                            .push(WriteReport::new(&intent, WriteStatus::Written));
                    }
                    ApplyResult::WouldWrite { intent } => {
                        landed += 1;
                        summary.writes_dry_run += 1;
                        summary
                            .writes
                            .push(WriteReport::new(&intent, WriteStatus::WouldWrite));
                    }
                    ApplyResult::Failed { error, .. } => summary.record_failure(&error),
                }
            }
            if landed > 0 {
                summary.groups_written += 1;
            }
        }
    }

    tracing::info!(
        clients = summary.clients,
        groups = summary.groups,
        fresh = summary.groups_fresh,
        written = summary.groups_written,
        intents = summary.intents,
        failures = summary.failures.len(),
        "reconciliation finished"
    );
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use freshen_core::{MemoryStore, Record, RosterError, StoreError};

    use crate::config::ConfigOptions;

    struct StaticRoster(Vec<&'static str>);

    impl RosterSource for StaticRoster {
        fn load(&self) -> Result<Vec<ClientId>, RosterError> {
            Ok(self.0.iter().map(|c| ClientId::from(*c)).collect())
        }

        fn location(&self) -> String {
            "static".to_string()
        }
    }

    struct BrokenRoster;

    impl RosterSource for BrokenRoster {
        fn load(&self) -> Result<Vec<ClientId>, RosterError> {
            freshen_core::roster::parse_roster("not json", "broken")
        }

        fn location(&self) -> String {
            "broken".to_string()
        }
    }

    /// Answers queries with an empty group and rejects every write.
    struct DownStore;

    impl RecordStore for DownStore {
        fn query_group(
            &self,
            _client: &ClientId,
            _category: &Category,
        ) -> Result<Vec<Record>, StoreError> {
            Ok(Vec::new())
        }
    }

    impl RecordSink for DownStore {
        fn upsert(&mut self, _record: Record) -> Result<(), StoreError> {
            Err(StoreError::Backend("service unavailable".to_string()))
        }
    }

    fn config(dry_run: bool) -> ReconcileConfig {
        ReconcileConfig::new(ConfigOptions {
            watched: "h1,h2".to_string(),
            categories: Some("love,letter".to_string()),
            dry_run,
            ..ConfigOptions::default()
        })
        .unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 20, 9, 0, 0).unwrap()
    }

    #[test]
    fn run_empty_roster_returns_empty_summary() {
        let mut store = MemoryStore::new();
        let summary = run(&StaticRoster(vec![]), &mut store, &config(false), now()).unwrap();
        assert_eq!(summary.clients, 0);
        assert_eq!(summary.groups, 0);
        assert!(!summary.has_failures());
    }

    #[test]
    fn run_counts_groups_and_writes() {
        let mut store = MemoryStore::new();
        let summary = run(&StaticRoster(vec!["a", "b"]), &mut store, &config(false), now()).unwrap();
        assert_eq!(summary.clients, 2);
        assert_eq!(summary.groups, 4);
        assert_eq!(summary.groups_written, 4);
        assert_eq!(summary.intents, 8);
        assert_eq!(summary.writes_applied, 8);
        assert_eq!(store.len(), 8);
    }

    #[test]
    fn dry_run_reports_without_writing() {
        let mut store = MemoryStore::new();
        let summary = run(&StaticRoster(vec!["a"]), &mut store, &config(true), now()).unwrap();
        assert!(summary.dry_run);
        assert_eq!(summary.writes_dry_run, 4);
        assert_eq!(summary.writes_applied, 0);
        assert!(summary
            .writes
            .iter()
            .all(|w| w.status == WriteStatus::WouldWrite));
        assert!(store.is_empty());
    }

    #[test]
    fn broken_roster_is_fatal() {
        let mut store = MemoryStore::new();
        let err = run(&BrokenRoster, &mut store, &config(false), now()).unwrap_err();
        assert!(matches!(err, ReconcileError::RosterUnavailable(_)), "got: {err}");
    }

    #[test]
    fn summary_serializes_counts() {
        let mut store = MemoryStore::new();
        let summary = run(&StaticRoster(vec!["a"]), &mut store, &config(false), now()).unwrap();
        let value = serde_json::to_value(&summary).unwrap();
        assert_eq!(value["groups_written"], 2);
        assert_eq!(value["writes"][0]["status"], "written");
        assert_eq!(value["policy"], "rolling-ttl (2d)");
    }

    #[test]
    fn group_with_every_write_rejected_is_not_counted_written() {
        let mut config = config(false);
        config.categories = vec![Category::from("love")];
        let summary = run(&StaticRoster(vec!["c1"]), &mut DownStore, &config, now()).unwrap();
        assert_eq!(summary.groups, 1);
        assert_eq!(summary.intents, 2);
        assert_eq!(summary.groups_written, 0);
        assert_eq!(summary.writes_applied, 0);
        assert_eq!(summary.write_failures, 2);
        assert_eq!(summary.failures.len(), 2);
        assert!(summary.writes.is_empty());
    }
}
