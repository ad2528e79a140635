//! Reconciliation engine: resolve → allocate → decide, per group.
//!
//! For each (client, category) pair:
//! 1. Resolve the group through the secondary index.
//! 2. Allocate one generation id for the round.
//! 3. For each watched fingerprint, skip when the existing record is fresh,
//!    otherwise emit a [`WriteIntent`] stamped `now` with the round's id.
//!
//! Groups are independent. A failed query is reported as
//! [`GroupOutcome::Failed`] and never stops the remaining pairs.

use chrono::{DateTime, Utc};
use serde::Serialize;

use freshen_core::{Category, ClientId, Fingerprint, GenerationId, RecordStore, WriteIntent};

use crate::allocator;
use crate::config::{FingerprintMode, ReconcileConfig};
use crate::error::ReconcileError;
use crate::resolver::{GroupResolver, ResolvedGroup};

/// Why a fingerprint is written this round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WriteReason {
    /// No record exists for the fingerprint yet.
    Missing,
    /// The existing record failed the freshness check.
    Stale { last_timestamp: Option<i64> },
}

/// Per-fingerprint verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Decision {
    Skip {
        fingerprint: Fingerprint,
        last_timestamp: Option<i64>,
    },
    Write {
        fingerprint: Fingerprint,
        reason: WriteReason,
    },
}

/// Everything decided for one group in one round.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupPlan {
    pub client: ClientId,
    pub category: Category,
    pub generation: GenerationId,
    pub decisions: Vec<Decision>,
    pub intents: Vec<WriteIntent>,
}

impl GroupPlan {
    /// True when every watched fingerprint was fresh.
    pub fn is_fresh(&self) -> bool {
        self.intents.is_empty()
    }
}

/// Outcome of one (client, category) pair.
#[derive(Debug)]
pub enum GroupOutcome {
    Planned(GroupPlan),
    /// Always a [`ReconcileError::GroupQueryFailed`].
    Failed(ReconcileError),
}

/// Stateless across runs: everything it knows comes from the store.
#[derive(Debug)]
pub struct ReconciliationEngine<'a> {
    config: &'a ReconcileConfig,
    resolver: GroupResolver,
}

impl<'a> ReconciliationEngine<'a> {
    pub fn new(config: &'a ReconcileConfig) -> Self {
        Self {
            config,
            resolver: GroupResolver::new(&config.watched),
        }
    }

    pub fn config(&self) -> &ReconcileConfig {
        self.config
    }

    pub fn resolver(&self) -> &GroupResolver {
        &self.resolver
    }

    /// Resolve and decide a single group.
    pub fn plan_group<S: RecordStore + ?Sized>(
        &self,
        store: &S,
        client: &ClientId,
        category: &Category,
        now: DateTime<Utc>,
    ) -> Result<GroupPlan, ReconcileError> {
        let group = self
            .resolver
            .resolve(store, client, category)
            .map_err(|source| ReconcileError::GroupQueryFailed {
                client: client.clone(),
                category: category.clone(),
                source,
            })?;
        Ok(self.decide(client, category, &group, now))
    }

    /// Decide a group that has already been resolved.
    pub fn decide(
        &self,
        client: &ClientId,
        category: &Category,
        group: &ResolvedGroup,
        now: DateTime<Utc>,
    ) -> GroupPlan {
        let generation = allocator::allocate_for(group);
        tracing::debug!(
            %client,
            %category,
            records = group.all_records.len(),
            matched = group.matched.len(),
            %generation,
            "allocated generation id"
        );

        let decisions = match self.config.mode {
            FingerprintMode::All => self.decide_each(group, now),
            FingerprintMode::FirstOnly => self.decide_first(group, now),
        };

        let timestamp = self.config.policy.stamp(now);
        let mut intents = Vec::new();
        for decision in &decisions {
            match decision {
                Decision::Skip {
                    fingerprint,
                    last_timestamp,
                } => {
                    tracing::debug!(
                        %client,
                        %category,
                        %fingerprint,
                        last_timestamp = ?last_timestamp,
                        "skip: record is fresh"
                    );
                }
                Decision::Write {
                    fingerprint,
                    reason,
                } => {
                    tracing::info!(
                        %client,
                        %category,
                        %fingerprint,
                        %generation,
                        reason = ?reason,
                        "emit write intent"
                    );
                    intents.push(WriteIntent {
                        client: client.clone(),
                        category: category.clone(),
                        fingerprint: fingerprint.clone(),
                        generation,
                        timestamp,
                        payload: self.config.payload.clone(),
                    });
                }
            }
        }

        GroupPlan {
            client: client.clone(),
            category: category.clone(),
            generation,
            decisions,
            intents,
        }
    }

    fn decide_each(&self, group: &ResolvedGroup, now: DateTime<Utc>) -> Vec<Decision> {
        self.config
            .watched
            .iter()
            .map(|fingerprint| match group.matched.get(fingerprint) {
                Some(existing) if self.config.policy.is_fresh(existing.timestamp, now) => {
                    Decision::Skip {
                        fingerprint: fingerprint.clone(),
                        last_timestamp: existing.timestamp,
                    }
                }
                Some(existing) => Decision::Write {
                    fingerprint: fingerprint.clone(),
                    reason: WriteReason::Stale {
                        last_timestamp: existing.timestamp,
                    },
                },
                None => Decision::Write {
                    fingerprint: fingerprint.clone(),
                    reason: WriteReason::Missing,
                },
            })
            .collect()
    }

    fn decide_first(&self, group: &ResolvedGroup, now: DateTime<Utc>) -> Vec<Decision> {
        let Some(first) = self.config.watched.first() else {
            return Vec::new();
        };
        let decision = match group.most_recent_match() {
            Some(existing) if self.config.policy.is_fresh(existing.timestamp, now) => {
                Decision::Skip {
                    fingerprint: existing.fingerprint.clone(),
                    last_timestamp: existing.timestamp,
                }
            }
            Some(existing) => Decision::Write {
                fingerprint: first.clone(),
                reason: WriteReason::Stale {
                    last_timestamp: existing.timestamp,
                },
            },
            None => Decision::Write {
                fingerprint: first.clone(),
                reason: WriteReason::Missing,
            },
        };
        vec![decision]
    }

    /// Plan every (client, category) pair without writing anything.
    ///
    /// This is the plan-only entrypoint for embedders that apply intents
    /// themselves. Every group is resolved against the same store state, so
    /// callers that write between groups should drive [`Self::plan_group`]
    /// per group instead, as [`crate::pipeline::reconcile_clients`] does.
    pub fn run<S: RecordStore + ?Sized>(
        &self,
        store: &S,
        clients: &[ClientId],
        now: DateTime<Utc>,
    ) -> Vec<GroupOutcome> {
        let mut outcomes = Vec::with_capacity(clients.len() * self.config.categories.len());
        for client in clients {
            for category in &self.config.categories {
                let outcome = match self.plan_group(store, client, category, now) {
                    Ok(plan) => GroupOutcome::Planned(plan),
                    Err(err) => {
                        tracing::warn!("{err}");
                        GroupOutcome::Failed(err)
                    }
                };
                outcomes.push(outcome);
            }
        }
        outcomes
    }
}

/// All write intents across planned outcomes from [`ReconciliationEngine::run`],
/// in plan order.
pub fn intents(outcomes: &[GroupOutcome]) -> impl Iterator<Item = &WriteIntent> {
    outcomes.iter().flat_map(|outcome| match outcome {
        GroupOutcome::Planned(plan) => plan.intents.as_slice(),
        GroupOutcome::Failed(_) => &[],
    })
}
