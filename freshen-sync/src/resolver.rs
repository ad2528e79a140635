//! Group lookup: one secondary-index query per (client, category).
//!
//! Results are split into records whose fingerprint is watched this run
//! (`matched`) and the full group (`all_records`, kept for id allocation).
//!
//! The store key is meant to make (client, category, fingerprint) unique, but
//! nothing structurally prevents duplicates. When two records share a watched
//! fingerprint, the most recent by normalized timestamp wins and ties go to
//! the higher generation id.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use freshen_core::{Category, ClientId, Fingerprint, Record, RecordStore, StoreError};

use crate::freshness::to_millis;

/// Records of one group, partitioned by watched fingerprint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedGroup {
    pub matched: BTreeMap<Fingerprint, Record>,
    pub all_records: Vec<Record>,
}

impl ResolvedGroup {
    /// The most recently stamped matched record, if any.
    pub fn most_recent_match(&self) -> Option<&Record> {
        self.matched
            .values()
            .max_by(|a, b| recency(a, b))
    }
}

/// Resolves (client, category) groups against the watched fingerprint set.
#[derive(Debug, Clone)]
pub struct GroupResolver {
    watched: BTreeSet<Fingerprint>,
}

impl GroupResolver {
    pub fn new<'a>(watched: impl IntoIterator<Item = &'a Fingerprint>) -> Self {
        Self {
            watched: watched.into_iter().cloned().collect(),
        }
    }

    pub fn is_watched(&self, fingerprint: &Fingerprint) -> bool {
        self.watched.contains(fingerprint)
    }

    /// Query the store for the group and partition the result.
    pub fn resolve<S: RecordStore + ?Sized>(
        &self,
        store: &S,
        client: &ClientId,
        category: &Category,
    ) -> Result<ResolvedGroup, StoreError> {
        let all_records = store.query_group(client, category)?;
        Ok(self.partition(all_records))
    }

    /// Partition already-fetched group records.
    pub fn partition(&self, all_records: Vec<Record>) -> ResolvedGroup {
        let mut matched: BTreeMap<Fingerprint, Record> = BTreeMap::new();
        for record in &all_records {
            if !self.is_watched(&record.fingerprint) {
                continue;
            }
            if let Some(current) = matched.get(&record.fingerprint) {
                tracing::warn!(
                    client = %record.client,
                    category = %record.category,
                    fingerprint = %record.fingerprint,
                    "duplicate record for fingerprint; keeping the more recent one"
                );
                if recency(record, current) != Ordering::Greater {
                    continue;
                }
            }
            matched.insert(record.fingerprint.clone(), record.clone());
        }
        ResolvedGroup {
            matched,
            all_records,
        }
    }
}

/// Order records by normalized timestamp (missing oldest), then generation.
pub(crate) fn recency(a: &Record, b: &Record) -> Ordering {
    let ts = |r: &Record| r.timestamp.filter(|t| *t > 0).map(to_millis);
    ts(a)
        .cmp(&ts(b))
        .then_with(|| a.generation.cmp(&b.generation))
}

#[cfg(test)]
mod tests {
    use super::*;
    use freshen_core::{GenerationId, MemoryStore, Payload};

    fn record(fp: &str, id: u64, ts: Option<i64>) -> Record {
        Record {
            client: ClientId::from("c1"),
            category: Category::from("love"),
            fingerprint: Fingerprint::from(fp),
            generation: GenerationId(id),
            timestamp: ts,
            payload: Payload::new(),
        }
    }

    fn watched(fps: &[&str]) -> Vec<Fingerprint> {
        fps.iter().map(|f| Fingerprint::from(*f)).collect()
    }

    #[test]
    fn partitions_watched_from_irrelevant() {
        let store = MemoryStore::with_records([
            record("h1", 2, Some(100)),
            record("other", 9, Some(100)),
        ]);
        let fps = watched(&["h1", "h2"]);
        let resolver = GroupResolver::new(&fps);
        let group = resolver
            .resolve(&store, &ClientId::from("c1"), &Category::from("love"))
            .unwrap();

        assert_eq!(group.matched.len(), 1);
        assert!(group.matched.contains_key(&Fingerprint::from("h1")));
        assert_eq!(group.all_records.len(), 2);
    }

    #[test]
    fn empty_group_resolves_empty() {
        let store = MemoryStore::new();
        let fps = watched(&["h1"]);
        let group = GroupResolver::new(&fps)
            .resolve(&store, &ClientId::from("nobody"), &Category::from("love"))
            .unwrap();
        assert_eq!(group, ResolvedGroup::default());
    }

    #[test]
    fn duplicate_fingerprint_keeps_most_recent() {
        let fps = watched(&["h1"]);
        let resolver = GroupResolver::new(&fps);
        let group = resolver.partition(vec![
            record("h1", 3, Some(1_700_000_000_000)),
            record("h1", 2, Some(1_700_000_500)),
            record("h1", 4, None),
        ]);
        // 1_700_000_500 seconds is later than 1_700_000_000_000 milliseconds.
        assert_eq!(group.matched[&Fingerprint::from("h1")].generation, GenerationId(2));
    }

    #[test]
    fn duplicate_tie_goes_to_higher_generation() {
        let fps = watched(&["h1"]);
        let group = GroupResolver::new(&fps).partition(vec![
            record("h1", 5, Some(100)),
            record("h1", 7, Some(100)),
            record("h1", 6, Some(100)),
        ]);
        assert_eq!(group.matched[&Fingerprint::from("h1")].generation, GenerationId(7));
    }

    #[test]
    fn most_recent_match_spans_fingerprints() {
        let fps = watched(&["h1", "h2"]);
        let group = GroupResolver::new(&fps).partition(vec![
            record("h1", 1, Some(100)),
            record("h2", 1, Some(200)),
        ]);
        assert_eq!(
            group.most_recent_match().map(|r| r.fingerprint.clone()),
            Some(Fingerprint::from("h2"))
        );
    }
}
