//! Generation identifier allocation, once per group per round.
//!
//! - Some watched fingerprint already has a record → reuse its identifier.
//!   Every matched record of a group is expected to carry the same one; the
//!   most recent match is inspected so the choice does not depend on read order.
//! - Otherwise → `max(identifier over the whole group, default 0) + 1`.

use std::collections::BTreeMap;

use freshen_core::{Fingerprint, GenerationId, Record};

use crate::resolver::{recency, ResolvedGroup};

/// Identifier to stamp on every write of this round for the group.
pub fn allocate(matched: &BTreeMap<Fingerprint, Record>, all_records: &[Record]) -> GenerationId {
    if let Some(existing) = matched.values().max_by(|a, b| recency(a, b)) {
        let disagreeing = matched
            .values()
            .filter(|r| r.generation != existing.generation)
            .count();
        if disagreeing > 0 {
            tracing::warn!(
                client = %existing.client,
                category = %existing.category,
                reused = %existing.generation,
                disagreeing,
                "matched records carry different generation ids"
            );
        }
        return existing.generation;
    }

    all_records
        .iter()
        .map(|r| r.generation)
        .max()
        .unwrap_or_default()
        .next()
}

/// [`allocate`] over a resolved group.
pub fn allocate_for(group: &ResolvedGroup) -> GenerationId {
    allocate(&group.matched, &group.all_records)
}
