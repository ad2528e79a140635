//! Timestamp normalization and freshness policies.
//!
//! Stored timestamps come in two units. Anything numerically greater than
//! [`MILLIS_THRESHOLD`] is read as epoch milliseconds, everything else as
//! epoch seconds.
//!
//! Policies:
//! - `RollingTtl` — fresh iff `now - last < ttl`, compared in milliseconds.
//! - `FixedCutoff` — fresh iff `last >= 00:00 UTC of (today - days)`,
//!   compared in seconds. The cutoff moves once a day, not continuously.
//!
//! A missing or non-positive timestamp is never fresh under either policy.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Days, Utc};

/// Values above this are epoch milliseconds.
pub const MILLIS_THRESHOLD: i64 = 1_000_000_000_000;

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// Normalize an epoch timestamp of either unit to milliseconds.
pub fn to_millis(timestamp: i64) -> i64 {
    if timestamp > MILLIS_THRESHOLD {
        timestamp
    } else {
        timestamp.saturating_mul(1000)
    }
}

/// Normalize an epoch timestamp of either unit to seconds.
pub fn to_seconds(timestamp: i64) -> i64 {
    if timestamp > MILLIS_THRESHOLD {
        timestamp / 1000
    } else {
        timestamp
    }
}

/// Run-level freshness policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampPolicy {
    RollingTtl { ttl: Duration },
    FixedCutoff { days: u32 },
}

impl TimestampPolicy {
    pub fn rolling_ttl_days(days: u32) -> Self {
        TimestampPolicy::RollingTtl {
            ttl: Duration::from_secs(u64::from(days) * SECONDS_PER_DAY),
        }
    }

    pub fn fixed_cutoff_days(days: u32) -> Self {
        TimestampPolicy::FixedCutoff { days }
    }

    /// Policy name as accepted on the command line.
    pub fn name(&self) -> &'static str {
        match self {
            TimestampPolicy::RollingTtl { .. } => "rolling-ttl",
            TimestampPolicy::FixedCutoff { .. } => "fixed-cutoff",
        }
    }

    /// Whether a record last stamped at `last` may be left untouched at `now`.
    pub fn is_fresh(&self, last: Option<i64>, now: DateTime<Utc>) -> bool {
        let Some(last) = last.filter(|ts| *ts > 0) else {
            return false;
        };
        match self {
            TimestampPolicy::RollingTtl { ttl } => {
                let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
                let age_ms = now.timestamp_millis().saturating_sub(to_millis(last));
                age_ms < ttl_ms
            }
            TimestampPolicy::FixedCutoff { .. } => match self.cutoff_seconds(now) {
                Some(cutoff) => to_seconds(last) >= cutoff,
                None => false,
            },
        }
    }

    /// Start of the UTC day `days` calendar days before `now`, in epoch seconds.
    ///
    /// `None` for the rolling policy, which has no fixed boundary.
    pub fn cutoff_seconds(&self, now: DateTime<Utc>) -> Option<i64> {
        let TimestampPolicy::FixedCutoff { days } = self else {
            return None;
        };
        now.date_naive()
            .checked_sub_days(Days::new(u64::from(*days)))
            .and_then(|day| day.and_hms_opt(0, 0, 0))
            .map(|midnight| midnight.and_utc().timestamp())
    }

    /// Timestamp to persist on a write made at `now`.
    ///
    /// Rolling-TTL stores milliseconds, fixed-cutoff stores seconds.
    pub fn stamp(&self, now: DateTime<Utc>) -> i64 {
        match self {
            TimestampPolicy::RollingTtl { .. } => now.timestamp_millis(),
            TimestampPolicy::FixedCutoff { .. } => now.timestamp(),
        }
    }
}

impl fmt::Display for TimestampPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimestampPolicy::RollingTtl { ttl } => {
                write!(f, "rolling-ttl ({})", format_seconds(ttl.as_secs()))
            }
            TimestampPolicy::FixedCutoff { days } => write!(f, "fixed-cutoff ({days}d)"),
        }
    }
}

/// Compact age of `last` relative to `now` (`"42s"`, `"3h"`, `"2d"`), or
/// `"never"` when there is no usable timestamp.
pub fn format_age(last: Option<i64>, now: DateTime<Utc>) -> String {
    match last.filter(|ts| *ts > 0) {
        Some(ts) => {
            let age_ms = now.timestamp_millis().saturating_sub(to_millis(ts)).max(0);
            format_seconds((age_ms / 1000) as u64)
        }
        None => "never".to_string(),
    }
}

fn format_seconds(seconds: u64) -> String {
    if seconds < 60 {
        return format!("{seconds}s");
    }
    if seconds < 60 * 60 {
        return format!("{}m", seconds / 60);
    }
    if seconds < 60 * 60 * 24 {
        return format!("{}h", seconds / (60 * 60));
    }
    format!("{}d", seconds / (60 * 60 * 24))
}
