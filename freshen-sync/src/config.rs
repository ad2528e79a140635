//! Run configuration.
//!
//! [`ConfigOptions`] carries the raw values as they arrive from flags or the
//! environment; [`ReconcileConfig::new`] validates them. Any problem is a
//! [`ReconcileError::ConfigInvalid`], which is fatal at startup.

use std::str::FromStr;

use freshen_core::{payload, Category, Fingerprint, Payload};

use crate::error::{config_err, ReconcileError};
use crate::freshness::TimestampPolicy;

/// Category used when none is configured.
pub const DEFAULT_CATEGORY: &str = "love";

/// Default day count for both policies.
pub const DEFAULT_DAYS: u32 = 2;

/// Which watched fingerprints a round may write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FingerprintMode {
    /// Every watched fingerprint is checked and written independently.
    #[default]
    All,
    /// The group is judged by its most recent matched record of any watched
    /// fingerprint; a stale group gets one write for the first fingerprint.
    FirstOnly,
}

/// Policy selector before its parameter is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyKind {
    RollingTtl,
    FixedCutoff,
}

impl FromStr for PolicyKind {
    type Err = ReconcileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "rolling-ttl" | "ttl" => Ok(PolicyKind::RollingTtl),
            "fixed-cutoff" | "cutoff" => Ok(PolicyKind::FixedCutoff),
            other => Err(config_err(format!(
                "unknown freshness policy '{other}'; expected: rolling-ttl, fixed-cutoff"
            ))),
        }
    }
}

/// Unvalidated configuration values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigOptions {
    /// Comma-separated watched fingerprints.
    pub watched: String,
    /// Comma-separated categories; `None` falls back to [`DEFAULT_CATEGORY`].
    pub categories: Option<String>,
    pub policy: String,
    pub ttl_days: u32,
    pub cutoff_days: u32,
    pub dry_run: bool,
    pub write_all_fingerprints: bool,
}

impl Default for ConfigOptions {
    fn default() -> Self {
        Self {
            watched: String::new(),
            categories: None,
            policy: "rolling-ttl".to_string(),
            ttl_days: DEFAULT_DAYS,
            cutoff_days: DEFAULT_DAYS,
            dry_run: false,
            write_all_fingerprints: true,
        }
    }
}

/// Validated run configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileConfig {
    /// Watched fingerprints in configured order (first one matters in
    /// [`FingerprintMode::FirstOnly`]).
    pub watched: Vec<Fingerprint>,
    pub categories: Vec<Category>,
    pub policy: TimestampPolicy,
    pub mode: FingerprintMode,
    pub dry_run: bool,
    pub payload: Payload,
}

impl ReconcileConfig {
    pub fn new(options: ConfigOptions) -> Result<Self, ReconcileError> {
        let watched: Vec<Fingerprint> = parse_list(&options.watched)
            .into_iter()
            .map(Fingerprint::from)
            .collect();
        if watched.is_empty() {
            return Err(config_err("watched fingerprint list is empty"));
        }

        let categories: Vec<Category> = match options.categories.as_deref() {
            Some(raw) => parse_list(raw).into_iter().map(Category::from).collect(),
            None => vec![Category::from(DEFAULT_CATEGORY)],
        };
        if categories.is_empty() {
            return Err(config_err("category list is empty"));
        }

        let policy = match options.policy.parse::<PolicyKind>()? {
            PolicyKind::RollingTtl => {
                require_days("ttl days", options.ttl_days)?;
                TimestampPolicy::rolling_ttl_days(options.ttl_days)
            }
            PolicyKind::FixedCutoff => {
                require_days("cutoff days", options.cutoff_days)?;
                TimestampPolicy::fixed_cutoff_days(options.cutoff_days)
            }
        };

        let mode = if options.write_all_fingerprints {
            FingerprintMode::All
        } else {
            FingerprintMode::FirstOnly
        };

        Ok(Self {
            watched,
            categories,
            policy,
            mode,
            dry_run: options.dry_run,
            payload: Payload::new(),
        })
    }

    /// Attach the payload copied onto every write intent.
    pub fn with_payload(mut self, payload: Payload) -> Result<Self, ReconcileError> {
        payload::validate(&payload).map_err(|e| config_err(e.to_string()))?;
        self.payload = payload;
        Ok(self)
    }
}

/// Split a comma-separated list, trimming entries and dropping blanks and repeats.
pub fn parse_list(raw: &str) -> Vec<String> {
    let mut items: Vec<String> = Vec::new();
    for item in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if !items.iter().any(|existing| existing == item) {
            items.push(item.to_string());
        }
    }
    items
}

fn require_days(label: &str, days: u32) -> Result<(), ReconcileError> {
    if days == 0 {
        return Err(config_err(format!("{label} must be at least 1")));
    }
    Ok(())
}
