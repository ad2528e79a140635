//! Options shared by `run` and `inspect`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Args};

use freshen_core::{store, JsonFileStore};
use freshen_sync::{config::DEFAULT_DAYS, ConfigOptions};

/// Freshness policy and watched-set options.
#[derive(Args, Debug, Clone)]
pub struct PolicyArgs {
    /// Comma-separated content fingerprints to track.
    #[arg(long, env = "WATCHED_FINGERPRINTS")]
    pub watched: String,

    /// Comma-separated categories to reconcile [default: love].
    #[arg(long, env = "CATEGORIES")]
    pub categories: Option<String>,

    /// Freshness policy: rolling-ttl or fixed-cutoff.
    #[arg(long, env = "FRESHNESS_POLICY", default_value = "rolling-ttl")]
    pub policy: String,

    /// Rolling-TTL window in days.
    #[arg(long, env = "TTL_DAYS", default_value_t = DEFAULT_DAYS)]
    pub ttl_days: u32,

    /// Fixed-cutoff: records stamped before 00:00 UTC this many days ago are stale.
    #[arg(long, env = "CUTOFF_DAYS", default_value_t = DEFAULT_DAYS)]
    pub cutoff_days: u32,

    /// Check and write every watched fingerprint (`false`: only the first).
    #[arg(
        long,
        env = "WRITE_ALL_FINGERPRINTS",
        default_value_t = true,
        action = ArgAction::Set
    )]
    pub write_all_fingerprints: bool,
}

impl PolicyArgs {
    pub fn to_options(&self, dry_run: bool) -> ConfigOptions {
        ConfigOptions {
            watched: self.watched.clone(),
            categories: self.categories.clone(),
            policy: self.policy.clone(),
            ttl_days: self.ttl_days,
            cutoff_days: self.cutoff_days,
            dry_run,
            write_all_fingerprints: self.write_all_fingerprints,
        }
    }
}

/// Record store location.
#[derive(Args, Debug, Clone)]
pub struct StoreArgs {
    /// JSON record store file [default: ~/.freshen/store.json].
    #[arg(long, env = "STORE_PATH")]
    pub store: Option<PathBuf>,
}

impl StoreArgs {
    pub fn open(&self) -> Result<JsonFileStore> {
        let path = match &self.store {
            Some(path) => path.clone(),
            None => store::default_store_path().context("could not determine store path")?,
        };
        JsonFileStore::open_at(&path)
            .with_context(|| format!("failed to open record store at {}", path.display()))
    }
}
