//! `freshen run` — reconcile the roster against the record store.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Args;
use colored::Colorize;

use freshen_core::{payload, roster, RosterSource};
use freshen_sync::{
    pipeline::{self, RunSummary, WriteStatus},
    ReconcileConfig,
};

use super::options::{PolicyArgs, StoreArgs};

/// Arguments for `freshen run`.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Roster location: a local JSON file or an http(s) object URL.
    #[arg(long, env = "ROSTER")]
    pub roster: String,

    #[command(flatten)]
    pub policy: PolicyArgs,

    #[command(flatten)]
    pub store: StoreArgs,

    /// YAML mapping of payload fields copied onto every written record.
    #[arg(long, env = "PAYLOAD_FILE")]
    pub payload: Option<PathBuf>,

    /// Produce and log write intents without writing anything.
    #[arg(long, env = "DRY_RUN")]
    pub dry_run: bool,

    /// Emit the run summary as JSON.
    #[arg(long)]
    pub json: bool,
}

impl RunArgs {
    pub fn run(self) -> Result<()> {
        let mut config = ReconcileConfig::new(self.policy.to_options(self.dry_run))?;
        if let Some(path) = &self.payload {
            let fields = payload::load_at(path)?;
            config = config.with_payload(fields)?;
        }

        let source = roster::source_for(&self.roster);
        let mut store = self.store.open()?;
        tracing::info!(
            roster = %source.location(),
            store = %store.path().display(),
            policy = %config.policy,
            dry_run = config.dry_run,
            "starting reconciliation run"
        );
        let summary = pipeline::run(source.as_ref(), &mut store, &config, Utc::now())
            .with_context(|| format!("reconciliation aborted for roster '{}'", self.roster))?;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&summary)
                    .context("failed to serialize run summary")?
            );
        } else {
            print_summary(&summary);
        }
        Ok(())
    }
}

fn print_summary(summary: &RunSummary) {
    let prefix = if summary.dry_run { "[dry-run] " } else { "" };

    if summary.groups == 0 {
        println!("{prefix}No clients in roster, nothing to do");
        return;
    }

    println!(
        "{prefix}✓ {} client(s), {} group(s) under {}: {} fresh, {} written, {} group(s) failed, {} write(s) failed",
        summary.clients,
        summary.groups,
        summary.policy,
        summary.groups_fresh,
        summary.groups_written,
        summary.group_failures,
        summary.write_failures,
    );

    for write in &summary.writes {
        let marker = match write.status {
            WriteStatus::Written => "✎ ",
            WriteStatus::WouldWrite => "~ ",
        };
        println!(
            "  {marker} {}/{} {} id={} ts={}",
            write.client, write.category, write.fingerprint, write.generation, write.timestamp
        );
    }

    if summary.has_failures() {
        println!(
            "{}",
            format!(
                "{} failure(s): {} group quer(ies), {} write(s)",
                summary.failures.len(),
                summary.group_failures,
                summary.write_failures
            )
            .red()
            .bold()
        );
        for failure in &summary.failures {
            println!("  ✗  {}", failure.message);
        }
    }
}
