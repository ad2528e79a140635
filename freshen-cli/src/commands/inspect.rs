//! `freshen inspect` — a client's stored records and pending decisions.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use freshen_core::{Category, ClientId, Record, RecordStore};
use freshen_sync::{
    engine::{Decision, WriteReason},
    freshness::format_age,
    GroupPlan, ReconcileConfig, ReconciliationEngine,
};

use super::options::{PolicyArgs, StoreArgs};

/// Arguments for `freshen inspect`.
#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Client identifier to inspect.
    pub client: String,

    /// Restrict to one category (defaults to every configured category).
    #[arg(long)]
    pub category: Option<String>,

    #[command(flatten)]
    pub policy: PolicyArgs,

    #[command(flatten)]
    pub store: StoreArgs,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct GroupReport {
    client: ClientId,
    category: Category,
    generation: u64,
    records: Vec<RecordRow>,
    decisions: Vec<Decision>,
}

#[derive(Debug, Serialize)]
struct RecordRow {
    fingerprint: String,
    id: u64,
    timestamp: Option<i64>,
    age: String,
    watched: bool,
    fresh: bool,
}

#[derive(Tabled)]
struct RecordTableRow {
    #[tabled(rename = "fingerprint")]
    fingerprint: String,
    #[tabled(rename = "id")]
    id: u64,
    #[tabled(rename = "age")]
    age: String,
    #[tabled(rename = "status")]
    status: String,
}

impl InspectArgs {
    pub fn run(self) -> Result<()> {
        let mut config = ReconcileConfig::new(self.policy.to_options(true))?;
        if let Some(category) = &self.category {
            config.categories = vec![Category::from(category.as_str())];
        }
        let store = self.store.open()?;
        let client = ClientId::from(self.client.as_str());
        let now = Utc::now();

        let reports = build_reports(&store, &config, &client, now)?;
        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&reports)
                    .context("failed to serialize inspect report")?
            );
            return Ok(());
        }

        print_reports(&config, reports);
        Ok(())
    }
}

fn build_reports<S: RecordStore + ?Sized>(
    store: &S,
    config: &ReconcileConfig,
    client: &ClientId,
    now: DateTime<Utc>,
) -> Result<Vec<GroupReport>> {
    let engine = ReconciliationEngine::new(config);
    let mut reports = Vec::new();
    for category in &config.categories {
        let group = engine
            .resolver()
            .resolve(store, client, category)
            .with_context(|| format!("query failed for '{client}' / '{category}'"))?;
        let GroupPlan {
            generation,
            decisions,
            ..
        } = engine.decide(client, category, &group, now);

        let mut records: Vec<RecordRow> = group
            .all_records
            .iter()
            .map(|record| record_row(&engine, record, now))
            .collect();
        records.sort_by(|a, b| a.fingerprint.cmp(&b.fingerprint));

        reports.push(GroupReport {
            client: client.clone(),
            category: category.clone(),
            generation: generation.0,
            records,
            decisions,
        });
    }
    Ok(reports)
}

fn record_row(engine: &ReconciliationEngine<'_>, record: &Record, now: DateTime<Utc>) -> RecordRow {
    RecordRow {
        fingerprint: record.fingerprint.0.clone(),
        id: record.generation.0,
        timestamp: record.timestamp,
        age: format_age(record.timestamp, now),
        watched: engine.resolver().is_watched(&record.fingerprint),
        fresh: engine.config().policy.is_fresh(record.timestamp, now),
    }
}

fn print_reports(config: &ReconcileConfig, reports: Vec<GroupReport>) {
    println!(
        "Freshen v{} | policy {} | {} watched fingerprint(s)",
        env!("CARGO_PKG_VERSION"),
        config.policy,
        config.watched.len(),
    );
    let separator = "■".repeat(60).bright_black().to_string();

    for report in reports {
        println!("{separator}");
        println!(
            "{} / {}  (next generation id: {})",
            report.client.to_string().bold(),
            report.category.to_string().bold(),
            report.generation
        );

        if report.records.is_empty() {
            println!("No stored records.");
        } else {
            let rows: Vec<RecordTableRow> = report
                .records
                .into_iter()
                .map(|row| RecordTableRow {
                    status: status_label(&row),
                    fingerprint: row.fingerprint,
                    id: row.id,
                    age: row.age,
                })
                .collect();
            let mut table = Table::new(rows);
            table.with(Style::rounded());
            println!("{table}");
        }

        for decision in &report.decisions {
            println!("  {}", describe(decision));
        }
    }
}

fn status_label(row: &RecordRow) -> String {
    if !row.watched {
        return "■ UNWATCHED".bright_black().to_string();
    }
    if row.fresh {
        "■ FRESH".green().bold().to_string()
    } else {
        "■ STALE".yellow().bold().to_string()
    }
}

fn describe(decision: &Decision) -> String {
    match decision {
        Decision::Skip { fingerprint, .. } => format!("·  skip {fingerprint} (fresh)"),
        Decision::Write {
            fingerprint,
            reason: WriteReason::Missing,
        } => format!("+  write {fingerprint} (no record yet)"),
        Decision::Write {
            fingerprint,
            reason: WriteReason::Stale { .. },
        } => format!("✎  write {fingerprint} (stale)"),
    }
}
