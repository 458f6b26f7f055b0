use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use bistro_config::{AppConfig, mask_url};
use bistro_db::{MigrationRunner, MigrationStatus, RecordStore, Registry, connect};
use clap::Subcommand;
use tracing::{error, info, warn};

#[derive(Subcommand, Debug, PartialEq)]
pub enum MigrateAction {
    /// Apply every pending migration in order
    Run,
    /// Show executed and pending migrations
    Status,
    /// Revert one executed migration
    Rollback {
        /// Migration id, e.g. 005
        id: String,
    },
}

pub async fn run(action: MigrateAction, config: &AppConfig) -> Result<()> {
    let url = &config.database.url;
    let store = connect(url)
        .await
        .with_context(|| format!("failed to connect to record store at {}", mask_url(url)))?;
    info!("connected to record store: {}", mask_url(url));

    let outcome = execute(action, Arc::clone(&store)).await;

    if let Err(e) = store.close().await {
        warn!("failed to close record store: {e}");
    }
    outcome
}

/// Run `action` against an open store. Once connected, `status` always
/// succeeds: a ledger read failure is reported but does not fail the command.
async fn execute(action: MigrateAction, store: Arc<dyn RecordStore>) -> Result<()> {
    let registry = Registry::builtin().context("invalid migration registry")?;
    let runner = MigrationRunner::new(store);

    match action {
        MigrateAction::Run => runner
            .run_all(registry.units())
            .await
            .map(|report| {
                if report.applied.is_empty() {
                    println!("Nothing to migrate.");
                } else {
                    println!("Applied: {}", report.applied.join(", "));
                }
            })
            .context("migration run failed"),
        MigrateAction::Status => {
            match runner.status(registry.units()).await {
                Ok(status) => print_status(&status),
                Err(e) => error!("failed to read migration status: {e}"),
            }
            Ok(())
        }
        MigrateAction::Rollback { id } => match registry.get(&id) {
            Some(unit) => runner
                .rollback(unit)
                .await
                .map(|()| println!("Rolled back {id}."))
                .with_context(|| format!("rollback of {id} failed")),
            None => Err(anyhow!("unknown migration id: {id}")),
        },
    }
}

fn print_status(status: &MigrationStatus) {
    println!("Executed migrations:");
    if status.executed.is_empty() {
        println!("  none");
    }
    for record in &status.executed {
        println!(
            "  {}  {}  ({})",
            record.migration_id,
            record.name,
            record.executed_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
    }
    println!("Pending migrations:");
    if status.pending.is_empty() {
        println!("  none");
    }
    for id in &status.pending {
        println!("  {id}");
    }
}
