use std::sync::Arc;

use bistro_common::Result;
use chrono::Utc;
use tracing::debug;

use super::{Migration, MigrationRecord};
use crate::store::{Collection, Filter, FindOptions, RecordStore, SortOrder};

/// Collection holding one [`MigrationRecord`] per executed migration.
pub const MIGRATIONS_COLLECTION: &str = "migrations";

/// Durable record of which migration ids have run.
///
/// Every method performs exactly one store operation. The ledger does not
/// enforce uniqueness of `migrationId`; the runner only records ids it has
/// just found pending.
pub struct MigrationLedger {
    store: Arc<dyn RecordStore>,
}

impl MigrationLedger {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    fn collection(&self) -> Collection<'_> {
        Collection::new(self.store.as_ref(), MIGRATIONS_COLLECTION)
    }

    /// All records, oldest execution first.
    pub async fn records(&self) -> Result<Vec<MigrationRecord>> {
        self.collection()
            .find(
                &Filter::All,
                &FindOptions::sort_by("executedAt", SortOrder::Asc),
            )
            .await
    }

    /// Executed migration ids, oldest execution first.
    pub async fn list_executed(&self) -> Result<Vec<String>> {
        Ok(self
            .records()
            .await?
            .into_iter()
            .map(|r| r.migration_id)
            .collect())
    }

    pub async fn record_executed(&self, migration: &dyn Migration) -> Result<()> {
        let record = MigrationRecord {
            migration_id: migration.id().to_string(),
            name: migration.name().to_string(),
            executed_at: Utc::now(),
        };
        self.collection().insert_one(&record).await?;
        debug!("recorded migration {} as executed", record.migration_id);
        Ok(())
    }

    /// Forget an executed migration. Succeeds when no record matches.
    pub async fn record_reverted(&self, migration_id: &str) -> Result<()> {
        let deleted = self
            .collection()
            .delete_one(&Filter::eq("migrationId", migration_id))
            .await?;
        debug!("removed {deleted} ledger record(s) for migration {migration_id}");
        Ok(())
    }
}
