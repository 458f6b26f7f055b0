use std::collections::HashSet;
use std::sync::Arc;

use bistro_common::{Error, Result};
use serde::Serialize;
use tracing::{error, info};

use super::{Migration, MigrationLedger, MigrationRecord};
use crate::store::RecordStore;

/// Ids applied by a successful [`MigrationRunner::run_all`], in order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunReport {
    pub applied: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MigrationStatus {
    pub executed: Vec<MigrationRecord>,
    pub pending: Vec<String>,
}

/// Applies pending migrations in order and rolls back single units.
///
/// Runs are strictly sequential and stop at the first failure. Nothing guards
/// against two processes running migrations against the same store at once.
pub struct MigrationRunner {
    store: Arc<dyn RecordStore>,
    ledger: MigrationLedger,
}

impl MigrationRunner {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        let ledger = MigrationLedger::new(Arc::clone(&store));
        Self { store, ledger }
    }

    pub fn ledger(&self) -> &MigrationLedger {
        &self.ledger
    }

    /// Apply every unit whose id is not in the ledger, in the given order.
    ///
    /// A failing `up` aborts the run: later units are not attempted and the
    /// failing unit's partial effects stay in place.
    pub async fn run_all(&self, units: &[Box<dyn Migration>]) -> Result<RunReport> {
        info!("running database migrations");

        let executed: HashSet<String> = self.ledger.list_executed().await?.into_iter().collect();
        let pending: Vec<&dyn Migration> = units
            .iter()
            .map(|unit| unit.as_ref())
            .filter(|unit| !executed.contains(unit.id()))
            .collect();

        if pending.is_empty() {
            info!("no pending migrations to run");
            return Ok(RunReport::default());
        }

        info!("found {} pending migrations", pending.len());

        let mut report = RunReport::default();
        for unit in pending {
            info!("running migration {}: {}", unit.id(), unit.name());

            if let Err(e) = unit.up(self.store.as_ref()).await {
                error!("migration failed: {} ({}): {e}", unit.id(), unit.name());
                return Err(Error::migration(unit.id(), e));
            }
            if let Err(e) = self.ledger.record_executed(unit).await {
                error!("failed to record migration {}: {e}", unit.id());
                return Err(Error::migration(unit.id(), e));
            }

            info!("migration completed: {}", unit.name());
            report.applied.push(unit.id().to_string());
        }

        info!("all {} migrations completed successfully", report.applied.len());
        Ok(report)
    }

    /// Revert one unit and drop its ledger record.
    ///
    /// If `down` fails the record is kept, so the unit still counts as
    /// executed even though its reverse action may have partly run. No
    /// reconciliation is attempted.
    pub async fn rollback(&self, unit: &dyn Migration) -> Result<()> {
        info!("rolling back migration {}: {}", unit.id(), unit.name());

        if let Err(e) = unit.down(self.store.as_ref()).await {
            error!("rollback failed: {} ({}): {e}", unit.id(), unit.name());
            return Err(Error::migration(unit.id(), e));
        }
        self.ledger.record_reverted(unit.id()).await?;

        info!("migration rolled back: {}", unit.name());
        Ok(())
    }

    /// Executed records plus the ids from `units` that have not run yet,
    /// in `units` order.
    pub async fn status(&self, units: &[Box<dyn Migration>]) -> Result<MigrationStatus> {
        let executed = self.ledger.records().await?;
        let done: HashSet<&str> = executed.iter().map(|r| r.migration_id.as_str()).collect();
        let pending = units
            .iter()
            .map(|unit| unit.id())
            .filter(|id| !done.contains(id))
            .map(str::to_string)
            .collect();

        Ok(MigrationStatus { executed, pending })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::sqlite_store::SqliteStore;
    use crate::store::{
        Document, Filter, FindOptions, IndexSpec, UpdateResult, to_document,
    };

    /// Test migration whose `up` writes a marker document to `effects`.
    pub(crate) struct Scripted {
        id: String,
        name: String,
        fail_up: bool,
        fail_down: bool,
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl Scripted {
        pub(crate) fn ok(id: &str) -> Self {
            Self {
                id: id.to_string(),
                name: format!("migration {id}"),
                fail_up: false,
                fail_down: false,
                calls: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn failing_up(mut self) -> Self {
            self.fail_up = true;
            self
        }

        fn failing_down(mut self) -> Self {
            self.fail_down = true;
            self
        }

        fn sharing(mut self, calls: &Arc<Mutex<Vec<String>>>) -> Self {
            self.calls = Arc::clone(calls);
            self
        }
    }

    #[async_trait]
    impl Migration for Scripted {
        fn id(&self) -> &str {
            &self.id
        }

        fn name(&self) -> &str {
            &self.name
        }

        async fn up(&self, store: &dyn RecordStore) -> Result<()> {
            self.calls.lock().unwrap().push(format!("up {}", self.id));
            if self.fail_up {
                return Err(Error::Database(format!("boom in {}", self.id)));
            }
            store
                .insert_one("effects", to_document(&json!({"by": self.id}))?)
                .await?;
            Ok(())
        }

        async fn down(&self, store: &dyn RecordStore) -> Result<()> {
            self.calls.lock().unwrap().push(format!("down {}", self.id));
            if self.fail_down {
                return Err(Error::Database(format!("cannot revert {}", self.id)));
            }
            store
                .delete_many("effects", &Filter::eq("by", self.id.as_str()))
                .await?;
            Ok(())
        }
    }

    /// Store wrapper that counts mutating calls.
    struct CountingStore {
        inner: SqliteStore,
        writes: AtomicUsize,
    }

    impl CountingStore {
        fn new() -> Self {
            Self {
                inner: SqliteStore::in_memory().unwrap(),
                writes: AtomicUsize::new(0),
            }
        }

        fn writes(&self) -> usize {
            self.writes.load(Ordering::SeqCst)
        }

        fn bump(&self) {
            self.writes.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl RecordStore for CountingStore {
        async fn ping(&self) -> Result<()> {
            self.inner.ping().await
        }

        async fn close(&self) -> Result<()> {
            self.inner.close().await
        }

        async fn find(
            &self,
            collection: &str,
            filter: &Filter,
            options: &FindOptions,
        ) -> Result<Vec<Document>> {
            self.inner.find(collection, filter, options).await
        }

        async fn find_one(&self, collection: &str, filter: &Filter) -> Result<Option<Document>> {
            self.inner.find_one(collection, filter).await
        }

        async fn insert_one(&self, collection: &str, doc: Document) -> Result<String> {
            self.bump();
            self.inner.insert_one(collection, doc).await
        }

        async fn insert_many(&self, collection: &str, docs: Vec<Document>) -> Result<Vec<String>> {
            self.bump();
            self.inner.insert_many(collection, docs).await
        }

        async fn update_one(
            &self,
            collection: &str,
            filter: &Filter,
            set: Document,
        ) -> Result<UpdateResult> {
            self.bump();
            self.inner.update_one(collection, filter, set).await
        }

        async fn find_one_and_update(
            &self,
            collection: &str,
            filter: &Filter,
            set: Document,
        ) -> Result<Option<Document>> {
            self.bump();
            self.inner.find_one_and_update(collection, filter, set).await
        }

        async fn delete_one(&self, collection: &str, filter: &Filter) -> Result<u64> {
            self.bump();
            self.inner.delete_one(collection, filter).await
        }

        async fn delete_many(&self, collection: &str, filter: &Filter) -> Result<u64> {
            self.bump();
            self.inner.delete_many(collection, filter).await
        }

        async fn create_index(&self, collection: &str, index: &IndexSpec) -> Result<()> {
            self.bump();
            self.inner.create_index(collection, index).await
        }

        async fn drop_collection(&self, collection: &str) -> Result<()> {
            self.bump();
            self.inner.drop_collection(collection).await
        }
    }

    fn units(list: Vec<Scripted>) -> Vec<Box<dyn Migration>> {
        list.into_iter()
            .map(|m| Box::new(m) as Box<dyn Migration>)
            .collect()
    }

    fn runner() -> MigrationRunner {
        MigrationRunner::new(Arc::new(SqliteStore::in_memory().unwrap()))
    }

    async fn effects(store: &dyn RecordStore) -> Vec<String> {
        store
            .find("effects", &Filter::All, &FindOptions::default())
            .await
            .unwrap()
            .into_iter()
            .map(|d| d["by"].as_str().unwrap().to_string())
            .collect()
    }

    #[tokio::test]
    async fn runs_pending_units_in_registry_order() {
        let runner = runner();
        let calls = Arc::new(Mutex::new(Vec::new()));
        let registry = units(vec![
            Scripted::ok("001").sharing(&calls),
            Scripted::ok("002").sharing(&calls),
        ]);

        let report = runner.run_all(&registry).await.unwrap();

        assert_eq!(report.applied, ["001", "002"]);
        assert_eq!(*calls.lock().unwrap(), ["up 001", "up 002"]);
        assert_eq!(runner.ledger().list_executed().await.unwrap(), ["001", "002"]);
    }

    #[tokio::test]
    async fn already_executed_units_are_skipped() {
        let runner = runner();
        runner.run_all(&units(vec![Scripted::ok("001")])).await.unwrap();
        let before = runner.ledger().records().await.unwrap();

        let calls = Arc::new(Mutex::new(Vec::new()));
        let report = runner
            .run_all(&units(vec![Scripted::ok("001").sharing(&calls)]))
            .await
            .unwrap();

        assert!(report.applied.is_empty());
        assert!(calls.lock().unwrap().is_empty());
        assert_eq!(runner.ledger().records().await.unwrap(), before);
    }

    #[tokio::test]
    async fn second_run_performs_no_writes() {
        let store = Arc::new(CountingStore::new());
        let runner = MigrationRunner::new(store.clone());
        let registry = units(vec![Scripted::ok("001"), Scripted::ok("002")]);

        runner.run_all(&registry).await.unwrap();
        let after_first = store.writes();
        assert_eq!(after_first, 4);

        runner.run_all(&registry).await.unwrap();
        assert_eq!(store.writes(), after_first);
    }

    #[tokio::test]
    async fn pending_order_follows_registry_not_ledger() {
        let runner = runner();
        // 002 executed out of band first
        runner.run_all(&units(vec![Scripted::ok("002")])).await.unwrap();

        let calls = Arc::new(Mutex::new(Vec::new()));
        let registry = units(vec![
            Scripted::ok("001").sharing(&calls),
            Scripted::ok("002").sharing(&calls),
            Scripted::ok("003").sharing(&calls),
        ]);
        runner.run_all(&registry).await.unwrap();

        assert_eq!(*calls.lock().unwrap(), ["up 001", "up 003"]);
    }

    #[tokio::test]
    async fn failure_halts_remaining_units() {
        let runner = runner();
        let calls = Arc::new(Mutex::new(Vec::new()));
        let registry = units(vec![
            Scripted::ok("001").sharing(&calls),
            Scripted::ok("002").sharing(&calls),
            Scripted::ok("003").failing_up().sharing(&calls),
            Scripted::ok("004").sharing(&calls),
        ]);

        let err = runner.run_all(&registry).await.unwrap_err();

        assert!(matches!(err, Error::Migration { ref id, .. } if id == "003"));
        assert_eq!(
            *calls.lock().unwrap(),
            ["up 001", "up 002", "up 003"]
        );
        assert_eq!(runner.ledger().list_executed().await.unwrap(), ["001", "002"]);
    }

    #[tokio::test]
    async fn failed_unit_is_retried_on_next_run() {
        let runner = runner();
        let _ = runner
            .run_all(&units(vec![Scripted::ok("001").failing_up()]))
            .await;

        let report = runner.run_all(&units(vec![Scripted::ok("001")])).await.unwrap();
        assert_eq!(report.applied, ["001"]);
    }

    #[tokio::test]
    async fn rollback_makes_unit_pending_again() {
        let store: Arc<dyn RecordStore> = Arc::new(SqliteStore::in_memory().unwrap());
        let runner = MigrationRunner::new(Arc::clone(&store));
        let registry = units(vec![Scripted::ok("001"), Scripted::ok("002")]);
        runner.run_all(&registry).await.unwrap();

        runner.rollback(registry[1].as_ref()).await.unwrap();

        assert_eq!(runner.ledger().list_executed().await.unwrap(), ["001"]);
        assert_eq!(effects(store.as_ref()).await, ["001"]);

        let report = runner.run_all(&registry).await.unwrap();
        assert_eq!(report.applied, ["002"]);
        assert_eq!(effects(store.as_ref()).await, ["001", "002"]);
    }

    #[tokio::test]
    async fn failed_rollback_keeps_ledger_record() {
        let runner = runner();
        let registry = units(vec![Scripted::ok("001").failing_down()]);
        runner.run_all(&registry).await.unwrap();

        let err = runner.rollback(registry[0].as_ref()).await.unwrap_err();

        assert!(err.to_string().contains("cannot revert 001"));
        assert_eq!(runner.ledger().list_executed().await.unwrap(), ["001"]);
    }

    #[tokio::test]
    async fn status_lists_pending_in_registry_order() {
        let runner = runner();
        runner
            .run_all(&units(vec![Scripted::ok("002")]))
            .await
            .unwrap();

        let registry = units(vec![
            Scripted::ok("001"),
            Scripted::ok("002"),
            Scripted::ok("003"),
        ]);
        let status = runner.status(&registry).await.unwrap();

        assert_eq!(status.executed.len(), 1);
        assert_eq!(status.executed[0].migration_id, "002");
        assert_eq!(status.pending, ["001", "003"]);
    }

    #[tokio::test]
    async fn status_on_fresh_store_has_everything_pending() {
        let runner = runner();
        let registry = units(vec![Scripted::ok("001"), Scripted::ok("002")]);
        let status = runner.status(&registry).await.unwrap();
        assert!(status.executed.is_empty());
        assert_eq!(status.pending, ["001", "002"]);
    }
}
