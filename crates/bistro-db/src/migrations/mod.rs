//! Migration system for tracking and applying record-store changes.
//!
//! Each migration has an id and a name and can be applied (`up`) and
//! reverted (`down`). Migrations are applied in registry order and tracked in
//! the `migrations` collection.

use async_trait::async_trait;
use bistro_common::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::RecordStore;

pub mod builtin;
pub mod ledger;
pub mod registry;
pub mod runner;

pub use ledger::MigrationLedger;
pub use registry::Registry;
pub use runner::{MigrationRunner, MigrationStatus, RunReport};

/// A single ordered change to the store's schema or seed data.
#[async_trait]
pub trait Migration: Send + Sync {
    /// Unique, monotonically increasing identifier ("001", "002", ...).
    fn id(&self) -> &str;

    fn name(&self) -> &str;

    async fn up(&self, store: &dyn RecordStore) -> Result<()>;

    async fn down(&self, store: &dyn RecordStore) -> Result<()>;
}

/// A ledger entry for an executed migration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationRecord {
    pub migration_id: String,
    pub name: String,
    #[serde(with = "bistro_common::timestamp")]
    pub executed_at: DateTime<Utc>,
}
