pub mod collections;
pub mod migrations;
pub mod sqlite_store;
pub mod store;

pub use migrations::{
    Migration, MigrationLedger, MigrationRecord, MigrationRunner, MigrationStatus, Registry,
    RunReport,
};
pub use sqlite_store::{MEMORY_URL, SqliteStore, connect};
pub use store::{
    Collection, Document, Filter, FindOptions, ID_FIELD, IndexKind, IndexSpec, RecordStore,
    SortOrder, UpdateResult, from_document, to_document,
};
