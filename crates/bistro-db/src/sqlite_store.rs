use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use bistro_common::{Error, Result, new_record_id};
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use serde_json::Value;
use tracing::{debug, info};

use crate::store::{
    Document, Filter, FindOptions, ID_FIELD, IndexKind, IndexSpec, RecordStore, SortOrder,
    UpdateResult,
};

/// Connection string selecting a throwaway in-memory store.
pub const MEMORY_URL: &str = "sqlite::memory:";

/// Document store on top of SQLite.
///
/// Each collection is a table `(seq, id, doc)` holding the document as JSON
/// text; filters and indexes are expressed with `json_extract`. Collections
/// are created on first write, like in a document database.
pub struct SqliteStore {
    conn: Mutex<Option<Connection>>,
}

impl SqliteStore {
    pub fn open(db_path: &Path) -> Result<Self> {
        info!("opening record store at {}", db_path.display());
        let conn = Connection::open(db_path)
            .map_err(|e| Error::Connection(format!("failed to open database: {e}")))?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .map_err(|e| Error::Connection(format!("failed to set pragmas: {e}")))?;

        Ok(Self::from_connection(conn))
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::Connection(format!("failed to open in-memory database: {e}")))?;

        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(Some(conn)),
        }
    }

    fn connection(&self) -> Result<MutexGuard<'_, Option<Connection>>> {
        self.conn
            .lock()
            .map_err(|_| Error::Database("record store lock poisoned".into()))
    }

    /// Run `f` against the open connection, holding the lock for its whole
    /// duration.
    fn with_conn<R>(&self, f: impl FnOnce(&mut Connection) -> Result<R>) -> Result<R> {
        let mut guard = self.connection()?;
        let conn = guard
            .as_mut()
            .ok_or_else(|| Error::Connection("record store is closed".into()))?;
        f(conn)
    }
}

/// Open the record store named by `url` and verify it answers a ping.
///
/// Accepted forms: `sqlite::memory:`, `sqlite://<path>` and `sqlite:<path>`.
pub async fn connect(url: &str) -> Result<Arc<dyn RecordStore>> {
    let store = match parse_url(url)? {
        None => SqliteStore::in_memory()?,
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(|e| {
                    Error::Connection(format!(
                        "failed to create data directory {}: {e}",
                        parent.display()
                    ))
                })?;
            }
            SqliteStore::open(&path)?
        }
    };

    store
        .ping()
        .await
        .map_err(|e| Error::Connection(format!("ping failed: {e}")))?;

    Ok(Arc::new(store))
}

/// `None` means in-memory.
fn parse_url(url: &str) -> Result<Option<PathBuf>> {
    if url == MEMORY_URL {
        return Ok(None);
    }
    let path = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))
        .ok_or_else(|| Error::Connection(format!("unsupported record store url: {url}")))?;
    if path.is_empty() {
        return Err(Error::Connection("record store url has no path".into()));
    }
    Ok(Some(PathBuf::from(path)))
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn ping(&self) -> Result<()> {
        self.with_conn(|conn| {
            conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
                .map_err(|e| Error::Connection(format!("ping failed: {e}")))?;
            Ok(())
        })
    }

    async fn close(&self) -> Result<()> {
        let conn = self.connection()?.take();
        match conn {
            Some(conn) => {
                conn.close()
                    .map_err(|(_, e)| Error::Database(format!("failed to close store: {e}")))?;
                info!("record store closed");
                Ok(())
            }
            None => Ok(()),
        }
    }

    async fn find(
        &self,
        collection: &str,
        filter: &Filter,
        options: &FindOptions,
    ) -> Result<Vec<Document>> {
        let table = quote_ident(collection)?;
        self.with_conn(|conn| {
            if !table_exists(conn, collection)? {
                return Ok(Vec::new());
            }
            let mut query = SqlBuilder::default();
            query.push_filter(filter)?;
            let mut sql = format!("SELECT id, doc FROM {table} WHERE {}", query.sql);

            sql.push_str(" ORDER BY ");
            for (field, order) in &options.sort {
                let expr = field_expr(field)?;
                let dir = match order {
                    SortOrder::Asc => "ASC",
                    SortOrder::Desc => "DESC",
                };
                sql.push_str(&format!("{expr} {dir}, "));
            }
            sql.push_str("seq ASC");

            if let Some(limit) = options.limit {
                sql.push_str(" LIMIT ?");
                query.params.push(SqlValue::Integer(limit as i64));
            }

            select_documents(conn, &sql, &query.params, collection)
        })
    }

    async fn find_one(&self, collection: &str, filter: &Filter) -> Result<Option<Document>> {
        let docs = self
            .find(collection, filter, &FindOptions::default().limit(1))
            .await?;
        Ok(docs.into_iter().next())
    }

    async fn insert_one(&self, collection: &str, doc: Document) -> Result<String> {
        let table = quote_ident(collection)?;
        self.with_conn(|conn| {
            ensure_collection(conn, &table)?;
            insert_document(conn, &table, collection, doc)
        })
    }

    async fn insert_many(&self, collection: &str, docs: Vec<Document>) -> Result<Vec<String>> {
        let table = quote_ident(collection)?;
        self.with_conn(|conn| {
            ensure_collection(conn, &table)?;
            let tx = conn
                .transaction()
                .map_err(|e| Error::Database(format!("failed to begin transaction: {e}")))?;
            let mut ids = Vec::with_capacity(docs.len());
            for doc in docs {
                ids.push(insert_document(&tx, &table, collection, doc)?);
            }
            tx.commit()
                .map_err(|e| Error::Database(format!("failed to commit insert into {collection}: {e}")))?;
            Ok(ids)
        })
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        set: Document,
    ) -> Result<UpdateResult> {
        let table = quote_ident(collection)?;
        self.with_conn(|conn| {
            let Some(id) = first_match(conn, &table, collection, filter)? else {
                return Ok(UpdateResult::default());
            };
            let modified = apply_set(conn, &table, collection, &id, set)?;
            Ok(UpdateResult {
                matched: 1,
                modified,
            })
        })
    }

    async fn find_one_and_update(
        &self,
        collection: &str,
        filter: &Filter,
        set: Document,
    ) -> Result<Option<Document>> {
        let table = quote_ident(collection)?;
        self.with_conn(|conn| {
            let Some(id) = first_match(conn, &table, collection, filter)? else {
                return Ok(None);
            };
            apply_set(conn, &table, collection, &id, set)?;
            let sql = format!("SELECT id, doc FROM {table} WHERE id = ?");
            let docs = select_documents(conn, &sql, &[SqlValue::Text(id)], collection)?;
            Ok(docs.into_iter().next())
        })
    }

    async fn delete_one(&self, collection: &str, filter: &Filter) -> Result<u64> {
        let table = quote_ident(collection)?;
        self.with_conn(|conn| {
            if !table_exists(conn, collection)? {
                return Ok(0);
            }
            let mut query = SqlBuilder::default();
            query.push_filter(filter)?;
            let sql = format!(
                "DELETE FROM {table} WHERE seq = \
                 (SELECT seq FROM {table} WHERE {} ORDER BY seq LIMIT 1)",
                query.sql
            );
            let deleted = conn
                .execute(&sql, params_from_iter(query.params.iter()))
                .map_err(|e| Error::Database(format!("failed to delete from {collection}: {e}")))?;
            Ok(deleted as u64)
        })
    }

    async fn delete_many(&self, collection: &str, filter: &Filter) -> Result<u64> {
        let table = quote_ident(collection)?;
        self.with_conn(|conn| {
            if !table_exists(conn, collection)? {
                return Ok(0);
            }
            let mut query = SqlBuilder::default();
            query.push_filter(filter)?;
            let sql = format!("DELETE FROM {table} WHERE {}", query.sql);
            let deleted = conn
                .execute(&sql, params_from_iter(query.params.iter()))
                .map_err(|e| Error::Database(format!("failed to delete from {collection}: {e}")))?;
            Ok(deleted as u64)
        })
    }

    async fn create_index(&self, collection: &str, index: &IndexSpec) -> Result<()> {
        let table = quote_ident(collection)?;
        let name = quote_ident(&index.name)?;
        if index.keys.is_empty() {
            return Err(Error::Database(format!("index {} has no keys", index.name)));
        }

        let mut columns = Vec::with_capacity(index.keys.len());
        for (field, kind) in &index.keys {
            let expr = field_expr(field)?;
            let dir = match kind {
                IndexKind::Asc | IndexKind::Text => "ASC",
                IndexKind::Desc => "DESC",
            };
            columns.push(format!("{expr} {dir}"));
        }
        let unique = if index.unique { "UNIQUE " } else { "" };
        let sql = format!(
            "CREATE {unique}INDEX IF NOT EXISTS {name} ON {table} ({})",
            columns.join(", ")
        );

        self.with_conn(|conn| {
            ensure_collection(conn, &table)?;
            conn.execute_batch(&sql).map_err(|e| {
                Error::Database(format!("failed to create index {}: {e}", index.name))
            })?;
            debug!("index {} ready on {collection}", index.name);
            Ok(())
        })
    }

    async fn drop_collection(&self, collection: &str) -> Result<()> {
        let table = quote_ident(collection)?;
        self.with_conn(|conn| {
            conn.execute_batch(&format!("DROP TABLE IF EXISTS {table}"))
                .map_err(|e| Error::Database(format!("failed to drop {collection}: {e}")))?;
            Ok(())
        })
    }
}

/// Accumulates a WHERE clause and its positional parameters.
#[derive(Default)]
struct SqlBuilder {
    sql: String,
    params: Vec<SqlValue>,
}

impl SqlBuilder {
    fn push_filter(&mut self, filter: &Filter) -> Result<()> {
        match filter {
            Filter::All => self.sql.push('1'),
            Filter::Eq(field, Value::Null) => {
                let expr = field_expr(field)?;
                self.sql.push_str(&format!("{expr} IS NULL"));
            }
            Filter::Eq(field, value) => self.push_comparison(field, "=", value)?,
            Filter::Gte(field, value) => self.push_comparison(field, ">=", value)?,
            Filter::Lte(field, value) => self.push_comparison(field, "<=", value)?,
            Filter::In(_, values) if values.is_empty() => self.sql.push('0'),
            Filter::In(field, values) => {
                let expr = field_expr(field)?;
                let placeholders = vec!["?"; values.len()].join(", ");
                self.sql.push_str(&format!("{expr} IN ({placeholders})"));
                self.params.extend(values.iter().map(to_sql_value));
            }
            Filter::Contains(field, needle) => {
                let expr = field_expr(field)?;
                self.sql
                    .push_str(&format!("instr(lower({expr}), lower(?)) > 0"));
                self.params.push(SqlValue::Text(needle.clone()));
            }
            Filter::And(parts) => self.push_junction(parts, " AND ", '1')?,
            Filter::Or(parts) => self.push_junction(parts, " OR ", '0')?,
        }
        Ok(())
    }

    fn push_comparison(&mut self, field: &str, op: &str, value: &Value) -> Result<()> {
        let expr = field_expr(field)?;
        self.sql.push_str(&format!("{expr} {op} ?"));
        self.params.push(to_sql_value(value));
        Ok(())
    }

    fn push_junction(&mut self, parts: &[Filter], joiner: &str, empty: char) -> Result<()> {
        if parts.is_empty() {
            self.sql.push(empty);
            return Ok(());
        }
        self.sql.push('(');
        for (i, part) in parts.iter().enumerate() {
            if i > 0 {
                self.sql.push_str(joiner);
            }
            self.push_filter(part)?;
        }
        self.sql.push(')');
        Ok(())
    }
}

/// SQL expression for a document field. The path is inlined so queries use
/// the same expression as the indexes built over it.
fn field_expr(field: &str) -> Result<String> {
    validate_field(field)?;
    if field == ID_FIELD {
        return Ok("id".to_string());
    }
    Ok(format!("json_extract(doc, '$.{field}')"))
}

fn validate_field(field: &str) -> Result<()> {
    let ok = !field.is_empty()
        && !field.starts_with('.')
        && !field.ends_with('.')
        && field
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
    if ok {
        Ok(())
    } else {
        Err(Error::Database(format!("invalid field name: {field:?}")))
    }
}

fn quote_ident(name: &str) -> Result<String> {
    let mut chars = name.chars();
    let ok = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if ok {
        Ok(format!("\"{name}\""))
    } else {
        Err(Error::Database(format!("invalid collection or index name: {name:?}")))
    }
}

fn to_sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or(f64::NAN)),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

fn table_exists(conn: &Connection, collection: &str) -> Result<bool> {
    conn.query_row(
        "SELECT count(*) > 0 FROM sqlite_master WHERE type = 'table' AND name = ?1",
        params![collection],
        |row| row.get(0),
    )
    .map_err(|e| Error::Database(format!("failed to check collection {collection}: {e}")))
}

fn ensure_collection(conn: &Connection, table: &str) -> Result<()> {
    conn.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {table} (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            id TEXT NOT NULL UNIQUE,
            doc TEXT NOT NULL
        )"
    ))
    .map_err(|e| Error::Database(format!("failed to create collection {table}: {e}")))
}

fn insert_document(
    conn: &Connection,
    table: &str,
    collection: &str,
    mut doc: Document,
) -> Result<String> {
    doc.remove(ID_FIELD);
    let id = new_record_id();
    let body = serde_json::to_string(&doc)?;
    conn.execute(
        &format!("INSERT INTO {table} (id, doc) VALUES (?1, ?2)"),
        params![id, body],
    )
    .map_err(|e| Error::Database(format!("failed to insert into {collection}: {e}")))?;
    Ok(id)
}

fn first_match(
    conn: &Connection,
    table: &str,
    collection: &str,
    filter: &Filter,
) -> Result<Option<String>> {
    if !table_exists(conn, collection)? {
        return Ok(None);
    }
    let mut query = SqlBuilder::default();
    query.push_filter(filter)?;
    let sql = format!(
        "SELECT id FROM {table} WHERE {} ORDER BY seq LIMIT 1",
        query.sql
    );
    conn.query_row(&sql, params_from_iter(query.params.iter()), |row| row.get(0))
        .optional()
        .map_err(|e| Error::Database(format!("failed to query {collection}: {e}")))
}

/// Merge the top-level keys of `set` into document `id`.
fn apply_set(
    conn: &Connection,
    table: &str,
    collection: &str,
    id: &str,
    mut set: Document,
) -> Result<u64> {
    set.remove(ID_FIELD);
    let patch = serde_json::to_string(&set)?;
    let updated = conn
        .execute(
            &format!("UPDATE {table} SET doc = json_patch(doc, ?1) WHERE id = ?2"),
            params![patch, id],
        )
        .map_err(|e| Error::Database(format!("failed to update {collection}: {e}")))?;
    Ok(updated as u64)
}

fn select_documents(
    conn: &Connection,
    sql: &str,
    params: &[SqlValue],
    collection: &str,
) -> Result<Vec<Document>> {
    let mut stmt = conn
        .prepare(sql)
        .map_err(|e| Error::Database(format!("failed to prepare query on {collection}: {e}")))?;

    let rows = stmt
        .query_map(params_from_iter(params.iter()), |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })
        .map_err(|e| Error::Database(format!("failed to query {collection}: {e}")))?;

    let mut docs = Vec::new();
    for row in rows {
        let (id, body) =
            row.map_err(|e| Error::Database(format!("failed to read {collection} row: {e}")))?;
        let mut doc: Document = serde_json::from_str(&body)?;
        doc.insert(ID_FIELD.to_string(), Value::String(id));
        docs.push(doc);
    }
    Ok(docs)
}
