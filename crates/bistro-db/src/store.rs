use async_trait::async_trait;
use bistro_common::{Error, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// A stored document: a JSON object. The store-generated identifier is
/// exposed under [`ID_FIELD`].
pub type Document = Map<String, Value>;

/// Name of the identifier field on every document returned by a store.
pub const ID_FIELD: &str = "id";

/// Document selector. Field names are dotted JSON paths; [`ID_FIELD`] refers
/// to the document identifier.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    All,
    Eq(String, Value),
    In(String, Vec<Value>),
    Gte(String, Value),
    Lte(String, Value),
    /// Case-insensitive substring match on a string field.
    Contains(String, String),
    And(Vec<Filter>),
    Or(Vec<Filter>),
}

impl Filter {
    pub fn id(id: &str) -> Self {
        Self::Eq(ID_FIELD.to_string(), Value::String(id.to_string()))
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Eq(field.into(), value.into())
    }

    pub fn is_in<V: Into<Value>>(
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Self::In(field.into(), values.into_iter().map(Into::into).collect())
    }

    pub fn gte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Gte(field.into(), value.into())
    }

    pub fn lte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Lte(field.into(), value.into())
    }

    pub fn contains(field: impl Into<String>, needle: impl Into<String>) -> Self {
        Self::Contains(field.into(), needle.into())
    }

    /// Conjunction, flattening nested `And`s and dropping `All`.
    pub fn and(self, other: Filter) -> Self {
        let mut parts = Vec::new();
        for f in [self, other] {
            match f {
                Filter::All => {}
                Filter::And(inner) => parts.extend(inner),
                f => parts.push(f),
            }
        }
        match parts.len() {
            0 => Filter::All,
            1 => parts.remove(0),
            _ => Filter::And(parts),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

/// Sorting and limiting for [`RecordStore::find`]. Documents that compare
/// equal (or all documents, with no sort keys) come back in insertion order.
#[derive(Debug, Clone, Default)]
pub struct FindOptions {
    pub sort: Vec<(String, SortOrder)>,
    pub limit: Option<usize>,
}

impl FindOptions {
    pub fn sort_by(field: impl Into<String>, order: SortOrder) -> Self {
        Self {
            sort: vec![(field.into(), order)],
            limit: None,
        }
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    Asc,
    Desc,
    /// Full-text key. Stores without text search index it as ascending.
    Text,
}

/// A named secondary index over one or more document fields.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexSpec {
    pub name: String,
    pub keys: Vec<(String, IndexKind)>,
    pub unique: bool,
}

impl IndexSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            keys: Vec::new(),
            unique: false,
        }
    }

    pub fn asc(mut self, field: impl Into<String>) -> Self {
        self.keys.push((field.into(), IndexKind::Asc));
        self
    }

    pub fn desc(mut self, field: impl Into<String>) -> Self {
        self.keys.push((field.into(), IndexKind::Desc));
        self
    }

    pub fn text(mut self, field: impl Into<String>) -> Self {
        self.keys.push((field.into(), IndexKind::Text));
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateResult {
    pub matched: u64,
    pub modified: u64,
}

/// The document database every service and the migration runner talk to.
///
/// Updates use `$set` semantics: top-level keys of the update document
/// replace the stored ones, other keys are left alone. All calls are
/// attempt-once; nothing here retries.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Round-trip to the store to confirm it is reachable.
    async fn ping(&self) -> Result<()>;

    /// Release the underlying connection. Every later call fails with
    /// `Error::Connection`.
    async fn close(&self) -> Result<()>;

    async fn find(
        &self,
        collection: &str,
        filter: &Filter,
        options: &FindOptions,
    ) -> Result<Vec<Document>>;

    async fn find_one(&self, collection: &str, filter: &Filter) -> Result<Option<Document>>;

    /// Insert a document and return its generated id. An `id` key in `doc`
    /// is ignored.
    async fn insert_one(&self, collection: &str, doc: Document) -> Result<String>;

    async fn insert_many(&self, collection: &str, docs: Vec<Document>) -> Result<Vec<String>>;

    async fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        set: Document,
    ) -> Result<UpdateResult>;

    /// Apply `set` to the first matching document and return it as it reads
    /// after the update, atomically.
    async fn find_one_and_update(
        &self,
        collection: &str,
        filter: &Filter,
        set: Document,
    ) -> Result<Option<Document>>;

    async fn delete_one(&self, collection: &str, filter: &Filter) -> Result<u64>;

    async fn delete_many(&self, collection: &str, filter: &Filter) -> Result<u64>;

    /// Create an index; a no-op if an index with the same name exists.
    async fn create_index(&self, collection: &str, index: &IndexSpec) -> Result<()>;

    /// Drop a collection with its indexes. Dropping a missing collection
    /// succeeds.
    async fn drop_collection(&self, collection: &str) -> Result<()>;
}

/// Typed view over one collection of a [`RecordStore`].
#[derive(Clone, Copy)]
pub struct Collection<'a> {
    store: &'a dyn RecordStore,
    name: &'a str,
}

impl<'a> Collection<'a> {
    pub fn new(store: &'a dyn RecordStore, name: &'a str) -> Self {
        Self { store, name }
    }

    pub fn name(&self) -> &str {
        self.name
    }

    pub async fn find<T: DeserializeOwned>(
        &self,
        filter: &Filter,
        options: &FindOptions,
    ) -> Result<Vec<T>> {
        self.store
            .find(self.name, filter, options)
            .await?
            .into_iter()
            .map(from_document)
            .collect()
    }

    pub async fn find_one<T: DeserializeOwned>(&self, filter: &Filter) -> Result<Option<T>> {
        self.store
            .find_one(self.name, filter)
            .await?
            .map(from_document)
            .transpose()
    }

    pub async fn insert_one<T: Serialize>(&self, value: &T) -> Result<String> {
        let doc = to_document(value)?;
        self.store.insert_one(self.name, doc).await
    }

    pub async fn insert_many<T: Serialize>(&self, values: &[T]) -> Result<Vec<String>> {
        let docs = values.iter().map(to_document).collect::<Result<Vec<_>>>()?;
        self.store.insert_many(self.name, docs).await
    }

    pub async fn update_one<S: Serialize>(&self, filter: &Filter, set: &S) -> Result<UpdateResult> {
        let set = to_document(set)?;
        self.store.update_one(self.name, filter, set).await
    }

    pub async fn find_one_and_update<S: Serialize, T: DeserializeOwned>(
        &self,
        filter: &Filter,
        set: &S,
    ) -> Result<Option<T>> {
        let set = to_document(set)?;
        self.store
            .find_one_and_update(self.name, filter, set)
            .await?
            .map(from_document)
            .transpose()
    }

    pub async fn delete_one(&self, filter: &Filter) -> Result<u64> {
        self.store.delete_one(self.name, filter).await
    }

    pub async fn delete_many(&self, filter: &Filter) -> Result<u64> {
        self.store.delete_many(self.name, filter).await
    }

    pub async fn create_index(&self, index: &IndexSpec) -> Result<()> {
        self.store.create_index(self.name, index).await
    }

    pub async fn drop(&self) -> Result<()> {
        self.store.drop_collection(self.name).await
    }
}

/// Serialize a value that must encode as a JSON object.
pub fn to_document<T: Serialize + ?Sized>(value: &T) -> Result<Document> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(Error::Database(format!(
            "documents must be JSON objects, got {}",
            json_kind(&other)
        ))),
    }
}

pub fn from_document<T: DeserializeOwned>(doc: Document) -> Result<T> {
    Ok(serde_json::from_value(Value::Object(doc))?)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
