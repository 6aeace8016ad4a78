//! In-memory storage implementation.
//!
//! Documents live in per-collection maps behind an async-aware read-write lock. Query
//! execution follows Firestore's rules closely enough to exercise every path of the
//! query layer: ordering a filtered query on a different field needs a declared
//! composite index, and membership predicates can be switched off.

use std::{
    collections::{BTreeMap, BTreeSet, HashMap, HashSet},
    sync::Arc,
};

use async_trait::async_trait;
use bson::{Bson, Document as BsonDocument};
use mea::rwlock::RwLock;
use tracing::debug;
use uuid::Uuid;

use firelayer_core::{
    backend::{NativeQuery, StoreBackend, StoreBackendBuilder},
    document::{DOCUMENT_ID, DocumentSnapshot},
    error::{DocumentStoreError, DocumentStoreResult},
    order::sort_snapshots,
    translate::{Predicate, PredicateOp},
};

type CollectionMap = BTreeMap<String, BsonDocument>;
type StoreMap = HashMap<String, CollectionMap>;

/// A composite index: equality/membership fields plus the field they are ordered by.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompositeIndex {
    pub collection: String,
    pub fields: BTreeSet<String>,
    pub order_by: String,
}

impl CompositeIndex {
    pub fn new<F: Into<String>>(
        collection: impl Into<String>,
        fields: impl IntoIterator<Item = F>,
        order_by: impl Into<String>,
    ) -> Self {
        Self {
            collection: collection.into(),
            fields: fields.into_iter().map(Into::into).collect(),
            order_by: order_by.into(),
        }
    }
}

/// Thread-safe in-memory document backend.
///
/// Clones share the same underlying data, so one instance can be handed to many tasks.
///
/// # Example
///
/// ```ignore
/// use firelayer_memory::InMemoryStore;
/// use firelayer::backend::StoreBackendBuilder;
///
/// let store = InMemoryStore::builder()
///     .with_composite_index("blogs", ["status"], "created_at")
///     .build()
///     .await?;
/// ```
#[derive(Clone, Debug)]
pub struct InMemoryStore {
    /// collection name -> (document id -> fields)
    store: Arc<RwLock<StoreMap>>,
    indexes: Arc<HashSet<CompositeIndex>>,
    membership: bool,
}

impl InMemoryStore {
    /// Creates an empty store with no composite indexes and native membership.
    pub fn new() -> Self {
        Self {
            store: Arc::new(RwLock::new(StoreMap::new())),
            indexes: Arc::new(HashSet::new()),
            membership: true,
        }
    }

    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }

    fn check_query(&self, collection: &str, query: &NativeQuery) -> DocumentStoreResult<()> {
        if !self.membership && query.predicates.iter().any(|p| p.op == PredicateOp::In) {
            return Err(DocumentStoreError::Backend(
                "membership predicates are not supported by this store".to_string(),
            ));
        }

        let Some(order) = &query.order else {
            return Ok(());
        };

        let fields = query
            .predicates
            .iter()
            .map(|p| p.field.clone())
            .filter(|field| field != &order.field)
            .collect::<BTreeSet<_>>();

        if order.field == DOCUMENT_ID || fields.is_empty() {
            return Ok(());
        }

        let index = CompositeIndex {
            collection: collection.to_string(),
            fields,
            order_by: order.field.clone(),
        };

        if self.indexes.contains(&index) {
            return Ok(());
        }

        Err(DocumentStoreError::IndexMissing {
            message: format!(
                "the query requires a composite index on ({}) ordered by {}",
                index.fields.iter().cloned().collect::<Vec<_>>().join(", "),
                index.order_by,
            ),
            collection: index.collection,
            order_by: index.order_by,
        })
    }

    fn matches_all(predicates: &[Predicate], document: &DocumentSnapshot) -> bool {
        predicates.iter().all(|predicate| predicate.matches(document))
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Splits update keys into field paths, expanding one level of nested maps.
fn flatten_updates(updates: BsonDocument) -> Vec<(String, Bson)> {
    let mut flattened = Vec::with_capacity(updates.len());

    for (key, value) in updates {
        match value {
            Bson::Document(nested) if !key.contains('.') && !nested.is_empty() => {
                for (nested_key, nested_value) in nested {
                    flattened.push((format!("{key}.{nested_key}"), nested_value));
                }
            }
            value => flattened.push((key, value)),
        }
    }

    flattened
}

/// Writes `value` at a dot path, creating (or replacing non-map) intermediate values.
fn set_path(document: &mut BsonDocument, path: &str, value: Bson) {
    match path.split_once('.') {
        None => {
            document.insert(path, value);
        }
        Some((head, rest)) => {
            if !matches!(document.get(head), Some(Bson::Document(_))) {
                document.insert(head, BsonDocument::new());
            }

            if let Some(Bson::Document(child)) = document.get_mut(head) {
                set_path(child, rest, value);
            }
        }
    }
}

#[async_trait]
impl StoreBackend for InMemoryStore {
    async fn run_query(
        &self,
        collection: &str,
        query: NativeQuery,
    ) -> DocumentStoreResult<Vec<DocumentSnapshot>> {
        self.check_query(collection, &query)?;

        let store = self.store.read().await;
        let Some(collection_map) = store.get(collection) else {
            return Ok(vec![]);
        };

        let mut documents = collection_map
            .iter()
            .map(|(id, data)| DocumentSnapshot::new(id.clone(), data.clone()))
            .filter(|document| Self::matches_all(&query.predicates, document))
            .collect::<Vec<_>>();

        drop(store);

        if let Some(order) = &query.order {
            sort_snapshots(&mut documents, Some(order));
        }

        if let Some(limit) = query.limit {
            documents.truncate(limit);
        }

        debug!(
            collection,
            predicates = query.predicates.len(),
            returned = documents.len(),
            "served native query"
        );

        Ok(documents)
    }

    async fn count_documents(
        &self,
        collection: &str,
        predicates: Vec<Predicate>,
    ) -> DocumentStoreResult<usize> {
        self.check_query(collection, &NativeQuery::new(predicates.clone()))?;

        let store = self.store.read().await;

        Ok(store
            .get(collection)
            .map(|collection_map| {
                collection_map
                    .iter()
                    .filter(|(id, data)| {
                        Self::matches_all(
                            &predicates,
                            &DocumentSnapshot::new(id.as_str(), (*data).clone()),
                        )
                    })
                    .count()
            })
            .unwrap_or(0))
    }

    fn supports_membership(&self) -> bool {
        self.membership
    }

    async fn add_document(&self, collection: &str, data: BsonDocument) -> DocumentStoreResult<String> {
        let id = Uuid::new_v4().simple().to_string();

        self.store
            .write()
            .await
            .entry(collection.to_string())
            .or_default()
            .insert(id.clone(), data);

        Ok(id)
    }

    async fn set_document(
        &self,
        collection: &str,
        id: &str,
        data: BsonDocument,
    ) -> DocumentStoreResult<()> {
        if id.is_empty() {
            return Err(DocumentStoreError::InvalidDocument("document id cannot be empty".to_string()));
        }

        self.store
            .write()
            .await
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), data);

        Ok(())
    }

    async fn get_document(
        &self,
        collection: &str,
        id: &str,
    ) -> DocumentStoreResult<Option<DocumentSnapshot>> {
        Ok(self
            .store
            .read()
            .await
            .get(collection)
            .and_then(|collection_map| collection_map.get(id))
            .map(|data| DocumentSnapshot::new(id, data.clone())))
    }

    async fn update_document(
        &self,
        collection: &str,
        id: &str,
        updates: BsonDocument,
    ) -> DocumentStoreResult<()> {
        let mut store = self.store.write().await;
        let document = store
            .get_mut(collection)
            .and_then(|collection_map| collection_map.get_mut(id))
            .ok_or_else(|| DocumentStoreError::DocumentNotFound(id.to_string(), collection.to_string()))?;

        for (path, value) in flatten_updates(updates) {
            set_path(document, &path, value);
        }

        Ok(())
    }

    async fn delete_document(&self, collection: &str, id: &str) -> DocumentStoreResult<()> {
        if let Some(collection_map) = self.store.write().await.get_mut(collection) {
            collection_map.remove(id);
        }

        Ok(())
    }
}

/// Builder for [`InMemoryStore`] instances.
///
/// ```ignore
/// let store = InMemoryStore::builder()
///     .with_composite_index("images", ["owner_id"], "created_at")
///     .without_membership()
///     .build()
///     .await?;
/// ```
#[derive(Debug, Clone)]
pub struct InMemoryStoreBuilder {
    indexes: HashSet<CompositeIndex>,
    membership: bool,
}

impl Default for InMemoryStoreBuilder {
    fn default() -> Self {
        Self { indexes: HashSet::new(), membership: true }
    }
}

impl InMemoryStoreBuilder {
    /// Declares a composite index over `fields` ordered by `order_by`.
    pub fn with_composite_index<F: Into<String>>(
        mut self,
        collection: impl Into<String>,
        fields: impl IntoIterator<Item = F>,
        order_by: impl Into<String>,
    ) -> Self {
        self.indexes.insert(CompositeIndex::new(collection, fields, order_by));
        self
    }

    /// Rejects membership predicates, forcing the query layer to expand them.
    pub fn without_membership(mut self) -> Self {
        self.membership = false;
        self
    }
}

#[async_trait]
impl StoreBackendBuilder for InMemoryStoreBuilder {
    type Backend = InMemoryStore;

    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        Ok(InMemoryStore {
            store: Arc::new(RwLock::new(StoreMap::new())),
            indexes: Arc::new(self.indexes),
            membership: self.membership,
        })
    }
}
