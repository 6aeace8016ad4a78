use std::sync::Mutex;

use async_trait::async_trait;
use bson::{Document as BsonDocument, doc};
use firelayer::{
    adapter::QueryAdapter,
    backend::{NativeQuery, StoreBackend, StoreBackendBuilder},
    document::{DOCUMENT_ID, DocumentSnapshot},
    error::{DocumentStoreError, DocumentStoreResult},
    executor::QueryExecutor,
    memory::InMemoryStore,
    page::Paginator,
    query::{Expr, Filter, Query, Sort, SortDirection},
    translate::{Branch, PostFilter, Predicate},
};
use tracing_test::traced_test;

/// Wraps the in-memory store, records native queries and fails on demand.
#[derive(Debug)]
struct FlakyBackend {
    inner: InMemoryStore,
    queries: Mutex<Vec<NativeQuery>>,
    fail_on_field: Option<&'static str>,
    fail_ordered: bool,
}

impl FlakyBackend {
    fn new(inner: InMemoryStore) -> Self {
        Self { inner, queries: Mutex::new(vec![]), fail_on_field: None, fail_ordered: false }
    }

    fn failing_on_field(mut self, field: &'static str) -> Self {
        self.fail_on_field = Some(field);
        self
    }

    fn failing_ordered(mut self) -> Self {
        self.fail_ordered = true;
        self
    }

    fn recorded(&self) -> Vec<NativeQuery> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl StoreBackend for FlakyBackend {
    async fn run_query(&self, collection: &str, query: NativeQuery) -> DocumentStoreResult<Vec<DocumentSnapshot>> {
        self.queries.lock().unwrap().push(query.clone());

        if let Some(field) = self.fail_on_field {
            if query.predicates.iter().any(|p| p.field == field) {
                return Err(DocumentStoreError::Backend(format!("cannot filter on {field}")));
            }
        }

        if self.fail_ordered && query.order.is_some() {
            return Err(DocumentStoreError::Unavailable("deadline exceeded".to_string()));
        }

        self.inner.run_query(collection, query).await
    }

    async fn count_documents(&self, collection: &str, predicates: Vec<Predicate>) -> DocumentStoreResult<usize> {
        self.inner.count_documents(collection, predicates).await
    }

    fn supports_membership(&self) -> bool {
        self.inner.supports_membership()
    }

    async fn add_document(&self, collection: &str, data: BsonDocument) -> DocumentStoreResult<String> {
        self.inner.add_document(collection, data).await
    }

    async fn set_document(&self, collection: &str, id: &str, data: BsonDocument) -> DocumentStoreResult<()> {
        self.inner.set_document(collection, id, data).await
    }

    async fn get_document(&self, collection: &str, id: &str) -> DocumentStoreResult<Option<DocumentSnapshot>> {
        self.inner.get_document(collection, id).await
    }

    async fn update_document(&self, collection: &str, id: &str, updates: BsonDocument) -> DocumentStoreResult<()> {
        self.inner.update_document(collection, id, updates).await
    }

    async fn delete_document(&self, collection: &str, id: &str) -> DocumentStoreResult<()> {
        self.inner.delete_document(collection, id).await
    }
}

fn ids(documents: &[DocumentSnapshot]) -> Vec<&str> {
    documents.iter().map(|d| d.id()).collect()
}

fn ai_images(owner_id: &str) -> Expr {
    Expr::from_mongo(&doc! {
        "owner_id": owner_id,
        "$or": [
            { "source": { "$in": ["nano", "blog"] } },
            { "source": { "$exists": false } },
            { "source": null },
        ],
    })
    .unwrap()
}

async fn seed_images(store: &impl StoreBackend) {
    let images = [
        ("1", doc! { "owner_id": "u1", "source": "nano" }),
        ("2", doc! { "owner_id": "u1" }),
        ("3", doc! { "owner_id": "u1", "source": null }),
        ("4", doc! { "owner_id": "u1", "source": "upload" }),
        ("5", doc! { "owner_id": "u2", "source": "nano" }),
    ];

    for (id, data) in images {
        store.set_document("images", id, data).await.unwrap();
    }
}

async fn seed_blogs(store: &impl StoreBackend) -> Vec<(String, Option<i64>)> {
    let mut pending = vec![];

    for i in 0..12_i64 {
        let id = format!("b{i:02}");
        let status = if i % 3 == 0 { "saved" } else { "pending" };
        // Repeated timestamps exercise the identity tie-break; b11 was never requested.
        let requested_at = (i != 11).then_some((i * 7) % 5);

        let review = match requested_at {
            Some(at) => doc! { "requested_at": at },
            None => doc! {},
        };

        store
            .set_document("blogs", &id, doc! { "status": status, "admin_review": review })
            .await
            .unwrap();

        if status == "pending" {
            pending.push((id, requested_at));
        }
    }

    pending
}

#[tokio::test]
async fn ai_view_returns_unrecorded_sources_once() {
    let store = InMemoryStore::new();
    seed_images(&store).await;
    let adapter = QueryAdapter::new(&store);

    let page = adapter
        .query(
            "images",
            &Query::builder()
                .filter(ai_images("u1"))
                .sort(DOCUMENT_ID, SortDirection::Asc)
                .limit(10)
                .build(),
        )
        .await
        .unwrap();

    assert_eq!(ids(&page.items), vec!["1", "2", "3"]);
    assert_eq!(page.total, 3);
    assert_eq!(adapter.count("images", Some(&ai_images("u1"))).await.unwrap(), 3);
}

#[tokio::test]
async fn overlapping_branches_are_deduplicated() {
    let store = InMemoryStore::new();
    store.set_document("docs", "x", doc! { "a": 1, "b": 1 }).await.unwrap();
    store.set_document("docs", "y", doc! { "a": 1, "b": 2 }).await.unwrap();
    store.set_document("docs", "z", doc! { "a": 2, "b": 1 }).await.unwrap();
    store.set_document("docs", "w", doc! { "a": 3, "b": 3 }).await.unwrap();

    let filter = Filter::or([Filter::eq("a", 1), Filter::eq("b", 1)]);
    let page = QueryAdapter::new(&store)
        .query("docs", &Query::builder().filter(filter.clone()).build())
        .await
        .unwrap();

    assert_eq!(ids(&page.items), vec!["x", "y", "z"]);
    assert_eq!(page.total, 3);
    assert_eq!(QueryAdapter::new(&store).count("docs", Some(&filter)).await.unwrap(), 3);
}

#[tokio::test]
#[traced_test]
async fn missing_index_falls_back_to_in_memory_sort() {
    let store = InMemoryStore::new();
    let mut expected = seed_blogs(&store).await;

    expected.sort_by(|(left_id, left_at), (right_id, right_at)| {
        right_at.cmp(left_at).then_with(|| right_id.cmp(left_id))
    });
    assert_eq!(expected.last().map(|(id, _)| id.as_str()), Some("b11"));
    let expected = expected.into_iter().skip(2).take(3).map(|(id, _)| id).collect::<Vec<_>>();

    let page = QueryAdapter::new(&store)
        .query(
            "blogs",
            &Query::builder()
                .filter(Filter::eq("status", "pending"))
                .sort("admin_review.requested_at", SortDirection::Desc)
                .offset(2)
                .limit(3)
                .build(),
        )
        .await
        .unwrap();

    assert_eq!(ids(&page.items), expected);
    assert_eq!(page.total, 8);
    assert!(page.has_more());
    assert!(logs_contain("composite index missing"));
    assert!(logs_contain("collection=\"blogs\""));
    assert!(logs_contain("order_by=admin_review.requested_at"));
}

#[tokio::test]
#[traced_test]
async fn indexed_query_matches_fallback_and_pushes_down_limit() {
    let plain = InMemoryStore::new();
    seed_blogs(&plain).await;

    let indexed = FlakyBackend::new(
        InMemoryStore::builder()
            .with_composite_index("blogs", ["status"], "admin_review.requested_at")
            .build()
            .await
            .unwrap(),
    );
    seed_blogs(&indexed).await;

    let query = Query::builder()
        .filter(Filter::eq("status", "pending"))
        .sort("admin_review.requested_at", SortDirection::Desc)
        .offset(2)
        .limit(3)
        .build();

    let from_index = QueryAdapter::new(&indexed).query("blogs", &query).await.unwrap();
    assert!(!logs_contain("composite index missing"));

    let from_fallback = QueryAdapter::new(&plain).query("blogs", &query).await.unwrap();

    assert_eq!(from_index, from_fallback);
    assert_eq!(
        indexed.recorded().iter().map(|q| q.limit).collect::<Vec<_>>(),
        vec![Some(5)]
    );
}

#[tokio::test]
async fn membership_expansion_matches_native_membership() {
    let native = InMemoryStore::new();
    let expanded = InMemoryStore::builder().without_membership().build().await.unwrap();
    seed_images(&native).await;
    seed_images(&expanded).await;

    for filter in [ai_images("u1"), Filter::is_in("source", ["nano", "upload"]), Filter::is_in("source", [bson::Bson::Null])] {
        let query = Query::builder().filter(filter).sort(DOCUMENT_ID, SortDirection::Desc).build();

        assert_eq!(
            QueryAdapter::new(&native).query("images", &query).await.unwrap(),
            QueryAdapter::new(&expanded).query("images", &query).await.unwrap(),
        );
    }
}

#[tokio::test]
async fn empty_membership_matches_nothing() {
    let store = InMemoryStore::new();
    seed_images(&store).await;

    let page = QueryAdapter::new(&store)
        .query("images", &Query::builder().filter(Filter::is_in("source", Vec::<bson::Bson>::new())).build())
        .await
        .unwrap();

    assert!(page.items.is_empty());
    assert_eq!(page.total, 0);
}

#[tokio::test]
async fn pages_past_the_end_are_empty() {
    let store = InMemoryStore::new();
    seed_images(&store).await;

    let page = QueryAdapter::new(&store)
        .query("images", &Query::builder().filter(Filter::eq("owner_id", "u1")).offset(10).limit(5).build())
        .await
        .unwrap();

    assert!(page.items.is_empty());
    assert_eq!(page.total, 4);
    assert_eq!(page.skip, 10);
}

#[tokio::test]
async fn failing_branch_aborts_the_union() {
    let backend = FlakyBackend::new(InMemoryStore::new()).failing_on_field("source");
    seed_images(&backend).await;

    let result = QueryAdapter::new(&backend)
        .query("images", &Query::builder().filter(ai_images("u1")).build())
        .await;

    assert!(matches!(result, Err(DocumentStoreError::Backend(message)) if message.contains("source")));
}

#[tokio::test]
#[traced_test]
async fn other_backend_errors_propagate_unchanged() {
    let backend = FlakyBackend::new(InMemoryStore::new()).failing_ordered();
    seed_images(&backend).await;

    let result = QueryAdapter::new(&backend)
        .find(
            "images",
            &Query::builder().filter(Filter::eq("owner_id", "u1")).sort("created_at", SortDirection::Asc).build(),
        )
        .await;

    assert!(matches!(result, Err(DocumentStoreError::Unavailable(_))));
    assert!(logs_contain("query failed"));
    assert!(!logs_contain("falling back"));
    assert_eq!(backend.recorded().len(), 1);
}

#[tokio::test]
async fn rejects_invalid_filters_and_limits() {
    let err = Expr::from_mongo(&doc! { "age": { "$gt": 3 } }).unwrap_err();
    assert!(matches!(err, DocumentStoreError::InvalidFilter(ref message) if message.contains("$gt")));

    let store = InMemoryStore::new();
    let result = QueryAdapter::new(&store)
        .query("images", &Query { limit: Some(0), ..Query::default() })
        .await;

    assert!(matches!(result, Err(DocumentStoreError::InvalidQuery(_))));
}

#[tokio::test]
async fn unfiltered_query_orders_by_identity() {
    let store = InMemoryStore::new();
    seed_images(&store).await;

    let page = QueryAdapter::new(&store)
        .query("images", &Query::builder().limit(2).build())
        .await
        .unwrap();

    assert_eq!(ids(&page.items), vec!["1", "2"]);
    assert_eq!(page.total, 5);
    assert_eq!(QueryAdapter::new(&store).count("images", None).await.unwrap(), 5);
}

#[tokio::test]
async fn executor_reports_where_ordering_happened() {
    let plain = InMemoryStore::new();
    let indexed = InMemoryStore::builder()
        .with_composite_index("blogs", ["status"], "admin_review.requested_at")
        .build()
        .await
        .unwrap();
    seed_blogs(&plain).await;
    seed_blogs(&indexed).await;

    let pending = Branch { predicates: vec![Predicate::eq("status", "pending")], post_filters: vec![] };
    let order = Sort::new("admin_review.requested_at", SortDirection::Desc);
    let window = Paginator::new(1, Some(4));

    let from_index = QueryExecutor::new(&indexed)
        .execute("blogs", &pending, Some(&order), window)
        .await
        .unwrap();
    assert!(from_index.server_ordered);

    let from_fallback = QueryExecutor::new(&plain)
        .execute("blogs", &pending, Some(&order), window)
        .await
        .unwrap();
    assert!(!from_fallback.server_ordered);
    assert_eq!(from_fallback.documents, from_index.documents);
    assert_eq!(from_fallback.documents.len(), 4);

    let unrequested = Branch {
        predicates: vec![Predicate::eq("status", "pending")],
        post_filters: vec![PostFilter::MissingOrNull("admin_review.requested_at".to_string())],
    };
    let post_filtered = QueryExecutor::new(&indexed)
        .execute("blogs", &unrequested, Some(&order), window)
        .await
        .unwrap();
    assert!(!post_filtered.server_ordered);
    assert!(post_filtered.documents.is_empty());

    let from_start = QueryExecutor::new(&indexed)
        .execute("blogs", &unrequested, Some(&order), Paginator::new(0, Some(4)))
        .await
        .unwrap();
    assert_eq!(ids(&from_start.documents), vec!["b11"]);
}
