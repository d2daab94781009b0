#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use chrono::{Duration, TimeZone, Utc};
use gridcrate::bson::{Bson, Document, doc};
use gridcrate::{
    AggregationFilter, ColumnConfig, DocumentStore, FindQuery, GridError, GridFilter,
    GridRequest, GridResponse, MemoryStore, QueryBuilder, StoreError, DATE_TIME,
};
#[cfg(feature = "mongodb")]
use gridcrate::MongoStore;

pub const COLLECTION: &str = "aggregation_documents";
pub const DOCUMENT_COUNT: i32 = 10;

pub fn fixture(i: i32) -> Document {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    doc! {
        "bool": i % 2 == 0,
        "date": start + Duration::days(i64::from(i)),
        "float": f64::from(i) * 11.0 / 10.0,
        "int": i,
        "string": format!("String {i}"),
    }
}

/// Route library logs to the test output; safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_target(false)
        .with_test_writer()
        .try_init();
}

/// Backend the integration tests run against.
///
/// With the `mongodb` feature enabled and `MONGODB_URL` set, every store is a fresh database
/// on that server. Otherwise it is an in-process [`MemoryStore`].
#[derive(Debug, Clone)]
pub enum TestStore {
    Memory(MemoryStore),
    #[cfg(feature = "mongodb")]
    Mongo(MongoStore),
}

impl TestStore {
    pub async fn create_text_index(&self, collection: &str, fields: &[&str]) -> Result<(), StoreError> {
        match self {
            Self::Memory(store) => store.create_text_index(collection, fields),
            #[cfg(feature = "mongodb")]
            Self::Mongo(store) => {
                let mut keys = Document::new();
                for field in fields {
                    keys.insert(*field, "text");
                }
                store
                    .database()
                    .collection::<Document>(collection)
                    .create_index(mongodb::IndexModel::builder().keys(keys).build())
                    .await?;
                Ok(())
            }
        }
    }
}

#[async_trait]
impl DocumentStore for TestStore {
    async fn find(&self, collection: &str, query: &FindQuery) -> Result<Vec<Document>, StoreError> {
        match self {
            Self::Memory(store) => store.find(collection, query).await,
            #[cfg(feature = "mongodb")]
            Self::Mongo(store) => store.find(collection, query).await,
        }
    }

    async fn count(&self, collection: &str, filter: &Document) -> Result<u64, StoreError> {
        match self {
            Self::Memory(store) => store.count(collection, filter).await,
            #[cfg(feature = "mongodb")]
            Self::Mongo(store) => store.count(collection, filter).await,
        }
    }

    async fn aggregate(
        &self,
        collection: &str,
        pipeline: &[Document],
    ) -> Result<Vec<Document>, StoreError> {
        match self {
            Self::Memory(store) => store.aggregate(collection, pipeline).await,
            #[cfg(feature = "mongodb")]
            Self::Mongo(store) => store.aggregate(collection, pipeline).await,
        }
    }
}

// Test binaries run one after another, so a per-binary prefix plus a counter keeps
// concurrently running tests apart.
#[cfg(feature = "mongodb")]
fn next_database_name() -> String {
    use std::sync::atomic::{AtomicUsize, Ordering};

    static NEXT: AtomicUsize = AtomicUsize::new(0);
    let binary = module_path!().split("::").next().unwrap_or("gridcrate");
    format!("{binary}_{}", NEXT.fetch_add(1, Ordering::Relaxed))
}

#[cfg(feature = "mongodb")]
async fn setup_mongo_store(url: &str) -> TestStore {
    let client = mongodb::Client::with_uri_str(url)
        .await
        .expect("connect to MONGODB_URL");
    let database = client.database(&next_database_name());

    // Leftovers from an earlier run
    database.drop().await.expect("drop test database");
    database
        .collection::<Document>(COLLECTION)
        .insert_many((0..DOCUMENT_COUNT).map(fixture))
        .await
        .expect("seed documents");

    TestStore::Mongo(MongoStore::new(database))
}

pub async fn setup_store() -> TestStore {
    init_tracing();

    #[cfg(feature = "mongodb")]
    if let Ok(url) = std::env::var("MONGODB_URL") {
        return setup_mongo_store(&url).await;
    }

    let store = MemoryStore::new();
    store
        .insert_many(COLLECTION, (0..DOCUMENT_COUNT).map(fixture))
        .expect("seed documents");
    TestStore::Memory(store)
}

fn document_columns() -> ColumnConfig {
    let mut columns = ColumnConfig::new(COLLECTION);
    for (logical, physical) in [
        ("bool", "bool"),
        ("custom_string", "string"),
        ("date", "date"),
        ("float", "float"),
        ("id", "_id"),
        ("int", "int"),
        ("string", "string"),
    ] {
        columns = columns.condition(logical, physical).sortation(logical, physical);
    }

    columns
        .condition("string2", "string2")
        .searchable("string")
        .searchable("custom_string")
        .condition_callback("custom_string", |_builder, values, field, predicate, _operator| {
            predicate.field(field).eq(values.first().cloned().unwrap_or(Bson::Null));
        })
        .sort_callback("custom_string", |builder| {
            builder.add_fields(doc! { "customString": "$string" });
            vec!["customString".to_string()]
        })
}

/// Pipeline-backed resource with a custom condition and sort callback.
pub struct AggregationDocumentFilter {
    columns: ColumnConfig,
}

impl AggregationDocumentFilter {
    pub fn new() -> Self {
        Self {
            columns: document_columns(),
        }
    }
}

impl AggregationFilter for AggregationDocumentFilter {
    const COLLECTION: &'static str = COLLECTION;
    const DATE_FORMAT: &'static str = DATE_TIME;

    fn columns(&self) -> &ColumnConfig {
        &self.columns
    }
}

/// Find-backed resource over the same collection.
pub struct QueryDocumentFilter {
    columns: ColumnConfig,
    count_filter: Option<Document>,
}

impl QueryDocumentFilter {
    pub fn new() -> Self {
        Self {
            columns: document_columns(),
            count_filter: None,
        }
    }

    pub fn with_count_filter(mut self, filter: Document) -> Self {
        self.count_filter = Some(filter);
        self
    }
}

impl GridFilter for QueryDocumentFilter {
    const COLLECTION: &'static str = COLLECTION;
    const DATE_FORMAT: &'static str = DATE_TIME;
    const ALLOW_NATIVE: bool = true;

    fn columns(&self) -> &ColumnConfig {
        &self.columns
    }

    fn custom_count_query(&self) -> Option<QueryBuilder> {
        self.count_filter
            .clone()
            .map(|filter| QueryBuilder::new().with_filter(filter))
    }
}

/// Same as [`QueryDocumentFilter`] but also requires a `$text` match when searching.
pub struct TextSearchDocumentFilter {
    columns: ColumnConfig,
}

impl TextSearchDocumentFilter {
    pub fn new() -> Self {
        Self {
            columns: document_columns(),
        }
    }
}

impl GridFilter for TextSearchDocumentFilter {
    const COLLECTION: &'static str = COLLECTION;
    const USE_TEXT_SEARCH: bool = true;

    fn columns(&self) -> &ColumnConfig {
        &self.columns
    }
}

#[derive(Clone)]
pub struct AppState {
    pub store: TestStore,
    pub documents: Arc<AggregationDocumentFilter>,
    pub text_documents: Arc<TextSearchDocumentFilter>,
}

async fn list_documents(
    State(state): State<AppState>,
    Json(request): Json<GridRequest>,
) -> Result<GridResponse, GridError> {
    state.documents.get_grid_response(&state.store, &request).await
}

async fn search_documents(
    State(state): State<AppState>,
    Json(request): Json<GridRequest>,
) -> Result<GridResponse, GridError> {
    state
        .text_documents
        .get_grid_response(&state.store, &request)
        .await
}

pub fn setup_test_app(store: TestStore) -> Router {
    let state = AppState {
        store,
        documents: Arc::new(AggregationDocumentFilter::new()),
        text_documents: Arc::new(TextSearchDocumentFilter::new()),
    };

    let api = Router::new()
        .route("/documents", post(list_documents))
        .route("/documents/search", post(search_documents))
        .with_state(state);

    Router::new().nest("/api/v1", api)
}

pub fn ints(documents: &[Document]) -> Vec<i32> {
    documents
        .iter()
        .filter_map(|document| document.get_i32("int").ok())
        .collect()
}
