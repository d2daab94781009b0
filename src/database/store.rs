use async_trait::async_trait;
use bson::Document;
use thiserror::Error;

/// A plain find request: filter, optional sort, window and projection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindQuery {
    pub filter: Document,
    pub sort: Option<Document>,
    pub skip: Option<u64>,
    pub limit: Option<u64>,
    pub projection: Option<Document>,
}

/// Error raised by a [`DocumentStore`].
///
/// `code` mirrors the numeric server error code when the backend reports one.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct StoreError {
    code: Option<i32>,
    message: String,
}

impl StoreError {
    /// Server code for "index not found", raised by `$text` without a text index.
    pub const INDEX_NOT_FOUND: i32 = 27;
    /// Server code for "bad value", used for malformed operators and stages.
    pub const BAD_VALUE: i32 = 2;

    pub fn new(code: Option<i32>, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn bad_value(message: impl Into<String>) -> Self {
        Self::new(Some(Self::BAD_VALUE), message)
    }

    #[must_use]
    pub const fn code(&self) -> Option<i32> {
        self.code
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub const fn is_missing_index(&self) -> bool {
        matches!(self.code, Some(Self::INDEX_NOT_FOUND))
    }
}

/// The document database seen by the grid compiler.
///
/// Implementations execute already-compiled artifacts; they never see a `GridRequest`.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find(&self, collection: &str, query: &FindQuery) -> Result<Vec<Document>, StoreError>;

    async fn count(&self, collection: &str, filter: &Document) -> Result<u64, StoreError>;

    async fn aggregate(
        &self,
        collection: &str,
        pipeline: &[Document],
    ) -> Result<Vec<Document>, StoreError>;
}
