//! In-memory [`DocumentStore`] for tests, demos and benchmarks
//!
//! Collections live behind a shared lock, so clones of a [`MemoryStore`] see the same data.
//! Queries follow server semantics closely enough for grid requests: `$text` fails with
//! code 27 unless [`MemoryStore::create_text_index`] was called for the collection.

mod matcher;
mod pipeline;

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use bson::oid::ObjectId;
use bson::{Bson, Document};

use self::matcher::Matcher;
use self::pipeline::{Pipeline, filter_documents, project, sort_documents};
use super::store::{DocumentStore, FindQuery, StoreError};

#[derive(Debug, Clone, Default)]
pub(crate) struct Collection {
    pub(crate) documents: Vec<Document>,
    pub(crate) text_fields: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    collections: Arc<RwLock<HashMap<String, Collection>>>,
}

fn poisoned<T>(_: PoisonError<T>) -> StoreError {
    StoreError::new(None, "memory store lock poisoned")
}

fn to_usize(value: u64) -> usize {
    usize::try_from(value).unwrap_or(usize::MAX)
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert documents, assigning an `ObjectId` `_id` where none is present.
    /// Returns the ids in insertion order.
    ///
    /// # Errors
    ///
    /// Fails only when the lock is poisoned.
    pub fn insert_many(
        &self,
        collection: &str,
        documents: impl IntoIterator<Item = Document>,
    ) -> Result<Vec<Bson>, StoreError> {
        let mut collections = self.collections.write().map_err(poisoned)?;
        let target = collections.entry(collection.to_string()).or_default();

        let mut ids = Vec::new();
        for document in documents {
            let document = if document.contains_key("_id") {
                document
            } else {
                let mut with_id = Document::new();
                with_id.insert("_id", ObjectId::new());
                for (key, value) in document {
                    with_id.insert(key, value);
                }
                with_id
            };
            ids.push(document.get("_id").cloned().unwrap_or(Bson::Null));
            target.documents.push(document);
        }

        Ok(ids)
    }

    /// # Errors
    ///
    /// Fails only when the lock is poisoned.
    pub fn insert_one(&self, collection: &str, document: Document) -> Result<Bson, StoreError> {
        let mut ids = self.insert_many(collection, [document])?;
        Ok(ids.pop().unwrap_or(Bson::Null))
    }

    /// Declare a text index over `fields`, enabling `$text` queries on the collection.
    ///
    /// # Errors
    ///
    /// Fails only when the lock is poisoned.
    pub fn create_text_index(&self, collection: &str, fields: &[&str]) -> Result<(), StoreError> {
        let mut collections = self.collections.write().map_err(poisoned)?;
        let target = collections.entry(collection.to_string()).or_default();
        target.text_fields = Some(fields.iter().map(ToString::to_string).collect());
        Ok(())
    }

    fn find_sync(&self, collection: &str, query: &FindQuery) -> Result<Vec<Document>, StoreError> {
        let collections = self.collections.read().map_err(poisoned)?;
        let Some(source) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        let matcher = Matcher::new(source.text_fields.as_deref());
        let mut documents = filter_documents(source.documents.clone(), &query.filter, &matcher)?;
        if let Some(sort) = &query.sort {
            sort_documents(&mut documents, sort)?;
        }

        let skip = query.skip.map_or(0, to_usize);
        let limit = query.limit.filter(|limit| *limit > 0).map_or(usize::MAX, to_usize);
        let page = documents.into_iter().skip(skip).take(limit);

        match &query.projection {
            Some(projection) => page.map(|document| project(&document, projection)).collect(),
            None => Ok(page.collect()),
        }
    }

    fn count_sync(&self, collection: &str, filter: &Document) -> Result<u64, StoreError> {
        let collections = self.collections.read().map_err(poisoned)?;
        let Some(source) = collections.get(collection) else {
            return Ok(0);
        };

        let matcher = Matcher::new(source.text_fields.as_deref());
        let mut total = 0;
        for document in &source.documents {
            if matcher.matches(document, filter)? {
                total += 1;
            }
        }
        Ok(total)
    }

    fn aggregate_sync(&self, collection: &str, stages: &[Document]) -> Result<Vec<Document>, StoreError> {
        let collections = self.collections.read().map_err(poisoned)?;
        let source = collections.get(collection);
        let documents = source.map(|source| source.documents.clone()).unwrap_or_default();
        let text_fields = source.and_then(|source| source.text_fields.as_deref());

        Pipeline::new(&collections, text_fields).run(documents, stages)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find(&self, collection: &str, query: &FindQuery) -> Result<Vec<Document>, StoreError> {
        self.find_sync(collection, query)
    }

    async fn count(&self, collection: &str, filter: &Document) -> Result<u64, StoreError> {
        self.count_sync(collection, filter)
    }

    async fn aggregate(
        &self,
        collection: &str,
        pipeline: &[Document],
    ) -> Result<Vec<Document>, StoreError> {
        self.aggregate_sync(collection, pipeline)
    }
}
