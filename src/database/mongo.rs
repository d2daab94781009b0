//! [`DocumentStore`] backed by the official `mongodb` driver.

use async_trait::async_trait;
use bson::Document;
use futures_util::TryStreamExt;
use mongodb::Database;
use mongodb::error::{Error, ErrorKind};

use super::store::{DocumentStore, FindQuery, StoreError};

#[derive(Debug, Clone)]
pub struct MongoStore {
    database: Database,
}

impl MongoStore {
    #[must_use]
    pub const fn new(database: Database) -> Self {
        Self { database }
    }

    #[must_use]
    pub const fn database(&self) -> &Database {
        &self.database
    }
}

impl From<Error> for StoreError {
    fn from(err: Error) -> Self {
        let code = match err.kind.as_ref() {
            ErrorKind::Command(command) => Some(command.code),
            _ => None,
        };
        Self::new(code, err.to_string())
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    async fn find(&self, collection: &str, query: &FindQuery) -> Result<Vec<Document>, StoreError> {
        let collection = self.database.collection::<Document>(collection);
        let mut find = collection.find(query.filter.clone());
        if let Some(sort) = &query.sort {
            find = find.sort(sort.clone());
        }
        if let Some(skip) = query.skip {
            find = find.skip(skip);
        }
        if let Some(limit) = query.limit {
            find = find.limit(i64::try_from(limit).unwrap_or(i64::MAX));
        }
        if let Some(projection) = &query.projection {
            find = find.projection(projection.clone());
        }

        let cursor = find.await?;
        Ok(cursor.try_collect().await?)
    }

    async fn count(&self, collection: &str, filter: &Document) -> Result<u64, StoreError> {
        let total = self
            .database
            .collection::<Document>(collection)
            .count_documents(filter.clone())
            .await?;
        Ok(total)
    }

    async fn aggregate(
        &self,
        collection: &str,
        pipeline: &[Document],
    ) -> Result<Vec<Document>, StoreError> {
        let cursor = self
            .database
            .collection::<Document>(collection)
            .aggregate(pipeline.to_vec())
            .await?;
        Ok(cursor.try_collect().await?)
    }
}
