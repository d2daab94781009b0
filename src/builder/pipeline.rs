use bson::{Document, doc};

use super::GridBuilder;

/// Builds an aggregation pipeline, one stage per builder call.
#[derive(Debug, Clone, Default)]
pub struct PipelineBuilder {
    stages: Vec<Document>,
}

impl PipelineBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an arbitrary stage such as `$lookup` or `$group`.
    pub fn add_stage(&mut self, stage: Document) -> &mut Self {
        self.stages.push(stage);
        self
    }

    #[must_use]
    pub fn stages(&self) -> &[Document] {
        &self.stages
    }

    #[must_use]
    pub fn into_stages(self) -> Vec<Document> {
        self.stages
    }
}

fn to_i64(count: u64) -> i64 {
    i64::try_from(count).unwrap_or(i64::MAX)
}

impl GridBuilder for PipelineBuilder {
    fn match_filter(&mut self, filter: Document) {
        self.stages.push(doc! { "$match": filter });
    }

    fn add_fields(&mut self, fields: Document) {
        self.stages.push(doc! { "$addFields": fields });
    }

    fn sort(&mut self, keys: Document) {
        self.stages.push(doc! { "$sort": keys });
    }

    fn unset(&mut self, fields: &[String]) {
        self.stages.push(doc! { "$unset": fields.to_vec() });
    }

    fn skip(&mut self, count: u64) {
        self.stages.push(doc! { "$skip": to_i64(count) });
    }

    fn limit(&mut self, count: u64) {
        self.stages.push(doc! { "$limit": to_i64(count) });
    }
}
