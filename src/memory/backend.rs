use crate::errors::BackendError;
use crate::patch::DocumentPatch;
use crate::projection::Projection;
use crate::query::Expression;
use crate::store::{FindParams, StoreBackend};
use async_trait::async_trait;
use bson::{Bson, Document};
use parking_lot::RwLock;
use std::collections::HashMap;

use super::eval::{bson_eq, compare_docs, matches_document};

/// Reference backend keeping each collection as an insertion-ordered list of documents.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    collections: RwLock<HashMap<String, Vec<Document>>>,
}

fn identifier_entry(identifier: &Document) -> Result<(&str, &Bson), BackendError> {
    let mut entries = identifier.iter();
    match (entries.next(), entries.next()) {
        (Some((k, v)), None) => Ok((k.as_str(), v)),
        _ => Err(format!("identifier must have exactly one entry, got {identifier}").into()),
    }
}

fn has_identifier(doc: &Document, (name, value): (&str, &Bson)) -> bool {
    doc.get(name).is_some_and(|v| bson_eq(v, value))
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records stored in `collection`.
    #[must_use]
    pub fn len(&self, collection: &str) -> usize {
        self.collections.read().get(collection).map_or(0, Vec::len)
    }

    #[must_use]
    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }

    /// Copy of the raw records in `collection`, in insertion order.
    #[must_use]
    pub fn snapshot(&self, collection: &str) -> Vec<Document> {
        self.collections.read().get(collection).cloned().unwrap_or_default()
    }

    #[must_use]
    pub fn collection_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.collections.read().keys().cloned().collect();
        names.sort();
        names
    }
}

#[async_trait]
impl StoreBackend for MemoryBackend {
    async fn create_document(
        &self,
        collection: &str,
        identifier: &Document,
        document: &Document,
    ) -> Result<bool, BackendError> {
        let id = identifier_entry(identifier)?;
        let mut collections = self.collections.write();
        let docs = collections.entry(collection.to_string()).or_default();
        if docs.iter().any(|d| has_identifier(d, id)) {
            return Ok(false);
        }
        docs.push(document.clone());
        Ok(true)
    }

    async fn read_document(
        &self,
        collection: &str,
        identifier: &Document,
        projection: &Projection,
    ) -> Result<Option<Document>, BackendError> {
        let id = identifier_entry(identifier)?;
        let collections = self.collections.read();
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.iter().find(|d| has_identifier(d, id)))
            .map(|d| projection.apply(d)))
    }

    async fn update_document(
        &self,
        collection: &str,
        identifier: &Document,
        patch: &DocumentPatch,
    ) -> Result<bool, BackendError> {
        let id = identifier_entry(identifier)?;
        let mut collections = self.collections.write();
        let Some(doc) = collections
            .get_mut(collection)
            .and_then(|docs| docs.iter_mut().find(|d| has_identifier(d, id)))
        else {
            return Ok(false);
        };
        patch.apply(doc);
        Ok(true)
    }

    async fn delete_document(
        &self,
        collection: &str,
        identifier: &Document,
    ) -> Result<bool, BackendError> {
        let id = identifier_entry(identifier)?;
        let mut collections = self.collections.write();
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(false);
        };
        let before = docs.len();
        docs.retain(|d| !has_identifier(d, id));
        Ok(docs.len() != before)
    }

    async fn find_documents(
        &self,
        collection: &str,
        expressions: &[Expression],
        projection: &Projection,
        params: &FindParams,
    ) -> Result<Vec<Document>, BackendError> {
        let collections = self.collections.read();
        let Some(docs) = collections.get(collection) else {
            return Ok(Vec::new());
        };
        let mut hits: Vec<&Document> =
            docs.iter().filter(|d| matches_document(d, expressions)).collect();
        if !params.sort.is_empty() {
            hits.sort_by(|a, b| compare_docs(a, b, &params.sort));
        }
        log::trace!("find on '{collection}': {} of {} matched", hits.len(), docs.len());
        Ok(hits
            .into_iter()
            .skip(params.skip)
            .take(params.limit.unwrap_or(usize::MAX))
            .map(|d| projection.apply(d))
            .collect())
    }

    async fn count_documents(
        &self,
        collection: &str,
        expressions: &[Expression],
    ) -> Result<u64, BackendError> {
        let collections = self.collections.read();
        let n = collections
            .get(collection)
            .map_or(0, |docs| docs.iter().filter(|d| matches_document(d, expressions)).count());
        Ok(u64::try_from(n).unwrap_or(u64::MAX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::build_document_patch;
    use crate::store::SortSpec;
    use bson::doc;

    #[tokio::test]
    async fn create_rejects_existing_identifier() {
        let backend = MemoryBackend::new();
        let id = doc! {"id": "m1"};
        assert!(backend.create_document("movies", &id, &doc! {"id": "m1"}).await.unwrap());
        assert!(!backend.create_document("movies", &id, &doc! {"id": "m1", "x": 1}).await.unwrap());
        assert_eq!(backend.len("movies"), 1);
    }

    #[tokio::test]
    async fn update_overlays_patch() {
        let backend = MemoryBackend::new();
        let id = doc! {"id": "m1"};
        backend
            .create_document("movies", &id, &doc! {"id": "m1", "title": "Alien", "year": 1979})
            .await
            .unwrap();
        let patch = build_document_patch(&doc! {"title": "Aliens", "year": Bson::Undefined});
        assert!(backend.update_document("movies", &id, &patch).await.unwrap());
        assert_eq!(backend.snapshot("movies"), vec![doc! {"id": "m1", "title": "Aliens"}]);
        let missing = doc! {"id": "nope"};
        assert!(!backend.update_document("movies", &missing, &patch).await.unwrap());
    }

    #[tokio::test]
    async fn find_sorts_then_pages() {
        let backend = MemoryBackend::new();
        for (id, year) in [("a", 1986), ("b", 1979), ("c", 1992)] {
            backend
                .create_document("movies", &doc! {"id": id}, &doc! {"id": id, "year": year})
                .await
                .unwrap();
        }
        let params = FindParams { sort: vec![SortSpec::asc("year")], skip: 1, limit: Some(1) };
        let found = backend
            .find_documents("movies", &[], &Projection::Paths(vec!["id".into()]), &params)
            .await
            .unwrap();
        assert_eq!(found, vec![doc! {"id": "a"}]);
        assert_eq!(backend.count_documents("movies", &[]).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn malformed_identifier_is_a_backend_error() {
        let backend = MemoryBackend::new();
        assert!(backend.delete_document("movies", &doc! {}).await.is_err());
        assert!(!backend.delete_document("movies", &doc! {"id": 1}).await.unwrap());
    }
}
