use crate::errors::BackendError;
use crate::patch::DocumentPatch;
use crate::projection::Projection;
use crate::query::Expression;
use async_trait::async_trait;
use bson::Document;

use super::options::FindParams;

/// The six document operations a storage backend provides.
///
/// `identifier` is always a single-entry document such as `{"id": "abc"}`. Booleans report
/// whether the operation took effect: `create_document` returns `false` when a record with
/// the identifier already exists; `update_document` and `delete_document` return `false`
/// when it does not.
#[async_trait]
pub trait StoreBackend: Send + Sync {
    async fn create_document(
        &self,
        collection: &str,
        identifier: &Document,
        document: &Document,
    ) -> Result<bool, BackendError>;

    async fn read_document(
        &self,
        collection: &str,
        identifier: &Document,
        projection: &Projection,
    ) -> Result<Option<Document>, BackendError>;

    async fn update_document(
        &self,
        collection: &str,
        identifier: &Document,
        patch: &DocumentPatch,
    ) -> Result<bool, BackendError>;

    async fn delete_document(
        &self,
        collection: &str,
        identifier: &Document,
    ) -> Result<bool, BackendError>;

    async fn find_documents(
        &self,
        collection: &str,
        expressions: &[Expression],
        projection: &Projection,
        params: &FindParams,
    ) -> Result<Vec<Document>, BackendError>;

    async fn count_documents(
        &self,
        collection: &str,
        expressions: &[Expression],
    ) -> Result<u64, BackendError>;
}
