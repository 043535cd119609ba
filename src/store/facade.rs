use crate::config::StoreConfig;
use crate::errors::StoreError;
use crate::logger::AUDIT_TARGET;
use crate::patch::{build_document_patch, strip_undefined};
use crate::projection::{Projection, build_projection};
use crate::query::QueryCompiler;
use crate::selector::{AttributeSelector, pick};
use bson::{Bson, Document, doc};
use std::sync::Arc;

use super::backend::StoreBackend;
use super::codec::{DocumentCodec, PlainCodec, from_document, to_document};
use super::options::{DeleteOptions, FindOptions, FindParams, LoadOptions, SaveOptions, SortSpec};
use super::registry::{StorableRegistry, StorableType};
use super::trace::TraceCollector;

/// Coordinates query compilation, projection and patching around a storage backend.
pub struct Store {
    backend: Arc<dyn StoreBackend>,
    codec: Arc<dyn DocumentCodec>,
    compiler: QueryCompiler,
    storables: StorableRegistry,
    max_limit: usize,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("storables", &self.storables.names())
            .field("max_limit", &self.max_limit)
            .finish_non_exhaustive()
    }
}

fn backend_error(operation: &str, collection: &str, e: crate::errors::BackendError) -> StoreError {
    log::warn!("backend {operation} on '{collection}' failed: {e}");
    StoreError::Backend(e)
}

impl Store {
    #[must_use]
    pub fn new(backend: Arc<dyn StoreBackend>) -> Self {
        Self {
            backend,
            codec: Arc::new(PlainCodec),
            compiler: QueryCompiler::default(),
            storables: StorableRegistry::default(),
            max_limit: StoreConfig::default().max_limit,
        }
    }

    /// # Errors
    /// Returns a `Config` error if the configured operators are inconsistent.
    pub fn with_config(backend: Arc<dyn StoreBackend>, config: &StoreConfig) -> Result<Self, StoreError> {
        Ok(Self {
            compiler: QueryCompiler::from_config(config)?,
            max_limit: config.max_limit,
            ..Self::new(backend)
        })
    }

    #[must_use]
    pub fn with_codec(mut self, codec: Arc<dyn DocumentCodec>) -> Self {
        self.codec = codec;
        self
    }

    #[must_use]
    pub const fn compiler(&self) -> &QueryCompiler {
        &self.compiler
    }

    /// # Errors
    /// See [`StorableRegistry::register`].
    pub fn register_storable(&self, storable: StorableType) -> Result<(), StoreError> {
        self.storables.register(storable)
    }

    /// # Errors
    /// Returns `UnknownStorable` if the name was never registered.
    pub fn storable(&self, name: &str) -> Result<StorableType, StoreError> {
        self.storables.get(name)
    }

    /// Record every operation made through the returned view into `collector`.
    #[must_use]
    pub const fn traced<'a>(&'a self, collector: &'a TraceCollector) -> TracedStore<'a> {
        TracedStore { store: self, collector }
    }

    fn projection_for(ty: &StorableType, selector: &AttributeSelector) -> Projection {
        build_projection(selector).with_paths(ty.identifiers.iter().cloned())
    }

    fn shape_result(
        &self,
        ty: &StorableType,
        selector: &AttributeSelector,
        document: &Document,
    ) -> Result<Document, StoreError> {
        let document = from_document(self.codec.as_ref(), document)?;
        Ok(pick(&document, selector, &ty.identifiers))
    }

    /// Load one record by identifier.
    ///
    /// # Errors
    /// `MissingFromStore` when absent and `throw_if_missing` is set; caller and backend
    /// errors otherwise.
    pub async fn load(
        &self,
        storable: &str,
        identifier: &Document,
        options: &LoadOptions,
    ) -> Result<Option<Document>, StoreError> {
        let ty = self.storable(storable)?;
        let identifier = to_document(self.codec.as_ref(), &ty.identifier_of(identifier)?)?;
        let projection = Self::projection_for(&ty, &options.attribute_selector);
        let found = self
            .backend
            .read_document(&ty.collection, &identifier, &projection)
            .await
            .map_err(|e| backend_error("read", &ty.collection, e))?;
        match found {
            Some(document) => {
                Ok(Some(self.shape_result(&ty, &options.attribute_selector, &document)?))
            }
            None if options.throw_if_missing => Err(StoreError::MissingFromStore {
                collection: ty.collection,
                identifier: identifier.to_string(),
            }),
            None => Ok(None),
        }
    }

    /// Create (`is_new`) or patch an existing record. Returns whether the backend wrote it.
    ///
    /// # Errors
    /// `InvalidOptions` for contradictory throw flags, `AlreadyExistsInStore` /
    /// `MissingFromStore` per the resolved flags, caller and backend errors otherwise.
    pub async fn save(
        &self,
        storable: &str,
        document: &Document,
        options: &SaveOptions,
    ) -> Result<bool, StoreError> {
        let (throw_if_missing, throw_if_exists) = options.resolve()?;
        let ty = self.storable(storable)?;
        let serialized = to_document(self.codec.as_ref(), document)?;
        let identifier = ty.identifier_of(&serialized)?;

        if options.is_new {
            let record = strip_undefined(&serialized);
            let created = self
                .backend
                .create_document(&ty.collection, &identifier, &record)
                .await
                .map_err(|e| backend_error("create", &ty.collection, e))?;
            if !created && throw_if_exists {
                return Err(StoreError::AlreadyExistsInStore {
                    collection: ty.collection,
                    identifier: identifier.to_string(),
                });
            }
            log::info!(target: AUDIT_TARGET, "create {} {} -> {}", ty.collection, identifier, created);
            return Ok(created);
        }

        let mut changes = serialized;
        for key in identifier.keys() {
            changes.remove(key);
        }
        let patch = build_document_patch(&changes);
        let updated = self
            .backend
            .update_document(&ty.collection, &identifier, &patch)
            .await
            .map_err(|e| backend_error("update", &ty.collection, e))?;
        if !updated && throw_if_missing {
            return Err(StoreError::MissingFromStore {
                collection: ty.collection,
                identifier: identifier.to_string(),
            });
        }
        log::info!(
            target: AUDIT_TARGET,
            "update {} {} set={} unset={} -> {}",
            ty.collection,
            identifier,
            patch.set.len(),
            patch.unset.len(),
            updated
        );
        Ok(updated)
    }

    /// Delete one record by identifier. Returns whether a record was removed.
    ///
    /// # Errors
    /// `MissingFromStore` when absent and `throw_if_missing` is set.
    pub async fn delete(
        &self,
        storable: &str,
        identifier: &Document,
        options: &DeleteOptions,
    ) -> Result<bool, StoreError> {
        let ty = self.storable(storable)?;
        let identifier = to_document(self.codec.as_ref(), &ty.identifier_of(identifier)?)?;
        let deleted = self
            .backend
            .delete_document(&ty.collection, &identifier)
            .await
            .map_err(|e| backend_error("delete", &ty.collection, e))?;
        if !deleted && options.throw_if_missing {
            return Err(StoreError::MissingFromStore {
                collection: ty.collection,
                identifier: identifier.to_string(),
            });
        }
        log::info!(target: AUDIT_TARGET, "delete {} {} -> {}", ty.collection, identifier, deleted);
        Ok(deleted)
    }

    /// Records matching `query`, shaped by the attribute selector.
    ///
    /// # Errors
    /// Query compilation errors and backend errors.
    pub async fn find(
        &self,
        storable: &str,
        query: &Document,
        options: &FindOptions,
    ) -> Result<Vec<Document>, StoreError> {
        let ty = self.storable(storable)?;
        let expressions = self.compiler.compile(&to_document(self.codec.as_ref(), query)?)?;
        let projection = Self::projection_for(&ty, &options.attribute_selector);
        let sort = to_document(self.codec.as_ref(), &SortSpec::to_document(&options.sort))?;
        let params = FindParams {
            sort: SortSpec::parse_document(&sort)?,
            skip: options.skip.unwrap_or(0),
            limit: Some(options.limit.unwrap_or(self.max_limit).min(self.max_limit)),
        };
        let documents = self
            .backend
            .find_documents(&ty.collection, &expressions, &projection, &params)
            .await
            .map_err(|e| backend_error("find", &ty.collection, e))?;
        documents
            .iter()
            .map(|d| self.shape_result(&ty, &options.attribute_selector, d))
            .collect()
    }

    /// Number of records matching `query`.
    ///
    /// # Errors
    /// Query compilation errors and backend errors.
    pub async fn count(&self, storable: &str, query: &Document) -> Result<u64, StoreError> {
        let ty = self.storable(storable)?;
        let expressions = self.compiler.compile(&to_document(self.codec.as_ref(), query)?)?;
        self.backend
            .count_documents(&ty.collection, &expressions)
            .await
            .map_err(|e| backend_error("count", &ty.collection, e))
    }
}

/// A [`Store`] view that appends every call to a caller-owned [`TraceCollector`].
#[derive(Debug, Clone, Copy)]
pub struct TracedStore<'a> {
    store: &'a Store,
    collector: &'a TraceCollector,
}

fn count_to_bson(n: u64) -> Bson {
    Bson::Int64(i64::try_from(n).unwrap_or(i64::MAX))
}

impl TracedStore<'_> {
    /// # Errors
    /// See [`Store::load`].
    pub async fn load(
        &self,
        storable: &str,
        identifier: &Document,
        options: &LoadOptions,
    ) -> Result<Option<Document>, StoreError> {
        let params = doc! {"storable": storable, "identifier": identifier.clone(), "options": options.to_bson()};
        let result = self.store.load(storable, identifier, options).await;
        self.collector.record(
            "load",
            params,
            result.as_ref().map(|d| d.clone().map_or(Bson::Null, Bson::Document)),
        );
        result
    }

    /// # Errors
    /// See [`Store::save`].
    pub async fn save(
        &self,
        storable: &str,
        document: &Document,
        options: &SaveOptions,
    ) -> Result<bool, StoreError> {
        let params = doc! {"storable": storable, "document": document.clone(), "options": options.to_bson()};
        let result = self.store.save(storable, document, options).await;
        self.collector.record("save", params, result.as_ref().map(|b| Bson::Boolean(*b)));
        result
    }

    /// # Errors
    /// See [`Store::delete`].
    pub async fn delete(
        &self,
        storable: &str,
        identifier: &Document,
        options: &DeleteOptions,
    ) -> Result<bool, StoreError> {
        let params = doc! {"storable": storable, "identifier": identifier.clone(), "options": options.to_bson()};
        let result = self.store.delete(storable, identifier, options).await;
        self.collector.record("delete", params, result.as_ref().map(|b| Bson::Boolean(*b)));
        result
    }

    /// # Errors
    /// See [`Store::find`].
    pub async fn find(
        &self,
        storable: &str,
        query: &Document,
        options: &FindOptions,
    ) -> Result<Vec<Document>, StoreError> {
        let params = doc! {"storable": storable, "query": query.clone(), "options": options.to_bson()};
        let result = self.store.find(storable, query, options).await;
        self.collector.record(
            "find",
            params,
            result.as_ref().map(|docs| Bson::Array(docs.iter().cloned().map(Bson::Document).collect())),
        );
        result
    }

    /// # Errors
    /// See [`Store::count`].
    pub async fn count(&self, storable: &str, query: &Document) -> Result<u64, StoreError> {
        let params = doc! {"storable": storable, "query": query.clone()};
        let result = self.store.count(storable, query).await;
        self.collector.record("count", params, result.as_ref().map(|n| count_to_bson(*n)));
        result
    }
}
