//! Query compilation and document projection for a document store.
//!
//! Callers describe records with plain BSON documents: nested attribute queries, attribute
//! selectors and sparse updates. The [`Store`] facade turns them into backend-neutral
//! [`Expression`]s, [`Projection`]s and [`DocumentPatch`]es and hands those to a
//! [`StoreBackend`]. [`MemoryBackend`] is a complete in-process backend.

pub mod config;
pub mod errors;
pub mod logger;
pub mod memory;
pub mod patch;
pub mod projection;
pub mod query;
pub mod selector;
pub mod store;

pub use config::StoreConfig;
pub use errors::{BackendError, StoreError};
pub use memory::MemoryBackend;
pub use patch::{DocumentPatch, build_document_patch};
pub use projection::{Projection, build_projection};
pub use query::{Expression, ExpressionValue, Operator, OperatorRegistry, QueryCompiler};
pub use selector::{AttributeSelector, pick};
pub use store::{
    DeleteOptions, FindOptions, LoadOptions, SaveOptions, SortSpec, StorableType, Store,
    StoreBackend, TraceCollector,
};

/// Initializes logging from the `DOCSTORE_LOG_*` environment variables.
///
/// # Errors
/// Returns an error if the log directory cannot be created or a logger is already set.
pub fn init() -> Result<(), Box<dyn std::error::Error>> {
    logger::configure_from_env()?;
    Ok(())
}
