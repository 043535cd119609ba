//! In-process [`StoreBackend`](crate::store::StoreBackend) used for tests and embedding.

pub mod backend;
pub mod eval;

pub use backend::MemoryBackend;
pub use eval::{compare_docs, matches_document};
