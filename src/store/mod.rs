//! The store facade and the contracts it coordinates: backends, codecs, storable types,
//! per-operation options and tracing.

pub mod backend;
pub mod codec;
pub mod facade;
pub mod options;
pub mod registry;
pub mod trace;

pub use backend::StoreBackend;
pub use codec::{DocumentCodec, PlainCodec};
pub use facade::{Store, TracedStore};
pub use options::{DeleteOptions, FindOptions, FindParams, LoadOptions, Order, SaveOptions, SortSpec};
pub use registry::{StorableRegistry, StorableType};
pub use trace::{TraceCollector, TraceEntry, TraceOutcome};
