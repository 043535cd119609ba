//! Diagnostic trace of store operations.
//!
//! A [`TraceCollector`] is owned by the caller and handed to `Store::traced`; only calls made
//! through the resulting `TracedStore` are recorded. Entries never influence control flow.

use crate::errors::StoreError;
use bson::{Bson, Document};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum TraceOutcome {
    Ok(Bson),
    Err { code: String, message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceEntry {
    pub operation: String,
    /// Deep copy of the parameters and options the operation was called with.
    pub params: Document,
    pub outcome: TraceOutcome,
}

impl TraceEntry {
    #[must_use]
    pub const fn is_err(&self) -> bool {
        matches!(self.outcome, TraceOutcome::Err { .. })
    }
}

/// Cheaply cloneable handle; clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct TraceCollector {
    entries: Arc<Mutex<Vec<TraceEntry>>>,
}

impl TraceCollector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record(&self, operation: &str, params: Document, outcome: Result<Bson, &StoreError>) {
        let outcome = match outcome {
            Ok(v) => TraceOutcome::Ok(v),
            Err(e) => TraceOutcome::Err { code: e.code().to_string(), message: e.to_string() },
        };
        self.entries.lock().push(TraceEntry { operation: operation.to_string(), params, outcome });
    }

    /// Snapshot of the entries recorded so far, in call order.
    #[must_use]
    pub fn entries(&self) -> Vec<TraceEntry> {
        self.entries.lock().clone()
    }

    /// Drain and return the recorded entries.
    #[must_use]
    pub fn take(&self) -> Vec<TraceEntry> {
        std::mem::take(&mut *self.entries.lock())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
