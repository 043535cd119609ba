use crate::errors::StoreError;
use bson::{Bson, Document};
use parking_lot::RwLock;
use std::collections::HashMap;

/// A named entity type the store knows how to persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorableType {
    pub name: String,
    pub collection: String,
    /// Identifier attributes; the first is the primary identifier.
    pub identifiers: Vec<String>,
}

impl StorableType {
    /// A type stored in a collection of the same name, identified by `id`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self { collection: name.clone(), name, identifiers: vec!["id".to_string()] }
    }

    #[must_use]
    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }

    #[must_use]
    pub fn with_identifiers<I, S>(mut self, identifiers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.identifiers = identifiers.into_iter().map(Into::into).collect();
        self
    }

    /// `{name: value}` for the first identifier attribute present in `document`.
    ///
    /// # Errors
    /// Returns `MissingIdentifier` when none is present with a usable value.
    pub fn identifier_of(&self, document: &Document) -> Result<Document, StoreError> {
        self.identifiers
            .iter()
            .find_map(|name| match document.get(name) {
                None | Some(Bson::Null | Bson::Undefined) => None,
                Some(v) => {
                    let mut id = Document::new();
                    id.insert(name.clone(), v.clone());
                    Some(id)
                }
            })
            .ok_or_else(|| StoreError::MissingIdentifier(self.name.clone()))
    }
}

/// Storable types by name. Populated at startup; lookups clone the entry out so no lock is
/// held across backend calls.
#[derive(Debug, Default)]
pub struct StorableRegistry {
    types: RwLock<HashMap<String, StorableType>>,
}

impl StorableRegistry {
    /// # Errors
    /// Returns `DuplicateStorable` if the name is taken, `Config` if no identifier is declared.
    pub fn register(&self, storable: StorableType) -> Result<(), StoreError> {
        if storable.identifiers.is_empty() {
            return Err(StoreError::Config(format!(
                "storable '{}' declares no identifier attribute",
                storable.name
            )));
        }
        let mut types = self.types.write();
        if types.contains_key(&storable.name) {
            return Err(StoreError::DuplicateStorable(storable.name));
        }
        log::debug!("registered storable '{}' -> '{}'", storable.name, storable.collection);
        types.insert(storable.name.clone(), storable);
        Ok(())
    }

    /// # Errors
    /// Returns `UnknownStorable` if the name was never registered.
    pub fn get(&self, name: &str) -> Result<StorableType, StoreError> {
        self.types
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::UnknownStorable(name.to_string()))
    }

    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.types.read().keys().cloned().collect();
        names.sort();
        names
    }
}
