use crate::errors::StoreError;
use crate::selector::AttributeSelector;
use bson::{Bson, Document, doc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Order {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: String,
    pub order: Order,
}

impl SortSpec {
    #[must_use]
    pub fn asc(field: impl Into<String>) -> Self {
        Self { field: field.into(), order: Order::Asc }
    }

    #[must_use]
    pub fn desc(field: impl Into<String>) -> Self {
        Self { field: field.into(), order: Order::Desc }
    }

    /// Parse `{field: 1 | -1 | "asc" | "desc", ...}`, keeping key order.
    ///
    /// # Errors
    /// Returns `InvalidSort` for any other direction value.
    pub fn parse_document(sort: &Document) -> Result<Vec<Self>, StoreError> {
        sort.iter()
            .map(|(field, dir)| {
                let order = match dir {
                    Bson::Int32(1) | Bson::Int64(1) => Order::Asc,
                    Bson::Int32(-1) | Bson::Int64(-1) => Order::Desc,
                    Bson::Double(d) if (*d - 1.0).abs() < f64::EPSILON => Order::Asc,
                    Bson::Double(d) if (*d + 1.0).abs() < f64::EPSILON => Order::Desc,
                    Bson::String(s) if s.eq_ignore_ascii_case("asc") => Order::Asc,
                    Bson::String(s) if s.eq_ignore_ascii_case("desc") => Order::Desc,
                    other => {
                        return Err(StoreError::InvalidSort(format!(
                            "direction for '{field}' must be 1, -1, \"asc\" or \"desc\", got {other}"
                        )));
                    }
                };
                Ok(Self { field: field.clone(), order })
            })
            .collect()
    }

    /// `{field: 1 | -1, ...}` in sort order.
    #[must_use]
    pub fn to_document(specs: &[Self]) -> Document {
        let mut d = Document::new();
        for s in specs {
            d.insert(s.field.clone(), if s.order == Order::Asc { 1 } else { -1 });
        }
        d
    }

    pub(crate) fn to_bson(specs: &[Self]) -> Bson {
        Bson::Document(Self::to_document(specs))
    }
}

/// Options for `Store::load`.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub attribute_selector: AttributeSelector,
    pub throw_if_missing: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self { attribute_selector: AttributeSelector::All, throw_if_missing: true }
    }
}

impl LoadOptions {
    pub(crate) fn to_bson(&self) -> Bson {
        Bson::Document(doc! {
            "attributeSelector": self.attribute_selector.to_bson(),
            "throwIfMissing": self.throw_if_missing,
        })
    }
}

/// Options for `Store::save`. Unset throw flags default from `is_new`.
#[derive(Debug, Clone, Default)]
pub struct SaveOptions {
    pub is_new: bool,
    pub throw_if_missing: Option<bool>,
    pub throw_if_exists: Option<bool>,
}

impl SaveOptions {
    #[must_use]
    pub fn new_record() -> Self {
        Self { is_new: true, ..Self::default() }
    }

    #[must_use]
    pub fn existing_record() -> Self {
        Self::default()
    }

    /// Resolved `(throw_if_missing, throw_if_exists)`.
    ///
    /// # Errors
    /// Returns `InvalidOptions` when both resolve to true.
    pub fn resolve(&self) -> Result<(bool, bool), StoreError> {
        let missing = self.throw_if_missing.unwrap_or(!self.is_new);
        let exists = self.throw_if_exists.unwrap_or(self.is_new);
        if missing && exists {
            return Err(StoreError::InvalidOptions(
                "'throw_if_missing' and 'throw_if_exists' cannot both be true".into(),
            ));
        }
        Ok((missing, exists))
    }

    pub(crate) fn to_bson(&self) -> Bson {
        let mut d = doc! {"isNew": self.is_new};
        if let Some(v) = self.throw_if_missing {
            d.insert("throwIfMissing", v);
        }
        if let Some(v) = self.throw_if_exists {
            d.insert("throwIfExists", v);
        }
        Bson::Document(d)
    }
}

/// Options for `Store::delete`.
#[derive(Debug, Clone)]
pub struct DeleteOptions {
    pub throw_if_missing: bool,
}

impl Default for DeleteOptions {
    fn default() -> Self {
        Self { throw_if_missing: true }
    }
}

impl DeleteOptions {
    pub(crate) fn to_bson(&self) -> Bson {
        Bson::Document(doc! {"throwIfMissing": self.throw_if_missing})
    }
}

/// Options for `Store::find`.
#[derive(Debug, Clone, Default)]
pub struct FindOptions {
    pub attribute_selector: AttributeSelector,
    pub sort: Vec<SortSpec>,
    pub skip: Option<usize>,
    pub limit: Option<usize>,
}

impl FindOptions {
    pub(crate) fn to_bson(&self) -> Bson {
        let mut d = doc! {
            "attributeSelector": self.attribute_selector.to_bson(),
            "sort": SortSpec::to_bson(&self.sort),
        };
        if let Some(skip) = self.skip {
            d.insert("skip", i64::try_from(skip).unwrap_or(i64::MAX));
        }
        if let Some(limit) = self.limit {
            d.insert("limit", i64::try_from(limit).unwrap_or(i64::MAX));
        }
        Bson::Document(d)
    }
}

/// Backend-agnostic paging and ordering handed to `StoreBackend::find_documents`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindParams {
    pub sort: Vec<SortSpec>,
    pub skip: usize,
    pub limit: Option<usize>,
}
