//! Attribute selectors: which attributes (and nested attributes) an operation touches.

use crate::errors::StoreError;
use bson::{Bson, Document};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AttributeSelector {
    /// Everything reachable, recursively.
    #[default]
    All,
    /// Nothing at all.
    Nothing,
    /// The listed attributes, each with its own sub-selection. Insertion ordered.
    /// An empty list selects the attribute itself but none of its sub-attributes.
    Fields(Vec<(String, AttributeSelector)>),
}

impl AttributeSelector {
    /// Normalize a raw selector into the canonical tree.
    ///
    /// Accepted shapes: a boolean, an array of attribute names (dotted names nest), or a
    /// document whose values are themselves raw selectors. `false` entries are dropped.
    ///
    /// # Errors
    /// Returns `InvalidAttributeSelector` for any other shape.
    pub fn normalize(raw: &Bson) -> Result<Self, StoreError> {
        match raw {
            Bson::Boolean(true) => Ok(Self::All),
            Bson::Boolean(false) => Ok(Self::Nothing),
            Bson::Array(names) => {
                let mut out = Self::Fields(Vec::new());
                for name in names {
                    let Bson::String(name) = name else {
                        return Err(StoreError::InvalidAttributeSelector(format!(
                            "expected an attribute name, got {name}"
                        )));
                    };
                    out = out.merge(Self::path(name, Self::All)?);
                }
                Ok(out)
            }
            Bson::Document(doc) => {
                let mut out = Self::Fields(Vec::new());
                for (name, sub) in doc {
                    let sub = Self::normalize(sub)?;
                    if sub.is_nothing() {
                        continue;
                    }
                    out = out.merge(Self::path(name, sub)?);
                }
                Ok(out)
            }
            other => Err(StoreError::InvalidAttributeSelector(format!(
                "expected a boolean, an array or a document, got {other}"
            ))),
        }
    }

    /// Selector for a list of top-level (or dotted) attribute names.
    ///
    /// # Errors
    /// Returns `InvalidAttributeSelector` if a name is empty.
    pub fn from_names<I, S>(names: I) -> Result<Self, StoreError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names
            .into_iter()
            .try_fold(Self::Fields(Vec::new()), |acc, n| Ok(acc.merge(Self::path(n.as_ref(), Self::All)?)))
    }

    fn path(dotted: &str, leaf: Self) -> Result<Self, StoreError> {
        if dotted.is_empty() || dotted.split('.').any(str::is_empty) {
            return Err(StoreError::InvalidAttributeSelector(format!(
                "invalid attribute name '{dotted}'"
            )));
        }
        Ok(dotted
            .rsplit('.')
            .fold(leaf, |acc, seg| Self::Fields(vec![(seg.to_string(), acc)])))
    }

    /// Union of two selectors.
    #[must_use]
    pub fn merge(self, other: Self) -> Self {
        match (self, other) {
            (Self::All, _) | (_, Self::All) => Self::All,
            (Self::Nothing, x) | (x, Self::Nothing) => x,
            (Self::Fields(mut a), Self::Fields(b)) => {
                for (name, sub) in b {
                    if let Some(pos) = a.iter().position(|(n, _)| *n == name) {
                        let (_, existing) = a.remove(pos);
                        a.insert(pos, (name, existing.merge(sub)));
                    } else {
                        a.push((name, sub));
                    }
                }
                Self::Fields(a)
            }
        }
    }

    #[must_use]
    pub const fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }

    #[must_use]
    pub const fn is_nothing(&self) -> bool {
        matches!(self, Self::Nothing)
    }

    /// Sub-selection for one attribute.
    #[must_use]
    pub fn get(&self, name: &str) -> Self {
        match self {
            Self::All => Self::All,
            Self::Nothing => Self::Nothing,
            Self::Fields(fields) => fields
                .iter()
                .find(|(n, _)| n == name)
                .map_or(Self::Nothing, |(_, s)| s.clone()),
        }
    }

    /// Rebuild with `name` fully selected.
    #[must_use]
    pub fn include(&self, name: &str) -> Self {
        match self {
            Self::All => Self::All,
            Self::Nothing => Self::Fields(vec![(name.to_string(), Self::All)]),
            Self::Fields(_) => {
                self.clone().merge(Self::Fields(vec![(name.to_string(), Self::All)]))
            }
        }
    }

    #[must_use]
    pub fn to_bson(&self) -> Bson {
        match self {
            Self::All => Bson::Boolean(true),
            Self::Nothing => Bson::Boolean(false),
            Self::Fields(fields) => {
                let mut doc = Document::new();
                for (name, sub) in fields {
                    doc.insert(name.clone(), sub.to_bson());
                }
                Bson::Document(doc)
            }
        }
    }
}

/// The subset of `document` selected by `selector`.
///
/// Top-level attributes named in `include_attribute_names` are kept whatever the selector
/// says, so identifiers survive any projection.
#[must_use]
pub fn pick(
    document: &Document,
    selector: &AttributeSelector,
    include_attribute_names: &[String],
) -> Document {
    if selector.is_all() {
        return document.clone();
    }
    let mut out = Document::new();
    for (name, value) in document {
        let sub = selector.get(name);
        if !sub.is_nothing() {
            out.insert(name.clone(), pick_value(value, &sub));
        } else if include_attribute_names.iter().any(|n| n == name) {
            out.insert(name.clone(), value.clone());
        }
    }
    out
}

fn pick_value(value: &Bson, selector: &AttributeSelector) -> Bson {
    match (value, selector) {
        (_, AttributeSelector::All) => value.clone(),
        (Bson::Document(d), _) => Bson::Document(pick(d, selector, &[])),
        (Bson::Array(items), _) => {
            Bson::Array(items.iter().map(|v| pick_value(v, selector)).collect())
        }
        _ => value.clone(),
    }
}
