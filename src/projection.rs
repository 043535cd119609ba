//! Storage-engine projections derived from attribute selectors.

use crate::selector::AttributeSelector;
use bson::{Bson, Document};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    /// No restriction: the backend returns every field.
    Unrestricted,
    /// Only these dotted paths are returned. Empty selects nothing.
    Paths(Vec<String>),
}

impl Projection {
    #[must_use]
    pub const fn is_unrestricted(&self) -> bool {
        matches!(self, Self::Unrestricted)
    }

    #[must_use]
    pub fn paths(&self) -> &[String] {
        match self {
            Self::Unrestricted => &[],
            Self::Paths(p) => p,
        }
    }

    /// Rebuild with extra paths included. An unrestricted projection stays unrestricted.
    #[must_use]
    pub fn with_paths<I, S>(&self, extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        match self {
            Self::Unrestricted => Self::Unrestricted,
            Self::Paths(p) => {
                let mut out = p.clone();
                for path in extra {
                    let path = path.into();
                    if !out.contains(&path) {
                        out.push(path);
                    }
                }
                Self::Paths(out)
            }
        }
    }

    /// `{path: true, ...}`, or `None` when unrestricted.
    #[must_use]
    pub fn to_document(&self) -> Option<Document> {
        match self {
            Self::Unrestricted => None,
            Self::Paths(p) => Some(p.iter().map(|k| (k.clone(), Bson::Boolean(true))).collect()),
        }
    }

    /// Restrict `document` to the projected paths.
    #[must_use]
    pub fn apply(&self, document: &Document) -> Document {
        let Self::Paths(paths) = self else {
            return document.clone();
        };
        let mut out = Document::new();
        for path in paths {
            copy_path(document, &mut out, path);
        }
        out
    }
}

fn copy_path(src: &Document, dst: &mut Document, path: &str) {
    let (head, rest) = match path.split_once('.') {
        Some((h, r)) => (h, Some(r)),
        None => (path, None),
    };
    let Some(value) = src.get(head) else {
        return;
    };
    match (rest, value) {
        (None, v) => {
            dst.insert(head.to_string(), v.clone());
        }
        (Some(rest), Bson::Document(sub)) => {
            if !matches!(dst.get(head), Some(Bson::Document(_))) {
                dst.insert(head.to_string(), Document::new());
            }
            if let Some(Bson::Document(target)) = dst.get_mut(head) {
                copy_path(sub, target, rest);
            }
        }
        (Some(rest), Bson::Array(items)) => {
            let existing = match dst.get(head) {
                Some(Bson::Array(a)) if a.len() == items.len() => a.clone(),
                _ => vec![Bson::Document(Document::new()); items.len()],
            };
            let merged = items
                .iter()
                .zip(existing)
                .map(|(item, acc)| match (item, acc) {
                    (Bson::Document(sub), Bson::Document(mut target)) => {
                        copy_path(sub, &mut target, rest);
                        Bson::Document(target)
                    }
                    (other, _) => other.clone(),
                })
                .collect::<Vec<_>>();
            dst.insert(head.to_string(), Bson::Array(merged));
        }
        // nothing below a scalar
        (Some(_), _) => {}
    }
}

/// Convert a normalized selector into a flat projection.
#[must_use]
pub fn build_projection(selector: &AttributeSelector) -> Projection {
    match selector {
        AttributeSelector::All => Projection::Unrestricted,
        AttributeSelector::Nothing => Projection::Paths(Vec::new()),
        AttributeSelector::Fields(_) => {
            let mut paths = Vec::new();
            collect_paths(selector, "", &mut paths);
            Projection::Paths(paths)
        }
    }
}

fn collect_paths(selector: &AttributeSelector, prefix: &str, out: &mut Vec<String>) {
    let AttributeSelector::Fields(fields) = selector else {
        return;
    };
    for (name, sub) in fields {
        let path = if prefix.is_empty() { name.clone() } else { format!("{prefix}.{name}") };
        match sub {
            AttributeSelector::All => out.push(path),
            AttributeSelector::Nothing => {}
            AttributeSelector::Fields(children) if children.is_empty() => out.push(path),
            AttributeSelector::Fields(_) => collect_paths(sub, &path, out),
        }
    }
}
