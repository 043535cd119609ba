//! Sparse-update patches: assign and remove operations derived from a serialized document.

use bson::{Bson, Document};

#[derive(Debug, Default, Clone, PartialEq)]
pub struct DocumentPatch {
    pub set: Vec<(String, Bson)>,
    pub unset: Vec<String>,
}

impl DocumentPatch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.unset.is_empty()
    }

    /// Mongo-style `{"$set": {...}, "$unset": {...}}` rendering.
    #[must_use]
    pub fn to_document(&self) -> Document {
        let mut set = Document::new();
        for (k, v) in &self.set {
            set.insert(k.clone(), v.clone());
        }
        let mut unset = Document::new();
        for k in &self.unset {
            unset.insert(k.clone(), Bson::Boolean(true));
        }
        let mut out = Document::new();
        if !set.is_empty() {
            out.insert("$set", set);
        }
        if !unset.is_empty() {
            out.insert("$unset", unset);
        }
        out
    }

    /// Apply assignments then removals to `doc`. Returns whether anything changed.
    pub fn apply(&self, doc: &mut Document) -> bool {
        let mut changed = false;
        for (k, v) in &self.set {
            if set_path(doc, k, v.clone()) {
                changed = true;
            }
        }
        for k in &self.unset {
            if unset_path(doc, k) {
                changed = true;
            }
        }
        changed
    }
}

/// Derive a patch from a sparse serialized document.
///
/// `Bson::Undefined` marks a field for removal. A nested document that directly carries an
/// undefined marker is patched field by field; any other nested document replaces the
/// stored value whole.
#[must_use]
pub fn build_document_patch(document: &Document) -> DocumentPatch {
    let mut patch = DocumentPatch::default();
    build(document, "", &mut patch);
    patch
}

fn build(document: &Document, prefix: &str, patch: &mut DocumentPatch) {
    for (name, value) in document {
        let path = if prefix.is_empty() { name.clone() } else { format!("{prefix}.{name}") };
        match value {
            Bson::Undefined => patch.unset.push(path),
            Bson::Document(sub) if marks_fields(sub) => build(sub, &path, patch),
            other => patch.set.push((path, strip_value(other))),
        }
    }
}

fn marks_fields(doc: &Document) -> bool {
    doc.values().any(|v| matches!(v, Bson::Undefined))
}

/// Remove undefined-valued fields, recursively.
#[must_use]
pub fn strip_undefined(document: &Document) -> Document {
    document
        .iter()
        .filter(|(_, v)| !matches!(v, Bson::Undefined))
        .map(|(k, v)| (k.clone(), strip_value(v)))
        .collect()
}

fn strip_value(value: &Bson) -> Bson {
    match value {
        Bson::Document(d) => Bson::Document(strip_undefined(d)),
        Bson::Array(items) => Bson::Array(
            items.iter().filter(|v| !matches!(v, Bson::Undefined)).map(strip_value).collect(),
        ),
        other => other.clone(),
    }
}

/// Assign at a dotted path. Missing or non-document intermediates become documents.
fn set_path(doc: &mut Document, path: &str, value: Bson) -> bool {
    let Some((head, rest)) = path.split_once('.') else {
        let changed = doc.get(path) != Some(&value);
        doc.insert(path.to_string(), value);
        return changed;
    };
    let created = !matches!(doc.get(head), Some(Bson::Document(_)));
    if created {
        doc.insert(head.to_string(), Document::new());
    }
    let Some(Bson::Document(sub)) = doc.get_mut(head) else {
        return created;
    };
    set_path(sub, rest, value) || created
}

fn unset_path(doc: &mut Document, path: &str) -> bool {
    match path.split_once('.') {
        None => doc.remove(path).is_some(),
        Some((head, rest)) => match doc.get_mut(head) {
            Some(Bson::Document(sub)) => unset_path(sub, rest),
            _ => false,
        },
    }
}
