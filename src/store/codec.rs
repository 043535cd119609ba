use crate::errors::StoreError;
use bson::{Bson, Document};

/// Converts values between their in-memory and wire-safe representations.
///
/// Round-tripping a value through `serialize` then `deserialize` must be lossless for every
/// value the store persists.
pub trait DocumentCodec: Send + Sync {
    fn serialize(&self, value: &Bson) -> Bson;
    fn deserialize(&self, value: &Bson) -> Bson;
}

/// Identity codec: values are already plain BSON.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainCodec;

impl DocumentCodec for PlainCodec {
    fn serialize(&self, value: &Bson) -> Bson {
        value.clone()
    }

    fn deserialize(&self, value: &Bson) -> Bson {
        value.clone()
    }
}

pub(crate) fn to_document(codec: &dyn DocumentCodec, doc: &Document) -> Result<Document, StoreError> {
    match codec.serialize(&Bson::Document(doc.clone())) {
        Bson::Document(d) => Ok(d),
        other => Err(StoreError::Codec(format!("serializer turned a document into {other}"))),
    }
}

pub(crate) fn from_document(codec: &dyn DocumentCodec, doc: &Document) -> Result<Document, StoreError> {
    match codec.deserialize(&Bson::Document(doc.clone())) {
        Bson::Document(d) => Ok(d),
        other => Err(StoreError::Codec(format!("deserializer turned a document into {other}"))),
    }
}
