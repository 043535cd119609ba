use thiserror::Error;

/// Opaque error raised by a storage backend. The store passes it through untouched.
pub type BackendError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Invalid query shape: {0}")]
    InvalidQueryShape(String),

    #[error("Unsupported root operator '{operator}' in {query} (only $and, $or and $nor are allowed)")]
    UnsupportedRootOperator { operator: String, query: String },

    #[error("Unknown operator '{operator}' in {query}")]
    UnknownOperator { operator: String, query: String },

    #[error("Operator '{operator}' expects a plain value, got an object in {query}")]
    UnexpectedObjectValue { operator: String, query: String },

    #[error("Operator '{operator}' expects an array value in {query}")]
    ExpectedArrayValue { operator: String, query: String },

    #[error("Query nesting exceeds the maximum depth of {0}")]
    QueryTooDeep(usize),

    #[error("Invalid attribute selector: {0}")]
    InvalidAttributeSelector(String),

    #[error("Invalid sort: {0}")]
    InvalidSort(String),

    #[error("Invalid options: {0}")]
    InvalidOptions(String),

    #[error("Missing identifier for storable '{0}'")]
    MissingIdentifier(String),

    #[error("Storable not registered: {0}")]
    UnknownStorable(String),

    #[error("Storable already registered: {0}")]
    DuplicateStorable(String),

    #[error("Document not found in store (collection: '{collection}', identifier: {identifier})")]
    MissingFromStore { collection: String, identifier: String },

    #[error("Document already exists in store (collection: '{collection}', identifier: {identifier})")]
    AlreadyExistsInStore { collection: String, identifier: String },

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serde JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Backend(BackendError),
}

impl StoreError {
    /// Stable machine-readable code, suitable for mapping onto API status codes.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidQueryShape(_) => "INVALID_QUERY_SHAPE",
            Self::UnsupportedRootOperator { .. } => "UNSUPPORTED_ROOT_OPERATOR",
            Self::UnknownOperator { .. } => "UNKNOWN_OPERATOR",
            Self::UnexpectedObjectValue { .. } => "UNEXPECTED_OBJECT_VALUE",
            Self::ExpectedArrayValue { .. } => "EXPECTED_ARRAY_VALUE",
            Self::QueryTooDeep(_) => "QUERY_TOO_DEEP",
            Self::InvalidAttributeSelector(_) => "INVALID_ATTRIBUTE_SELECTOR",
            Self::InvalidSort(_) => "INVALID_SORT",
            Self::InvalidOptions(_) => "INVALID_OPTIONS",
            Self::MissingIdentifier(_) => "MISSING_IDENTIFIER",
            Self::UnknownStorable(_) => "UNKNOWN_STORABLE",
            Self::DuplicateStorable(_) => "DUPLICATE_STORABLE",
            Self::MissingFromStore { .. } => "MISSING_FROM_STORE",
            Self::AlreadyExistsInStore { .. } => "ALREADY_EXISTS_IN_STORE",
            Self::Codec(_) => "CODEC",
            Self::Config(_) => "CONFIG",
            Self::Io(_) => "IO",
            Self::Json(_) => "JSON",
            Self::Toml(_) => "TOML",
            Self::Backend(_) => "BACKEND",
        }
    }

    /// Errors caused by a malformed request. These are never worth retrying.
    #[must_use]
    pub const fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidQueryShape(_)
                | Self::UnsupportedRootOperator { .. }
                | Self::UnknownOperator { .. }
                | Self::UnexpectedObjectValue { .. }
                | Self::ExpectedArrayValue { .. }
                | Self::QueryTooDeep(_)
                | Self::InvalidAttributeSelector(_)
                | Self::InvalidSort(_)
                | Self::InvalidOptions(_)
                | Self::MissingIdentifier(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        let e = StoreError::MissingFromStore { collection: "Movie".into(), identifier: "{ \"id\": \"abc\" }".into() };
        assert_eq!(e.code(), "MISSING_FROM_STORE");
        assert!(!e.is_caller_error());
        let e = StoreError::InvalidQueryShape("{ \"a\": 1, \"$in\": [] }".into());
        assert_eq!(e.code(), "INVALID_QUERY_SHAPE");
        assert!(e.is_caller_error());
    }

    #[test]
    fn backend_errors_pass_through() {
        let inner: BackendError = "connection reset".into();
        let e = StoreError::Backend(inner);
        assert_eq!(e.to_string(), "connection reset");
    }
}
