use crate::config::StoreConfig;
use crate::errors::StoreError;
use bson::{Bson, Document};
use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// Marker that distinguishes operator keys from attribute names.
pub const OPERATOR_MARKER: char = '$';

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Operator {
    Equal,
    NotEqual,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    In,
    NotIn,
    Includes,
    StartsWith,
    EndsWith,
    Matches,
    And,
    Or,
    Nor,
    Some,
    Every,
    Not,
    /// Backend-specific scalar operator, kept verbatim.
    Extension(String),
}

/// What an operator's value holds once compiled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// A plain value.
    Scalar,
    /// One nested expression list (`$some`, `$every`, `$not`).
    Nested,
    /// A list of nested expression lists (`$and`, `$or`, `$nor`).
    NestedList,
}

const BUILTINS: [Operator; 18] = [
    Operator::Equal,
    Operator::NotEqual,
    Operator::GreaterThan,
    Operator::GreaterThanOrEqual,
    Operator::LessThan,
    Operator::LessThanOrEqual,
    Operator::In,
    Operator::NotIn,
    Operator::Includes,
    Operator::StartsWith,
    Operator::EndsWith,
    Operator::Matches,
    Operator::And,
    Operator::Or,
    Operator::Nor,
    Operator::Some,
    Operator::Every,
    Operator::Not,
];

const BUILTIN_ALIASES: [(&str, Operator); 9] = [
    ("$eq", Operator::Equal),
    ("$ne", Operator::NotEqual),
    ("$gt", Operator::GreaterThan),
    ("$gte", Operator::GreaterThanOrEqual),
    ("$lt", Operator::LessThan),
    ("$lte", Operator::LessThanOrEqual),
    ("$nin", Operator::NotIn),
    ("$any", Operator::Some),
    ("$all", Operator::Every),
];

impl Operator {
    #[must_use]
    pub fn token(&self) -> &str {
        match self {
            Self::Equal => "$equal",
            Self::NotEqual => "$notEqual",
            Self::GreaterThan => "$greaterThan",
            Self::GreaterThanOrEqual => "$greaterThanOrEqual",
            Self::LessThan => "$lessThan",
            Self::LessThanOrEqual => "$lessThanOrEqual",
            Self::In => "$in",
            Self::NotIn => "$notIn",
            Self::Includes => "$includes",
            Self::StartsWith => "$startsWith",
            Self::EndsWith => "$endsWith",
            Self::Matches => "$matches",
            Self::And => "$and",
            Self::Or => "$or",
            Self::Nor => "$nor",
            Self::Some => "$some",
            Self::Every => "$every",
            Self::Not => "$not",
            Self::Extension(token) => token,
        }
    }

    #[must_use]
    pub const fn arity(&self) -> Arity {
        match self {
            Self::And | Self::Or | Self::Nor => Arity::NestedList,
            Self::Some | Self::Every | Self::Not => Arity::Nested,
            _ => Arity::Scalar,
        }
    }

    /// `$and`, `$or` and `$nor`: the only operators allowed at the root of a query.
    #[must_use]
    pub const fn is_combinator(&self) -> bool {
        matches!(self.arity(), Arity::NestedList)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// The set of operators a compiler accepts.
///
/// Built from the canonical operators plus aliases and backend extensions. Constructed once
/// and passed by reference; never mutated while queries are being compiled.
#[derive(Debug, Clone)]
pub struct OperatorRegistry {
    tokens: HashMap<String, Operator>,
    extensions: BTreeSet<String>,
}

impl Default for OperatorRegistry {
    fn default() -> Self {
        let mut tokens: HashMap<String, Operator> =
            BUILTINS.iter().map(|op| (op.token().to_string(), op.clone())).collect();
        for (alias, op) in BUILTIN_ALIASES {
            tokens.insert(alias.to_string(), op);
        }
        Self { tokens, extensions: BTreeSet::new() }
    }
}

impl OperatorRegistry {
    /// Registry with the aliases and extensions declared in `config`.
    ///
    /// # Errors
    /// Returns a `Config` error if an alias targets a token the registry does not know.
    pub fn from_config(config: &StoreConfig) -> Result<Self, StoreError> {
        let mut registry = Self::default();
        for token in &config.operator_extensions {
            registry = registry.with_extension(token);
        }
        for (alias, target) in &config.operator_aliases {
            registry = registry.with_alias(alias, target)?;
        }
        Ok(registry)
    }

    /// Accept `token` as a backend-specific scalar operator.
    #[must_use]
    pub fn with_extension(mut self, token: &str) -> Self {
        if !self.tokens.contains_key(token) {
            self.extensions.insert(token.to_string());
            self.tokens.insert(token.to_string(), Operator::Extension(token.to_string()));
        }
        self
    }

    /// Accept `alias` as another spelling of `target`.
    ///
    /// # Errors
    /// Returns a `Config` error if `target` is unknown.
    pub fn with_alias(mut self, alias: &str, target: &str) -> Result<Self, StoreError> {
        let op = self.tokens.get(target).cloned().ok_or_else(|| {
            StoreError::Config(format!("alias '{alias}' targets unknown operator '{target}'"))
        })?;
        self.tokens.insert(alias.to_string(), op);
        Ok(self)
    }

    /// Purely syntactic: does this key name an operator rather than an attribute?
    #[must_use]
    pub fn looks_like_operator(key: &str) -> bool {
        key.starts_with(OPERATOR_MARKER)
    }

    /// The operator a token stands for, without looking at any value.
    #[must_use]
    pub fn resolve(&self, token: &str) -> Option<Operator> {
        self.tokens.get(token).cloned()
    }

    #[must_use]
    pub fn extensions(&self) -> impl Iterator<Item = &str> {
        self.extensions.iter().map(String::as_str)
    }

    /// Operator used when a value is given without one.
    #[must_use]
    pub fn default_operator(value: &Bson) -> Operator {
        match value {
            Bson::Array(_) => Operator::In,
            _ => Operator::Equal,
        }
    }

    /// Map a caller-supplied token to the operator actually compiled, given the value's shape.
    ///
    /// `$not` over a plain value means `$notEqual` (or `$notIn` for an array), and
    /// `$in`/`$notIn` over a non-array mean `$equal`/`$notEqual`.
    ///
    /// # Errors
    /// Returns `UnknownOperator` naming the token and the enclosing `query`.
    pub fn normalize(
        &self,
        token: &str,
        value: &Bson,
        query: &Document,
    ) -> Result<Operator, StoreError> {
        let op = self.resolve(token).ok_or_else(|| StoreError::UnknownOperator {
            operator: token.to_string(),
            query: query.to_string(),
        })?;
        Ok(match (op, value) {
            (Operator::Not, Bson::Array(_)) => Operator::NotIn,
            (Operator::Not, Bson::Document(_)) => Operator::Not,
            (Operator::Not, _) => Operator::NotEqual,
            (Operator::In, v) if !matches!(v, Bson::Array(_)) => Operator::Equal,
            (Operator::NotIn, v) if !matches!(v, Bson::Array(_)) => Operator::NotEqual,
            (op, _) => op,
        })
    }
}
