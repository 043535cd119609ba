use crate::config::StoreConfig;
use crate::errors::StoreError;
use bson::{Bson, Document};

use super::operators::{Arity, Operator, OperatorRegistry};
use super::types::{OperatorClause, Query, QueryNode};

/// Parse JSON text into a query document, keeping key order.
///
/// # Errors
/// Returns an error if the text is not a JSON object.
pub fn parse_query_json(json: &str) -> Result<Document, StoreError> {
    let doc: Document = serde_json::from_str(json)?;
    Ok(doc)
}

impl Query {
    /// Parse `query` against `registry` with the default depth and `$in` limits.
    ///
    /// # Errors
    /// See [`QueryCompiler::parse`](super::QueryCompiler::parse).
    pub fn parse(query: &Document, registry: &OperatorRegistry) -> Result<Self, StoreError> {
        let cfg = StoreConfig::default();
        Parser { registry, max_depth: cfg.max_query_depth, max_in_set: cfg.max_in_set }
            .parse_root(query)
    }
}

/// Turns raw query documents into the [`Query`] AST. All validation happens here.
pub(crate) struct Parser<'a> {
    pub registry: &'a OperatorRegistry,
    pub max_depth: usize,
    pub max_in_set: usize,
}

enum KeyKind {
    Empty,
    Attributes,
    Operators,
    Mixed,
}

fn classify(doc: &Document) -> KeyKind {
    let ops = doc.keys().filter(|k| OperatorRegistry::looks_like_operator(k)).count();
    match (doc.len(), ops) {
        (0, _) => KeyKind::Empty,
        (_, 0) => KeyKind::Attributes,
        (n, o) if n == o => KeyKind::Operators,
        _ => KeyKind::Mixed,
    }
}

fn mixed(doc: &Document) -> StoreError {
    StoreError::InvalidQueryShape(format!(
        "cannot mix attribute names and operators in {doc}"
    ))
}

impl Parser<'_> {
    pub fn parse_root(&self, doc: &Document) -> Result<Query, StoreError> {
        let root = match classify(doc) {
            KeyKind::Empty => QueryNode::Fields(Vec::new()),
            KeyKind::Mixed => return Err(mixed(doc)),
            KeyKind::Attributes => self.parse_fields(doc, 1)?,
            KeyKind::Operators => {
                for key in doc.keys() {
                    let supported = self.registry.resolve(key).is_some_and(|op| op.is_combinator());
                    if !supported {
                        return Err(StoreError::UnsupportedRootOperator {
                            operator: key.clone(),
                            query: doc.to_string(),
                        });
                    }
                }
                self.parse_operators(doc, 1)?
            }
        };
        Ok(Query { root })
    }

    fn check_depth(&self, depth: usize) -> Result<(), StoreError> {
        if depth > self.max_depth {
            return Err(StoreError::QueryTooDeep(self.max_depth));
        }
        Ok(())
    }

    fn parse_value(&self, value: &Bson, depth: usize) -> Result<QueryNode, StoreError> {
        let Bson::Document(doc) = value else {
            if let Bson::Array(items) = value
                && items.len() > self.max_in_set
            {
                return Err(StoreError::InvalidQueryShape(format!(
                    "implicit '$in' accepts at most {} values",
                    self.max_in_set
                )));
            }
            return Ok(QueryNode::Value(value.clone()));
        };
        self.check_depth(depth)?;
        match classify(doc) {
            KeyKind::Empty => Ok(QueryNode::Fields(Vec::new())),
            KeyKind::Attributes => self.parse_fields(doc, depth),
            KeyKind::Operators => self.parse_operators(doc, depth),
            KeyKind::Mixed => Err(mixed(doc)),
        }
    }

    fn parse_fields(&self, doc: &Document, depth: usize) -> Result<QueryNode, StoreError> {
        let mut fields = Vec::with_capacity(doc.len());
        for (name, value) in doc {
            if name.is_empty() {
                return Err(StoreError::InvalidQueryShape(format!("empty attribute name in {doc}")));
            }
            fields.push((name.clone(), self.parse_value(value, depth + 1)?));
        }
        Ok(QueryNode::Fields(fields))
    }

    fn parse_operators(&self, doc: &Document, depth: usize) -> Result<QueryNode, StoreError> {
        let mut clauses = Vec::with_capacity(doc.len());
        for (token, value) in doc {
            let operator = self.registry.normalize(token, value, doc)?;
            clauses.push(self.parse_clause(token, operator, value, doc, depth)?);
        }
        Ok(QueryNode::Operators(clauses))
    }

    /// `token` is the operator as written, used in error messages.
    fn parse_clause(
        &self,
        token: &str,
        operator: Operator,
        value: &Bson,
        doc: &Document,
        depth: usize,
    ) -> Result<OperatorClause, StoreError> {
        match operator.arity() {
            Arity::Nested => {
                let node = self.parse_value(value, depth + 1)?;
                Ok(OperatorClause::Quantify { operator, node: Box::new(node) })
            }
            Arity::NestedList => {
                let Bson::Array(items) = value else {
                    return Err(StoreError::ExpectedArrayValue {
                        operator: token.to_string(),
                        query: doc.to_string(),
                    });
                };
                let nodes = items
                    .iter()
                    .map(|item| self.parse_value(item, depth + 1))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(OperatorClause::Combine { operator, nodes })
            }
            Arity::Scalar => {
                if matches!(value, Bson::Document(_)) {
                    return Err(StoreError::UnexpectedObjectValue {
                        operator: token.to_string(),
                        query: doc.to_string(),
                    });
                }
                if let Bson::Array(items) = value
                    && matches!(operator, Operator::In | Operator::NotIn)
                    && items.len() > self.max_in_set
                {
                    return Err(StoreError::InvalidQueryShape(format!(
                        "'{operator}' accepts at most {} values in {doc}",
                        self.max_in_set
                    )));
                }
                Ok(OperatorClause::Compare { operator, value: value.clone() })
            }
        }
    }
}
