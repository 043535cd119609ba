use crate::config::StoreConfig;
use crate::errors::StoreError;
use bson::Document;

use super::operators::OperatorRegistry;
use super::parse::{Parser, parse_query_json};
use super::types::{Expression, ExpressionValue, OperatorClause, Query, QueryNode};

/// Compiles query documents into flat, ordered expression lists.
///
/// Compilation is a pure function of the query: the same input always yields the same
/// expressions, in input key order.
#[derive(Debug, Clone)]
pub struct QueryCompiler {
    registry: OperatorRegistry,
    max_depth: usize,
    max_in_set: usize,
}

impl Default for QueryCompiler {
    fn default() -> Self {
        let cfg = StoreConfig::default();
        Self::new(OperatorRegistry::default(), cfg.max_query_depth, cfg.max_in_set)
    }
}

impl QueryCompiler {
    #[must_use]
    pub const fn new(registry: OperatorRegistry, max_depth: usize, max_in_set: usize) -> Self {
        Self { registry, max_depth, max_in_set }
    }

    /// # Errors
    /// Returns a `Config` error if the configured operators are inconsistent.
    pub fn from_config(config: &StoreConfig) -> Result<Self, StoreError> {
        Ok(Self::new(
            OperatorRegistry::from_config(config)?,
            config.max_query_depth,
            config.max_in_set,
        ))
    }

    #[must_use]
    pub const fn registry(&self) -> &OperatorRegistry {
        &self.registry
    }

    /// Validate `query` and build its AST.
    ///
    /// # Errors
    /// Returns a caller error (`InvalidQueryShape`, `UnsupportedRootOperator`,
    /// `UnknownOperator`, `UnexpectedObjectValue`, `ExpectedArrayValue`, `QueryTooDeep`)
    /// describing the first offending fragment.
    pub fn parse(&self, query: &Document) -> Result<Query, StoreError> {
        Parser { registry: &self.registry, max_depth: self.max_depth, max_in_set: self.max_in_set }
            .parse_root(query)
    }

    /// Flatten a parsed query. Never fails.
    #[must_use]
    pub fn lower(&self, query: &Query) -> Vec<Expression> {
        let mut out = Vec::new();
        lower_node(&query.root, "", &mut out);
        out
    }

    /// Parse then lower.
    ///
    /// # Errors
    /// See [`QueryCompiler::parse`].
    pub fn compile(&self, query: &Document) -> Result<Vec<Expression>, StoreError> {
        let parsed = self.parse(query)?;
        let expressions = self.lower(&parsed);
        log::debug!("compiled query into {} expression(s)", expressions.len());
        for e in &expressions {
            log::trace!("  {}", e.to_bson());
        }
        Ok(expressions)
    }

    /// # Errors
    /// Returns `Json` for malformed text, otherwise see [`QueryCompiler::parse`].
    pub fn compile_json(&self, json: &str) -> Result<Vec<Expression>, StoreError> {
        self.compile(&parse_query_json(json)?)
    }
}

fn join_path(parent: &str, name: &str) -> String {
    if parent.is_empty() { name.to_string() } else { format!("{parent}.{name}") }
}

fn lower_node(node: &QueryNode, path: &str, out: &mut Vec<Expression>) {
    match node {
        QueryNode::Value(value) => out.push(Expression::new(
            path,
            OperatorRegistry::default_operator(value),
            ExpressionValue::Plain(value.clone()),
        )),
        QueryNode::Fields(fields) => {
            for (name, sub) in fields {
                lower_node(sub, &join_path(path, name), out);
            }
        }
        QueryNode::Operators(clauses) => {
            for clause in clauses {
                out.push(lower_clause(clause, path));
            }
        }
    }
}

fn lower_clause(clause: &OperatorClause, path: &str) -> Expression {
    match clause {
        OperatorClause::Compare { operator, value } => {
            Expression::new(path, operator.clone(), ExpressionValue::Plain(value.clone()))
        }
        OperatorClause::Quantify { operator, node } => {
            let mut nested = Vec::new();
            lower_node(node, "", &mut nested);
            Expression::new(path, operator.clone(), ExpressionValue::Nested(nested))
        }
        OperatorClause::Combine { operator, nodes } => {
            let lists = nodes
                .iter()
                .map(|n| {
                    let mut nested = Vec::new();
                    lower_node(n, "", &mut nested);
                    nested
                })
                .collect();
            Expression::new(path, operator.clone(), ExpressionValue::NestedList(lists))
        }
    }
}
