use bson::Bson;

use super::operators::Operator;

/// A parsed, validated query. Produced by [`super::QueryCompiler::parse`].
///
/// The root node is always `Fields` or `Operators` holding only combinators.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub(crate) root: QueryNode,
}

impl Query {
    #[must_use]
    pub const fn root(&self) -> &QueryNode {
        &self.root
    }

    /// A query with no conditions.
    #[must_use]
    pub const fn all() -> Self {
        Self { root: QueryNode::Fields(Vec::new()) }
    }
}

/// One level of a query, already disambiguated.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryNode {
    /// A plain value with no explicit operator.
    Value(Bson),
    /// Attribute names, each extending the path. Empty means "no restriction".
    Fields(Vec<(String, QueryNode)>),
    /// Operators applied to the current path, in input order.
    Operators(Vec<OperatorClause>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum OperatorClause {
    Compare { operator: Operator, value: Bson },
    Quantify { operator: Operator, node: Box<QueryNode> },
    Combine { operator: Operator, nodes: Vec<QueryNode> },
}

/// A compiled `(path, operator, value)` triple.
///
/// Nested expression paths are relative to the enclosing expression's path; `""` denotes
/// the value at that path itself.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub path: String,
    pub operator: Operator,
    pub value: ExpressionValue,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExpressionValue {
    Plain(Bson),
    Nested(Vec<Expression>),
    NestedList(Vec<Vec<Expression>>),
}

impl Expression {
    #[must_use]
    pub fn new(path: impl Into<String>, operator: Operator, value: ExpressionValue) -> Self {
        Self { path: path.into(), operator, value }
    }

    /// `[path, operator, value]`, with nested expressions rendered the same way.
    #[must_use]
    pub fn to_bson(&self) -> Bson {
        let value = match &self.value {
            ExpressionValue::Plain(v) => v.clone(),
            ExpressionValue::Nested(exprs) => expressions_to_bson(exprs),
            ExpressionValue::NestedList(lists) => {
                Bson::Array(lists.iter().map(|l| expressions_to_bson(l)).collect())
            }
        };
        Bson::Array(vec![Bson::String(self.path.clone()), Bson::String(self.operator.token().to_string()), value])
    }
}

#[must_use]
pub fn expressions_to_bson(expressions: &[Expression]) -> Bson {
    Bson::Array(expressions.iter().map(Expression::to_bson).collect())
}
