//! Query language: operator registry, validating parser and expression compiler.

mod compile;
mod operators;
mod parse;
mod types;

pub use compile::QueryCompiler;
pub use operators::{Arity, OPERATOR_MARKER, Operator, OperatorRegistry};
pub use parse::parse_query_json;
pub use types::{
    Expression, ExpressionValue, OperatorClause, Query, QueryNode, expressions_to_bson,
};
