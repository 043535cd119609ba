//! Evaluation of compiled expressions against stored documents.

use crate::query::{Expression, ExpressionValue, Operator};
use crate::store::{Order, SortSpec};
use bson::{Bson, Document};
use std::cmp::Ordering;

/// What an expression path is resolved against.
#[derive(Debug, Clone, Copy)]
enum Scope<'a> {
    Document(&'a Document),
    Value(Option<&'a Bson>),
}

impl<'a> Scope<'a> {
    fn descend(self, path: &str) -> Self {
        if path.is_empty() {
            return self;
        }
        let start = match self {
            Self::Document(d) | Self::Value(Some(Bson::Document(d))) => d,
            Self::Value(_) => return Self::Value(None),
        };
        Self::Value(get_path(start, path))
    }

    const fn value(self) -> Option<&'a Bson> {
        match self {
            Self::Document(_) => None,
            Self::Value(v) => v,
        }
    }
}

/// Whether `doc` satisfies every expression.
#[must_use]
pub fn matches_document(doc: &Document, expressions: &[Expression]) -> bool {
    all(Scope::Document(doc), expressions)
}

fn all(scope: Scope<'_>, expressions: &[Expression]) -> bool {
    expressions.iter().all(|e| eval_expression(scope, e))
}

fn eval_expression(scope: Scope<'_>, expr: &Expression) -> bool {
    let here = scope.descend(&expr.path);
    match (&expr.operator, &expr.value) {
        (Operator::And, ExpressionValue::NestedList(lists)) => lists.iter().all(|l| all(here, l)),
        (Operator::Or, ExpressionValue::NestedList(lists)) => lists.iter().any(|l| all(here, l)),
        (Operator::Nor, ExpressionValue::NestedList(lists)) => !lists.iter().any(|l| all(here, l)),
        (Operator::Not, ExpressionValue::Nested(nested)) => !all(here, nested),
        (Operator::Some, ExpressionValue::Nested(nested)) => match here.value() {
            Some(Bson::Array(items)) => items.iter().any(|i| all(Scope::Value(Some(i)), nested)),
            _ => false,
        },
        (Operator::Every, ExpressionValue::Nested(nested)) => match here.value() {
            Some(Bson::Array(items)) => items.iter().all(|i| all(Scope::Value(Some(i)), nested)),
            _ => false,
        },
        (op, ExpressionValue::Plain(value)) => eval_compare(op, here.value(), value),
        _ => false,
    }
}

fn eval_compare(op: &Operator, field: Option<&Bson>, value: &Bson) -> bool {
    match op {
        Operator::Equal => values_equal(field, value),
        Operator::NotEqual => !values_equal(field, value),
        Operator::GreaterThan => ordered(field, value) == Some(Ordering::Greater),
        Operator::GreaterThanOrEqual => {
            matches!(ordered(field, value), Some(Ordering::Greater | Ordering::Equal))
        }
        Operator::LessThan => ordered(field, value) == Some(Ordering::Less),
        Operator::LessThanOrEqual => {
            matches!(ordered(field, value), Some(Ordering::Less | Ordering::Equal))
        }
        Operator::In => is_in_set(field, value),
        Operator::NotIn => !is_in_set(field, value),
        Operator::Includes => match (field, value) {
            (Some(Bson::String(s)), Bson::String(needle)) => s.contains(needle.as_str()),
            (Some(Bson::Array(items)), v) => items.iter().any(|i| bson_eq(i, v)),
            _ => false,
        },
        Operator::StartsWith => match (field, value) {
            (Some(Bson::String(s)), Bson::String(prefix)) => s.starts_with(prefix.as_str()),
            _ => false,
        },
        Operator::EndsWith => match (field, value) {
            (Some(Bson::String(s)), Bson::String(suffix)) => s.ends_with(suffix.as_str()),
            _ => false,
        },
        Operator::Matches => eval_matches(field, value),
        // combinators carry nested values; extensions are not understood here
        _ => false,
    }
}

#[cfg(feature = "regex")]
fn eval_matches(field: Option<&Bson>, value: &Bson) -> bool {
    // inline flags such as (?i) select case-insensitive matching
    let (Some(Bson::String(s)), Bson::String(pattern)) = (field, value) else {
        return false;
    };
    regex::Regex::new(pattern).is_ok_and(|r| r.is_match(s))
}

#[cfg(not(feature = "regex"))]
fn eval_matches(_field: Option<&Bson>, _value: &Bson) -> bool {
    log::warn!("$matches requires the 'regex' feature; treating as no match");
    false
}

fn values_equal(field: Option<&Bson>, value: &Bson) -> bool {
    match field {
        None => matches!(value, Bson::Null | Bson::Undefined),
        Some(f) => bson_eq(f, value),
    }
}

fn is_in_set(field: Option<&Bson>, set: &Bson) -> bool {
    let Bson::Array(set) = set else {
        return values_equal(field, set);
    };
    match field {
        None => set.iter().any(|x| matches!(x, Bson::Null)),
        Some(whole @ Bson::Array(items)) => set
            .iter()
            .any(|x| bson_eq(whole, x) || items.iter().any(|i| bson_eq(i, x))),
        Some(v) => set.iter().any(|x| bson_eq(v, x)),
    }
}

/// Equality with numbers compared by value across integer and float widths.
#[must_use]
pub fn bson_eq(a: &Bson, b: &Bson) -> bool {
    if let (Some(x), Some(y)) = (as_num(a), as_num(b)) {
        return cmp_num(x, y) == Some(Ordering::Equal);
    }
    a == b
}

/// Ordering between two values of the same kind; `None` when they are not comparable.
fn ordered(field: Option<&Bson>, value: &Bson) -> Option<Ordering> {
    let field = field?;
    if let (Some(x), Some(y)) = (as_num(field), as_num(value)) {
        return cmp_num(x, y);
    }
    match (field, value) {
        (Bson::String(x), Bson::String(y)) => Some(x.cmp(y)),
        (Bson::Boolean(x), Bson::Boolean(y)) => Some(x.cmp(y)),
        (Bson::DateTime(x), Bson::DateTime(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Integers stay exact; only floats and decimals go through `f64`.
#[derive(Debug, Clone, Copy)]
enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    #[allow(clippy::cast_precision_loss)]
    fn to_f64(self) -> f64 {
        match self {
            Self::Int(i) => i as f64,
            Self::Float(f) => f,
        }
    }
}

fn as_num(x: &Bson) -> Option<Num> {
    match x {
        Bson::Int32(i) => Some(Num::Int(i64::from(*i))),
        Bson::Int64(i) => Some(Num::Int(*i)),
        Bson::Double(f) => Some(Num::Float(*f)),
        Bson::Decimal128(d) => d.to_string().parse::<f64>().ok().map(Num::Float),
        _ => None,
    }
}

fn cmp_num(a: Num, b: Num) -> Option<Ordering> {
    match (a, b) {
        (Num::Int(x), Num::Int(y)) => Some(x.cmp(&y)),
        (x, y) => x.to_f64().partial_cmp(&y.to_f64()),
    }
}

fn total_cmp_num(a: Num, b: Num) -> Ordering {
    match (a, b) {
        (Num::Int(x), Num::Int(y)) => x.cmp(&y),
        (x, y) => x.to_f64().total_cmp(&y.to_f64()),
    }
}

/// Total order used for sorting: numbers by value, then strings and booleans, with values
/// of different kinds ordered by kind.
#[must_use]
pub fn compare_bson(a: &Bson, b: &Bson) -> Ordering {
    if let (Some(x), Some(y)) = (as_num(a), as_num(b)) {
        return total_cmp_num(x, y);
    }
    match (a, b) {
        (Bson::String(x), Bson::String(y)) => x.cmp(y),
        (Bson::Boolean(x), Bson::Boolean(y)) => x.cmp(y),
        (Bson::DateTime(x), Bson::DateTime(y)) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

const fn type_rank(v: &Bson) -> u8 {
    match v {
        Bson::MinKey => 0,
        Bson::Null | Bson::Undefined => 1,
        Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Decimal128(_) => 2,
        Bson::String(_) | Bson::Symbol(_) => 3,
        Bson::Document(_) => 4,
        Bson::Array(_) => 5,
        Bson::Binary(_) => 6,
        Bson::ObjectId(_) => 7,
        Bson::Boolean(_) => 8,
        Bson::DateTime(_) => 9,
        Bson::Timestamp(_) => 10,
        Bson::RegularExpression(_) => 11,
        Bson::DbPointer(_) => 12,
        Bson::JavaScriptCode(_) | Bson::JavaScriptCodeWithScope(_) => 13,
        Bson::MaxKey => 255,
    }
}

/// Compare two documents by the sort fields in order; a missing field sorts first.
#[must_use]
pub fn compare_docs(a: &Document, b: &Document, sort: &[SortSpec]) -> Ordering {
    for s in sort {
        let ord = match (get_path(a, &s.field), get_path(b, &s.field)) {
            (Some(x), Some(y)) => compare_bson(x, y),
            (Some(_), None) => Ordering::Greater,
            (None, Some(_)) => Ordering::Less,
            (None, None) => Ordering::Equal,
        };
        if ord != Ordering::Equal {
            return if s.order == Order::Asc { ord } else { ord.reverse() };
        }
    }
    Ordering::Equal
}

/// Value at a dotted path through nested documents.
#[must_use]
pub fn get_path<'a>(doc: &'a Document, path: &str) -> Option<&'a Bson> {
    let (head, rest) = match path.split_once('.') {
        Some((h, r)) => (h, Some(r)),
        None => (path, None),
    };
    match (doc.get(head)?, rest) {
        (v, None) => Some(v),
        (Bson::Document(sub), Some(rest)) => get_path(sub, rest),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::QueryCompiler;
    use bson::doc;

    fn check(doc: &Document, query: Document) -> bool {
        let exprs = QueryCompiler::default().compile(&query).unwrap();
        matches_document(doc, &exprs)
    }

    #[test]
    fn numbers_compare_across_widths() {
        let d = doc! {"year": 1979_i64, "rating": 8.5};
        assert!(check(&d, doc! {"year": 1979}));
        assert!(check(&d, doc! {"year": {"$gte": 1979.0}}));
        assert!(check(&d, doc! {"rating": {"$lt": 9}}));
        assert!(!check(&d, doc! {"year": {"$gt": "1900"}}));
    }

    #[test]
    fn nested_paths_and_missing_fields() {
        let d = doc! {"director": {"name": "Ridley Scott"}};
        assert!(check(&d, doc! {"director": {"name": {"$startsWith": "Ridley"}}}));
        assert!(check(&d, doc! {"studio": null}));
        assert!(!check(&d, doc! {"studio": {"$gt": 1}}));
        assert!(check(&d, doc! {"studio": {"$notEqual": "Fox"}}));
    }

    #[test]
    fn quantifiers_use_element_scope() {
        let d = doc! {"tags": ["horror", "space"], "cast": [{"name": "Sigourney", "lead": true}, {"name": "Tom"}]};
        assert!(check(&d, doc! {"tags": {"$some": {"$equal": "space"}}}));
        assert!(!check(&d, doc! {"tags": {"$every": {"$equal": "space"}}}));
        assert!(check(&d, doc! {"cast": {"$some": {"lead": true}}}));
        assert!(check(&d, doc! {"cast": {"$every": {"name": {"$includes": "o"}}}}));
        assert!(check(&d, doc! {"tags": {"$includes": "horror"}}));
    }

    #[test]
    fn combinators_and_negation() {
        let d = doc! {"title": "Alien", "year": 1979};
        assert!(check(&d, doc! {"$or": [{"year": 1986}, {"title": "Alien"}]}));
        assert!(!check(&d, doc! {"$nor": [{"year": 1986}, {"title": "Alien"}]}));
        assert!(check(&d, doc! {"$and": [{"year": {"$in": [1979, 1986]}}, {"title": {"$endsWith": "en"}}]}));
        assert!(check(&d, doc! {"year": {"$not": {"$lt": 1970}}}));
        assert!(check(&d, doc! {"title": {"$not": ["Aliens", "Prometheus"]}}));
    }

    #[cfg(feature = "regex")]
    #[test]
    fn matches_uses_regex() {
        let d = doc! {"title": "Alien"};
        assert!(check(&d, doc! {"title": {"$matches": "^Al.*n$"}}));
        assert!(!check(&d, doc! {"title": {"$matches": "^al"}}));
    }

    #[test]
    fn large_integers_stay_distinct() {
        let big = 1_i64 << 53;
        let d = doc! {"id": big + 1};
        assert!(!bson_eq(&Bson::Int64(big), &Bson::Int64(big + 1)));
        assert!(check(&d, doc! {"id": big + 1}));
        assert!(!check(&d, doc! {"id": big}));
        assert!(check(&d, doc! {"id": {"$greaterThan": big}}));
        assert!(check(&d, doc! {"id": {"$in": [big + 1]}}));
        assert_eq!(compare_bson(&Bson::Int64(big), &Bson::Int64(big + 1)), Ordering::Less);
        assert!(bson_eq(&Bson::Int32(7), &Bson::Double(7.0)));
    }

    #[test]
    fn sort_orders_missing_first() {
        let a = doc! {"year": 1979, "title": "Alien"};
        let b = doc! {"year": 1986, "title": "Aliens"};
        let c = doc! {"title": "Untitled"};
        let sort = [SortSpec::asc("year")];
        let mut docs = vec![b.clone(), a.clone(), c.clone()];
        docs.sort_by(|x, y| compare_docs(x, y, &sort));
        assert_eq!(docs, vec![c, a, b]);
    }
}
