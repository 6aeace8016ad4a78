//! Query construction and filtering API.
//!
//! Filters are an explicit sum type, [`Expr`], rather than loosely-typed dictionaries.
//! Route handlers that still speak the MongoDB dictionary dialect can parse it with
//! [`Expr::from_mongo`], which rejects anything outside the supported subset.
//!
//! # Query Building
//!
//! ```ignore
//! use firelayer::query::{Query, Filter, SortDirection};
//!
//! let query = Query::builder()
//!     .filter(Filter::eq("owner_id", "u1").and(Filter::or([
//!         Filter::is_in("source", ["nano", "blog"]),
//!         Filter::not_exists("source"),
//!     ])))
//!     .sort("created_at", SortDirection::Desc)
//!     .offset(24)
//!     .limit(24)
//!     .build();
//! ```
//!
//! # Filter Expression API
//!
//! - Equality: `eq`, `is_null`
//! - Membership: `is_in`
//! - Presence: `exists`, `not_exists`
//! - Logical: `and`, `or`

use std::{fmt, str::FromStr};

use bson::{Bson, Document as BsonDocument};

use crate::error::{DocumentStoreError, DocumentStoreResult};

/// Sort direction for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    /// Ascending order (A to Z, 0 to 9, earliest to latest).
    Asc,
    /// Descending order (Z to A, 9 to 0, latest to earliest).
    #[default]
    Desc,
}

impl FromStr for SortDirection {
    type Err = DocumentStoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(SortDirection::Asc),
            "desc" | "descending" => Ok(SortDirection::Desc),
            other => Err(DocumentStoreError::InvalidQuery(format!("unknown sort direction `{other}`"))),
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortDirection::Asc => f.write_str("ASCENDING"),
            SortDirection::Desc => f.write_str("DESCENDING"),
        }
    }
}

/// Sort specification for query results.
///
/// `field` is a dot path into nested maps, or [`DOCUMENT_ID`](crate::document::DOCUMENT_ID).
#[derive(Debug, Clone, PartialEq)]
pub struct Sort {
    /// The field path to sort by.
    pub field: String,
    /// The sort direction.
    pub direction: SortDirection,
}

impl Sort {
    pub fn new(field: impl Into<String>, direction: SortDirection) -> Self {
        Self { field: field.into(), direction }
    }
}

/// A filter expression.
///
/// `Eq(field, null)` and `Exists(field, false)` both match documents where the field
/// is absent or null; `Exists(field, true)` matches documents where it is present and
/// not null.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// All sub-expressions must match. An empty list matches every document.
    And(Vec<Expr>),
    /// At least one branch must match. An empty list matches nothing.
    Or(Vec<Expr>),
    /// The field equals the value.
    Eq(String, Bson),
    /// The field equals one of the values.
    In(String, Vec<Bson>),
    /// The field is present (`true`) or absent/null (`false`).
    Exists(String, bool),
}

impl Expr {
    /// Combines this expression with another using logical AND.
    ///
    /// If this expression is already an AND, the other expression is appended.
    pub fn and(self, other: Expr) -> Self {
        match self {
            Expr::And(mut list) => {
                list.push(other);
                Expr::And(list)
            }
            _ => Expr::And(vec![self, other]),
        }
    }

    /// Combines this expression with another using logical OR.
    ///
    /// If this expression is already an OR, the other expression is appended.
    pub fn or(self, other: Expr) -> Self {
        match self {
            Expr::Or(mut list) => {
                list.push(other);
                Expr::Or(list)
            }
            _ => Expr::Or(vec![self, other]),
        }
    }

    /// Parses a MongoDB-style filter dictionary.
    ///
    /// Supported shapes: `{field: value}`, `{field: {"$eq": value}}`,
    /// `{field: {"$in": [..]}}`, `{field: {"$exists": bool}}` and a top-level
    /// `{"$or": [filter, ..]}` whose branches use the same shapes without another `$or`.
    /// Keys at the same level are conjoined.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidFilter`] naming the offending key for unknown
    /// operators and malformed operands.
    pub fn from_mongo(filter: &BsonDocument) -> DocumentStoreResult<Expr> {
        parse_filter(filter, true)
    }
}

fn invalid(message: String) -> DocumentStoreError {
    DocumentStoreError::InvalidFilter(message)
}

fn parse_filter(filter: &BsonDocument, allow_or: bool) -> DocumentStoreResult<Expr> {
    let mut conjuncts = Vec::with_capacity(filter.len());

    for (key, value) in filter {
        if key == "$or" {
            if !allow_or {
                return Err(invalid("`$or` cannot be nested inside an `$or` branch".to_string()));
            }

            let branches = value
                .as_array()
                .ok_or_else(|| invalid("`$or` must be an array of filter documents".to_string()))?;

            if branches.is_empty() {
                return Err(invalid("`$or` must be a non-empty array".to_string()));
            }

            conjuncts.push(Expr::Or(
                branches
                    .iter()
                    .map(|branch| match branch.as_document() {
                        Some(branch) => parse_filter(branch, false),
                        None => Err(invalid("`$or` entries must be filter documents".to_string())),
                    })
                    .collect::<DocumentStoreResult<Vec<_>>>()?,
            ));
        } else if key.starts_with('$') {
            return Err(invalid(format!("unknown operator `{key}`")));
        } else {
            conjuncts.push(parse_field(key, value)?);
        }
    }

    Ok(match conjuncts.len() {
        1 => conjuncts.remove(0),
        _ => Expr::And(conjuncts),
    })
}

fn parse_field(field: &str, value: &Bson) -> DocumentStoreResult<Expr> {
    let operators = match value {
        Bson::Document(doc) if doc.keys().any(|k| k.starts_with('$')) => doc,
        _ => return Ok(Expr::Eq(field.to_string(), value.clone())),
    };

    let mut exprs = Vec::with_capacity(operators.len());

    for (op, operand) in operators {
        exprs.push(match op.as_str() {
            "$eq" => Expr::Eq(field.to_string(), operand.clone()),
            "$in" => Expr::In(
                field.to_string(),
                operand
                    .as_array()
                    .ok_or_else(|| invalid(format!("`$in` on `{field}` expects an array")))?
                    .clone(),
            ),
            "$exists" => Expr::Exists(
                field.to_string(),
                operand
                    .as_bool()
                    .ok_or_else(|| invalid(format!("`$exists` on `{field}` expects a boolean")))?,
            ),
            other if other.starts_with('$') => {
                return Err(invalid(format!("unknown operator `{other}` on field `{field}`")));
            }
            other => {
                return Err(invalid(format!(
                    "field `{field}` mixes operators with the plain key `{other}`"
                )));
            }
        });
    }

    Ok(match exprs.len() {
        1 => exprs.remove(0),
        _ => Expr::And(exprs),
    })
}

/// Helper for constructing filter expressions.
///
/// ```ignore
/// use firelayer::query::Filter;
///
/// let expr = Filter::eq("status", "pending").and(Filter::exists("admin_review"));
/// ```
pub struct Filter;

impl Filter {
    /// Matches documents where the field equals the value.
    pub fn eq(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::Eq(field.into(), value.into())
    }

    /// Matches documents where the field is absent or null.
    pub fn is_null(field: impl Into<String>) -> Expr {
        Expr::Eq(field.into(), Bson::Null)
    }

    /// Matches documents where the field equals any of the values.
    pub fn is_in<V: Into<Bson>>(field: impl Into<String>, values: impl IntoIterator<Item = V>) -> Expr {
        Expr::In(field.into(), values.into_iter().map(Into::into).collect())
    }

    /// Matches documents where the field is present and not null.
    pub fn exists(field: impl Into<String>) -> Expr {
        Expr::Exists(field.into(), true)
    }

    /// Matches documents where the field is absent or null.
    pub fn not_exists(field: impl Into<String>) -> Expr {
        Expr::Exists(field.into(), false)
    }

    /// Combines expressions such that all must match.
    pub fn and(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::And(exprs.into_iter().collect())
    }

    /// Combines expressions such that any can match.
    pub fn or(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::Or(exprs.into_iter().collect())
    }
}

/// A structured query: filter, ordering, skip and limit.
///
/// A `limit` of `None` means unbounded. Use [`QueryBuilder`] for construction.
#[derive(Debug, Clone, Default)]
pub struct Query {
    /// Optional filter expression; `None` matches every document.
    pub filter: Option<Expr>,
    /// Maximum number of documents to return.
    pub limit: Option<usize>,
    /// Number of matching documents to skip.
    pub offset: usize,
    /// Ordering of the results; `None` orders by document identity ascending.
    pub sort: Option<Sort>,
}

impl Query {
    /// Creates a new empty query with no filter or limit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new query builder for fluent construction.
    pub fn builder() -> QueryBuilder {
        QueryBuilder::new()
    }

    /// Rejects out-of-range parameters.
    pub fn validate(&self) -> DocumentStoreResult<()> {
        if self.limit == Some(0) {
            return Err(DocumentStoreError::InvalidQuery("limit must be greater than zero".to_string()));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    query: Query,
}

impl QueryBuilder {
    pub fn new() -> Self {
        QueryBuilder { query: Query::default() }
    }

    /// Sets the filter expression for this query.
    pub fn filter(mut self, filter: Expr) -> Self {
        self.query.filter = Some(filter);
        self
    }

    /// Sets the maximum number of documents to return.
    pub fn limit(mut self, limit: usize) -> Self {
        self.query.limit = Some(limit);
        self
    }

    /// Sets the number of matching documents to skip.
    pub fn offset(mut self, offset: usize) -> Self {
        self.query.offset = offset;
        self
    }

    /// Sets the ordering of the results.
    pub fn sort(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.query.sort = Some(Sort::new(field, direction));
        self
    }

    pub fn build(self) -> Query {
        self.query
    }
}

/// Walks an [`Expr`] tree, producing one output per node.
pub trait QueryVisitor {
    type Output;
    type Error: Into<DocumentStoreError>;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_eq(&mut self, field: &str, value: &Bson) -> Result<Self::Output, Self::Error>;
    fn visit_in(&mut self, field: &str, values: &[Bson]) -> Result<Self::Output, Self::Error>;
    fn visit_exists(
        &mut self,
        field: &str,
        should_exist: bool,
    ) -> Result<Self::Output, Self::Error>;

    fn visit_expr(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        match expr {
            Expr::And(exprs) => self.visit_and(exprs),
            Expr::Or(exprs) => self.visit_or(exprs),
            Expr::Eq(field, value) => self.visit_eq(field, value),
            Expr::In(field, values) => self.visit_in(field, values),
            Expr::Exists(field, should_exist) => self.visit_exists(field, *should_exist),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn parses_equality_membership_and_presence() {
        let expr = Expr::from_mongo(&doc! {
            "owner_id": "u1",
            "$or": [
                { "source": { "$in": ["nano", "blog"] } },
                { "source": { "$exists": false } },
                { "source": null },
            ],
        })
        .unwrap();

        assert_eq!(
            expr,
            Expr::And(vec![
                Filter::eq("owner_id", "u1"),
                Expr::Or(vec![
                    Filter::is_in("source", ["nano", "blog"]),
                    Filter::not_exists("source"),
                    Filter::is_null("source"),
                ]),
            ])
        );
    }

    #[test]
    fn single_key_filter_is_not_wrapped() {
        let expr = Expr::from_mongo(&doc! { "status": "pending" }).unwrap();
        assert_eq!(expr, Filter::eq("status", "pending"));
    }

    #[test]
    fn nested_maps_without_operators_are_equality() {
        let expr = Expr::from_mongo(&doc! { "meta": { "title": "x" } }).unwrap();
        assert_eq!(expr, Filter::eq("meta", doc! { "title": "x" }));
    }

    #[test]
    fn rejects_unknown_operators_by_name() {
        let err = Expr::from_mongo(&doc! { "age": { "$gt": 3 } }).unwrap_err();
        assert!(matches!(&err, DocumentStoreError::InvalidFilter(msg) if msg.contains("$gt")));

        let err = Expr::from_mongo(&doc! { "$nor": [] }).unwrap_err();
        assert!(matches!(&err, DocumentStoreError::InvalidFilter(msg) if msg.contains("$nor")));
    }

    #[test]
    fn rejects_malformed_or() {
        for filter in [
            doc! { "$or": { "a": 1 } },
            doc! { "$or": [] },
            doc! { "$or": [1] },
            doc! { "$or": [{ "$or": [{ "a": 1 }] }] },
        ] {
            let err = Expr::from_mongo(&filter).unwrap_err();
            assert!(
                matches!(&err, DocumentStoreError::InvalidFilter(msg) if msg.contains("$or")),
                "{filter:?} -> {err:?}"
            );
        }
    }

    #[test]
    fn rejects_malformed_operands() {
        assert!(Expr::from_mongo(&doc! { "a": { "$in": "x" } }).is_err());
        assert!(Expr::from_mongo(&doc! { "a": { "$exists": 1 } }).is_err());
        assert!(Expr::from_mongo(&doc! { "a": { "$in": [1], "b": 2 } }).is_err());
    }

    #[test]
    fn direction_parsing() {
        assert_eq!("DESCENDING".parse::<SortDirection>().unwrap(), SortDirection::Desc);
        assert_eq!("asc".parse::<SortDirection>().unwrap(), SortDirection::Asc);
        assert!("sideways".parse::<SortDirection>().is_err());
    }

    #[test]
    fn zero_limit_is_rejected() {
        assert!(Query::builder().limit(0).build().validate().is_err());
        assert!(Query::builder().limit(1).build().validate().is_ok());
        assert!(Query::new().validate().is_ok());
    }
}
