//! Translation of filter expressions into native predicate branches.
//!
//! Firestore-like backends evaluate conjunctions of equality and membership predicates
//! only. The translator rewrites an [`Expr`] into disjunctive normal form: a list of
//! [`Branch`]es, each a conjunction of native [`Predicate`]s plus [`PostFilter`]s for
//! conditions the backend cannot express (field absent or null, field present). The
//! surrounding conjuncts of an `Or` are distributed into every branch.
//!
//! Membership is translated according to the backend: one native `In` predicate when
//! the backend supports it, otherwise one branch per value.

use std::convert::Infallible;

use bson::Bson;

use crate::{
    document::{DOCUMENT_ID, DocumentSnapshot},
    query::{Expr, QueryVisitor},
    value::{is_missing_or_null, values_equal},
};

/// Native predicate operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredicateOp {
    /// Field equals the value.
    Eq,
    /// Field equals one of the values in the array operand.
    In,
}

/// A condition the backend evaluates itself.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    /// Dot path of the field, or [`DOCUMENT_ID`].
    pub field: String,
    pub op: PredicateOp,
    /// The operand. An array for [`PredicateOp::In`].
    pub value: Bson,
}

impl Predicate {
    pub fn eq(field: impl Into<String>, value: impl Into<Bson>) -> Self {
        Self { field: field.into(), op: PredicateOp::Eq, value: value.into() }
    }

    pub fn is_in(field: impl Into<String>, values: Vec<Bson>) -> Self {
        Self { field: field.into(), op: PredicateOp::In, value: Bson::Array(values) }
    }

    /// Evaluates the predicate the way a native engine would.
    ///
    /// Provided for in-process backends; remote backends evaluate predicates themselves.
    pub fn matches(&self, document: &DocumentSnapshot) -> bool {
        let actual = match self.field.as_str() {
            DOCUMENT_ID => Bson::String(document.id.clone()),
            field => match document.get_path(field) {
                Some(value) => value.clone(),
                None => return false,
            },
        };

        match (&self.op, &self.value) {
            (PredicateOp::Eq, expected) => values_equal(&actual, expected),
            (PredicateOp::In, Bson::Array(candidates)) => {
                candidates.iter().any(|candidate| values_equal(&actual, candidate))
            }
            (PredicateOp::In, expected) => values_equal(&actual, expected),
        }
    }
}

/// A condition evaluated in memory after the native fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostFilter {
    /// The field is absent or null.
    MissingOrNull(String),
    /// The field is present and not null.
    Present(String),
}

impl PostFilter {
    pub fn matches(&self, document: &DocumentSnapshot) -> bool {
        match self {
            PostFilter::MissingOrNull(field) => is_missing_or_null(document.sort_value(field).as_ref()),
            PostFilter::Present(field) => !is_missing_or_null(document.sort_value(field).as_ref()),
        }
    }
}

/// One conjunction of native predicates and post-filters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Branch {
    pub predicates: Vec<Predicate>,
    pub post_filters: Vec<PostFilter>,
}

impl Branch {
    fn with_predicate(predicate: Predicate) -> Self {
        Self { predicates: vec![predicate], post_filters: Vec::new() }
    }

    fn with_post_filter(post_filter: PostFilter) -> Self {
        Self { predicates: Vec::new(), post_filters: vec![post_filter] }
    }

    fn conjoin(&self, other: &Branch) -> Branch {
        let mut merged = self.clone();
        merged.predicates.extend(other.predicates.iter().cloned());
        merged.post_filters.extend(other.post_filters.iter().cloned());
        merged
    }

    /// Returns `true` if the backend can evaluate the whole branch.
    pub fn is_native(&self) -> bool {
        self.post_filters.is_empty()
    }

    /// Returns `true` if the document passes every post-filter.
    pub fn post_filter(&self, document: &DocumentSnapshot) -> bool {
        self.post_filters.iter().all(|filter| filter.matches(document))
    }

    /// Returns `true` if the document satisfies every condition of the branch.
    pub fn matches(&self, document: &DocumentSnapshot) -> bool {
        self.predicates.iter().all(|predicate| predicate.matches(document)) && self.post_filter(document)
    }
}

/// The result of translating a filter.
#[derive(Debug, Clone, PartialEq)]
pub enum Translation {
    /// A single conjunction; the query can run as one native query.
    Single(Branch),
    /// A union of branches to be merged and de-duplicated. Empty when unsatisfiable.
    Union(Vec<Branch>),
}

impl Translation {
    /// Returns all branches in declaration order.
    pub fn branches(&self) -> &[Branch] {
        match self {
            Translation::Single(branch) => std::slice::from_ref(branch),
            Translation::Union(branches) => branches,
        }
    }
}

/// Rewrites expressions into native branches.
#[derive(Debug, Clone, Copy)]
pub struct Translator {
    membership: bool,
}

impl Translator {
    /// Creates a translator. `membership` selects native `In` predicates over expansion.
    pub fn new(membership: bool) -> Self {
        Self { membership }
    }

    /// Translates an optional filter; `None` becomes an unconstrained single branch.
    pub fn translate(&mut self, filter: Option<&Expr>) -> Translation {
        let Some(filter) = filter else {
            return Translation::Single(Branch::default());
        };

        let mut branches = match self.visit_expr(filter) {
            Ok(branches) => branches,
            Err(never) => match never {},
        };

        match branches.len() {
            1 => Translation::Single(branches.remove(0)),
            _ => Translation::Union(branches),
        }
    }
}

impl QueryVisitor for Translator {
    type Output = Vec<Branch>;
    type Error = Infallible;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        let mut product = vec![Branch::default()];

        for expr in exprs {
            let alternatives = self.visit_expr(expr)?;
            product = product
                .iter()
                .flat_map(|left| alternatives.iter().map(move |right| left.conjoin(right)))
                .collect();
        }

        Ok(product)
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        let mut branches = Vec::new();

        for expr in exprs {
            branches.extend(self.visit_expr(expr)?);
        }

        Ok(branches)
    }

    fn visit_eq(&mut self, field: &str, value: &Bson) -> Result<Self::Output, Self::Error> {
        if is_missing_or_null(Some(value)) {
            return Ok(vec![Branch::with_post_filter(PostFilter::MissingOrNull(field.to_string()))]);
        }

        Ok(vec![Branch::with_predicate(Predicate::eq(field, value.clone()))])
    }

    fn visit_in(&mut self, field: &str, values: &[Bson]) -> Result<Self::Output, Self::Error> {
        let (nulls, values): (Vec<&Bson>, Vec<&Bson>) = values
            .iter()
            .partition(|value| is_missing_or_null(Some(*value)));

        let mut branches = if self.membership && !values.is_empty() {
            vec![Branch::with_predicate(Predicate::is_in(
                field,
                values.into_iter().cloned().collect(),
            ))]
        } else {
            values
                .into_iter()
                .map(|value| Branch::with_predicate(Predicate::eq(field, value.clone())))
                .collect()
        };

        if !nulls.is_empty() {
            branches.push(Branch::with_post_filter(PostFilter::MissingOrNull(field.to_string())));
        }

        Ok(branches)
    }

    fn visit_exists(&mut self, field: &str, should_exist: bool) -> Result<Self::Output, Self::Error> {
        let filter = match should_exist {
            true => PostFilter::Present(field.to_string()),
            false => PostFilter::MissingOrNull(field.to_string()),
        };

        Ok(vec![Branch::with_post_filter(filter)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Filter;
    use bson::doc;

    fn translate(membership: bool, expr: &Expr) -> Translation {
        Translator::new(membership).translate(Some(expr))
    }

    #[test]
    fn plain_equalities_stay_a_single_branch() {
        let expr = Filter::eq("owner_id", "u1").and(Filter::eq("status", "saved"));

        assert_eq!(
            translate(true, &expr),
            Translation::Single(Branch {
                predicates: vec![Predicate::eq("owner_id", "u1"), Predicate::eq("status", "saved")],
                post_filters: vec![],
            })
        );
    }

    #[test]
    fn no_filter_is_unconstrained() {
        assert_eq!(Translator::new(true).translate(None), Translation::Single(Branch::default()));
    }

    #[test]
    fn or_distributes_surrounding_filters() {
        let expr = Filter::eq("owner_id", "u1").and(Filter::or([
            Filter::is_in("source", ["nano", "blog"]),
            Filter::not_exists("source"),
            Filter::is_null("source"),
        ]));

        let branches = match translate(true, &expr) {
            Translation::Union(branches) => branches,
            other => panic!("expected a union, got {other:?}"),
        };

        assert_eq!(branches.len(), 3);
        assert!(branches.iter().all(|b| b.predicates[0] == Predicate::eq("owner_id", "u1")));
        assert_eq!(
            branches[0].predicates[1],
            Predicate::is_in("source", vec!["nano".into(), "blog".into()])
        );
        assert_eq!(branches[1].post_filters, vec![PostFilter::MissingOrNull("source".into())]);
        assert_eq!(branches[2].post_filters, vec![PostFilter::MissingOrNull("source".into())]);
    }

    #[test]
    fn membership_expands_without_native_support() {
        let expr = Filter::is_in("source", ["nano", "blog"]);

        assert_eq!(
            translate(false, &expr),
            Translation::Union(vec![
                Branch::with_predicate(Predicate::eq("source", "nano")),
                Branch::with_predicate(Predicate::eq("source", "blog")),
            ])
        );
    }

    #[test]
    fn null_membership_becomes_a_post_filter_branch() {
        let expr = Filter::is_in("source", [Bson::String("nano".into()), Bson::Null]);

        assert_eq!(
            translate(true, &expr),
            Translation::Union(vec![
                Branch::with_predicate(Predicate::is_in("source", vec!["nano".into()])),
                Branch::with_post_filter(PostFilter::MissingOrNull("source".into())),
            ])
        );
    }

    #[test]
    fn empty_membership_is_unsatisfiable() {
        let expr = Filter::eq("owner_id", "u1").and(Filter::is_in("source", Vec::<Bson>::new()));

        assert_eq!(translate(true, &expr), Translation::Union(vec![]));
    }

    #[test]
    fn branches_agree_with_direct_evaluation() {
        let docs = [
            DocumentSnapshot::new("1", doc! { "owner_id": "u1", "source": "nano" }),
            DocumentSnapshot::new("2", doc! { "owner_id": "u1", "source": null }),
            DocumentSnapshot::new("3", doc! { "owner_id": "u1" }),
            DocumentSnapshot::new("4", doc! { "owner_id": "u2", "source": "nano" }),
            DocumentSnapshot::new("5", doc! { "owner_id": "u1", "source": "upload" }),
        ];
        let exprs = [
            Filter::eq("owner_id", "u1").and(Filter::or([
                Filter::is_in("source", ["nano", "blog"]),
                Filter::not_exists("source"),
            ])),
            Filter::or([Filter::eq("source", "upload"), Filter::eq("owner_id", "u2")]),
            Filter::exists("source").and(Filter::is_in("owner_id", ["u1"])),
            Filter::not_exists(DOCUMENT_ID),
            Filter::is_null(DOCUMENT_ID),
            Filter::exists(DOCUMENT_ID).and(Filter::eq("owner_id", "u2")),
            Filter::or([Filter::eq(DOCUMENT_ID, "3"), Filter::is_in(DOCUMENT_ID, ["5"])]),
        ];

        for membership in [true, false] {
            for expr in &exprs {
                let translation = translate(membership, expr);
                for doc in &docs {
                    let via_branches = translation.branches().iter().any(|b| b.matches(doc));
                    assert_eq!(via_branches, expr.matches(doc), "{expr:?} on {}", doc.id);
                }
            }
        }
    }
}
