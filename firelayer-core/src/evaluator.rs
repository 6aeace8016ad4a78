//! Direct evaluation of filter expressions against a document.
//!
//! This is the reference semantics for [`Expr`]. The in-memory post-filter path uses it
//! and the native predicate translation must agree with it.

use std::convert::Infallible;

use bson::Bson;

use crate::{
    document::DocumentSnapshot,
    query::{Expr, QueryVisitor},
    value::{is_missing_or_null, values_equal},
};

pub(crate) struct DocumentEvaluator<'a> {
    document: &'a DocumentSnapshot,
}

impl<'a> DocumentEvaluator<'a> {
    pub fn new(document: &'a DocumentSnapshot) -> Self {
        Self { document }
    }

    fn field(&self, field: &str) -> Option<Bson> {
        self.document.sort_value(field)
    }
}

impl<'a> QueryVisitor for DocumentEvaluator<'a> {
    type Output = bool;
    type Error = Infallible;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if !self.visit_expr(expr)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if self.visit_expr(expr)? {
                return Ok(true);
            }
        }

        Ok(false)
    }

    fn visit_eq(&mut self, field: &str, value: &Bson) -> Result<Self::Output, Self::Error> {
        let actual = self.field(field);

        if is_missing_or_null(Some(value)) {
            return Ok(is_missing_or_null(actual.as_ref()));
        }

        Ok(actual.is_some_and(|actual| values_equal(&actual, value)))
    }

    fn visit_in(&mut self, field: &str, values: &[Bson]) -> Result<Self::Output, Self::Error> {
        for value in values {
            if self.visit_eq(field, value)? {
                return Ok(true);
            }
        }

        Ok(false)
    }

    fn visit_exists(&mut self, field: &str, should_exist: bool) -> Result<Self::Output, Self::Error> {
        Ok(is_missing_or_null(self.field(field).as_ref()) != should_exist)
    }
}

impl Expr {
    /// Returns `true` if the document satisfies this expression.
    pub fn matches(&self, document: &DocumentSnapshot) -> bool {
        match DocumentEvaluator::new(document).visit_expr(self) {
            Ok(matched) => matched,
            Err(never) => match never {},
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{document::DOCUMENT_ID, query::Filter};
    use bson::doc;

    fn image(id: &str, data: bson::Document) -> DocumentSnapshot {
        DocumentSnapshot::new(id, data)
    }

    #[test]
    fn equality_and_membership() {
        let doc = image("1", doc! { "owner_id": "u1", "source": "nano", "size": 3 });

        assert!(Filter::eq("owner_id", "u1").matches(&doc));
        assert!(!Filter::eq("owner_id", "u2").matches(&doc));
        assert!(Filter::eq("size", 3.0).matches(&doc));
        assert!(Filter::is_in("source", ["blog", "nano"]).matches(&doc));
        assert!(!Filter::is_in("source", ["blog"]).matches(&doc));
        assert!(!Filter::is_in("source", Vec::<Bson>::new()).matches(&doc));
    }

    #[test]
    fn absent_and_null_are_interchangeable() {
        let missing = image("1", doc! { "owner_id": "u1" });
        let null = image("2", doc! { "owner_id": "u1", "source": null });
        let set = image("3", doc! { "owner_id": "u1", "source": "nano" });

        for expr in [Filter::not_exists("source"), Filter::is_null("source")] {
            assert!(expr.matches(&missing));
            assert!(expr.matches(&null));
            assert!(!expr.matches(&set));
        }

        assert!(!Filter::exists("source").matches(&missing));
        assert!(!Filter::exists("source").matches(&null));
        assert!(Filter::exists("source").matches(&set));
    }

    #[test]
    fn nested_paths_and_identity() {
        let doc = image("b7", doc! { "admin_review": { "reviewed_by": "admin" } });

        assert!(Filter::eq("admin_review.reviewed_by", "admin").matches(&doc));
        assert!(Filter::eq(DOCUMENT_ID, "b7").matches(&doc));
    }

    #[test]
    fn logical_combinators() {
        let doc = image("1", doc! { "a": 1, "b": 2 });

        assert!(Expr::And(vec![]).matches(&doc));
        assert!(!Expr::Or(vec![]).matches(&doc));
        assert!(Filter::eq("a", 1).and(Filter::or([Filter::eq("b", 5), Filter::eq("b", 2)])).matches(&doc));
        assert!(!Filter::eq("a", 1).and(Filter::eq("b", 5)).matches(&doc));
    }
}
