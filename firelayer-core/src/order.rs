//! Document ordering shared by native backends and the in-memory fallback.
//!
//! Documents order by the sort field first (absent or null values are the minimum),
//! then by identity in the same direction. This matches the implicit `__name__`
//! ordering of Firestore-like engines, so a fallback sort reproduces what the
//! index-backed query would have returned.

use std::cmp::Ordering;

use crate::{
    document::DocumentSnapshot,
    query::{Sort, SortDirection},
    value::compare_values,
};

/// Compares two documents under `sort`.
pub fn compare_snapshots(left: &DocumentSnapshot, right: &DocumentSnapshot, sort: &Sort) -> Ordering {
    let ordering = compare_values(
        left.sort_value(&sort.field).as_ref(),
        right.sort_value(&sort.field).as_ref(),
    )
    .then_with(|| left.id.cmp(&right.id));

    match sort.direction {
        SortDirection::Asc => ordering,
        SortDirection::Desc => ordering.reverse(),
    }
}

/// Sorts documents in place. Without a sort the order is identity ascending.
pub fn sort_snapshots(documents: &mut [DocumentSnapshot], sort: Option<&Sort>) {
    match sort {
        Some(sort) => documents.sort_by(|a, b| compare_snapshots(a, b, sort)),
        None => documents.sort_by(|a, b| a.id.cmp(&b.id)),
    }
}
