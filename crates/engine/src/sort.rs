//! Sort pass.
//!
//! Values rank `bool < number < string < other`. Numbers compare
//! numerically, strings by collation key. Records without a value for the
//! sort field always come last, in both directions. Remaining ties keep the
//! snapshot order.

use std::cmp::Ordering;

use serde_json::Value;

use crate::collate;
use crate::query::{SortDirection, SortSpec};
use crate::record::Record;

/// Precomputed sort value of one record.
#[derive(Debug, Clone, PartialEq)]
enum SortValue {
    Bool(bool),
    Number(f64),
    Text { key: String, raw: String },
    Other { key: String, raw: String },
}

impl SortValue {
    fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Bool(b) => Some(SortValue::Bool(*b)),
            Value::Number(n) => n.as_f64().map(SortValue::Number),
            Value::String(s) => Some(SortValue::Text {
                key: collate::collation_key(s),
                raw: s.clone(),
            }),
            other => {
                let raw = other.to_string();
                Some(SortValue::Other {
                    key: collate::collation_key(&raw),
                    raw,
                })
            }
        }
    }

    fn rank(&self) -> u8 {
        match self {
            SortValue::Bool(_) => 0,
            SortValue::Number(_) => 1,
            SortValue::Text { .. } => 2,
            SortValue::Other { .. } => 3,
        }
    }

    fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (SortValue::Bool(a), SortValue::Bool(b)) => a.cmp(b),
            (SortValue::Number(a), SortValue::Number(b)) => a.total_cmp(b),
            (SortValue::Text { key: ka, raw: ra }, SortValue::Text { key: kb, raw: rb })
            | (SortValue::Other { key: ka, raw: ra }, SortValue::Other { key: kb, raw: rb }) => {
                ka.cmp(kb).then_with(|| ra.cmp(rb))
            }
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

/// Order `(original index, record)` pairs in place.
pub(crate) fn sort_matches(matches: &mut Vec<(usize, &Record)>, sort: &SortSpec) {
    let mut keyed: Vec<(Option<SortValue>, usize, &Record)> = matches
        .drain(..)
        .map(|(index, record)| {
            let value = record
                .field(&sort.field)
                .and_then(|v| SortValue::from_json(&v));
            (value, index, record)
        })
        .collect();

    keyed.sort_by(|(va, ia, _), (vb, ib, _)| {
        compare_values(va.as_ref(), vb.as_ref(), sort.direction).then_with(|| ia.cmp(ib))
    });

    matches.extend(keyed.into_iter().map(|(_, index, record)| (index, record)));
}

/// Compare two optional sort values; absent values always sort last.
fn compare_values(a: Option<&SortValue>, b: Option<&SortValue>, direction: SortDirection) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => match direction {
            SortDirection::Asc => a.compare(b),
            SortDirection::Desc => b.compare(a),
        },
    }
}
