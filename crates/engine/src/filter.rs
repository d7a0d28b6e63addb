//! Filter pass: free-text search and per-field predicates.
//!
//! Filters are resolved against the bucket registry once per evaluation, so
//! an unknown scheme or label fails the query before any record is looked
//! at. Record-level problems (missing or mistyped fields) only ever make a
//! record not match.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::bucket::{BucketRegistry, BucketScheme, UNKNOWN_BUCKET, in_bounds};
use crate::error::QueryError;
use crate::query::{FilterSpec, FilterValue, RangeSpec};
use crate::record::Record;

/// A filter with its bucket references resolved.
#[derive(Debug)]
pub(crate) struct CompiledFilter<'a> {
    field: &'a str,
    predicate: Predicate<'a>,
}

#[derive(Debug)]
enum Predicate<'a> {
    Equals(&'a FilterValue),
    OneOf(&'a [FilterValue]),
    Any,
    Bounds { min: Option<f64>, max: Option<f64> },
    Bucket {
        scheme: &'a BucketScheme,
        labels: &'a [String],
    },
}

/// Resolve every filter of a query, failing on unknown schemes or labels.
pub(crate) fn compile<'a>(
    filters: &'a BTreeMap<String, FilterSpec>,
    buckets: &'a BucketRegistry,
) -> Result<Vec<CompiledFilter<'a>>, QueryError> {
    filters
        .iter()
        .map(|(field, spec)| {
            let predicate = match spec {
                FilterSpec::Equals(value) => Predicate::Equals(value),
                FilterSpec::OneOf(values) => Predicate::OneOf(values),
                FilterSpec::Range(RangeSpec::Any) => Predicate::Any,
                FilterSpec::Range(RangeSpec::Bounds { min, max }) => Predicate::Bounds {
                    min: *min,
                    max: *max,
                },
                FilterSpec::Range(RangeSpec::Bucket { scheme, label })
                    if label == UNKNOWN_BUCKET =>
                {
                    // `unknown` has no range; it selects values no range covers.
                    Predicate::Bucket {
                        scheme: buckets.scheme(scheme)?,
                        labels: std::slice::from_ref(label),
                    }
                }
                FilterSpec::Range(RangeSpec::Bucket { scheme, label }) => {
                    let resolved = buckets.scheme(scheme)?;
                    let range = resolved.range_for(label).ok_or_else(|| {
                        QueryError::UnknownBucketLabel {
                            scheme: scheme.clone(),
                            label: label.clone(),
                        }
                    })?;
                    Predicate::Bounds {
                        min: range.min,
                        max: range.max,
                    }
                }
                FilterSpec::Bucket { scheme, labels } => {
                    let resolved = buckets.scheme(scheme)?;
                    if let Some(label) = labels.iter().find(|l| !resolved.has_label(l)) {
                        return Err(QueryError::UnknownBucketLabel {
                            scheme: scheme.clone(),
                            label: label.clone(),
                        });
                    }
                    Predicate::Bucket {
                        scheme: resolved,
                        labels,
                    }
                }
            };
            Ok(CompiledFilter {
                field: field.as_str(),
                predicate,
            })
        })
        .collect()
}

impl CompiledFilter<'_> {
    /// Whether `record` satisfies this filter.
    pub(crate) fn accepts(&self, record: &Record) -> bool {
        match &self.predicate {
            Predicate::Any => true,
            Predicate::Equals(expected) => record
                .field(self.field)
                .is_some_and(|v| any_element(&v, |item| expected.matches(item))),
            Predicate::OneOf(allowed) => record.field(self.field).is_some_and(|v| {
                any_element(&v, |item| allowed.iter().any(|a| a.matches(item)))
            }),
            Predicate::Bounds { min, max } => record
                .number(self.field)
                .is_some_and(|n| in_bounds(n, *min, *max)),
            Predicate::Bucket { scheme, labels } => {
                let label = scheme.label_for(record.number(self.field));
                labels.iter().any(|l| l == label)
            }
        }
    }
}

/// Apply `pred` to a scalar, or to each element of an array.
fn any_element(value: &Value, pred: impl Fn(&Value) -> bool) -> bool {
    match value {
        Value::Array(items) => items.iter().any(pred),
        other => pred(other),
    }
}

/// Case-insensitive substring search over the name and extra text fields.
#[derive(Debug)]
pub(crate) struct SearchMatcher<'a> {
    needle: Option<String>,
    fields: &'a [String],
}

impl<'a> SearchMatcher<'a> {
    pub(crate) fn new(search: &str, fields: &'a [String]) -> Self {
        let needle = (!search.is_empty()).then(|| search.to_lowercase());
        Self { needle, fields }
    }

    pub(crate) fn matches(&self, record: &Record) -> bool {
        let Some(needle) = &self.needle else {
            return true;
        };
        if record.name.to_lowercase().contains(needle.as_str()) {
            return true;
        }
        self.fields.iter().any(|field| {
            record.field(field).is_some_and(|v| {
                any_element(&v, |item| {
                    item.as_str()
                        .is_some_and(|s| s.to_lowercase().contains(needle.as_str()))
                })
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn accepts(spec: FilterSpec, field: &str, record: &Record) -> Result<bool, QueryError> {
        let registry = BucketRegistry::builtin();
        let mut filters = BTreeMap::new();
        filters.insert(field.to_string(), spec);
        let compiled = compile(&filters, &registry)?;
        Ok(compiled.iter().all(|f| f.accepts(record)))
    }

    fn pulsar(flux: Option<f64>) -> Record {
        let record = Record::new("1", "J1713+0747").with_field("phase", "MSPSRPI");
        match flux {
            Some(f) => record.with_field("flux", f),
            None => record,
        }
    }

    #[test]
    fn equals_matches_exact_value() {
        let record = pulsar(Some(1.0));
        assert_eq!(accepts(FilterSpec::Equals("MSPSRPI".into()), "phase", &record), Ok(true));
        assert_eq!(accepts(FilterSpec::Equals("PSRPI".into()), "phase", &record), Ok(false));
        assert_eq!(accepts(FilterSpec::Equals(1i64.into()), "flux", &record), Ok(true));
    }

    #[test]
    fn equals_missing_field_fails() {
        let record = pulsar(None);
        assert_eq!(accepts(FilterSpec::Equals(1.0_f64.into()), "flux", &record), Ok(false));
    }

    #[test]
    fn one_of_matches_any_array_element() {
        let record = Record::new("p1", "Paper").with_field("keywords", json!(["VLBI", "parallax"]));
        assert_eq!(
            accepts(FilterSpec::one_of(["astrometry", "VLBI"]), "keywords", &record),
            Ok(true)
        );
        assert_eq!(accepts(FilterSpec::one_of(["timing"]), "keywords", &record), Ok(false));
    }

    #[test]
    fn bounds_are_half_open() {
        let spec = || FilterSpec::between(Some(0.76), Some(1.2));
        assert_eq!(accepts(spec(), "flux", &pulsar(Some(0.76))), Ok(true));
        assert_eq!(accepts(spec(), "flux", &pulsar(Some(1.2))), Ok(false));
        assert_eq!(accepts(spec(), "flux", &pulsar(None)), Ok(false));
    }

    #[test]
    fn any_range_accepts_missing() {
        let spec = FilterSpec::Range(RangeSpec::Any);
        assert_eq!(accepts(spec, "flux", &pulsar(None)), Ok(true));
    }

    #[test]
    fn named_bucket_range_resolves() {
        let spec = || {
            FilterSpec::Range(RangeSpec::Bucket {
                scheme: "flux_density".into(),
                label: "high".into(),
            })
        };
        assert_eq!(accepts(spec(), "flux", &pulsar(Some(1.5))), Ok(true));
        assert_eq!(accepts(spec(), "flux", &pulsar(Some(0.5))), Ok(false));
    }

    #[test]
    fn unknown_bucket_range_selects_unbucketed_values() {
        let spec = || {
            FilterSpec::Range(RangeSpec::Bucket {
                scheme: "flux_density".into(),
                label: "unknown".into(),
            })
        };
        assert_eq!(accepts(spec(), "flux", &pulsar(None)), Ok(true));
        assert_eq!(accepts(spec(), "flux", &pulsar(Some(0.1))), Ok(true));
        assert_eq!(accepts(spec(), "flux", &pulsar(Some(0.5))), Ok(false));
    }

    #[test]
    fn bucket_membership_includes_unknown_label() {
        let unknown = FilterSpec::bucket("flux_density", ["unknown"]);
        assert_eq!(accepts(unknown, "flux", &pulsar(None)), Ok(true));
        let high = FilterSpec::bucket("flux_density", ["high"]);
        assert_eq!(accepts(high, "flux", &pulsar(None)), Ok(false));
    }

    #[test]
    fn unknown_scheme_is_rejected() {
        let result = accepts(FilterSpec::bucket("distance", ["near"]), "dist", &pulsar(None));
        assert_eq!(result, Err(QueryError::UnknownBucketScheme("distance".into())));
    }

    #[test]
    fn unknown_label_is_rejected() {
        let result = accepts(FilterSpec::bucket("parallax", ["huge"]), "parallax", &pulsar(None));
        assert_eq!(
            result,
            Err(QueryError::UnknownBucketLabel {
                scheme: "parallax".into(),
                label: "huge".into()
            })
        );
    }

    #[test]
    fn search_is_case_insensitive_on_name() {
        let record = pulsar(None);
        assert!(SearchMatcher::new("j1713", &[]).matches(&record));
        assert!(SearchMatcher::new("", &[]).matches(&record));
        assert!(!SearchMatcher::new("J0437", &[]).matches(&record));
    }

    #[test]
    fn search_covers_extra_fields() {
        let fields = vec!["authors".to_string(), "keywords".to_string()];
        let record = Record::new("p1", "Parallaxes of millisecond pulsars")
            .with_field("authors", "Ding, H.; Deller, A. T.")
            .with_field("keywords", json!(["VLBI", "Astrometry"]));
        assert!(SearchMatcher::new("deller", &fields).matches(&record));
        assert!(SearchMatcher::new("astrometry", &fields).matches(&record));
        assert!(!SearchMatcher::new("timing", &fields).matches(&record));
    }
}
