//! Bucket schemes: categorical labels derived from continuous measurements.
//!
//! A scheme is an ordered list of half-open ranges. The same
//! [`BucketScheme::label_for`] is used to precompute display fields and to
//! evaluate bucket filters, so a record is always shown under the bucket it
//! is filtered by.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::QueryError;
use crate::record::Record;

/// Label reported when no range matches (including absent values).
pub const UNKNOWN_BUCKET: &str = "unknown";

/// One labelled range: `min` inclusive, `max` exclusive. An absent bound is
/// unbounded on that side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketRange {
    pub label: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,

    /// Human-readable text for the renderer (e.g. "0.2-0.76 mJy").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl BucketRange {
    /// Shorthand for a range without a description.
    pub fn new(label: &str, min: Option<f64>, max: Option<f64>) -> Self {
        Self {
            label: label.to_string(),
            min,
            max,
            description: None,
        }
    }

    /// Attach a display description.
    pub fn describe(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    /// Whether `value` falls within `[min, max)`.
    pub fn contains(&self, value: f64) -> bool {
        in_bounds(value, self.min, self.max)
    }
}

/// Half-open bounds check shared by buckets and range filters.
pub(crate) fn in_bounds(value: f64, min: Option<f64>, max: Option<f64>) -> bool {
    if value.is_nan() {
        return false;
    }
    min.is_none_or(|lo| value >= lo) && max.is_none_or(|hi| value < hi)
}

/// A named, ordered list of ranges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketScheme {
    pub name: String,
    pub ranges: Vec<BucketRange>,
}

impl BucketScheme {
    pub fn new(name: &str, ranges: Vec<BucketRange>) -> Self {
        Self {
            name: name.to_string(),
            ranges,
        }
    }

    /// Label of the first range containing `value`, or [`UNKNOWN_BUCKET`].
    pub fn label_for(&self, value: Option<f64>) -> &str {
        value
            .and_then(|v| self.ranges.iter().find(|r| r.contains(v)))
            .map_or(UNKNOWN_BUCKET, |r| r.label.as_str())
    }

    /// The range carrying `label`, if any.
    pub fn range_for(&self, label: &str) -> Option<&BucketRange> {
        self.ranges.iter().find(|r| r.label == label)
    }

    /// Whether `label` can be produced by this scheme.
    pub fn has_label(&self, label: &str) -> bool {
        label == UNKNOWN_BUCKET || self.range_for(label).is_some()
    }

    /// MSPSRpi 1.4 GHz flux density classes (mJy). The classes map to
    /// 4-hour, 2-hour and 1-hour observing sessions respectively.
    pub fn flux_density() -> Self {
        Self::new(
            "flux_density",
            vec![
                BucketRange::new("low", Some(0.2), Some(0.76)).describe("0.2-0.76 mJy"),
                BucketRange::new("medium", Some(0.76), Some(1.2)).describe("0.76-1.2 mJy"),
                BucketRange::new("high", Some(1.2), None).describe(">1.2 mJy"),
            ],
        )
    }

    /// Parallax classes used by the data release catalog (mas).
    pub fn parallax() -> Self {
        Self::new(
            "parallax",
            vec![
                BucketRange::new("low", None, Some(0.8)).describe("< 0.8 mas"),
                BucketRange::new("medium", Some(0.8), Some(1.5)).describe("0.8-1.5 mas"),
                BucketRange::new("high", Some(1.5), None).describe(">= 1.5 mas"),
            ],
        )
    }
}

/// Named bucket schemes available to queries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BucketRegistry {
    schemes: BTreeMap<String, BucketScheme>,
}

impl BucketRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the flux density and parallax schemes.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(BucketScheme::flux_density());
        registry.register(BucketScheme::parallax());
        registry
    }

    /// Add or replace a scheme under its own name.
    pub fn register(&mut self, scheme: BucketScheme) {
        self.schemes.insert(scheme.name.clone(), scheme);
    }

    /// Look up a scheme, failing loudly for unknown names.
    pub fn scheme(&self, name: &str) -> Result<&BucketScheme, QueryError> {
        self.schemes
            .get(name)
            .ok_or_else(|| QueryError::UnknownBucketScheme(name.to_string()))
    }

    /// Whether a scheme is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.schemes.contains_key(name)
    }

    /// Merge another registry into this one; later schemes win.
    pub fn extend(&mut self, other: BucketRegistry) {
        self.schemes.extend(other.schemes);
    }
}

/// A display field precomputed from a raw measurement.
///
/// `field` receives the bucket label of the numeric value at `source`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedField {
    pub field: String,
    pub source: String,
    pub scheme: String,
}

impl DerivedField {
    pub fn new(field: &str, source: &str, scheme: &str) -> Self {
        Self {
            field: field.to_string(),
            source: source.to_string(),
            scheme: scheme.to_string(),
        }
    }

    /// Write the label into a copy of `record`.
    pub(crate) fn apply(&self, scheme: &BucketScheme, record: &Record) -> Record {
        let label = scheme.label_for(record.number(&self.source)).to_string();
        record.clone().with_field(self.field.clone(), label)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flux_density_labels() {
        let scheme = BucketScheme::flux_density();
        assert_eq!(scheme.label_for(Some(0.5)), "low");
        assert_eq!(scheme.label_for(Some(0.76)), "medium");
        assert_eq!(scheme.label_for(Some(1.0)), "medium");
        assert_eq!(scheme.label_for(Some(1.2)), "high");
        assert_eq!(scheme.label_for(Some(40.0)), "high");
    }

    #[test]
    fn below_first_range_is_unknown() {
        let scheme = BucketScheme::flux_density();
        assert_eq!(scheme.label_for(Some(0.1)), UNKNOWN_BUCKET);
    }

    #[test]
    fn absent_and_nan_are_unknown() {
        let scheme = BucketScheme::parallax();
        assert_eq!(scheme.label_for(None), UNKNOWN_BUCKET);
        assert_eq!(scheme.label_for(Some(f64::NAN)), UNKNOWN_BUCKET);
    }

    #[test]
    fn parallax_low_is_unbounded_below() {
        let scheme = BucketScheme::parallax();
        assert_eq!(scheme.label_for(Some(-0.3)), "low");
        assert_eq!(scheme.label_for(Some(0.79)), "low");
        assert_eq!(scheme.label_for(Some(1.5)), "high");
    }

    #[test]
    fn first_matching_range_wins() {
        let scheme = BucketScheme::new(
            "overlap",
            vec![
                BucketRange::new("first", Some(0.0), Some(10.0)),
                BucketRange::new("second", Some(5.0), Some(15.0)),
            ],
        );
        assert_eq!(scheme.label_for(Some(7.0)), "first");
        assert_eq!(scheme.label_for(Some(12.0)), "second");
    }

    #[test]
    fn has_label_accepts_unknown() {
        let scheme = BucketScheme::flux_density();
        assert!(scheme.has_label("high"));
        assert!(scheme.has_label(UNKNOWN_BUCKET));
        assert!(!scheme.has_label("bright"));
    }

    #[test]
    fn registry_unknown_scheme_errors() {
        let registry = BucketRegistry::builtin();
        assert!(registry.scheme("parallax").is_ok());
        assert_eq!(
            registry.scheme("distance"),
            Err(QueryError::UnknownBucketScheme("distance".to_string()))
        );
    }

    #[test]
    fn registry_deserializes_from_map() {
        let json = r#"{"dm": {"name": "dm", "ranges": [{"label": "near", "max": 20.0}]}}"#;
        let registry: BucketRegistry = serde_json::from_str(json).unwrap();
        let scheme = registry.scheme("dm").unwrap();
        assert_eq!(scheme.label_for(Some(3.0)), "near");
        assert_eq!(scheme.label_for(Some(30.0)), UNKNOWN_BUCKET);
    }

    #[test]
    fn derived_field_writes_label() {
        let derived = DerivedField::new("fluxBucket", "flux", "flux_density");
        let record = Record::new("1", "A").with_field("flux", "1.5");
        let out = derived.apply(&BucketScheme::flux_density(), &record);
        assert_eq!(out.get("fluxBucket"), Some(serde_json::json!("high")));
        assert_eq!(record.get("fluxBucket"), None);
    }
}
