//! Catalog query types.
//!
//! A [`CatalogQuery`] carries every dimension of what the caller wants to see
//! (search text, filters, sort, page) as one immutable value. Renderers
//! replace the whole value on each interaction instead of tracking the
//! dimensions separately.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Declarative catalog query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogQuery {
    /// Case-insensitive substring matched against the display name and any
    /// configured search fields. Empty means no constraint.
    #[serde(default)]
    pub search: String,

    /// Field constraints, all of which must hold.
    #[serde(default)]
    pub filters: BTreeMap<String, FilterSpec>,

    /// Sort order. Absent keeps the snapshot's insertion order.
    #[serde(default)]
    pub sort: Option<SortSpec>,

    /// Requested page.
    #[serde(default)]
    pub page: PageRequest,
}

impl CatalogQuery {
    /// Query matching everything, first page of 10.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the search text.
    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = search.into();
        self
    }

    /// Add or replace the filter on `field`.
    pub fn with_filter(mut self, field: impl Into<String>, spec: FilterSpec) -> Self {
        self.filters.insert(field.into(), spec);
        self
    }

    /// Set the sort.
    pub fn with_sort(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.sort = Some(SortSpec {
            field: field.into(),
            direction,
        });
        self
    }

    /// Set the page.
    pub fn with_page(mut self, index: u32, size: u32) -> Self {
        self.page = PageRequest { index, size };
        self
    }

    /// Apply a column-header click to the current sort.
    pub fn toggled(mut self, clicked: &str) -> Self {
        self.sort = Some(toggle_sort(self.sort.as_ref(), clicked));
        self
    }
}

/// Rule applied to one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterSpec {
    /// Exact value match.
    Equals(FilterValue),
    /// Value must be one of the listed values.
    OneOf(Vec<FilterValue>),
    /// Numeric range match.
    Range(RangeSpec),
    /// Bucket label of the field's numeric value must be one of `labels`.
    Bucket { scheme: String, labels: Vec<String> },
}

impl FilterSpec {
    /// Shorthand for a set-membership filter on strings.
    pub fn one_of<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FilterSpec::OneOf(
            values
                .into_iter()
                .map(|v| FilterValue::String(v.into()))
                .collect(),
        )
    }

    /// Shorthand for a bucket membership filter.
    pub fn bucket<I, S>(scheme: &str, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FilterSpec::Bucket {
            scheme: scheme.to_string(),
            labels: labels.into_iter().map(Into::into).collect(),
        }
    }

    /// Shorthand for an inclusive-lower, exclusive-upper numeric range.
    pub fn between(min: Option<f64>, max: Option<f64>) -> Self {
        FilterSpec::Range(RangeSpec::Bounds { min, max })
    }
}

/// Numeric range of a [`FilterSpec::Range`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangeSpec {
    /// No constraint; also accepts records missing the field.
    Any,
    /// `[min, max)`, either side optional.
    Bounds {
        #[serde(default)]
        min: Option<f64>,
        #[serde(default)]
        max: Option<f64>,
    },
    /// The range of a named bucket.
    Bucket { scheme: String, label: String },
}

/// Filter operand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl FilterValue {
    /// Numeric view, used to compare 1 and 1.0 as equal.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FilterValue::Integer(i) => Some(*i as f64),
            FilterValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Whether a single (non-array) JSON value equals this operand.
    ///
    /// A numeric operand also matches a string holding the same number, so
    /// text columns such as CSV cells and record ids filter by value.
    pub fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (FilterValue::String(expected), Value::String(actual)) => expected == actual,
            (FilterValue::Boolean(expected), Value::Bool(actual)) => expected == actual,
            (_, Value::Number(n)) => match (self.as_f64(), n.as_f64()) {
                (Some(expected), Some(actual)) => expected == actual,
                _ => false,
            },
            (_, Value::String(actual)) => match self.as_f64() {
                Some(expected) => actual.trim().parse::<f64>() == Ok(expected),
                None => false,
            },
            _ => false,
        }
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        FilterValue::String(value.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        FilterValue::String(value)
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        FilterValue::Integer(value)
    }
}

impl From<f64> for FilterValue {
    fn from(value: f64) -> Self {
        FilterValue::Float(value)
    }
}

impl From<bool> for FilterValue {
    fn from(value: bool) -> Self {
        FilterValue::Boolean(value)
    }
}

/// Sort specification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    /// Field to sort by (dotted paths allowed).
    pub field: String,

    /// Sort direction.
    #[serde(default)]
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn asc(field: &str) -> Self {
        Self {
            field: field.to_string(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: &str) -> Self {
        Self {
            field: field.to_string(),
            direction: SortDirection::Desc,
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    /// The opposite direction.
    pub fn flipped(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }

    /// Parse `asc`/`ascending`/`desc`/`descending` (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Some(SortDirection::Asc),
            "desc" | "descending" => Some(SortDirection::Desc),
            _ => None,
        }
    }
}

/// Next sort after a click on `clicked`.
///
/// Clicking the active field flips its direction; clicking any other field
/// sorts by it ascending.
pub fn toggle_sort(current: Option<&SortSpec>, clicked: &str) -> SortSpec {
    match current {
        Some(sort) if sort.field == clicked => SortSpec {
            field: sort.field.clone(),
            direction: sort.direction.flipped(),
        },
        _ => SortSpec::asc(clicked),
    }
}

/// Requested page (1-based index).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageRequest {
    #[serde(default = "default_page_index")]
    pub index: u32,

    #[serde(default = "default_page_size")]
    pub size: u32,
}

fn default_page_index() -> u32 {
    1
}

fn default_page_size() -> u32 {
    10
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            index: default_page_index(),
            size: default_page_size(),
        }
    }
}

impl PageRequest {
    /// Half-open slice bounds of this page within `total` items.
    pub fn bounds(&self, total: usize) -> (usize, usize) {
        let size = self.size as usize;
        let start = (self.index.saturating_sub(1) as usize)
            .saturating_mul(size)
            .min(total);
        let end = start.saturating_add(size).min(total);
        (start, end)
    }
}
