//! Query-string parameters.
//!
//! Translates flat `key=value` pairs (from a URL or the command line) into a
//! [`CatalogQuery`]:
//!
//! - `q` search text, `sort` field, `dir` direction, `toggle` clicked field
//! - `page`, `per_page`
//! - `filter.<field>=a|b` set membership
//! - `bucket.<field>=<scheme>:<label>|<label>` bucket membership
//! - `range.<field>=<min>..<max>` numeric range, either side optional, or
//!   `any`

use mspsrpi_engine::{
    CatalogQuery, FilterSpec, FilterValue, RangeSpec, SortDirection, SortSpec,
};
use thiserror::Error;

/// A parameter that could not be understood.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParamError {
    #[error("invalid value for '{key}': {reason}")]
    Invalid { key: String, reason: String },
}

impl ParamError {
    fn invalid(key: &str, reason: impl Into<String>) -> Self {
        ParamError::Invalid {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

/// Parsed parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryParams {
    pub query: CatalogQuery,

    /// Field whose column header was clicked.
    pub toggle: Option<String>,
}

impl QueryParams {
    /// Apply the toggle (if any) on top of `current`, the sort in effect.
    pub fn into_query(self, current: Option<&SortSpec>) -> CatalogQuery {
        let mut query = self.query;
        if let Some(clicked) = self.toggle {
            let current = query.sort.as_ref().or(current).cloned();
            query.sort = Some(mspsrpi_engine::toggle_sort(current.as_ref(), &clicked));
        }
        query
    }
}

/// Parse key/value pairs; `default_page_size` applies without `per_page`.
pub fn parse(pairs: &[(String, String)], default_page_size: u32) -> Result<QueryParams, ParamError> {
    let mut query = CatalogQuery::new().with_page(1, default_page_size);
    let mut sort_field: Option<String> = None;
    let mut direction = SortDirection::Asc;
    let mut toggle = None;

    for (key, value) in pairs {
        match key.as_str() {
            "q" => query.search = value.clone(),
            "sort" if !value.is_empty() => sort_field = Some(value.clone()),
            "sort" => {}
            "dir" => {
                direction = SortDirection::parse(value)
                    .ok_or_else(|| ParamError::invalid(key, "expected asc or desc"))?;
            }
            "toggle" if !value.is_empty() => toggle = Some(value.clone()),
            "toggle" => {}
            "page" => query.page.index = parse_u32(key, value)?,
            "per_page" => query.page.size = parse_u32(key, value)?,
            _ => {
                if let Some(field) = key.strip_prefix("filter.") {
                    query.filters.insert(field_name(key, field)?, parse_one_of(value));
                } else if let Some(field) = key.strip_prefix("bucket.") {
                    query
                        .filters
                        .insert(field_name(key, field)?, parse_bucket(key, value)?);
                } else if let Some(field) = key.strip_prefix("range.") {
                    query
                        .filters
                        .insert(field_name(key, field)?, parse_range(key, value)?);
                } else {
                    tracing::debug!(key = %key, "ignoring unknown query parameter");
                }
            }
        }
    }

    query.sort = sort_field.map(|field| SortSpec { field, direction });
    Ok(QueryParams { query, toggle })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ParamError> {
    value
        .trim()
        .parse()
        .map_err(|_| ParamError::invalid(key, format!("'{value}' is not a non-negative integer")))
}

fn field_name(key: &str, field: &str) -> Result<String, ParamError> {
    if field.is_empty() {
        Err(ParamError::invalid(key, "missing field name"))
    } else {
        Ok(field.to_string())
    }
}

/// `a|b|c`; each value is read as JSON when it parses, else as a string.
fn parse_one_of(value: &str) -> FilterSpec {
    FilterSpec::OneOf(value.split('|').map(parse_value).collect())
}

fn parse_value(raw: &str) -> FilterValue {
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(serde_json::Value::Bool(b)) => FilterValue::Boolean(b),
        Ok(serde_json::Value::Number(n)) => match n.as_i64() {
            Some(i) => FilterValue::Integer(i),
            None => n
                .as_f64()
                .map_or_else(|| FilterValue::String(raw.to_string()), FilterValue::Float),
        },
        Ok(serde_json::Value::String(s)) => FilterValue::String(s),
        _ => FilterValue::String(raw.to_string()),
    }
}

fn parse_bucket(key: &str, value: &str) -> Result<FilterSpec, ParamError> {
    let Some((scheme, labels)) = value.split_once(':') else {
        return Err(ParamError::invalid(key, "expected <scheme>:<label>|<label>"));
    };
    if scheme.is_empty() {
        return Err(ParamError::invalid(key, "missing bucket scheme"));
    }
    Ok(FilterSpec::bucket(
        scheme,
        labels.split('|').filter(|l| !l.is_empty()),
    ))
}

fn parse_range(key: &str, value: &str) -> Result<FilterSpec, ParamError> {
    if value.eq_ignore_ascii_case("any") {
        return Ok(FilterSpec::Range(RangeSpec::Any));
    }
    let Some((min, max)) = value.split_once("..") else {
        return Err(ParamError::invalid(key, "expected <min>..<max>"));
    };
    Ok(FilterSpec::between(
        parse_bound(key, min)?,
        parse_bound(key, max)?,
    ))
}

fn parse_bound(key: &str, raw: &str) -> Result<Option<f64>, ParamError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .map(Some)
        .ok_or_else(|| ParamError::invalid(key, format!("'{raw}' is not a number")))
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults() {
        let params = parse(&[], 12).unwrap();
        assert_eq!(params.query.page.size, 12);
        assert_eq!(params.query.page.index, 1);
        assert!(params.query.sort.is_none());
        assert!(params.toggle.is_none());
    }

    #[test]
    fn search_sort_and_page() {
        let params = parse(
            &pairs(&[("q", "J04"), ("sort", "parallax"), ("dir", "desc"), ("page", "3"), ("per_page", "5")]),
            10,
        )
        .unwrap();
        assert_eq!(params.query.search, "J04");
        assert_eq!(params.query.sort, Some(SortSpec::desc("parallax")));
        assert_eq!(params.query.page.index, 3);
        assert_eq!(params.query.page.size, 5);
    }

    #[test]
    fn filters() {
        let params = parse(
            &pairs(&[
                ("filter.phase", "MSPSRPI|MSPSRPI2"),
                ("filter.year", "2019"),
                ("bucket.fluxDensity", "flux_density:low|high"),
                ("range.parallax", "0.8.."),
                ("range.dm", "any"),
            ]),
            10,
        )
        .unwrap();
        let filters = &params.query.filters;
        assert_eq!(filters["phase"], FilterSpec::one_of(["MSPSRPI", "MSPSRPI2"]));
        assert_eq!(filters["year"], FilterSpec::OneOf(vec![FilterValue::Integer(2019)]));
        assert_eq!(
            filters["fluxDensity"],
            FilterSpec::bucket("flux_density", ["low", "high"])
        );
        assert_eq!(filters["parallax"], FilterSpec::between(Some(0.8), None));
        assert_eq!(filters["dm"], FilterSpec::Range(RangeSpec::Any));
    }

    #[test]
    fn bad_values_are_rejected() {
        assert!(parse(&pairs(&[("dir", "up")]), 10).is_err());
        assert!(parse(&pairs(&[("page", "-1")]), 10).is_err());
        assert!(parse(&pairs(&[("bucket.flux", "low")]), 10).is_err());
        assert!(parse(&pairs(&[("range.flux", "a..b")]), 10).is_err());
        assert!(parse(&pairs(&[("filter.", "x")]), 10).is_err());
    }

    #[test]
    fn zero_page_passes_through_for_the_engine_to_reject() {
        let params = parse(&pairs(&[("page", "0")]), 10).unwrap();
        assert_eq!(params.query.page.index, 0);
    }

    #[test]
    fn toggle_uses_current_sort() {
        let params = parse(&pairs(&[("toggle", "name")]), 10).unwrap();
        let query = params.into_query(Some(&SortSpec::asc("name")));
        assert_eq!(query.sort, Some(SortSpec::desc("name")));

        let params = parse(&pairs(&[("sort", "name"), ("dir", "desc"), ("toggle", "flux")]), 10).unwrap();
        let query = params.into_query(None);
        assert_eq!(query.sort, Some(SortSpec::asc("flux")));
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let params = parse(&pairs(&[("utm_source", "x")]), 10).unwrap();
        assert!(params.query.filters.is_empty());
    }
}
