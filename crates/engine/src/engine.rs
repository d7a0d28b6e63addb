//! Query evaluation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::bucket::{BucketRegistry, DerivedField};
use crate::collate;
use crate::error::QueryError;
use crate::filter::{self, SearchMatcher};
use crate::query::{CatalogQuery, PageRequest};
use crate::record::Record;
use crate::result::ResultPage;
use crate::sort;

/// Evaluates catalog queries against an in-memory record snapshot.
///
/// The engine holds configuration only (bucket schemes, extra search
/// fields, derived fields). Every call is independent.
#[derive(Debug, Clone, Default)]
pub struct CatalogQueryEngine {
    buckets: BucketRegistry,
    search_fields: Vec<String>,
    derived: Vec<DerivedField>,
}

/// A distinct field value with the number of records carrying it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacetCount {
    pub value: Value,
    pub count: u64,
}

impl CatalogQueryEngine {
    /// Create an engine over the given bucket schemes.
    pub fn new(buckets: BucketRegistry) -> Self {
        Self {
            buckets,
            search_fields: Vec::new(),
            derived: Vec::new(),
        }
    }

    /// Also match search text against these fields.
    pub fn with_search_fields(mut self, fields: Vec<String>) -> Self {
        self.search_fields = fields;
        self
    }

    /// Precompute these bucket fields in [`CatalogQueryEngine::derive_fields`].
    pub fn with_derived_fields(mut self, derived: Vec<DerivedField>) -> Self {
        self.derived = derived;
        self
    }

    /// The bucket schemes this engine resolves against.
    pub fn buckets(&self) -> &BucketRegistry {
        &self.buckets
    }

    /// Extra search fields.
    pub fn search_fields(&self) -> &[String] {
        &self.search_fields
    }

    /// Check a query without evaluating it.
    pub fn validate(&self, query: &CatalogQuery) -> Result<(), QueryError> {
        check_page(&query.page)?;
        filter::compile(&query.filters, &self.buckets).map(|_| ())
    }

    /// Evaluate `query` against `records`.
    ///
    /// Filters, then sorts (when a sort is given; otherwise the input order
    /// is kept), then slices out the requested page. A page past the end
    /// yields no items but the same totals.
    pub fn evaluate(
        &self,
        records: &[Record],
        query: &CatalogQuery,
    ) -> Result<ResultPage, QueryError> {
        check_page(&query.page)?;

        let filters = filter::compile(&query.filters, &self.buckets)?;
        let search = SearchMatcher::new(&query.search, &self.search_fields);

        let mut matches: Vec<(usize, &Record)> = records
            .iter()
            .enumerate()
            .filter(|(_, record)| {
                search.matches(record) && filters.iter().all(|f| f.accepts(record))
            })
            .collect();

        if let Some(sort) = &query.sort {
            sort::sort_matches(&mut matches, sort);
        }

        let total = matches.len();
        let (start, end) = query.page.bounds(total);
        let items: Vec<Record> = matches[start..end]
            .iter()
            .map(|(_, record)| (*record).clone())
            .collect();

        tracing::debug!(
            records = records.len(),
            matches = total,
            page = query.page.index,
            returned = items.len(),
            "catalog query evaluated"
        );

        Ok(ResultPage::new(
            items,
            total as u64,
            query.page.index,
            query.page.size,
        ))
    }

    /// Copy `records`, adding every configured derived bucket field.
    pub fn derive_fields(&self, records: &[Record]) -> Result<Vec<Record>, QueryError> {
        let resolved = self
            .derived
            .iter()
            .map(|d| self.buckets.scheme(&d.scheme).map(|scheme| (d, scheme)))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(records
            .iter()
            .map(|record| {
                resolved
                    .iter()
                    .fold(record.clone(), |acc, (derived, scheme)| {
                        derived.apply(scheme, &acc)
                    })
            })
            .collect())
    }

    /// Bucket label of `value` under the named scheme.
    pub fn bucket_label(&self, scheme: &str, value: Option<f64>) -> Result<String, QueryError> {
        Ok(self.buckets.scheme(scheme)?.label_for(value).to_string())
    }

    /// Distinct values of `field` with their counts.
    ///
    /// Numbers are listed descending (newest year first), strings by
    /// collation, anything else by its JSON text. Array fields contribute
    /// each element. Records without the field are not counted.
    pub fn facet(&self, records: &[Record], field: &str) -> Vec<FacetCount> {
        let mut counts: BTreeMap<String, FacetCount> = BTreeMap::new();
        for record in records {
            let Some(value) = record.get(field) else {
                continue;
            };
            let values = match value {
                Value::Array(items) => items,
                other => vec![other],
            };
            for item in values.into_iter().filter(|v| !v.is_null()) {
                counts
                    .entry(item.to_string())
                    .and_modify(|f| f.count += 1)
                    .or_insert(FacetCount {
                        value: item,
                        count: 1,
                    });
            }
        }

        let mut facets: Vec<FacetCount> = counts.into_values().collect();
        facets.sort_by(|a, b| match (&a.value, &b.value) {
            (Value::Number(x), Value::Number(y)) => {
                let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
                y.total_cmp(&x)
            }
            (Value::Number(_), _) => std::cmp::Ordering::Less,
            (_, Value::Number(_)) => std::cmp::Ordering::Greater,
            (Value::String(x), Value::String(y)) => collate::compare(x, y),
            (x, y) => x.to_string().cmp(&y.to_string()),
        });
        facets
    }
}

fn check_page(page: &PageRequest) -> Result<(), QueryError> {
    if page.size < 1 {
        return Err(QueryError::InvalidPageSize(page.size));
    }
    if page.index < 1 {
        return Err(QueryError::InvalidPageIndex(page.index));
    }
    Ok(())
}
