//! Query engine integration tests.
//!
//! Drives the public API end to end over small catalogs: derived bucket
//! fields, filters, search, sort toggling and pagination.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use mspsrpi_engine::{
    BucketRegistry, CatalogQuery, CatalogQueryEngine, DerivedField, FilterSpec, QueryError,
    SortDirection, SortSpec, UNKNOWN_BUCKET,
};
use mspsrpi_test_utils::{abc_catalog, assert, pulsar_catalog, test_record};
use serde_json::json;

fn engine() -> CatalogQueryEngine {
    CatalogQueryEngine::new(BucketRegistry::builtin()).with_derived_fields(vec![
        DerivedField::new("fluxBucket", "flux", "flux_density"),
        DerivedField::new("parallaxBucket", "parallax", "parallax"),
    ])
}

// -------------------------------------------------------------------------
// Scenarios
// -------------------------------------------------------------------------

#[test]
fn high_flux_sorted_descending() {
    let engine = engine();
    let records = engine.derive_fields(&abc_catalog()).unwrap();
    let query = CatalogQuery::new()
        .with_filter("fluxBucket", FilterSpec::one_of(["high"]))
        .with_sort("flux", SortDirection::Desc)
        .with_page(1, 10);

    let page = engine.evaluate(&records, &query).unwrap();
    assert::page_ids(&page, &["3"]);
    assert_eq!(page.total_matches, 1);
    assert_eq!(page.page_count, 1);
}

#[test]
fn search_single_letter() {
    let page = engine()
        .evaluate(&abc_catalog(), &CatalogQuery::new().with_search("b"))
        .unwrap();
    assert::page_ids(&page, &["2"]);
}

#[test]
fn second_page_holds_the_remainder() {
    let engine = engine();
    let first = engine
        .evaluate(&abc_catalog(), &CatalogQuery::new().with_page(1, 2))
        .unwrap();
    assert_eq!(first.items.len(), 2);
    assert_eq!(first.total_matches, 3);
    assert_eq!(first.page_count, 2);
    assert!(first.has_next);

    let second = engine
        .evaluate(&abc_catalog(), &CatalogQuery::new().with_page(2, 2))
        .unwrap();
    assert::page_ids(&second, &["3"]);
    assert!(!second.has_next);
    assert!(second.has_prev);
}

#[test]
fn toggling_name_sort_reverses_order() {
    let engine = engine();
    let ascending = CatalogQuery::new().with_sort("name", SortDirection::Asc);
    let page = engine.evaluate(&abc_catalog(), &ascending).unwrap();
    assert::page_ids(&page, &["1", "2", "3"]);

    let descending = ascending.toggled("name");
    assert_eq!(descending.sort, Some(SortSpec::desc("name")));
    let page = engine.evaluate(&abc_catalog(), &descending).unwrap();
    assert::page_ids(&page, &["3", "2", "1"]);
}

#[test]
fn page_past_the_end_is_empty_with_totals() {
    let page = engine()
        .evaluate(&abc_catalog(), &CatalogQuery::new().with_page(9, 2))
        .unwrap();
    assert!(page.items.is_empty());
    assert_eq!(page.total_matches, 3);
    assert_eq!(page.page_count, 2);
    assert!(page.is_out_of_range());
}

#[test]
fn empty_catalog_yields_empty_page() {
    let page = engine().evaluate(&[], &CatalogQuery::new()).unwrap();
    assert!(page.items.is_empty());
    assert_eq!(page.total_matches, 0);
    assert_eq!(page.page_count, 0);
}

// -------------------------------------------------------------------------
// Buckets
// -------------------------------------------------------------------------

#[test]
fn missing_parallax_lands_in_unknown_bucket() {
    let engine = engine();
    let records = engine.derive_fields(&pulsar_catalog()).unwrap();
    let query = CatalogQuery::new()
        .with_filter("parallaxBucket", FilterSpec::one_of([UNKNOWN_BUCKET]));
    let page = engine.evaluate(&records, &query).unwrap();
    assert::page_ids(&page, &["4"]);
}

#[test]
fn bucket_filter_on_raw_field_matches_derived_label() {
    let engine = engine();
    let records = engine.derive_fields(&pulsar_catalog()).unwrap();

    let by_raw = CatalogQuery::new()
        .with_filter("parallax", FilterSpec::bucket("parallax", ["medium"]));
    let by_derived =
        CatalogQuery::new().with_filter("parallaxBucket", FilterSpec::one_of(["medium"]));

    let raw = engine.evaluate(&records, &by_raw).unwrap();
    let derived = engine.evaluate(&records, &by_derived).unwrap();
    assert_eq!(raw.items, derived.items);
    assert::page_ids(&raw, &["2", "5"]);
}

#[test]
fn unknown_bucket_label_fails_the_query() {
    let query = CatalogQuery::new().with_filter("flux", FilterSpec::bucket("flux_density", ["x"]));
    assert_eq!(
        engine().evaluate(&abc_catalog(), &query),
        Err(QueryError::UnknownBucketLabel {
            scheme: "flux_density".into(),
            label: "x".into()
        })
    );
}

// -------------------------------------------------------------------------
// Filters and search
// -------------------------------------------------------------------------

#[test]
fn filters_combine_with_search() {
    let query = CatalogQuery::new()
        .with_search("j1")
        .with_filter("phase", FilterSpec::one_of(["MSPSRPI"]))
        .with_sort("parallax", SortDirection::Asc);
    let page = engine().evaluate(&pulsar_catalog(), &query).unwrap();
    assert::page_ids(&page, &["3", "5", "2"]);
}

#[test]
fn range_filter_excludes_missing_values() {
    let query = CatalogQuery::new().with_filter("parallax", FilterSpec::between(Some(0.0), None));
    let page = engine().evaluate(&pulsar_catalog(), &query).unwrap();
    assert_eq!(page.total_matches, 4);
}

#[test]
fn search_over_configured_fields() {
    let engine = CatalogQueryEngine::new(BucketRegistry::builtin())
        .with_search_fields(vec!["authors".into(), "keywords".into()]);
    let records = vec![
        test_record("p1", "Parallaxes of millisecond pulsars")
            .with_field("authors", json!("Ding, H.; Deller, A. T."))
            .with_field("keywords", json!(["VLBI", "astrometry"]))
            .build(),
        test_record("p2", "Pulsar timing")
            .with_field("authors", json!("Smith, J."))
            .build(),
    ];

    let page = engine
        .evaluate(&records, &CatalogQuery::new().with_search("DELLER"))
        .unwrap();
    assert::page_ids(&page, &["p1"]);

    let page = engine
        .evaluate(&records, &CatalogQuery::new().with_search("vlbi"))
        .unwrap();
    assert::page_ids(&page, &["p1"]);
}

// -------------------------------------------------------------------------
// Sorting
// -------------------------------------------------------------------------

#[test]
fn missing_values_sort_last_both_ways() {
    let engine = engine();
    let asc = engine
        .evaluate(
            &pulsar_catalog(),
            &CatalogQuery::new().with_sort("parallax", SortDirection::Asc),
        )
        .unwrap();
    assert::page_ids(&asc, &["3", "5", "2", "1", "4"]);

    let desc = engine
        .evaluate(
            &pulsar_catalog(),
            &CatalogQuery::new().with_sort("parallax", SortDirection::Desc),
        )
        .unwrap();
    assert::page_ids(&desc, &["1", "2", "5", "3", "4"]);
}

#[test]
fn no_sort_keeps_insertion_order() {
    let page = engine()
        .evaluate(&pulsar_catalog(), &CatalogQuery::new())
        .unwrap();
    assert::page_ids(&page, &["1", "2", "3", "4", "5"]);
}

#[test]
fn facets_of_phase() {
    let facets = engine().facet(&pulsar_catalog(), "phase");
    let summary: Vec<(String, u64)> = facets
        .into_iter()
        .map(|f| (f.value.as_str().unwrap().to_string(), f.count))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("MSPSRPI".to_string(), 3),
            ("MSPSRPI2".to_string(), 1),
            ("PSRPI".to_string(), 1),
        ]
    );
}
