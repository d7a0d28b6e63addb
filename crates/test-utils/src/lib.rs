//! MSPSRpi test utilities.
//!
//! Helpers for integration testing: record builders, sample catalogs in
//! their on-disk shapes, and assertion utilities for query results.

use mspsrpi_engine::Record;
use serde_json::Value as JsonValue;

/// Create a test record with an id and display name.
pub fn test_record(id: &str, name: &str) -> TestRecord {
    TestRecord {
        id: id.to_string(),
        name: name.to_string(),
        fields: serde_json::json!({}),
    }
}

/// A test record builder for creating fixtures.
#[derive(Debug, Clone)]
pub struct TestRecord {
    pub id: String,
    pub name: String,
    pub fields: JsonValue,
}

impl TestRecord {
    /// Add a single field.
    pub fn with_field(mut self, name: &str, value: JsonValue) -> Self {
        if let Some(obj) = self.fields.as_object_mut() {
            obj.insert(name.to_string(), value);
        }
        self
    }

    /// Set the 1.4 GHz flux density (mJy).
    pub fn with_flux(self, flux: f64) -> Self {
        self.with_field("flux", serde_json::json!(flux))
    }

    /// Set the parallax (mas).
    pub fn with_parallax(self, parallax: f64) -> Self {
        self.with_field("parallax", serde_json::json!(parallax))
    }

    /// Set the survey phase.
    pub fn in_phase(self, phase: &str) -> Self {
        self.with_field("phase", serde_json::json!(phase))
    }

    /// Build the engine record.
    pub fn build(self) -> Record {
        let mut record = Record::new(self.id, self.name);
        if let JsonValue::Object(fields) = self.fields {
            record.fields = fields;
        }
        record
    }
}

/// The three-record catalog used throughout the query tests.
///
/// Fluxes 0.5, 1.0 and 1.5 fall in the low, medium and high flux density
/// buckets respectively.
pub fn abc_catalog() -> Vec<Record> {
    vec![
        test_record("1", "A").with_flux(0.5).build(),
        test_record("2", "B").with_flux(1.0).build(),
        test_record("3", "C").with_flux(1.5).build(),
    ]
}

/// A handful of pulsars across phases, with one missing its parallax.
pub fn pulsar_catalog() -> Vec<Record> {
    vec![
        test_record("1", "J0437-4715")
            .in_phase("PSRPI")
            .with_parallax(6.4)
            .with_flux(149.0)
            .build(),
        test_record("2", "J1012+5307")
            .in_phase("MSPSRPI")
            .with_parallax(1.17)
            .with_flux(3.0)
            .build(),
        test_record("3", "J1640+2224")
            .in_phase("MSPSRPI")
            .with_parallax(0.68)
            .with_flux(2.0)
            .build(),
        test_record("4", "J2145-0750")
            .in_phase("MSPSRPI2")
            .with_flux(0.9)
            .build(),
        test_record("5", "J1713+0747")
            .in_phase("MSPSRPI")
            .with_parallax(0.95)
            .with_flux(0.3)
            .build(),
    ]
}

/// On-disk sample catalogs, as the site loads them.
pub mod sources {
    use serde_json::{Value as JsonValue, json};

    /// A data release catalog: a bare array of pulsar objects.
    pub fn data_release() -> JsonValue {
        json!([
            {"id": 1, "name": "J0437-4715", "phase": "PSRPI", "parallax": 6.4, "status": "published"},
            {"id": 2, "name": "J1012+5307", "phase": "MSPSRPI", "parallax": 1.17, "status": "published"},
            {"id": 3, "name": "J1640+2224", "phase": "MSPSRPI", "parallax": 0.68, "status": "in-prep"},
            {"id": 4, "name": "J2145-0750", "phase": "MSPSRPI2", "status": "observing"}
        ])
    }

    /// A first-phase details catalog: pulsars nested under `pulsars` with
    /// flux densities stored as strings.
    pub fn mspsrpi_details() -> JsonValue {
        json!({
            "pulsars": [
                {"name": "J1012+5307", "flux_density_1_4GHz": "3.0", "ra": "10:12:33.4", "dec": "+53:07:02.3"},
                {"name": "J1640+2224", "flux_density_1_4GHz": "0.54", "ra": "16:40:16.7", "dec": "+22:24:08.8"},
                {"name": "J1738+0333", "flux_density_1_4GHz": "0.9", "ra": "17:38:53.9", "dec": "+03:33:10.9"},
                {"name": "J2010-1323", "flux_density_1_4GHz": "n/a"}
            ]
        })
    }

    /// A second-phase catalog with numeric flux and preformatted categories.
    pub fn mspsrpi2() -> JsonValue {
        json!([
            {"id": "m2-1", "name": "J0030+0451", "fluxDensity": 0.6, "fluxCategory": "0.2-0.76 mJy", "epochs_observed": 8, "inbeam_calibrators": ["J0030+0451-IBC1"]},
            {"id": "m2-2", "name": "J0621+1002", "fluxDensity": 1.9, "fluxCategory": ">1.2 mJy", "epochs_observed": 6},
            {"id": "m2-3", "name": "J1022+1001", "fluxDensity": 0.8, "fluxCategory": "0.76-1.2 mJy", "epochs_observed": 4}
        ])
    }

    /// The publications sheet, as exported to CSV.
    pub fn publications_csv() -> &'static str {
        "phase,title,authors,year,journal,doi,abstract,keywords,highlight,volume\n\
         mspsrpi,Parallaxes of millisecond pulsars,\"Ding, H.; Deller, A. T.\",2023,MNRAS,10.1093/mnras/stad001,VLBI astrometry of MSPs,VLBI;astrometry,TRUE,520\n\
         PSRPI,The PSRPI survey,\"Deller, A. T.\",2019,ApJ,10.3847/1538-4357/ab11c8,Pulsar parallaxes,\"parallax, distances\",false,875\n\
         ,Missing phase,Nobody,2020,,,,,,\n\
         EVN,Unrelated campaign,\"Smith, J.\",2021,A&A,,,timing,1,520\n"
    }
}

/// Assertion helpers for records and pages.
pub mod assert {
    use mspsrpi_engine::{Record, ResultPage};
    use serde_json::Value;

    /// Assert that a JSON value has a specific key.
    pub fn has_key(value: &Value, key: &str) {
        assert!(
            value.get(key).is_some(),
            "Expected JSON to have key '{key}', got: {value}"
        );
    }

    /// Ids of a record list, in order.
    pub fn ids(records: &[Record]) -> Vec<String> {
        records.iter().map(|r| r.id.clone()).collect()
    }

    /// Assert the ids on a page, in order.
    pub fn page_ids(page: &ResultPage, expected: &[&str]) {
        assert_eq!(
            ids(&page.items),
            expected.iter().map(|s| s.to_string()).collect::<Vec<_>>(),
            "unexpected page contents (total {})",
            page.total_matches
        );
    }
}
