//! Source schemas.
//!
//! Each data phase publishes its catalog in its own shape. A
//! [`SourceSchema`] maps one of those shapes onto canonical [`Record`]s so
//! the query engine never has to know where a record came from.

use std::collections::HashSet;

use mspsrpi_engine::Record;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::loader::LoadError;

/// Survey phases a publication may belong to.
pub const KNOWN_PHASES: [&str; 3] = ["PSRPI", "MSPSRPI", "MSPSRPI2"];

/// Numeric fields of the data release catalog.
const DATA_RELEASE_NUMERIC: [&str; 3] = ["parallax", "properMotionRA", "properMotionDec"];

/// Known raw catalog shapes.
///
/// Written in manifests as a map keyed by `kind`, e.g.
/// `{kind: generic, name_field: target}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceSchema {
    /// Array of pulsars with parallax and proper motion.
    DataRelease,
    /// Object whose `pulsars` array carries string 1.4 GHz flux densities.
    Mspsrpi,
    /// Array of second-phase pulsars with `fluxDensity`.
    Mspsrpi2,
    /// Publication rows as exported from the shared sheet.
    Publications,
    /// Array of objects, display name read from `name_field`.
    Generic { name_field: String },
}

impl SourceSchema {
    /// Normalize a decoded source into records.
    ///
    /// Rows that cannot become records are skipped with a warning. Only a
    /// source whose overall shape is wrong fails.
    pub fn normalize(&self, raw: Value) -> Result<Vec<Record>, LoadError> {
        let records: Vec<Record> = match self {
            SourceSchema::DataRelease => rows(raw, "data release")?
                .into_iter()
                .enumerate()
                .filter_map(|(position, row)| named_record(row, position, "name"))
                .map(|record| coerce_numbers(record, &DATA_RELEASE_NUMERIC))
                .collect(),

            SourceSchema::Mspsrpi => {
                let pulsars = match raw {
                    Value::Object(mut object) => object.remove("pulsars"),
                    _ => None,
                };
                let Some(pulsars) = pulsars else {
                    return Err(LoadError::Shape(
                        "MSPSRPI details must be an object with a `pulsars` array".to_string(),
                    ));
                };
                rows(pulsars, "MSPSRPI pulsars")?
                    .into_iter()
                    .enumerate()
                    .filter_map(|(position, row)| named_record(row, position, "name"))
                    .map(|record| {
                        let flux = record.number("flux_density_1_4GHz");
                        with_number(record, "fluxDensity", flux).with_field("phase", "MSPSRPI")
                    })
                    .collect()
            }

            SourceSchema::Mspsrpi2 => rows(raw, "MSPSRPI2 pulsars")?
                .into_iter()
                .enumerate()
                .filter_map(|(position, row)| named_record(row, position, "name"))
                .map(|mut record| {
                    // Replaced by the derived flux bucket.
                    record.fields.remove("fluxCategory");
                    coerce_numbers(record, &["fluxDensity"]).with_field("phase", "MSPSRPI2")
                })
                .collect(),

            SourceSchema::Publications => rows(raw, "publications")?
                .into_iter()
                .enumerate()
                .filter_map(|(row, value)| publication(row, value))
                .collect(),

            SourceSchema::Generic { name_field } => rows(raw, "catalog")?
                .into_iter()
                .enumerate()
                .filter_map(|(position, row)| named_record(row, position, name_field))
                .collect(),
        };

        warn_duplicate_ids(&records);
        Ok(records)
    }
}

fn rows(raw: Value, what: &str) -> Result<Vec<Value>, LoadError> {
    match raw {
        Value::Array(rows) => Ok(rows),
        other => Err(LoadError::Shape(format!(
            "{what} must be an array, got {}",
            type_name(&other)
        ))),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn named_record(row: Value, position: usize, name_field: &str) -> Option<Record> {
    let record = Record::from_value(row, position, name_field);
    if record.is_none() {
        tracing::warn!(position, name_field, "skipping row without a name");
    }
    record
}

/// Replace numeric strings with numbers; unparseable values become null.
fn coerce_numbers(record: Record, fields: &[&str]) -> Record {
    fields.iter().fold(record, |record, field| {
        if record.fields.contains_key(*field) {
            let value = record.number(field);
            with_number(record, field, value)
        } else {
            record
        }
    })
}

fn with_number(record: Record, field: &str, value: Option<f64>) -> Record {
    let value = value
        .and_then(serde_json::Number::from_f64)
        .map_or(Value::Null, Value::Number);
    record.with_field(field, value)
}

fn publication(row: usize, value: Value) -> Option<Record> {
    let Value::Object(mut fields) = value else {
        tracing::warn!(row, "skipping publication row that is not an object");
        return None;
    };

    let title = take_text(&mut fields, "title");
    let phase = take_text(&mut fields, "phase");
    let (Some(title), Some(phase)) = (title, phase) else {
        tracing::warn!(row, "skipping publication without title or phase");
        return None;
    };

    let phase = phase.to_uppercase();
    let phase = if KNOWN_PHASES.contains(&phase.as_str()) {
        phase
    } else {
        tracing::warn!(row, phase = %phase, title = %title, "unexpected publication phase");
        String::new()
    };

    let id = take_text(&mut fields, "id").unwrap_or_else(|| format!("pub-{row}"));

    // The title is also the display name; keep it addressable as `title`.
    let mut record = Record::new(id, title.clone())
        .with_field("title", title)
        .with_field("phase", phase);

    if let Some(keywords) = take_text(&mut fields, "keywords") {
        record = record.with_field("keywords", split_keywords(&keywords));
    }

    let highlight = take_text(&mut fields, "highlight").is_some_and(|h| is_truthy(&h));
    record = record.with_field("highlight", highlight);

    if let Some(year) = fields.remove("year") {
        let year = match year {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        };
        if let Some(year) = year {
            record = record.with_field("year", year);
        }
    }

    for (key, value) in fields {
        match value {
            Value::String(s) if s.trim().is_empty() => {}
            Value::Null => {}
            other => record = record.with_field(key, other),
        }
    }

    Some(record)
}

/// Remove a text field, treating blank strings as absent.
fn take_text(fields: &mut Map<String, Value>, key: &str) -> Option<String> {
    match fields.remove(key)? {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Keywords are `;`-separated, falling back to `,` when no `;` is present.
fn split_keywords(raw: &str) -> Vec<String> {
    let separator = if raw.contains(';') { ';' } else { ',' };
    raw.split(separator)
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect()
}

fn is_truthy(raw: &str) -> bool {
    matches!(raw.trim(), "TRUE" | "true" | "1")
}

fn warn_duplicate_ids(records: &[Record]) {
    let mut seen = HashSet::new();
    for record in records {
        if !seen.insert(record.id.as_str()) {
            tracing::warn!(id = %record.id, "duplicate record id");
        }
    }
}
