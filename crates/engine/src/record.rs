//! Catalog records.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One catalog entry (e.g. one pulsar or one publication).
///
/// The engine treats a record as an open mapping from field name to JSON
/// value. Only the identifier and the display name are structural: the id
/// drives identity-based selection in the renderer, the name drives text
/// search and the default sort.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Stable unique identifier.
    pub id: String,

    /// Display name.
    pub name: String,

    /// All remaining fields, flattened next to `id` and `name`.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Record {
    /// Create a record with no additional fields.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            fields: Map::new(),
        }
    }

    /// Build a record from a JSON object.
    ///
    /// The id is taken from the `id` field (strings verbatim, numbers
    /// rendered as text) and falls back to the 0-based `position`. The name
    /// is read from `name_field`. Returns `None` for non-objects and for
    /// objects without a string name.
    pub fn from_value(value: Value, position: usize, name_field: &str) -> Option<Self> {
        let Value::Object(mut fields) = value else {
            return None;
        };

        let name = match fields.remove(name_field) {
            Some(Value::String(s)) => s,
            _ => return None,
        };

        let id = match fields.remove("id") {
            Some(Value::String(s)) if !s.is_empty() => s,
            Some(Value::Number(n)) => n.to_string(),
            _ => position.to_string(),
        };

        Some(Self { id, name, fields })
    }

    /// Add or replace a field.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Look up a field by dotted path (`"coordinates.ra"`).
    ///
    /// `id` and `name` resolve to the structural fields. JSON `null` is
    /// reported as absent so that it never matches a filter.
    pub fn get(&self, path: &str) -> Option<Value> {
        self.field(path).map(Cow::into_owned)
    }

    /// Like [`Record::get`], borrowing where the value lives in `fields`.
    pub(crate) fn field(&self, path: &str) -> Option<Cow<'_, Value>> {
        match path {
            "id" => Some(Cow::Owned(Value::String(self.id.clone()))),
            "name" => Some(Cow::Owned(Value::String(self.name.clone()))),
            _ => self.lookup(path).filter(|v| !v.is_null()).map(Cow::Borrowed),
        }
    }

    /// Numeric view of a field.
    ///
    /// Numeric strings such as `"0.54"` are parsed; anything else that is
    /// not a number is absent.
    pub fn number(&self, path: &str) -> Option<f64> {
        match self.lookup(path)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
            _ => None,
        }
    }

    /// Borrowing lookup into `fields`, walking nested objects.
    fn lookup(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('.');
        let first = parts.next()?;
        let mut current = self.fields.get(first)?;
        for part in parts {
            current = current.as_object()?.get(part)?;
        }
        Some(current)
    }
}
