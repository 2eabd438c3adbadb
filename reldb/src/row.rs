//! Result rows: ordered column-name-to-value mappings

use crate::error::{Error, Result};
use crate::value::{FromValue, Value};

/// A single result row.
///
/// Entries are ordered by the statement's declared schema (or by driver
/// order for ad-hoc reads). A column declared in the schema always has an
/// entry; columns the backend did not return hold `Value::Null`.
///
/// Rows are plain data: they hold no reference to the connection that
/// produced them and are owned by the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    entries: Vec<(String, Value)>,
}

impl Row {
    pub(crate) fn new(entries: Vec<(String, Value)>) -> Self {
        Self { entries }
    }

    /// Build a row from column/value pairs. Intended for fixture data and
    /// tests; live rows come from the result mapper.
    pub fn from_pairs<N, V>(pairs: impl IntoIterator<Item = (N, V)>) -> Self
    where
        N: Into<String>,
        V: Into<Value>,
    {
        Self {
            entries: pairs
                .into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        }
    }

    /// Number of columns in the row.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the row has no columns.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get a value by column name.
    pub fn value(&self, column: &str) -> Result<&Value> {
        self.entries
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
            .ok_or_else(|| Error::ColumnNotFound(column.to_string()))
    }

    /// Get a typed value by column name.
    pub fn get<T: FromValue>(&self, column: &str) -> Result<T> {
        T::from_value(self.value(column)?.clone())
    }

    /// Iterate over `(column, value)` entries in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value))
    }

    /// Render the row as a JSON object for handler responses.
    pub fn to_json(&self) -> serde_json::Value {
        let mut map = serde_json::Map::with_capacity(self.entries.len());
        for (name, value) in &self.entries {
            map.insert(name.clone(), value.to_json());
        }
        serde_json::Value::Object(map)
    }
}
