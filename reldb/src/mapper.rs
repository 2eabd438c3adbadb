//! Result mapper: driver records onto declared schemas

use crate::error::{Error, Result};
use crate::row::Row;
use crate::value::Value;

/// A driver-decoded record: column name / value pairs in driver order.
pub type RawRow = Vec<(String, Value)>;

/// Map a batch of driver records onto the declared schema.
pub(crate) fn map_rows(columns: &[&str], raw: Vec<RawRow>) -> Result<Vec<Row>> {
    let mut rows = Vec::with_capacity(raw.len());
    for record in raw {
        rows.push(map_row(columns, record)?);
    }
    Ok(rows)
}

/// Map one driver record onto the declared schema.
///
/// Output entries follow the declared column order. A column the backend did
/// not return maps to an explicit `Value::Null`, never to a missing key.
/// Column matching is case-insensitive (Oracle reports uppercase, MySQL
/// preserves whatever the query said). Temporal coercion to ISO-8601
/// strings happens here and nowhere else.
///
/// An empty schema (health probes, ad-hoc reads) preserves driver order.
pub(crate) fn map_row(columns: &[&str], record: RawRow) -> Result<Row> {
    if columns.is_empty() {
        let entries = record
            .into_iter()
            .map(|(name, value)| (name, coerce(value)))
            .collect();
        return Ok(Row::new(entries));
    }

    let mut entries = Vec::with_capacity(columns.len());
    for (i, column) in columns.iter().enumerate() {
        if columns[..i].iter().any(|c| c.eq_ignore_ascii_case(column)) {
            return Err(Error::Mapping(format!(
                "duplicate column in declared schema: {}",
                column
            )));
        }
        let value = record
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(column))
            .map(|(_, value)| value.clone())
            .unwrap_or(Value::Null);
        entries.push((column.to_string(), coerce(value)));
    }
    Ok(Row::new(entries))
}

/// Type coercion applied to every mapped value: dates become `YYYY-MM-DD`,
/// datetimes become ISO-8601 strings. Everything else passes through.
fn coerce(value: Value) -> Value {
    match value {
        Value::Date(d) => Value::String(d.format("%Y-%m-%d").to_string()),
        Value::DateTime(dt) => Value::String(dt.format("%Y-%m-%dT%H:%M:%S").to_string()),
        other => other,
    }
}
