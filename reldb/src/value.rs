//! Dynamic Value type for database values

use crate::error::{Error, Result};
use chrono::{NaiveDate, NaiveDateTime};

/// A dynamic database value covering the column types used by the
/// dashboard schema.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// SQL NULL value
    Null,
    /// Boolean value
    Bool(bool),
    /// Signed 64-bit integer
    I64(i64),
    /// Unsigned 64-bit integer
    U64(u64),
    /// 64-bit floating point
    F64(f64),
    /// String/text value
    String(String),
    /// Binary data
    Bytes(Vec<u8>),
    /// Date value
    Date(NaiveDate),
    /// DateTime/Timestamp value
    DateTime(NaiveDateTime),
    /// JSON value
    Json(serde_json::Value),
}

impl Value {
    /// Check if this value is null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Get the type name for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::I64(_) => "i64",
            Value::U64(_) => "u64",
            Value::F64(_) => "f64",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Date(_) => "date",
            Value::DateTime(_) => "datetime",
            Value::Json(_) => "json",
        }
    }

    /// Convert to a `serde_json::Value` for handler serialization.
    ///
    /// Temporal values are rendered as ISO-8601 strings, matching the
    /// coercion the result mapper applies.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(v) => serde_json::Value::Bool(*v),
            Value::I64(v) => serde_json::Value::from(*v),
            Value::U64(v) => serde_json::Value::from(*v),
            Value::F64(v) => serde_json::Value::from(*v),
            Value::String(v) => serde_json::Value::String(v.clone()),
            Value::Bytes(v) => serde_json::Value::String(String::from_utf8_lossy(v).into_owned()),
            Value::Date(v) => serde_json::Value::String(v.format("%Y-%m-%d").to_string()),
            Value::DateTime(v) => {
                serde_json::Value::String(v.format("%Y-%m-%dT%H:%M:%S").to_string())
            }
            Value::Json(v) => v.clone(),
        }
    }
}

// Implement From for common types
impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::I64(v.into())
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::I64(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::U64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::F64(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::DateTime(v)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Value::Json(v)
    }
}

// Implement From for Option<T> where T: Into<Value>
impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

/// Trait for types that can be constructed from a database value.
pub trait FromValue: Sized {
    /// Convert a database value to this type.
    fn from_value(value: Value) -> Result<Self>;
}

impl FromValue for bool {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Bool(v) => Ok(v),
            Value::I64(v) => Ok(v != 0),
            Value::U64(v) => Ok(v != 0),
            _ => Err(Error::TypeConversion {
                expected: "bool",
                actual: value.type_name().to_string(),
            }),
        }
    }
}

impl FromValue for i64 {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::I64(v) => Ok(v),
            Value::U64(v) => v.try_into().map_err(|_| Error::TypeConversion {
                expected: "i64",
                actual: format!("u64({}) out of range", v),
            }),
            _ => Err(Error::TypeConversion {
                expected: "i64",
                actual: value.type_name().to_string(),
            }),
        }
    }
}

impl FromValue for u64 {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::U64(v) => Ok(v),
            Value::I64(v) => v.try_into().map_err(|_| Error::TypeConversion {
                expected: "u64",
                actual: format!("i64({}) out of range", v),
            }),
            _ => Err(Error::TypeConversion {
                expected: "u64",
                actual: value.type_name().to_string(),
            }),
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::F64(v) => Ok(v),
            Value::I64(v) => Ok(v as f64),
            _ => Err(Error::TypeConversion {
                expected: "f64",
                actual: value.type_name().to_string(),
            }),
        }
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::String(v) => Ok(v),
            Value::Bytes(v) => String::from_utf8(v).map_err(|e| Error::TypeConversion {
                expected: "utf8 string",
                actual: format!("invalid utf8: {}", e),
            }),
            _ => Err(Error::TypeConversion {
                expected: "string",
                actual: value.type_name().to_string(),
            }),
        }
    }
}

impl FromValue for NaiveDate {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Date(v) => Ok(v),
            Value::DateTime(v) => Ok(v.date()),
            // The mapper renders dates as ISO-8601 strings; accept them back.
            Value::String(v) => {
                NaiveDate::parse_from_str(&v, "%Y-%m-%d").map_err(|_| Error::TypeConversion {
                    expected: "date",
                    actual: format!("string({})", v),
                })
            }
            _ => Err(Error::TypeConversion {
                expected: "date",
                actual: value.type_name().to_string(),
            }),
        }
    }
}

impl FromValue for NaiveDateTime {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::DateTime(v) => Ok(v),
            Value::Date(v) => Ok(v.and_hms_opt(0, 0, 0).unwrap_or_default()),
            Value::String(v) => NaiveDateTime::parse_from_str(&v, "%Y-%m-%dT%H:%M:%S").map_err(
                |_| Error::TypeConversion {
                    expected: "datetime",
                    actual: format!("string({})", v),
                },
            ),
            _ => Err(Error::TypeConversion {
                expected: "datetime",
                actual: value.type_name().to_string(),
            }),
        }
    }
}

impl FromValue for serde_json::Value {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Json(v) => Ok(v),
            Value::String(v) => serde_json::from_str(&v).map_err(|e| Error::TypeConversion {
                expected: "json",
                actual: format!("invalid json: {}", e),
            }),
            _ => Err(Error::TypeConversion {
                expected: "json",
                actual: value.type_name().to_string(),
            }),
        }
    }
}

// Implement for Option<T>
impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(None),
            _ => Ok(Some(T::from_value(value)?)),
        }
    }
}
