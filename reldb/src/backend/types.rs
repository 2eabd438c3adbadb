//! Type conversion between reldb values and mysql_async values

use crate::error::{Error, Result};
use crate::value::Value;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use mysql_async::Value as MySqlValue;

/// Convert a reldb Value to a mysql_async Value
pub(super) fn to_mysql_value(value: &Value) -> MySqlValue {
    use chrono::{Datelike, Timelike};

    match value {
        Value::Null => MySqlValue::NULL,
        Value::Bool(v) => MySqlValue::from(*v),
        Value::I64(v) => MySqlValue::from(*v),
        Value::U64(v) => MySqlValue::from(*v),
        Value::F64(v) => MySqlValue::from(*v),
        Value::String(v) => MySqlValue::from(v.as_str()),
        Value::Bytes(v) => MySqlValue::from(v.as_slice()),
        Value::Date(v) => MySqlValue::Date(v.year() as u16, v.month() as u8, v.day() as u8, 0, 0, 0, 0),
        Value::DateTime(v) => MySqlValue::Date(
            v.year() as u16,
            v.month() as u8,
            v.day() as u8,
            v.hour() as u8,
            v.minute() as u8,
            v.second() as u8,
            v.and_utc().timestamp_subsec_micros(),
        ),
        Value::Json(v) => MySqlValue::from(v.to_string()),
    }
}

/// Convert a mysql_async Value to a reldb Value
pub(super) fn from_mysql_value(value: MySqlValue) -> Result<Value> {
    match value {
        MySqlValue::NULL => Ok(Value::Null),
        MySqlValue::Bytes(v) => {
            // Text protocol returns most things as bytes; prefer strings
            match String::from_utf8(v) {
                Ok(s) => Ok(Value::String(s)),
                Err(e) => Ok(Value::Bytes(e.into_bytes())),
            }
        }
        MySqlValue::Int(v) => Ok(Value::I64(v)),
        MySqlValue::UInt(v) => Ok(Value::U64(v)),
        MySqlValue::Float(v) => Ok(Value::F64(v.into())),
        MySqlValue::Double(v) => Ok(Value::F64(v)),
        MySqlValue::Date(year, month, day, hour, min, sec, micro) => {
            let date = NaiveDate::from_ymd_opt(year as i32, month as u32, day as u32).ok_or_else(
                || Error::TypeConversion {
                    expected: "date",
                    actual: format!("{}-{}-{}", year, month, day),
                },
            )?;
            if hour == 0 && min == 0 && sec == 0 && micro == 0 {
                Ok(Value::Date(date))
            } else {
                let time = NaiveTime::from_hms_micro_opt(hour as u32, min as u32, sec as u32, micro)
                    .ok_or_else(|| Error::TypeConversion {
                        expected: "time",
                        actual: format!("{}:{}:{}.{}", hour, min, sec, micro),
                    })?;
                Ok(Value::DateTime(NaiveDateTime::new(date, time)))
            }
        }
        // The dashboard schema has no TIME columns; surface one as text if
        // it ever shows up rather than failing the whole row.
        MySqlValue::Time(is_neg, days, hours, mins, secs, micro) => Ok(Value::String(format!(
            "{}{:02}:{:02}:{:02}.{:06}",
            if is_neg { "-" } else { "" },
            days * 24 + hours as u32,
            mins,
            secs,
            micro
        ))),
    }
}
