//! Coerced values and the data types options and arguments may declare.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// A value produced by coercing a raw command-line token, or supplied as a
/// declared default.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Date(DateTime<Utc>),
    Json(serde_json::Value),
    Array(Vec<Value>),
}

impl Value {
    /// Loose truthiness used by dispatch checks (`--help`, `--no-banner`).
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::Date(_) => true,
            Value::Json(j) => !j.is_null(),
            Value::Array(a) => !a.is_empty(),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str(""),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::String(s) => f.write_str(s),
            Value::Date(d) => write!(f, "{}", d.to_rfc3339()),
            Value::Json(j) => write!(f, "{j}"),
            Value::Array(a) => {
                for (i, v) in a.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{v}")?;
                }
                Ok(())
            }
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(0.0)),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            obj @ serde_json::Value::Object(_) => Value::Json(obj),
        }
    }
}

/// Data type tag an option value or positional argument may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValueKind {
    #[default]
    String,
    Bool,
    Number,
    Int,
    PositiveInt,
    File,
    Date,
    YesNo,
    Json,
}

impl ValueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueKind::String => "string",
            ValueKind::Bool => "bool",
            ValueKind::Number => "number",
            ValueKind::Int => "int",
            ValueKind::PositiveInt => "positive-int",
            ValueKind::File => "file",
            ValueKind::Date => "date",
            ValueKind::YesNo => "yesno",
            ValueKind::Json => "json",
        }
    }
}

impl FromStr for ValueKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "string" | "str" => Ok(ValueKind::String),
            "bool" | "boolean" => Ok(ValueKind::Bool),
            "number" | "num" => Ok(ValueKind::Number),
            "int" | "integer" => Ok(ValueKind::Int),
            "positive-int" | "positiveInt" | "uint" => Ok(ValueKind::PositiveInt),
            "file" | "path" => Ok(ValueKind::File),
            "date" => Ok(ValueKind::Date),
            "yesno" | "yes-no" => Ok(ValueKind::YesNo),
            "json" => Ok(ValueKind::Json),
            other => Err(Error::InvalidDataType(other.to_string())),
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coerce a raw token into a [`Value`] for the given kind.
pub fn coerce(kind: ValueKind, raw: &str) -> Result<Value> {
    match kind {
        ValueKind::String => Ok(Value::String(raw.to_string())),
        ValueKind::Bool => match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(Value::Bool(true)),
            "false" | "0" | "no" | "off" => Ok(Value::Bool(false)),
            _ => Err(Error::InvalidValue {
                name: raw.to_string(),
                reason: "expected a boolean".to_string(),
            }),
        },
        ValueKind::Number => raw
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .map(Value::Number)
            .ok_or_else(|| Error::InvalidNumber {
                value: raw.to_string(),
            }),
        ValueKind::Int => coerce_int(raw).map(|n| Value::Number(n as f64)),
        ValueKind::PositiveInt => {
            let n = coerce_int(raw)?;
            if n < 0 {
                return Err(Error::Range {
                    value: raw.to_string(),
                    reason: "expected a non-negative integer".to_string(),
                });
            }
            Ok(Value::Number(n as f64))
        }
        ValueKind::File => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                return Err(Error::InvalidValue {
                    name: raw.to_string(),
                    reason: "expected a file path".to_string(),
                });
            }
            Ok(Value::String(expand_home(trimmed)))
        }
        ValueKind::Date => coerce_date(raw.trim()).map(Value::Date),
        ValueKind::YesNo => match raw.trim().to_ascii_lowercase().as_str() {
            "yes" | "y" | "true" | "1" => Ok(Value::Bool(true)),
            "no" | "n" | "false" | "0" => Ok(Value::Bool(false)),
            _ => Err(Error::NotYesNo {
                value: raw.to_string(),
            }),
        },
        ValueKind::Json => serde_json::from_str::<serde_json::Value>(raw)
            .map(Value::Json)
            .map_err(|err| Error::InvalidJson {
                reason: err.to_string(),
            }),
    }
}

fn coerce_int(raw: &str) -> Result<i64> {
    let trimmed = raw.trim();
    if let Ok(n) = trimmed.parse::<i64>() {
        return Ok(n);
    }
    match trimmed.parse::<f64>() {
        Ok(f) if f.is_finite() => Err(Error::Range {
            value: raw.to_string(),
            reason: "expected an integer".to_string(),
        }),
        _ => Err(Error::InvalidNumber {
            value: raw.to_string(),
        }),
    }
}

fn coerce_date(raw: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Ok(dt.and_utc());
    }
    if let Ok(d) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        // Midnight is always valid for a calendar date.
        return Ok(d.and_hms_opt(0, 0, 0).unwrap().and_utc());
    }
    Err(Error::InvalidDate {
        value: raw.to_string(),
    })
}

fn expand_home(path: &str) -> String {
    if path == "~" {
        if let Ok(home) = std::env::var("HOME") {
            return home;
        }
    } else if let Some(rest) = path.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return format!("{home}/{rest}");
        }
    }
    path.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_parse_from_tags() {
        assert_eq!("number".parse::<ValueKind>().unwrap(), ValueKind::Number);
        assert_eq!(
            "positive-int".parse::<ValueKind>().unwrap(),
            ValueKind::PositiveInt
        );
        assert_eq!("yesno".parse::<ValueKind>().unwrap(), ValueKind::YesNo);
        let err = "complex".parse::<ValueKind>().unwrap_err();
        assert_eq!(err.code(), "INVALID_DATA_TYPE");
    }

    #[test]
    fn numbers_coerce_or_fail() {
        assert_eq!(
            coerce(ValueKind::Number, "3.5").unwrap(),
            Value::Number(3.5)
        );
        assert_eq!(
            coerce(ValueKind::Number, "nope").unwrap_err().code(),
            "INVALID_NUMBER"
        );
        assert_eq!(coerce(ValueKind::Int, "12").unwrap(), Value::Number(12.0));
        assert_eq!(
            coerce(ValueKind::Int, "1.5").unwrap_err().code(),
            "RANGE_ERROR"
        );
        assert_eq!(
            coerce(ValueKind::PositiveInt, "-2").unwrap_err().code(),
            "RANGE_ERROR"
        );
    }

    #[test]
    fn yesno_accepts_common_spellings() {
        assert_eq!(coerce(ValueKind::YesNo, "yes").unwrap(), Value::Bool(true));
        assert_eq!(coerce(ValueKind::YesNo, "N").unwrap(), Value::Bool(false));
        assert_eq!(
            coerce(ValueKind::YesNo, "maybe").unwrap_err().code(),
            "NOT_YES_NO"
        );
    }

    #[test]
    fn dates_parse_rfc3339_and_calendar_forms() {
        assert!(matches!(
            coerce(ValueKind::Date, "2024-06-01").unwrap(),
            Value::Date(_)
        ));
        assert!(matches!(
            coerce(ValueKind::Date, "2024-06-01T10:30:00Z").unwrap(),
            Value::Date(_)
        ));
        assert_eq!(
            coerce(ValueKind::Date, "june").unwrap_err().code(),
            "INVALID_DATE"
        );
    }

    #[test]
    fn json_values_round_through_serde() {
        let v = coerce(ValueKind::Json, r#"{"a":1}"#).unwrap();
        assert_eq!(v, Value::Json(serde_json::json!({"a": 1})));
        assert_eq!(
            coerce(ValueKind::Json, "{oops").unwrap_err().code(),
            "INVALID_JSON"
        );
    }

    #[test]
    fn truthiness_matches_dispatch_expectations() {
        assert!(Value::Bool(true).is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(!Value::Null.is_truthy());
        assert!(Value::String("x".to_string()).is_truthy());
        assert!(!Value::Number(0.0).is_truthy());
    }
}
