use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A backend record. The backend owns the schema, so fields stay untyped.
pub type Record = Map<String, Value>;

/// Identifier of a record, as used for joins.
///
/// A string made only of ASCII digits normalises to `Int`, so a foreign key
/// sent as `"12345"` joins against a primary id of `12345`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordKey {
    Int(i64),
    Str(String),
}

impl RecordKey {
    /// Build a key from a JSON value. Null, bool, float, array and object
    /// values are not usable keys.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(Self::Int),
            Value::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return None;
                }
                if trimmed.bytes().all(|b| b.is_ascii_digit()) {
                    if let Ok(n) = trimmed.parse::<i64>() {
                        return Some(Self::Int(n));
                    }
                }
                Some(Self::Str(trimmed.to_string()))
            }
            _ => None,
        }
    }

    /// Key stored under `field` in `record`, if usable.
    pub fn of(record: &Record, field: &str) -> Option<Self> {
        record.get(field).and_then(Self::from_value)
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{n}"),
            Self::Str(s) => f.write_str(s),
        }
    }
}

impl From<i64> for RecordKey {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<&str> for RecordKey {
    fn from(s: &str) -> Self {
        Self::from_value(&Value::String(s.to_string())).unwrap_or_else(|| Self::Str(s.into()))
    }
}

/// Render a scalar JSON value as text for searching and comparison.
/// Arrays and objects are not searchable.
pub fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
