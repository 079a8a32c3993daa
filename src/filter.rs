//! Filter/Search Engine over assembled rows.
//!
//! Pure and deterministic: the same rows and criteria always give the same
//! subsequence, in input order. Nothing is cached and nothing is mutated.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::assemble::ViewModelRow;
use crate::descriptor::{FieldKind, ViewDescriptor};
use crate::models::value_text;

/// Whether a constraint value leaves `kind` unconstrained. Blank always
/// does; `ALL` only for exact and date fields, where it is the select-box
/// "everything" option. On text fields `all` is an ordinary substring.
fn is_inactive(value: &str, kind: FieldKind) -> bool {
    let v = value.trim();
    v.is_empty() || (kind != FieldKind::Text && v.eq_ignore_ascii_case("ALL"))
}

/// Current user-entered search state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterCriteria {
    /// Free text matched against the view's search fields.
    pub query: String,
    /// Per-field constraints, compared per the field's declared kind.
    /// Blank values, and `ALL` on exact or date fields, mean no constraint.
    pub constraints: BTreeMap<String, String>,
}

impl FilterCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_query(mut self, query: &str) -> Self {
        self.query = query.to_string();
        self
    }

    pub fn with(mut self, field: &str, value: &str) -> Self {
        self.set(field, value);
        self
    }

    pub fn set(&mut self, field: &str, value: &str) {
        self.constraints.insert(field.to_string(), value.to_string());
    }

    pub fn set_query(&mut self, query: &str) {
        self.query = query.to_string();
    }

    /// Back to "everything".
    pub fn clear(&mut self) {
        self.query.clear();
        self.constraints.clear();
    }

    /// True when nothing has been entered. A blank query is inactive; any
    /// other query, `all` included, is a substring search.
    pub fn is_empty(&self) -> bool {
        self.query.trim().is_empty() && self.constraints.values().all(|v| v.trim().is_empty())
    }
}

/// Rows satisfying every active predicate, in input order.
pub fn apply<'a>(
    rows: &'a [ViewModelRow],
    criteria: &FilterCriteria,
    descriptor: &ViewDescriptor,
) -> Vec<&'a ViewModelRow> {
    if criteria.is_empty() {
        return rows.iter().collect();
    }

    let query = criteria.query.trim().to_lowercase();
    let constraints: Vec<(&str, FieldKind, &str)> = criteria
        .constraints
        .iter()
        .map(|(field, value)| (field.as_str(), descriptor.kind_of(field), value.trim()))
        .filter(|(_, kind, value)| !is_inactive(value, *kind))
        .collect();

    rows.iter()
        .filter(|row| {
            (query.is_empty() || matches_query(row, &query, &descriptor.search_fields))
                && constraints
                    .iter()
                    .all(|(field, kind, value)| matches_constraint(row.field(field), *kind, value))
        })
        .collect()
}

/// Case-insensitive substring across any of `fields`. `query` is lowercase.
fn matches_query(row: &ViewModelRow, query: &str, fields: &[String]) -> bool {
    fields.iter().any(|field| {
        row.field(field)
            .and_then(value_text)
            .is_some_and(|text| text.to_lowercase().contains(query))
    })
}

fn matches_constraint(value: Option<&Value>, kind: FieldKind, wanted: &str) -> bool {
    let Some(text) = value.and_then(value_text) else {
        return false;
    };
    match kind {
        FieldKind::Exact => text.trim().eq_ignore_ascii_case(wanted),
        FieldKind::Text => text.to_lowercase().contains(&wanted.to_lowercase()),
        FieldKind::Date => match (calendar_day(wanted), calendar_day(&text)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        },
    }
}

/// Calendar day of an RFC 3339 timestamp or a `YYYY-MM-DD`-prefixed string.
///
/// Timestamps keep their own offset's date; no timezone conversion.
pub fn calendar_day(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.date_naive());
    }
    let prefix = raw.get(..10)?;
    NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok()
}
