//! View-Model Assembler: primary records + lookup indexes → table rows.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::Serialize;
use serde_json::Value;

use crate::descriptor::{DerivedField, ViewDescriptor};
use crate::index::LookupIndex;
use crate::models::{value_text, CaseStatus, Record, RecordKey};

/// One denormalised table row.
///
/// Serialises flat: record fields, then each join under its name (`null`
/// when absent), then derived fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewModelRow {
    #[serde(skip)]
    pub id: Option<RecordKey>,
    #[serde(flatten)]
    pub record: Record,
    #[serde(flatten)]
    pub joined: BTreeMap<String, Option<Record>>,
    #[serde(flatten)]
    pub derived: BTreeMap<String, Value>,
}

impl ViewModelRow {
    /// Resolve `path`: derived fields first, then record fields, then
    /// `join.field` for joined records.
    pub fn field(&self, path: &str) -> Option<&Value> {
        if let Some(value) = self.derived.get(path) {
            return Some(value);
        }
        if let Some(value) = self.record.get(path) {
            return Some(value);
        }
        let (join, field) = path.split_once('.')?;
        self.joined.get(join)?.as_ref()?.get(field)
    }

    pub fn joined(&self, name: &str) -> Option<&Record> {
        self.joined.get(name).and_then(|r| r.as_ref())
    }

    pub fn status(&self) -> Option<CaseStatus> {
        self.record
            .get("status")
            .and_then(Value::as_str)
            .and_then(|s| CaseStatus::from_str(&s.to_ascii_uppercase()).ok())
    }
}

/// Join `primary` against `indexes` (keyed by join name).
///
/// Output has the same length and order as `primary`. Every join declared
/// on the descriptor appears on every row, `None` when unmatched or when
/// its index is missing.
pub fn assemble(
    primary: Vec<Record>,
    indexes: &BTreeMap<String, LookupIndex>,
    descriptor: &ViewDescriptor,
) -> Vec<ViewModelRow> {
    primary
        .into_iter()
        .map(|record| {
            let id = RecordKey::of(&record, &descriptor.id_field);

            let joined = descriptor
                .joins
                .iter()
                .map(|join| {
                    let matched = id
                        .as_ref()
                        .and_then(|key| indexes.get(&join.name)?.get(key))
                        .cloned();
                    (join.name.clone(), matched)
                })
                .collect();

            let derived = descriptor
                .derived
                .iter()
                .map(|field| (field.name().to_string(), derive(field, &record)))
                .collect();

            ViewModelRow {
                id,
                record,
                joined,
                derived,
            }
        })
        .collect()
}

fn derive(field: &DerivedField, record: &Record) -> Value {
    match field {
        DerivedField::Mapped {
            source,
            table,
            default,
            ..
        } => {
            let Some(raw) = record.get(source).and_then(value_text) else {
                return default.clone();
            };
            table
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(raw.trim()))
                .map(|(_, value)| value.clone())
                .unwrap_or_else(|| default.clone())
        }
        DerivedField::DocumentProgress {
            submitted,
            required,
            ..
        } => {
            let submitted = entry_count(record.get(submitted));
            let required = entry_count(record.get(required));
            Value::from(document_progress(submitted, required))
        }
        DerivedField::StatusLabel { source, .. } => match record.get(source).and_then(Value::as_str) {
            Some(raw) => match CaseStatus::from_str(&raw.to_ascii_uppercase()) {
                Ok(status) => Value::String(status.label()),
                Err(_) => Value::String(raw.to_string()),
            },
            None => Value::Null,
        },
    }
}

/// Arrays count their entries; non-negative integers are taken as counts.
fn entry_count(value: Option<&Value>) -> usize {
    match value {
        Some(Value::Array(items)) => items.len(),
        Some(Value::Number(n)) => n.as_u64().map(|n| n as usize).unwrap_or(0),
        _ => 0,
    }
}

/// Integer percentage of `required` covered by `submitted`, rounded half
/// up and capped at 100. Nothing required counts as complete.
pub fn document_progress(submitted: usize, required: usize) -> u32 {
    if required == 0 {
        return 100;
    }
    let submitted = submitted.min(required) as u64;
    let required = required as u64;
    ((200 * submitted + required) / (2 * required)) as u32
}
