//! Declarative description of one list view: which collection is primary,
//! what gets joined onto it, which fields are derived, and how it filters.

use serde::Serialize;
use serde_json::Value;

use crate::resource::{Requirement, Resource};

/// A secondary collection joined onto the primary by foreign key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JoinSpec {
    /// Name the joined record appears under on each row.
    pub name: String,
    pub resource: Resource,
    /// Field on the secondary record holding the primary's identifier.
    pub foreign_key: String,
    pub requirement: Requirement,
}

/// Presentational field computed per row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DerivedField {
    /// Look `source` up in `table` (case-insensitive); `default` otherwise.
    Mapped {
        name: String,
        source: String,
        table: Vec<(String, Value)>,
        default: Value,
    },
    /// Integer percentage of `required` entries present in `submitted`.
    DocumentProgress {
        name: String,
        submitted: String,
        required: String,
    },
    /// Title-cased label for a workflow status field.
    StatusLabel { name: String, source: String },
}

impl DerivedField {
    pub fn name(&self) -> &str {
        match self {
            Self::Mapped { name, .. }
            | Self::DocumentProgress { name, .. }
            | Self::StatusLabel { name, .. } => name,
        }
    }
}

/// How a constraint field compares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Case-insensitive equality (status, category).
    Exact,
    /// Calendar-day equality.
    Date,
    /// Case-insensitive substring.
    Text,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewDescriptor {
    pub name: String,
    pub primary: Resource,
    /// Fixed query sent with the primary fetch (server-side filters).
    pub primary_query: Vec<(String, String)>,
    pub id_field: String,
    pub joins: Vec<JoinSpec>,
    pub derived: Vec<DerivedField>,
    /// Fields the free-text query searches (dotted paths allowed).
    pub search_fields: Vec<String>,
    pub constraint_fields: Vec<(String, FieldKind)>,
}

impl ViewDescriptor {
    pub fn new(name: &str, primary: Resource, id_field: &str) -> Self {
        Self {
            name: name.to_string(),
            primary,
            primary_query: Vec::new(),
            id_field: id_field.to_string(),
            joins: Vec::new(),
            derived: Vec::new(),
            search_fields: Vec::new(),
            constraint_fields: Vec::new(),
        }
    }

    pub fn query(mut self, key: &str, value: &str) -> Self {
        self.primary_query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn join(mut self, name: &str, resource: Resource, foreign_key: &str) -> Self {
        self.joins.push(JoinSpec {
            name: name.to_string(),
            resource,
            foreign_key: foreign_key.to_string(),
            requirement: Requirement::Optional,
        });
        self
    }

    /// Join whose failure must fail the whole cycle.
    pub fn join_required(mut self, name: &str, resource: Resource, foreign_key: &str) -> Self {
        self.joins.push(JoinSpec {
            name: name.to_string(),
            resource,
            foreign_key: foreign_key.to_string(),
            requirement: Requirement::Required,
        });
        self
    }

    pub fn derive(mut self, field: DerivedField) -> Self {
        self.derived.push(field);
        self
    }

    pub fn search(mut self, fields: &[&str]) -> Self {
        self.search_fields
            .extend(fields.iter().map(|f| f.to_string()));
        self
    }

    pub fn constraint(mut self, field: &str, kind: FieldKind) -> Self {
        self.constraint_fields.push((field.to_string(), kind));
        self
    }

    /// Declared kind for `field`; undeclared fields compare as `Text`.
    pub fn kind_of(&self, field: &str) -> FieldKind {
        self.constraint_fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, kind)| *kind)
            .unwrap_or(FieldKind::Text)
    }
}

/// `Mapped` helper taking `(&str, &str)` pairs.
pub fn mapped(name: &str, source: &str, table: &[(&str, &str)], default: &str) -> DerivedField {
    DerivedField::Mapped {
        name: name.to_string(),
        source: source.to_string(),
        table: table
            .iter()
            .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
            .collect(),
        default: Value::String(default.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_collects_parts() {
        let d = ViewDescriptor::new("cases", Resource::Enquiries, "enquiry_id")
            .query("status", "APPROVED")
            .join("invoice", Resource::Invoices, "enquiry_id")
            .join_required("assignment", Resource::FlightAssignments, "enquiry_id")
            .search(&["patient_name", "enquiry_code"])
            .constraint("status", FieldKind::Exact);

        assert_eq!(d.primary_query, vec![("status".into(), "APPROVED".into())]);
        assert_eq!(d.joins.len(), 2);
        assert_eq!(d.joins[0].requirement, Requirement::Optional);
        assert_eq!(d.joins[1].requirement, Requirement::Required);
        assert_eq!(d.search_fields.len(), 2);
    }

    #[test]
    fn undeclared_fields_are_text() {
        let d = ViewDescriptor::new("x", Resource::Districts, "district_id")
            .constraint("created_at", FieldKind::Date);
        assert_eq!(d.kind_of("created_at"), FieldKind::Date);
        assert_eq!(d.kind_of("district_name"), FieldKind::Text);
    }

    #[test]
    fn derived_field_names() {
        let f = mapped("priority", "air_transport_type", &[("EMERGENCY", "HIGH")], "NORMAL");
        assert_eq!(f.name(), "priority");
        let p = DerivedField::DocumentProgress {
            name: "progress".into(),
            submitted: "documents_submitted".into(),
            required: "documents_required".into(),
        };
        assert_eq!(p.name(), "progress");
    }
}
