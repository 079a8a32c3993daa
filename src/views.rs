//! Catalogue of the workflow's list views.
//!
//! Each role's screen is one descriptor over the generic pipeline.

use crate::descriptor::{mapped, DerivedField, FieldKind, ViewDescriptor};
use crate::resource::Resource;

fn priority() -> DerivedField {
    mapped(
        "priority",
        "air_transport_type",
        &[("EMERGENCY", "HIGH"), ("URGENT", "MEDIUM")],
        "NORMAL",
    )
}

fn status_label() -> DerivedField {
    DerivedField::StatusLabel {
        name: "status_label".into(),
        source: "status".into(),
    }
}

fn document_progress() -> DerivedField {
    DerivedField::DocumentProgress {
        name: "document_progress".into(),
        submitted: "documents_submitted".into(),
        required: "documents_required".into(),
    }
}

const CASE_SEARCH_FIELDS: &[&str] = &[
    "patient_name",
    "enquiry_code",
    "contact_name",
    "contact_phone",
    "hospital_name",
    "district_name",
];

/// Air Requirement Team: every case with its assignment, post-operation
/// report, invoice and closure.
pub fn air_team_cases() -> ViewDescriptor {
    ViewDescriptor::new("air_team_cases", Resource::Enquiries, "enquiry_id")
        .join("assignment", Resource::FlightAssignments, "enquiry_id")
        .join("report", Resource::PostOperationReports, "enquiry_id")
        .join("invoice", Resource::Invoices, "enquiry_id")
        .join("closure", Resource::CaseClosures, "enquiry_id")
        .derive(priority())
        .derive(status_label())
        .derive(document_progress())
        .search(CASE_SEARCH_FIELDS)
        .search(&["invoice.invoice_number", "assignment.ambulance_id"])
        .constraint("status", FieldKind::Exact)
        .constraint("priority", FieldKind::Exact)
        .constraint("created_at", FieldKind::Date)
}

/// CMO queue: enquiries with document completeness.
pub fn cmo_enquiries() -> ViewDescriptor {
    ViewDescriptor::new("cmo_enquiries", Resource::Enquiries, "enquiry_id")
        .derive(priority())
        .derive(status_label())
        .derive(document_progress())
        .search(CASE_SEARCH_FIELDS)
        .constraint("status", FieldKind::Exact)
        .constraint("created_at", FieldKind::Date)
}

/// IT team overview: enquiries with invoice and closure.
pub fn it_team_enquiries() -> ViewDescriptor {
    ViewDescriptor::new("it_team_enquiries", Resource::Enquiries, "enquiry_id")
        .join("invoice", Resource::Invoices, "enquiry_id")
        .join("closure", Resource::CaseClosures, "enquiry_id")
        .derive(status_label())
        .search(CASE_SEARCH_FIELDS)
        .search(&["invoice.invoice_number"])
        .constraint("status", FieldKind::Exact)
        .constraint("created_at", FieldKind::Date)
}

pub fn districts() -> ViewDescriptor {
    ViewDescriptor::new("districts", Resource::Districts, "district_id")
        .search(&["district_name", "district_code", "state"])
        .constraint("state", FieldKind::Exact)
}

pub fn hospitals() -> ViewDescriptor {
    ViewDescriptor::new("hospitals", Resource::Hospitals, "hospital_id")
        .search(&["name", "address", "contact_phone", "district_name"])
        .constraint("hospital_type", FieldKind::Exact)
        .constraint("district_name", FieldKind::Exact)
}

pub fn users() -> ViewDescriptor {
    ViewDescriptor::new("users", Resource::Users, "user_id")
        .search(&["username", "full_name", "email", "phone"])
        .constraint("role", FieldKind::Exact)
        .constraint("status", FieldKind::Exact)
}

pub fn ambulances() -> ViewDescriptor {
    ViewDescriptor::new("ambulances", Resource::Ambulances, "ambulance_id")
        .search(&["ambulance_id", "aircraft_type", "registration_number", "base_location"])
        .constraint("status", FieldKind::Exact)
        .constraint("aircraft_type", FieldKind::Exact)
}

pub fn flight_assignments() -> ViewDescriptor {
    ViewDescriptor::new("flight_assignments", Resource::FlightAssignments, "assignment_id")
        .search(&["ambulance_id", "crew_details", "enquiry_code", "patient_name"])
        .constraint("status", FieldKind::Exact)
        .constraint("departure_time", FieldKind::Date)
}

/// Every catalogued view, in menu order.
pub fn all() -> Vec<ViewDescriptor> {
    vec![
        air_team_cases(),
        cmo_enquiries(),
        it_team_enquiries(),
        districts(),
        hospitals(),
        users(),
        ambulances(),
        flight_assignments(),
    ]
}

/// Look up a catalogued view; `-` and `_` are interchangeable.
pub fn by_name(name: &str) -> Option<ViewDescriptor> {
    let wanted = name.trim().replace('-', "_");
    all().into_iter().find(|d| d.name == wanted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockTransport;
    use crate::view::ListView;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn names_are_unique_and_resolvable() {
        let names: Vec<String> = all().into_iter().map(|d| d.name).collect();
        let mut sorted = names.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), names.len());
        assert!(by_name("air-team-cases").is_some());
        assert!(by_name("nope").is_none());
    }

    #[test]
    fn every_search_field_resolves_to_a_join_or_plain_field() {
        for d in all() {
            for field in &d.search_fields {
                if let Some((join, _)) = field.split_once('.') {
                    assert!(
                        d.joins.iter().any(|j| j.name == join),
                        "{}: unknown join in {field}",
                        d.name
                    );
                }
            }
        }
    }

    #[tokio::test]
    async fn air_team_view_end_to_end() {
        let mock = Arc::new(
            MockTransport::new()
                .on_get(
                    "enquiries",
                    json!({"data": [
                        {"enquiry_id": 12345, "patient_name": "Ramesh", "status": "APPROVED",
                         "air_transport_type": "EMERGENCY", "created_at": "2026-05-02T08:00:00Z",
                         "documents_submitted": ["a", "b", "c"], "documents_required": ["a", "b", "c", "d"]},
                        {"enquiry_id": 12346, "patient_name": "Sita", "status": "PENDING"}
                    ]}),
                )
                .on_get(
                    "invoices",
                    json!([
                        {"enquiry_id": "12345", "amount": 1000},
                        {"enquiry_id": 12345, "amount": 2000}
                    ]),
                )
                .on_get("flight-assignments", json!([{"enquiry_id": 12346, "ambulance_id": "VT-AMB"}])),
        );
        let view = ListView::new(Arc::clone(&mock), air_team_cases());
        view.refresh().await.unwrap();

        let rows = view.rows();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].field("invoice.amount"), Some(&json!(2000)));
        assert_eq!(rows[0].field("priority"), Some(&json!("HIGH")));
        assert_eq!(rows[0].field("document_progress"), Some(&json!(75)));
        assert_eq!(rows[0].joined.get("closure"), Some(&None));
        assert_eq!(rows[1].field("assignment.ambulance_id"), Some(&json!("VT-AMB")));

        view.set_query("vt-amb");
        assert_eq!(view.visible_count(), 1);
        view.set_query("");
        view.set_constraint("priority", "high");
        assert_eq!(view.visible_count(), 1);
    }
}
