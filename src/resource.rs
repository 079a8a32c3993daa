//! Resource Fetcher: one logical backend collection per call.
//!
//! Collapses the two response shapes the backend uses (a bare array, or
//! `{ data: [...], pagination?: {...} }`) into an `Envelope`, and applies the
//! availability policy: `Optional` resources degrade to an empty list,
//! `Required` ones surface their error.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::client::Transport;
use crate::error::ClientError;
use crate::models::Record;

// ═══════════════════════════════════════════════════════════
// Types
// ═══════════════════════════════════════════════════════════

/// Backend collections consumed by the workflow's list views.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    Enquiries,
    CaseSearch,
    FlightAssignments,
    PostOperationReports,
    Invoices,
    CaseClosures,
    Districts,
    Hospitals,
    Users,
    Ambulances,
    AvailableAmbulances,
    AvailableEnquiries,
    Notifications,
    /// Any other path, used as-is.
    Custom(String),
}

impl Resource {
    pub fn path(&self) -> &str {
        match self {
            Self::Enquiries => "enquiries",
            Self::CaseSearch => "cases/search",
            Self::FlightAssignments => "flight-assignments",
            Self::PostOperationReports => "post-operation-reports",
            Self::Invoices => "invoices",
            Self::CaseClosures => "case-closures",
            Self::Districts => "districts",
            Self::Hospitals => "hospitals",
            Self::Users => "users",
            Self::Ambulances => "ambulances",
            Self::AvailableAmbulances => "ambulances/available",
            Self::AvailableEnquiries => "flight-assignments/available-enquiries",
            Self::Notifications => "notifications",
            Self::Custom(path) => path.trim_start_matches('/'),
        }
    }
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.path())
    }
}

/// Whether a failure of this resource should surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Requirement {
    Required,
    Optional,
}

/// Server-reported pagination block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerPagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    #[serde(alias = "total_pages")]
    pub total_pages: u32,
}

/// Normalised response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Envelope {
    pub records: Vec<Record>,
    pub pagination: Option<ServerPagination>,
}

/// Collapse a bare array or `{data: [...]}` into an `Envelope`.
///
/// Any other shape is an empty list. Non-object entries are dropped.
pub fn normalize_envelope(body: Value) -> Envelope {
    let (items, pagination) = match body {
        Value::Array(items) => (items, None),
        Value::Object(mut obj) => {
            let pagination = obj
                .remove("pagination")
                .and_then(|p| serde_json::from_value::<ServerPagination>(p).ok());
            match obj.remove("data") {
                Some(Value::Array(items)) => (items, pagination),
                _ => (Vec::new(), pagination),
            }
        }
        _ => (Vec::new(), None),
    };

    let total = items.len();
    let records: Vec<Record> = items
        .into_iter()
        .filter_map(|item| match item {
            Value::Object(record) => Some(record),
            _ => None,
        })
        .collect();
    if records.len() != total {
        tracing::debug!(
            dropped = total - records.len(),
            "Dropped non-object entries from response"
        );
    }

    Envelope {
        records,
        pagination,
    }
}

// ═══════════════════════════════════════════════════════════
// ResourceFetcher
// ═══════════════════════════════════════════════════════════

/// Fetches collections through a `Transport`.
pub struct ResourceFetcher<'a, T: Transport> {
    transport: &'a T,
}

impl<'a, T: Transport> ResourceFetcher<'a, T> {
    pub fn new(transport: &'a T) -> Self {
        Self { transport }
    }

    /// GET `resource` and normalise the body.
    ///
    /// `Optional` resources never fail: errors are logged and an empty
    /// envelope is returned. `Required` resources propagate the error.
    pub async fn fetch(
        &self,
        resource: &Resource,
        query: &[(String, String)],
        requirement: Requirement,
    ) -> Result<Envelope, ClientError> {
        match self.transport.get(resource.path(), query).await {
            Ok(body) => {
                let envelope = normalize_envelope(body);
                tracing::debug!(
                    resource = %resource,
                    count = envelope.records.len(),
                    "Fetched collection"
                );
                Ok(envelope)
            }
            Err(e) if requirement == Requirement::Optional && e != ClientError::Unauthorized => {
                tracing::warn!(
                    resource = %resource,
                    error = %e,
                    "Optional resource unavailable, continuing without it"
                );
                Ok(Envelope::default())
            }
            Err(e) => Err(e),
        }
    }

    /// Records only, for callers that ignore pagination.
    pub async fn fetch_records(
        &self,
        resource: &Resource,
        query: &[(String, String)],
        requirement: Requirement,
    ) -> Result<Vec<Record>, ClientError> {
        Ok(self.fetch(resource, query, requirement).await?.records)
    }
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════
