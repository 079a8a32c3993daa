//! Mutation/Refresh Cycle.
//!
//! A write is submitted; on success the editor closes and every view the
//! write could have touched is refetched in full. On failure the editor
//! stays open with the server's message and nothing is refetched, so the
//! form is not lost.
//!
//! State machine: `Viewing → Editing → Submitting → {Viewing | Editing}`.

use std::fmt;

use futures_util::future::join_all;
use serde_json::Value;

use crate::assemble::ViewModelRow;
use crate::client::{Method, Transport};
use crate::error::ClientError;
use crate::models::{CaseStatus, Record, RecordKey};
use crate::resource::Resource;
use crate::view::{ListView, RefreshOutcome, ViewError};

/// Minimum password length accepted by the backend.
pub const MIN_PASSWORD_LEN: usize = 8;

// ═══════════════════════════════════════════════════════════
// Mutation
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq)]
pub struct Mutation {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

impl Mutation {
    pub fn create(resource: &Resource, body: Value) -> Self {
        Self {
            method: Method::Post,
            path: resource.path().to_string(),
            body: Some(body),
        }
    }

    pub fn update(resource: &Resource, id: &RecordKey, body: Value) -> Self {
        Self {
            method: Method::Put,
            path: format!("{}/{id}", resource.path()),
            body: Some(body),
        }
    }

    pub fn delete(resource: &Resource, id: &RecordKey) -> Self {
        Self {
            method: Method::Delete,
            path: format!("{}/{id}", resource.path()),
            body: None,
        }
    }

    /// `PATCH {resource}/{id}/status` with the new status and optional remarks.
    pub fn status_change(
        resource: &Resource,
        id: &RecordKey,
        status: CaseStatus,
        remarks: Option<&str>,
    ) -> Self {
        let mut body = serde_json::json!({ "status": status.as_str() });
        if let Some(remarks) = remarks.filter(|r| !r.trim().is_empty()) {
            body["remarks"] = Value::String(remarks.trim().to_string());
        }
        Self {
            method: Method::Patch,
            path: format!("{}/{id}/status", resource.path()),
            body: Some(body),
        }
    }
}

/// Send `mutation`; on success refetch every view in `affected`.
///
/// On failure nothing is refetched and the error is returned as-is.
pub async fn mutate<T: Transport>(
    transport: &T,
    mutation: &Mutation,
    affected: &[&ListView<T>],
) -> Result<Submitted, ClientError> {
    let response = transport
        .send(mutation.method, &mutation.path, mutation.body.clone())
        .await
        .map_err(|e| {
            tracing::warn!(
                method = %mutation.method,
                path = %mutation.path,
                error = %e,
                "Mutation rejected"
            );
            e
        })?;
    tracing::info!(method = %mutation.method, path = %mutation.path, "Mutation applied");

    let refreshed = join_all(affected.iter().map(|view| view.refresh())).await;
    Ok(Submitted {
        response,
        refreshed,
    })
}

/// Successful write plus the outcome of each follow-up refresh.
#[derive(Debug)]
pub struct Submitted {
    pub response: Value,
    pub refreshed: Vec<Result<RefreshOutcome, ViewError>>,
}

// ═══════════════════════════════════════════════════════════
// Editor state machine
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditMode {
    New,
    Edit(RecordKey),
}

#[derive(Debug, Clone, PartialEq)]
pub enum EditorState {
    Viewing,
    Editing {
        mode: EditMode,
        form: Record,
        error: Option<String>,
    },
    Submitting {
        mode: EditMode,
        form: Record,
    },
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EditorError {
    #[error("Nothing is being edited")]
    NotEditing,
    #[error("A submission is already in progress")]
    AlreadySubmitting,
    #[error("Row has no identifier to edit")]
    MissingId,
    #[error("{0}")]
    Invalid(String),
    #[error(transparent)]
    Rejected(#[from] ClientError),
}

type Validator = Box<dyn Fn(&Record) -> Result<(), String> + Send + Sync>;

/// Editor for one record type backed by `resource`.
pub struct Editor {
    resource: Resource,
    state: EditorState,
    validators: Vec<Validator>,
}

impl fmt::Debug for Editor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Editor")
            .field("resource", &self.resource)
            .field("state", &self.state)
            .field("validators", &self.validators.len())
            .finish()
    }
}

impl Editor {
    pub fn new(resource: Resource) -> Self {
        Self {
            resource,
            state: EditorState::Viewing,
            validators: Vec::new(),
        }
    }

    /// Client-side check run before any request is sent.
    pub fn with_validator(
        mut self,
        validator: impl Fn(&Record) -> Result<(), String> + Send + Sync + 'static,
    ) -> Self {
        self.validators.push(Box::new(validator));
        self
    }

    pub fn state(&self) -> &EditorState {
        &self.state
    }

    pub fn is_open(&self) -> bool {
        !matches!(self.state, EditorState::Viewing)
    }

    /// While true the submit control should be disabled.
    pub fn is_submitting(&self) -> bool {
        matches!(self.state, EditorState::Submitting { .. })
    }

    pub fn error(&self) -> Option<&str> {
        match &self.state {
            EditorState::Editing { error, .. } => error.as_deref(),
            _ => None,
        }
    }

    /// "New": start from `defaults`.
    pub fn open_new(&mut self, defaults: Record) {
        self.state = EditorState::Editing {
            mode: EditMode::New,
            form: defaults,
            error: None,
        };
    }

    /// "Edit": start from the selected row's record.
    pub fn open_edit(&mut self, row: &ViewModelRow) -> Result<(), EditorError> {
        let id = row.id.clone().ok_or(EditorError::MissingId)?;
        self.state = EditorState::Editing {
            mode: EditMode::Edit(id),
            form: row.record.clone(),
            error: None,
        };
        Ok(())
    }

    /// Discard any in-progress edits.
    pub fn close(&mut self) {
        self.state = EditorState::Viewing;
    }

    pub fn form(&self) -> Option<&Record> {
        match &self.state {
            EditorState::Editing { form, .. } | EditorState::Submitting { form, .. } => Some(form),
            EditorState::Viewing => None,
        }
    }

    /// Editable only while `Editing`; a submitting form is frozen.
    pub fn form_mut(&mut self) -> Option<&mut Record> {
        match &mut self.state {
            EditorState::Editing { form, .. } => Some(form),
            _ => None,
        }
    }

    pub fn set_field(&mut self, field: &str, value: Value) -> Result<(), EditorError> {
        let form = self.form_mut().ok_or(EditorError::NotEditing)?;
        form.insert(field.to_string(), value);
        Ok(())
    }

    /// `Editing → Submitting`. Runs validators; on failure stays in
    /// `Editing` with the message and no request should be sent.
    pub fn begin_submit(&mut self) -> Result<(EditMode, Record), EditorError> {
        let (mode, form) = match &mut self.state {
            EditorState::Viewing => return Err(EditorError::NotEditing),
            EditorState::Submitting { .. } => return Err(EditorError::AlreadySubmitting),
            EditorState::Editing { mode, form, error } => {
                if let Some(message) = self.validators.iter().find_map(|v| v(form).err()) {
                    *error = Some(message.clone());
                    return Err(EditorError::Invalid(message));
                }
                (mode.clone(), form.clone())
            }
        };
        self.state = EditorState::Submitting {
            mode: mode.clone(),
            form: form.clone(),
        };
        Ok((mode, form))
    }

    /// `Submitting → Viewing` on success, `→ Editing` with the message on failure.
    pub fn finish_submit(&mut self, result: &Result<Value, ClientError>) {
        if !self.is_submitting() {
            return;
        }
        let EditorState::Submitting { mode, form } =
            std::mem::replace(&mut self.state, EditorState::Viewing)
        else {
            return;
        };
        if let Err(e) = result {
            self.state = EditorState::Editing {
                mode,
                form,
                error: Some(e.user_message()),
            };
        }
    }

    /// Create (POST) for new records, update (PUT) for edits.
    pub fn default_mutation(&self, mode: &EditMode, form: &Record) -> Mutation {
        let body = Value::Object(form.clone());
        match mode {
            EditMode::New => Mutation::create(&self.resource, body),
            EditMode::Edit(id) => Mutation::update(&self.resource, id, body),
        }
    }

    /// `Submitting → Editing` with the form intact and no error. For a
    /// submission whose future was dropped before it finished.
    pub fn abandon_submit(&mut self) {
        if !self.is_submitting() {
            return;
        }
        if let EditorState::Submitting { mode, form } =
            std::mem::replace(&mut self.state, EditorState::Viewing)
        {
            self.state = EditorState::Editing {
                mode,
                form,
                error: None,
            };
        }
    }

    /// Submit the form with the default create/update mutation.
    ///
    /// If the returned future is dropped before it completes, the editor
    /// stays `Submitting`; call `abandon_submit` (keeps the form) or
    /// `close` to leave that state.
    pub async fn submit<T: Transport>(
        &mut self,
        transport: &T,
        affected: &[&ListView<T>],
    ) -> Result<Submitted, EditorError> {
        let (mode, form) = self.begin_submit()?;
        let mutation = self.default_mutation(&mode, &form);
        self.run(transport, mutation, affected).await
    }

    /// Submit with a caller-built mutation (e.g. a status change).
    ///
    /// Dropping the future mid-request leaves the editor `Submitting`, as
    /// with `submit`.
    pub async fn submit_with<T: Transport>(
        &mut self,
        transport: &T,
        build: impl FnOnce(&EditMode, &Record) -> Mutation,
        affected: &[&ListView<T>],
    ) -> Result<Submitted, EditorError> {
        let (mode, form) = self.begin_submit()?;
        let mutation = build(&mode, &form);
        self.run(transport, mutation, affected).await
    }

    async fn run<T: Transport>(
        &mut self,
        transport: &T,
        mutation: Mutation,
        affected: &[&ListView<T>],
    ) -> Result<Submitted, EditorError> {
        let result = transport
            .send(mutation.method, &mutation.path, mutation.body.clone())
            .await;
        self.finish_submit(&result);

        match result {
            Ok(response) => {
                tracing::info!(method = %mutation.method, path = %mutation.path, "Saved");
                let refreshed = join_all(affected.iter().map(|view| view.refresh())).await;
                Ok(Submitted {
                    response,
                    refreshed,
                })
            }
            Err(e) => {
                tracing::warn!(path = %mutation.path, error = %e, "Save rejected, editor kept open");
                Err(EditorError::Rejected(e))
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Validators
// ═══════════════════════════════════════════════════════════

/// New password must match its confirmation and meet the length policy.
pub fn validate_password_change(new_password: &str, confirm: &str) -> Result<(), String> {
    if new_password != confirm {
        return Err("Passwords do not match".into());
    }
    if new_password.chars().count() < MIN_PASSWORD_LEN {
        return Err(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        ));
    }
    Ok(())
}

/// Validator requiring every field in `fields` to be present and non-blank.
pub fn require_fields(
    fields: &[&str],
) -> impl Fn(&Record) -> Result<(), String> + Send + Sync + 'static {
    let fields: Vec<String> = fields.iter().map(|f| f.to_string()).collect();
    move |form: &Record| {
        for field in &fields {
            let blank = match form.get(field) {
                None | Some(Value::Null) => true,
                Some(Value::String(s)) => s.trim().is_empty(),
                _ => false,
            };
            if blank {
                return Err(format!("{} is required", field.replace('_', " ")));
            }
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockTransport;
    use crate::descriptor::ViewDescriptor;
    use serde_json::json;
    use std::sync::Arc;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    fn assignments_view(mock: &Arc<MockTransport>) -> ListView<MockTransport> {
        ListView::new(
            Arc::clone(mock),
            ViewDescriptor::new("assignments", Resource::FlightAssignments, "assignment_id"),
        )
    }

    #[tokio::test]
    async fn successful_create_closes_and_refreshes_all_affected() {
        let mock = Arc::new(
            MockTransport::new()
                .on_get("flight-assignments", json!([{"assignment_id": 1}]))
                .on_get("ambulances/available", json!([{"ambulance_id": "A1"}, {"ambulance_id": "A2"}]))
                .on_send(Method::Post, "flight-assignments", Ok(json!({"assignment_id": 2}))),
        );
        let assignments = assignments_view(&mock);
        let ambulances = ListView::new(
            Arc::clone(&mock),
            ViewDescriptor::new("ambulances", Resource::AvailableAmbulances, "ambulance_id"),
        );
        assignments.refresh().await.unwrap();
        ambulances.refresh().await.unwrap();
        assert_eq!(assignments.rows().len(), 1);

        mock.push_get("flight-assignments", json!([{"assignment_id": 1}, {"assignment_id": 2}]));
        mock.push_get("ambulances/available", json!([{"ambulance_id": "A2"}]));

        let mut editor = Editor::new(Resource::FlightAssignments);
        editor.open_new(record(json!({"enquiry_id": 9, "ambulance_id": "A1"})));
        let submitted = editor
            .submit(mock.as_ref(), &[&assignments, &ambulances])
            .await
            .unwrap();

        assert_eq!(submitted.response["assignment_id"], 2);
        assert!(submitted.refreshed.iter().all(|r| r.is_ok()));
        assert!(!editor.is_open());
        assert_eq!(assignments.rows().len(), 2);
        assert_eq!(ambulances.rows().len(), 1);
    }

    #[tokio::test]
    async fn failed_submit_keeps_editor_open_and_skips_refresh() {
        let mock = Arc::new(
            MockTransport::new()
                .on_get("flight-assignments", json!([{"assignment_id": 1}]))
                .on_send(
                    Method::Post,
                    "flight-assignments",
                    Err(ClientError::Http {
                        status: 409,
                        message: "Ambulance already assigned".into(),
                    }),
                ),
        );
        let view = assignments_view(&mock);
        view.refresh().await.unwrap();
        let gets_before = mock.call_count("flight-assignments");

        let mut editor = Editor::new(Resource::FlightAssignments);
        editor.open_new(record(json!({"enquiry_id": 9})));
        let err = editor.submit(mock.as_ref(), &[&view]).await.unwrap_err();

        assert!(matches!(err, EditorError::Rejected(_)));
        assert!(editor.is_open());
        assert!(!editor.is_submitting());
        assert_eq!(editor.error(), Some("Ambulance already assigned"));
        assert_eq!(editor.form().unwrap()["enquiry_id"], 9);
        assert_eq!(view.rows().len(), 1);
        // one POST, no extra GET
        assert_eq!(mock.call_count("flight-assignments"), gets_before + 1);
    }

    #[tokio::test]
    async fn validation_failure_sends_nothing() {
        let mock = MockTransport::new();
        let mut editor =
            Editor::new(Resource::Invoices).with_validator(require_fields(&["invoice_number"]));
        editor.open_new(record(json!({"invoice_number": "  "})));

        let err = editor.submit::<MockTransport>(&mock, &[]).await.unwrap_err();
        assert_eq!(err, EditorError::Invalid("invoice number is required".into()));
        assert!(mock.calls().is_empty());
        assert_eq!(editor.error(), Some("invoice number is required"));
    }

    #[tokio::test]
    async fn dropped_submit_can_be_abandoned() {
        let mock = MockTransport::new();
        let mut editor = Editor::new(Resource::Invoices);
        editor.open_new(record(json!({"amount": 500})));

        // state left behind by a submit future dropped before its response
        editor.begin_submit().unwrap();
        assert!(editor.is_submitting());
        assert_eq!(
            editor.submit::<MockTransport>(&mock, &[]).await.unwrap_err(),
            EditorError::AlreadySubmitting
        );

        editor.abandon_submit();
        assert!(!editor.is_submitting());
        assert!(editor.error().is_none());
        assert_eq!(editor.form().unwrap()["amount"], 500);
        editor.set_field("amount", json!(600)).unwrap();
        assert!(mock.calls().is_empty());
    }

    #[test]
    fn double_submit_is_refused() {
        let mut editor = Editor::new(Resource::Invoices);
        editor.open_new(Record::new());
        editor.begin_submit().unwrap();
        assert!(editor.is_submitting());
        assert_eq!(editor.begin_submit().unwrap_err(), EditorError::AlreadySubmitting);
        assert!(editor.form_mut().is_none());
    }

    #[test]
    fn submit_without_open_editor_fails() {
        let mut editor = Editor::new(Resource::Invoices);
        assert_eq!(editor.begin_submit().unwrap_err(), EditorError::NotEditing);
        assert_eq!(
            editor.set_field("x", json!(1)).unwrap_err(),
            EditorError::NotEditing
        );
    }

    #[test]
    fn edit_prefills_from_row_and_puts() {
        let row = ViewModelRow {
            id: Some(RecordKey::Int(4)),
            record: record(json!({"invoice_id": 4, "amount": 1000})),
            joined: Default::default(),
            derived: Default::default(),
        };
        let mut editor = Editor::new(Resource::Invoices);
        editor.open_edit(&row).unwrap();
        editor.set_field("amount", json!(1500)).unwrap();

        let (mode, form) = editor.begin_submit().unwrap();
        let mutation = editor.default_mutation(&mode, &form);
        assert_eq!(mutation.method, Method::Put);
        assert_eq!(mutation.path, "invoices/4");
        assert_eq!(mutation.body.unwrap()["amount"], 1500);
    }

    #[test]
    fn edit_requires_row_id() {
        let row = ViewModelRow {
            id: None,
            record: Record::new(),
            joined: Default::default(),
            derived: Default::default(),
        };
        let mut editor = Editor::new(Resource::Invoices);
        assert_eq!(editor.open_edit(&row).unwrap_err(), EditorError::MissingId);
        assert!(!editor.is_open());
    }

    #[test]
    fn close_discards_edits() {
        let mut editor = Editor::new(Resource::CaseClosures);
        editor.open_new(Record::new());
        editor.set_field("remarks", json!("draft")).unwrap();
        editor.close();
        assert!(editor.form().is_none());
        editor.open_new(Record::new());
        assert!(editor.form().unwrap().get("remarks").is_none());
    }

    #[tokio::test]
    async fn status_change_via_submit_with() {
        let mock = MockTransport::new().on_send(
            Method::Patch,
            "enquiries/12/status",
            Ok(json!({"ok": true})),
        );
        let row = ViewModelRow {
            id: Some(RecordKey::Int(12)),
            record: record(json!({"enquiry_id": 12, "status": "PENDING"})),
            joined: Default::default(),
            derived: Default::default(),
        };
        let mut editor = Editor::new(Resource::Enquiries);
        editor.open_edit(&row).unwrap();
        editor
            .submit_with::<MockTransport>(
                &mock,
                |mode, _form| match mode {
                    EditMode::Edit(id) => Mutation::status_change(
                        &Resource::Enquiries,
                        id,
                        CaseStatus::Escalated,
                        Some(" needs DM review "),
                    ),
                    EditMode::New => unreachable!(),
                },
                &[],
            )
            .await
            .unwrap();

        let call = &mock.calls()[0];
        assert_eq!(call.method, "PATCH");
        assert_eq!(
            call.body,
            Some(json!({"status": "ESCALATED", "remarks": "needs DM review"}))
        );
    }

    #[tokio::test]
    async fn standalone_delete_refreshes() {
        let mock = Arc::new(
            MockTransport::new()
                .on_get("flight-assignments", json!([{"assignment_id": 1}, {"assignment_id": 2}]))
                .on_send(Method::Delete, "flight-assignments/2", Ok(Value::Null)),
        );
        let view = assignments_view(&mock);
        view.refresh().await.unwrap();
        mock.push_get("flight-assignments", json!([{"assignment_id": 1}]));

        let mutation = Mutation::delete(&Resource::FlightAssignments, &RecordKey::Int(2));
        mutate(mock.as_ref(), &mutation, &[&view]).await.unwrap();
        assert_eq!(view.rows().len(), 1);
    }

    #[test]
    fn password_policy() {
        assert_eq!(
            validate_password_change("abcdefgh", "abcdefgx").unwrap_err(),
            "Passwords do not match"
        );
        assert!(validate_password_change("short", "short")
            .unwrap_err()
            .contains("at least 8"));
        assert!(validate_password_change("longenough", "longenough").is_ok());
    }
}
