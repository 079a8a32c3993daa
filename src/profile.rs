//! The signed-in user's own profile.

use serde_json::Value;

use crate::client::{Method, Transport};
use crate::editor::validate_password_change;
use crate::error::ClientError;
use crate::models::Record;
use crate::session::SessionContext;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProfileError {
    #[error("{0}")]
    Invalid(String),
    #[error(transparent)]
    Client(#[from] ClientError),
}

fn user_path(session: &SessionContext) -> String {
    format!("users/{}", session.user_id)
}

/// Accepts a bare object or `{ data: {...} }`.
fn unwrap_record(body: Value) -> Result<Record, ClientError> {
    match body {
        Value::Object(mut obj) => match obj.remove("data") {
            Some(Value::Object(inner)) => Ok(inner),
            Some(other) => {
                obj.insert("data".to_string(), other);
                Ok(obj)
            }
            None => Ok(obj),
        },
        other => Err(ClientError::Decode(format!("expected user object, got {other}"))),
    }
}

/// `GET /users/{user_id}`.
pub async fn load<T: Transport>(
    transport: &T,
    session: &SessionContext,
) -> Result<Record, ClientError> {
    let body = transport.get(&user_path(session), &[]).await?;
    unwrap_record(body)
}

/// `PUT /users/{user_id}` with the changed fields. Returns the stored profile.
pub async fn update<T: Transport>(
    transport: &T,
    session: &SessionContext,
    fields: Record,
) -> Result<Record, ClientError> {
    let path = user_path(session);
    let body = transport
        .send(Method::Put, &path, Some(Value::Object(fields)))
        .await?;
    tracing::info!(user = %session.username, "Profile updated");
    match body {
        Value::Null => load(transport, session).await,
        body => unwrap_record(body),
    }
}

/// `PUT /users/{user_id}/password`. Validation runs before any request.
pub async fn change_password<T: Transport>(
    transport: &T,
    session: &SessionContext,
    current: &str,
    new_password: &str,
    confirm: &str,
) -> Result<(), ProfileError> {
    if current.is_empty() {
        return Err(ProfileError::Invalid("Current password is required".into()));
    }
    validate_password_change(new_password, confirm).map_err(ProfileError::Invalid)?;
    if current == new_password {
        return Err(ProfileError::Invalid(
            "New password must differ from the current one".into(),
        ));
    }

    let body = serde_json::json!({
        "current_password": current,
        "new_password": new_password,
    });
    transport
        .send(Method::Put, &format!("{}/password", user_path(session)), Some(body))
        .await?;
    tracing::info!(user = %session.username, "Password changed");
    Ok(())
}
