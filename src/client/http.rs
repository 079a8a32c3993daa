use std::time::Duration;

use reqwest::header::{HeaderMap, AUTHORIZATION, CONTENT_DISPOSITION, CONTENT_TYPE};
use serde_json::Value;

use super::{Download, Method, Transport};
use crate::config::ClientConfig;
use crate::error::{message_from_body, ClientError};
use crate::session::SessionHandle;

/// reqwest-backed client for the backend REST API.
///
/// Attaches the session's bearer token to every request. A 401 response
/// clears the session (memory and disk) before surfacing
/// `ClientError::Unauthorized`, so callers only need to route to login.
#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    http: reqwest::Client,
    session: SessionHandle,
    timeout_secs: u64,
}

impl ApiClient {
    pub fn new(config: &ClientConfig, session: SessionHandle) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http,
            session,
            timeout_secs: config.timeout_secs,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self
            .http
            .request(method, self.url(path))
            .header("X-Request-Id", uuid::Uuid::new_v4().to_string());
        if let Some(token) = self.session.bearer() {
            builder = builder.header(AUTHORIZATION, format!("Bearer {}", token.expose()));
        }
        builder
    }

    fn map_send_error(&self, e: reqwest::Error) -> ClientError {
        if e.is_timeout() {
            ClientError::Timeout(self.timeout_secs)
        } else if e.is_connect() {
            ClientError::Connection(self.base_url.clone())
        } else {
            ClientError::Transport(e.to_string())
        }
    }

    /// Send and check status. Non-2xx bodies are read for a message.
    async fn execute(
        &self,
        builder: reqwest::RequestBuilder,
        label: &str,
    ) -> Result<reqwest::Response, ClientError> {
        let response = builder.send().await.map_err(|e| self.map_send_error(e))?;
        let status = response.status();
        tracing::debug!(request = label, status = status.as_u16(), "Backend responded");

        if status == reqwest::StatusCode::UNAUTHORIZED {
            tracing::warn!(request = label, "Backend rejected session, clearing it");
            self.session.clear();
            return Err(ClientError::Unauthorized);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Http {
                status: status.as_u16(),
                message: message_from_body(status.as_u16(), &body),
            });
        }
        Ok(response)
    }

    async fn read_json(&self, response: reqwest::Response) -> Result<Value, ClientError> {
        let text = response.text().await.map_err(|e| self.map_send_error(e))?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| ClientError::Decode(e.to_string()))
    }
}

impl Transport for ApiClient {
    async fn get(&self, path: &str, query: &[(String, String)]) -> Result<Value, ClientError> {
        let label = format!("GET {path}");
        let response = self
            .execute(self.request(reqwest::Method::GET, path).query(query), &label)
            .await?;
        self.read_json(response).await
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, ClientError> {
        let label = format!("{method} {path}");
        let mut builder = self.request(to_reqwest(method), path);
        if let Some(body) = &body {
            builder = builder.json(body);
        }
        let response = self.execute(builder, &label).await?;
        self.read_json(response).await
    }

    async fn download(
        &self,
        path: &str,
        query: &[(String, String)],
    ) -> Result<Download, ClientError> {
        let label = format!("GET {path}");
        let response = self
            .execute(self.request(reqwest::Method::GET, path).query(query), &label)
            .await?;

        let headers = response.headers().clone();
        let bytes = response.bytes().await.map_err(|e| self.map_send_error(e))?;
        let content_type = header_str(&headers, CONTENT_TYPE.as_str());
        let file_name = header_str(&headers, CONTENT_DISPOSITION.as_str())
            .and_then(|d| filename_from_disposition(&d))
            .unwrap_or_else(|| fallback_file_name(path, content_type.as_deref()));

        tracing::info!(file = %file_name, size = bytes.len(), "Download received");
        Ok(Download {
            file_name,
            content_type,
            bytes: bytes.to_vec(),
        })
    }

    async fn upload(
        &self,
        path: &str,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<Value, ClientError> {
        let label = format!("POST {path}");
        let mime = mime_guess::from_path(file_name).first_or_octet_stream();
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(mime.essence_str())
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .execute(self.request(reqwest::Method::POST, path).multipart(form), &label)
            .await?;
        self.read_json(response).await
    }
}

fn to_reqwest(method: Method) -> reqwest::Method {
    match method {
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
    }
}

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

/// `attachment; filename="cases.csv"` → `cases.csv`.
pub fn filename_from_disposition(disposition: &str) -> Option<String> {
    disposition.split(';').find_map(|part| {
        let (key, value) = part.trim().split_once('=')?;
        if !key.trim().eq_ignore_ascii_case("filename") {
            return None;
        }
        let name = value.trim().trim_matches('"').trim();
        (!name.is_empty()).then(|| name.to_string())
    })
}

/// `/data/export/enquiries` + `text/csv` → `enquiries.csv`.
pub fn fallback_file_name(path: &str, content_type: Option<&str>) -> String {
    let stem = path
        .trim_end_matches('/')
        .rsplit('/')
        .find(|s| !s.is_empty())
        .unwrap_or("download");
    let extension = content_type
        .map(|ct| ct.split(';').next().unwrap_or(ct).trim())
        .and_then(mime_guess::get_mime_extensions_str)
        .and_then(|exts| exts.first().copied())
        .unwrap_or("bin");
    format!("{stem}.{extension}")
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use crate::session::{SessionContext, SessionStore};
    use axum::http::{HeaderMap as AxumHeaders, StatusCode};
    use axum::response::IntoResponse;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::json;

    fn authorized(headers: &AxumHeaders) -> bool {
        headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            == Some("Bearer tok-1")
    }

    async fn enquiries(headers: AxumHeaders) -> axum::response::Response {
        if !authorized(&headers) {
            return StatusCode::UNAUTHORIZED.into_response();
        }
        Json(json!({"data": [{"enquiry_id": 1}, {"enquiry_id": 2}]})).into_response()
    }

    async fn broken() -> axum::response::Response {
        (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({"message": "Hospital is not active"})),
        )
            .into_response()
    }

    async fn export() -> axum::response::Response {
        (
            [
                ("content-type", "text/csv"),
                ("content-disposition", "attachment; filename=\"enquiries.csv\""),
            ],
            "id,name\n1,A\n",
        )
            .into_response()
    }

    async fn echo(Json(body): Json<Value>) -> Json<Value> {
        Json(json!({"received": body}))
    }

    async fn spawn_backend() -> String {
        let app = Router::new()
            .route("/api/enquiries", get(enquiries))
            .route("/api/broken", get(broken))
            .route("/api/data/export/enquiries", get(export))
            .route("/api/echo", post(echo));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/api")
    }

    fn signed_in() -> SessionHandle {
        let handle = SessionHandle::new();
        handle
            .login(SessionContext::new("tok-1", "5", "it.admin", Role::ItAdmin))
            .unwrap();
        handle
    }

    #[tokio::test]
    async fn get_sends_bearer_and_decodes_envelope() {
        let base = spawn_backend().await;
        let client = ApiClient::new(&ClientConfig::new(&base), signed_in()).unwrap();
        let body = client.get("/enquiries", &[]).await.unwrap();
        assert_eq!(body["data"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn unauthorized_clears_session() {
        let base = spawn_backend().await;
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("session.json"));
        let session = SessionHandle::with_store(store.clone());
        session
            .login(SessionContext::new("stale", "5", "it.admin", Role::ItAdmin))
            .unwrap();

        let client = ApiClient::new(&ClientConfig::new(&base), session.clone()).unwrap();
        let err = client.get("enquiries", &[]).await.unwrap_err();
        assert_eq!(err, ClientError::Unauthorized);
        assert!(!session.is_active());
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn error_body_message_is_surfaced() {
        let base = spawn_backend().await;
        let client = ApiClient::new(&ClientConfig::new(&base), signed_in()).unwrap();
        let err = client.get("broken", &[]).await.unwrap_err();
        assert_eq!(
            err,
            ClientError::Http {
                status: 422,
                message: "Hospital is not active".into()
            }
        );
    }

    #[tokio::test]
    async fn download_reads_disposition_name() {
        let base = spawn_backend().await;
        let client = ApiClient::new(&ClientConfig::new(&base), signed_in()).unwrap();
        let download = client.download("data/export/enquiries", &[]).await.unwrap();
        assert_eq!(download.file_name, "enquiries.csv");
        assert_eq!(download.content_type.as_deref(), Some("text/csv"));
        assert_eq!(download.bytes, b"id,name\n1,A\n");
    }

    #[tokio::test]
    async fn send_posts_json_body() {
        let base = spawn_backend().await;
        let client = ApiClient::new(&ClientConfig::new(&base), signed_in()).unwrap();
        let reply = client
            .send(Method::Post, "echo", Some(json!({"amount": 1000})))
            .await
            .unwrap();
        assert_eq!(reply["received"]["amount"], 1000);
    }

    #[tokio::test]
    async fn unreachable_backend_is_connection_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let config = ClientConfig::new(&format!("http://{addr}"));
        let client = ApiClient::new(&config, SessionHandle::new()).unwrap();
        let err = client.get("enquiries", &[]).await.unwrap_err();
        assert!(matches!(err, ClientError::Connection(_)), "got {err:?}");
    }

    #[test]
    fn disposition_parsing() {
        assert_eq!(
            filename_from_disposition("attachment; filename=\"report.pdf\""),
            Some("report.pdf".into())
        );
        assert_eq!(
            filename_from_disposition("attachment; FILENAME=cases.xlsx"),
            Some("cases.xlsx".into())
        );
        assert_eq!(filename_from_disposition("inline"), None);
    }

    #[test]
    fn fallback_name_uses_mime_extension() {
        assert_eq!(
            fallback_file_name("/reports/monthly", Some("application/pdf")),
            "monthly.pdf"
        );
        assert_eq!(
            fallback_file_name("data/export/users", Some("text/csv; charset=utf-8")),
            "users.csv"
        );
        assert_eq!(fallback_file_name("reports/x/", None), "x.bin");
    }

    #[test]
    fn constructor_trims_base_url() {
        let client =
            ApiClient::new(&ClientConfig::new("http://localhost:5000/api/"), SessionHandle::new())
                .unwrap();
        assert_eq!(client.base_url(), "http://localhost:5000/api");
        assert_eq!(client.url("/enquiries"), "http://localhost:5000/api/enquiries");
    }
}
