//! Backend transport.
//!
//! `Transport` is the seam every layer above talks through. `ApiClient` is
//! the real reqwest-backed implementation; `MockTransport` is a scripted
//! stand-in for tests and offline demos.

mod http;
mod mock;

pub use http::*;
pub use mock::*;

use std::future::Future;

use serde_json::Value;

use crate::error::ClientError;

/// Query parameters, in order. Values are URL-encoded by the transport.
pub type Query = Vec<(String, String)>;

/// Write verbs. Reads always go through `Transport::get`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A file returned by an export or report endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Everything the data-access layer needs from the backend.
pub trait Transport: Send + Sync {
    /// Authenticated GET returning the decoded JSON body (`Null` if empty).
    fn get(
        &self,
        path: &str,
        query: &[(String, String)],
    ) -> impl Future<Output = Result<Value, ClientError>> + Send;

    /// Write request with an optional JSON body.
    fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> impl Future<Output = Result<Value, ClientError>> + Send;

    /// GET returning raw bytes (CSV/XLSX/PDF exports).
    fn download(
        &self,
        path: &str,
        query: &[(String, String)],
    ) -> impl Future<Output = Result<Download, ClientError>> + Send;

    /// Multipart upload of a single file under the `file` field.
    fn upload(
        &self,
        path: &str,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> impl Future<Output = Result<Value, ClientError>> + Send;
}

/// Build a `Query` from string pairs.
pub fn query_of(pairs: &[(&str, &str)]) -> Query {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}
