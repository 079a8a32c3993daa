use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use serde_json::Value;

use super::{Download, Method, Transport};
use crate::error::ClientError;

/// One recorded request.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub method: String,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

#[derive(Clone)]
struct Scripted<T> {
    delay: Option<Duration>,
    result: Result<T, ClientError>,
}

/// Queue of scripted replies. The last reply is sticky.
struct Replies<T> {
    queue: VecDeque<Scripted<T>>,
}

impl<T: Clone> Replies<T> {
    fn next(&mut self) -> Option<Scripted<T>> {
        if self.queue.len() > 1 {
            self.queue.pop_front()
        } else {
            self.queue.front().cloned()
        }
    }
}

#[derive(Default)]
struct MockState {
    gets: HashMap<String, Replies<Value>>,
    sends: HashMap<(Method, String), Replies<Value>>,
    downloads: HashMap<String, Replies<Download>>,
    calls: Vec<RecordedCall>,
}

/// Scripted transport for tests and offline demos.
///
/// Replies are keyed by path (leading `/` ignored; query strings are
/// recorded but do not affect matching). Unscripted paths answer 404.
#[derive(Default)]
pub struct MockTransport {
    state: Mutex<MockState>,
}

fn key(path: &str) -> String {
    path.trim_start_matches('/').to_string()
}

fn not_found() -> ClientError {
    ClientError::Http {
        status: 404,
        message: "Not Found".into(),
    }
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a GET reply for `path`.
    pub fn on_get(self, path: &str, value: Value) -> Self {
        self.script_get(path, None, Ok(value))
    }

    /// Queue a GET reply that resolves after `delay`.
    pub fn on_get_delayed(self, path: &str, delay: Duration, value: Value) -> Self {
        self.script_get(path, Some(delay), Ok(value))
    }

    /// Queue a GET failure for `path`.
    pub fn on_get_error(self, path: &str, error: ClientError) -> Self {
        self.script_get(path, None, Err(error))
    }

    /// Queue a reply for a write request.
    pub fn on_send(self, method: Method, path: &str, result: Result<Value, ClientError>) -> Self {
        self.with_state(|state| {
            state
                .sends
                .entry((method, key(path)))
                .or_insert_with(|| Replies { queue: VecDeque::new() })
                .queue
                .push_back(Scripted { delay: None, result });
        });
        self
    }

    pub fn on_download(self, path: &str, download: Download) -> Self {
        self.with_state(|state| {
            state
                .downloads
                .entry(key(path))
                .or_insert_with(|| Replies { queue: VecDeque::new() })
                .queue
                .push_back(Scripted {
                    delay: None,
                    result: Ok(download),
                });
        });
        self
    }

    /// Replace every GET reply for `path` on an already-shared mock.
    pub fn push_get(&self, path: &str, value: Value) {
        self.with_state(|state| {
            let replies = state
                .gets
                .entry(key(path))
                .or_insert_with(|| Replies { queue: VecDeque::new() });
            replies.queue.clear();
            replies.queue.push_back(Scripted {
                delay: None,
                result: Ok(value),
            });
        });
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state
            .lock()
            .map(|s| s.calls.clone())
            .unwrap_or_default()
    }

    /// Number of requests (any verb) made to `path`.
    pub fn call_count(&self, path: &str) -> usize {
        let wanted = key(path);
        self.calls().iter().filter(|c| c.path == wanted).count()
    }

    fn script_get(self, path: &str, delay: Option<Duration>, result: Result<Value, ClientError>) -> Self {
        self.with_state(|state| {
            state
                .gets
                .entry(key(path))
                .or_insert_with(|| Replies { queue: VecDeque::new() })
                .queue
                .push_back(Scripted { delay, result });
        });
        self
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut MockState) -> R) -> R {
        match self.state.lock() {
            Ok(mut guard) => f(&mut guard),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }

    fn record(&self, method: &str, path: &str, query: &[(String, String)], body: Option<Value>) {
        self.with_state(|state| {
            state.calls.push(RecordedCall {
                method: method.to_string(),
                path: key(path),
                query: query.to_vec(),
                body,
            })
        });
    }

    async fn resolve<T>(scripted: Option<Scripted<T>>) -> Result<T, ClientError> {
        let scripted = scripted.ok_or_else(not_found)?;
        if let Some(delay) = scripted.delay {
            tokio::time::sleep(delay).await;
        }
        scripted.result
    }
}

impl Transport for MockTransport {
    async fn get(&self, path: &str, query: &[(String, String)]) -> Result<Value, ClientError> {
        self.record("GET", path, query, None);
        let scripted = self.with_state(|s| s.gets.get_mut(&key(path)).and_then(|r| r.next()));
        Self::resolve(scripted).await
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, ClientError> {
        self.record(method.as_str(), path, &[], body);
        let scripted =
            self.with_state(|s| s.sends.get_mut(&(method, key(path))).and_then(|r| r.next()));
        Self::resolve(scripted).await
    }

    async fn download(
        &self,
        path: &str,
        query: &[(String, String)],
    ) -> Result<Download, ClientError> {
        self.record("GET", path, query, None);
        let scripted = self.with_state(|s| s.downloads.get_mut(&key(path)).and_then(|r| r.next()));
        Self::resolve(scripted).await
    }

    async fn upload(
        &self,
        path: &str,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<Value, ClientError> {
        let body = serde_json::json!({ "file_name": file_name, "size": bytes.len() });
        self.record("POST", path, &[], Some(body));
        let scripted = self.with_state(|s| {
            s.sends
                .get_mut(&(Method::Post, key(path)))
                .and_then(|r| r.next())
        });
        Self::resolve(scripted).await
    }
}
