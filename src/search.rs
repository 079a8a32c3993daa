//! Server-side search endpoints.

use crate::client::Transport;
use crate::error::ClientError;
use crate::models::{Record, SearchKind};
use crate::resource::{normalize_envelope, Requirement, Resource, ResourceFetcher};

/// `GET /search/{kind}?q=term`. A blank term returns nothing without a request.
pub async fn search<T: Transport>(
    transport: &T,
    kind: SearchKind,
    term: &str,
) -> Result<Vec<Record>, ClientError> {
    let term = term.trim();
    if term.is_empty() {
        return Ok(Vec::new());
    }
    let path = format!("search/{kind}");
    let body = transport
        .get(&path, &[("q".to_string(), term.to_string())])
        .await?;
    let records = normalize_envelope(body).records;
    tracing::debug!(kind = %kind, count = records.len(), "Search completed");
    Ok(records)
}

/// Case search (`GET /cases/search?q=term`).
pub async fn search_cases<T: Transport>(
    transport: &T,
    term: &str,
) -> Result<Vec<Record>, ClientError> {
    let term = term.trim();
    if term.is_empty() {
        return Ok(Vec::new());
    }
    ResourceFetcher::new(transport)
        .fetch_records(
            &Resource::CaseSearch,
            &[("q".to_string(), term.to_string())],
            Requirement::Required,
        )
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockTransport;
    use serde_json::json;

    #[tokio::test]
    async fn blank_term_sends_nothing() {
        let mock = MockTransport::new();
        assert!(search(&mock, SearchKind::Hospitals, "   ").await.unwrap().is_empty());
        assert!(search_cases(&mock, "").await.unwrap().is_empty());
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn search_hits_kind_path_with_trimmed_term() {
        let mock = MockTransport::new().on_get(
            "search/hospitals",
            json!({"data": [{"hospital_id": 1, "name": "AIIMS Bhopal"}]}),
        );
        let hits = search(&mock, SearchKind::Hospitals, " aiims ").await.unwrap();
        assert_eq!(hits.len(), 1);
        let call = &mock.calls()[0];
        assert_eq!(call.path, "search/hospitals");
        assert_eq!(call.query, vec![("q".to_string(), "aiims".to_string())]);
    }

    #[tokio::test]
    async fn case_search_errors_surface() {
        let mock = MockTransport::new().on_get_error("cases/search", ClientError::Timeout(30));
        let err = search_cases(&mock, "ENQ-1").await.unwrap_err();
        assert_eq!(err, ClientError::Timeout(30));
    }
}
