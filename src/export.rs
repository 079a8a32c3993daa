//! Data export, report downloads and bulk import.

use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::client::{Download, Transport};
use crate::error::ClientError;
use crate::models::ExportFormat;

/// `GET /data/export/{data_type}?format=`.
pub async fn export_data<T: Transport>(
    transport: &T,
    data_type: &str,
    format: ExportFormat,
) -> Result<Download, ClientError> {
    let path = format!("data/export/{}", data_type.trim_matches('/'));
    let download = transport
        .download(&path, &[("format".to_string(), format.to_string())])
        .await?;
    tracing::info!(
        data_type,
        format = %format,
        bytes = download.bytes.len(),
        "Export downloaded"
    );
    Ok(download)
}

/// `GET /reports/{report_type}` with report parameters (date range etc.).
pub async fn download_report<T: Transport>(
    transport: &T,
    report_type: &str,
    params: &[(String, String)],
) -> Result<Download, ClientError> {
    let path = format!("reports/{}", report_type.trim_matches('/'));
    transport.download(&path, params).await
}

/// Write `download` into `dir` under its own file name.
///
/// File names carrying a path component are refused.
pub fn save_download(download: &Download, dir: &Path) -> Result<PathBuf, ClientError> {
    let name = download.file_name.trim();
    if name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\'])
    {
        return Err(ClientError::Io(format!(
            "Refusing to save file with unsafe name {:?}",
            download.file_name
        )));
    }
    std::fs::create_dir_all(dir)?;
    let target = dir.join(name);
    std::fs::write(&target, &download.bytes)?;
    tracing::info!(path = %target.display(), "Saved download");
    Ok(target)
}

/// Upload a file to `/data/import`; returns the server's import summary.
pub async fn import_data<T: Transport>(transport: &T, file: &Path) -> Result<Value, ClientError> {
    let file_name = file
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| ClientError::Io(format!("Not a file: {}", file.display())))?
        .to_string();
    let bytes = tokio::fs::read(file).await?;
    tracing::info!(file = %file_name, bytes = bytes.len(), "Importing data");
    transport.upload("data/import", &file_name, bytes).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{Method, MockTransport};
    use serde_json::json;

    fn csv(name: &str) -> Download {
        Download {
            file_name: name.to_string(),
            content_type: Some("text/csv".into()),
            bytes: b"id,name\n1,Bhopal\n".to_vec(),
        }
    }

    #[tokio::test]
    async fn export_sends_format() {
        let mock = MockTransport::new().on_download("data/export/districts", csv("districts.csv"));
        let download = export_data(&mock, "districts", ExportFormat::Csv).await.unwrap();
        assert_eq!(download.file_name, "districts.csv");
        assert_eq!(
            mock.calls()[0].query,
            vec![("format".to_string(), "csv".to_string())]
        );
    }

    #[tokio::test]
    async fn report_passes_params() {
        let mock = MockTransport::new().on_download("reports/monthly", csv("monthly.csv"));
        let params = vec![("from".to_string(), "2026-01-01".to_string())];
        download_report(&mock, "monthly", &params).await.unwrap();
        assert_eq!(mock.calls()[0].query, params);
    }

    #[test]
    fn save_writes_into_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = save_download(&csv("out.csv"), &dir.path().join("nested")).unwrap();
        assert_eq!(std::fs::read(path).unwrap(), b"id,name\n1,Bhopal\n");
    }

    #[test]
    fn save_refuses_path_components() {
        let dir = tempfile::tempdir().unwrap();
        for bad in ["../evil.csv", "a/b.csv", "..\\x.csv", "..", " "] {
            assert!(save_download(&csv(bad), dir.path()).is_err(), "{bad}");
        }
    }

    #[tokio::test]
    async fn import_uploads_file_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("hospitals.csv");
        std::fs::write(&file, b"name\nAIIMS\n").unwrap();
        let mock = MockTransport::new().on_send(Method::Post, "data/import", Ok(json!({"imported": 1})));

        let summary = import_data(&mock, &file).await.unwrap();
        assert_eq!(summary["imported"], 1);
        let call = &mock.calls()[0];
        assert_eq!(call.body.as_ref().unwrap()["file_name"], "hospitals.csv");
        assert_eq!(call.body.as_ref().unwrap()["size"], 11);
    }

    #[tokio::test]
    async fn import_missing_file_is_io_error() {
        let mock = MockTransport::new();
        let err = import_data(&mock, Path::new("/nonexistent/x.csv")).await.unwrap_err();
        assert!(matches!(err, ClientError::Io(_)));
        assert!(mock.calls().is_empty());
    }
}
