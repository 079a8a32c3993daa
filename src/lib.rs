pub mod config;
pub mod error;
pub mod models;
pub mod session; // Session context + on-disk store
pub mod client; // Transport seam: reqwest client + scripted mock
pub mod resource; // Resource Fetcher
pub mod index; // Lookup Index Builder
pub mod descriptor;
pub mod assemble; // View-Model Assembler
pub mod filter; // Filter/Search Engine
pub mod pagination;
pub mod view; // Fetch cycle pipeline
pub mod editor; // Mutation/Refresh Cycle
pub mod notifications;
pub mod search;
pub mod profile;
pub mod export;
pub mod views; // Role screens as descriptors

use std::str::FromStr;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::client::ApiClient;
use crate::models::ExportFormat;
use crate::session::{SessionHandle, SessionStore};
use crate::view::ListView;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Usage(String),
    #[error(transparent)]
    Session(#[from] session::StoreError),
    #[error(transparent)]
    Client(#[from] error::ClientError),
    #[error("{}", .0.user_message())]
    View(#[from] view::ViewError),
    #[error("Failed to render output: {0}")]
    Output(#[from] serde_json::Error),
}

fn usage() -> AppError {
    let names: Vec<String> = views::all().into_iter().map(|d| d.name).collect();
    AppError::Usage(format!(
        "usage: {bin} <view> [query]\n       {bin} export <data-type> [csv|xlsx|pdf]\nviews: {}",
        names.join(", "),
        bin = config::APP_NAME.to_lowercase(),
    ))
}

/// Install the global subscriber. `RUST_LOG` overrides the default filter.
/// Logs go to stderr so stdout stays machine-readable.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

/// Entry point for the `airmed` binary. `args` excludes the program name.
pub async fn run(args: &[String]) -> Result<(), AppError> {
    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let config = config::ClientConfig::from_env();
    let session = SessionHandle::restore(SessionStore::default_location())?;
    if !session.is_active() {
        tracing::warn!("No stored session; requests will be unauthenticated");
    }
    let client = Arc::new(ApiClient::new(&config, session)?);

    match args.first().map(String::as_str) {
        Some("export") => {
            let data_type = args.get(1).ok_or_else(usage)?;
            let format = match args.get(2) {
                Some(raw) => ExportFormat::from_str(&raw.to_ascii_lowercase()).map_err(|_| usage())?,
                None => ExportFormat::Csv,
            };
            let download = export::export_data(client.as_ref(), data_type, format).await?;
            let saved = export::save_download(&download, &config::downloads_dir())?;
            println!("{}", saved.display());
        }
        Some(name) => {
            let descriptor = views::by_name(name).ok_or_else(usage)?;
            let view = ListView::new(client, descriptor);
            view.refresh().await?;
            if let Some(query) = args.get(1) {
                view.set_query(query);
            }
            println!("{}", serde_json::to_string_pretty(&view.visible_json())?);
        }
        None => return Err(usage()),
    }
    Ok(())
}
