use std::path::PathBuf;

/// Application-level constants
pub const APP_NAME: &str = "Airmed";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default backend when `AIRMED_API_URL` is unset.
pub const DEFAULT_API_URL: &str = "http://localhost:5000/api";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;

/// Log directive used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "airmed_lib=info,airmed=info,reqwest=warn"
}

/// Get the application data directory (~/.airmed/).
///
/// Falls back to the current directory when no home directory can be determined.
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".airmed")
}

/// Session file holding the signed-in user's token and identity.
pub fn session_file() -> PathBuf {
    app_data_dir().join("session.json")
}

/// Where exported files land when the caller does not pick a directory.
pub fn downloads_dir() -> PathBuf {
    dirs::download_dir().unwrap_or_else(|| app_data_dir().join("downloads"))
}

/// HTTP client settings for the backend REST API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

impl ClientConfig {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
        }
    }

    /// Read `AIRMED_API_URL`, `AIRMED_TIMEOUT_SECS` and
    /// `AIRMED_CONNECT_TIMEOUT_SECS`. Unparseable numbers fall back to defaults.
    pub fn from_env() -> Self {
        let base_url =
            std::env::var("AIRMED_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        let mut config = Self::new(&base_url);
        if let Some(secs) = env_secs("AIRMED_TIMEOUT_SECS") {
            config.timeout_secs = secs;
        }
        if let Some(secs) = env_secs("AIRMED_CONNECT_TIMEOUT_SECS") {
            config.connect_timeout_secs = secs;
        }
        config
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_API_URL)
    }
}

fn env_secs(key: &str) -> Option<u64> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Some(secs),
        _ => {
            tracing::warn!(key, value = %raw, "Ignoring invalid timeout setting");
            None
        }
    }
}
