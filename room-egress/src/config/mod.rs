//! Startup configuration.
//!
//! Everything is read once from the environment (after `.env` is loaded by
//! `main`) into an [`AppConfig`] that is then injected into each component.
//! Nothing reads the environment after startup.

use std::path::PathBuf;
use std::time::Duration;

use crate::api::server::ApiServerConfig;
use crate::logging::{LogFormat, LoggingSettings};
use crate::{Error, Result};

/// Default output base directory.
pub const DEFAULT_OUTPUT_DIR: &str = "/out";

/// Default bound on a single backend call, in seconds.
pub const DEFAULT_BACKEND_TIMEOUT_SECS: u64 = 30;

/// Connection settings for the recording backend.
#[derive(Clone)]
pub struct BackendConfig {
    /// Server URL, `ws(s)://` or `http(s)://`.
    pub url: String,
    pub api_key: String,
    pub api_secret: String,
    /// Per-request HTTP timeout.
    pub request_timeout: Duration,
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("url", &self.url)
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// Egress behavior settings.
#[derive(Debug, Clone)]
pub struct EgressConfig {
    /// Directory under which per-session folders are created.
    pub output_dir: PathBuf,
    /// Upper bound on each backend call made by the orchestrator.
    pub backend_timeout: Duration,
    /// Refuse a start while the same session already has a recording.
    pub single_active_per_session: bool,
}

impl Default for EgressConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            backend_timeout: Duration::from_secs(DEFAULT_BACKEND_TIMEOUT_SECS),
            single_active_per_session: false,
        }
    }
}

/// Complete service configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub backend: BackendConfig,
    pub egress: EgressConfig,
    pub server: ApiServerConfig,
    pub logging: LoggingSettings,
}

impl AppConfig {
    /// Load from process environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using an arbitrary key lookup.
    ///
    /// Supported keys:
    /// - `LIVEKIT_URL`, `LIVEKIT_API_KEY`, `LIVEKIT_API_SECRET` (required)
    /// - `EGRESS_OUTPUT_DIR`, `EGRESS_BACKEND_TIMEOUT_SECS`,
    ///   `EGRESS_SINGLE_ACTIVE_PER_SESSION`
    /// - `API_BIND_ADDRESS`, `API_PORT`
    /// - `RUST_LOG`, `LOG_FORMAT`, `LOG_DIR`
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &str| {
            get(key).ok_or_else(|| Error::config(format!("{key} must be set")))
        };

        let egress_defaults = EgressConfig::default();
        let backend_timeout = match get("EGRESS_BACKEND_TIMEOUT_SECS") {
            Some(raw) => parse_secs("EGRESS_BACKEND_TIMEOUT_SECS", &raw)?,
            None => egress_defaults.backend_timeout,
        };
        let single_active_per_session = match get("EGRESS_SINGLE_ACTIVE_PER_SESSION") {
            Some(raw) => parse_bool("EGRESS_SINGLE_ACTIVE_PER_SESSION", &raw)?,
            None => egress_defaults.single_active_per_session,
        };

        let backend = BackendConfig {
            url: required("LIVEKIT_URL")?,
            api_key: required("LIVEKIT_API_KEY")?,
            api_secret: required("LIVEKIT_API_SECRET")?,
            request_timeout: backend_timeout,
        };

        let egress = EgressConfig {
            output_dir: get("EGRESS_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(egress_defaults.output_dir),
            backend_timeout,
            single_active_per_session,
        };

        let mut server = ApiServerConfig::default();
        if let Some(bind_address) = get("API_BIND_ADDRESS") {
            server.bind_address = bind_address;
        }
        if let Some(port) = get("API_PORT") {
            server.port = port
                .trim()
                .parse::<u16>()
                .map_err(|e| Error::config(format!("API_PORT '{port}' is invalid: {e}")))?;
        }

        let mut logging = LoggingSettings::default();
        if let Some(filter) = get("RUST_LOG") {
            logging.filter = filter;
        }
        if let Some(format) = get("LOG_FORMAT") {
            logging.format = format.parse::<LogFormat>()?;
        }
        logging.log_dir = get("LOG_DIR").map(PathBuf::from);

        Ok(Self {
            backend,
            egress,
            server,
            logging,
        })
    }
}

fn parse_secs(key: &str, raw: &str) -> Result<Duration> {
    let secs = raw
        .trim()
        .parse::<u64>()
        .map_err(|e| Error::config(format!("{key} '{raw}' is invalid: {e}")))?;
    if secs == 0 {
        return Err(Error::config(format!("{key} must be greater than zero")));
    }
    Ok(Duration::from_secs(secs))
}

fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::config(format!("{key} '{raw}' is not a boolean"))),
    }
}
