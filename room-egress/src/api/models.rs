//! API request and response models (DTOs).
//!
//! Field names are camelCase on the wire.

use serde::{Deserialize, Serialize};

use crate::egress::{EgressInfo, StartedEgress};

/// Body of `POST /start`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartRequest {
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Body of `POST /stop`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopRequest {
    #[serde(default)]
    pub egress_id: Option<String>,
}

/// Response of `POST /start`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartResponse {
    pub ok: bool,
    pub egress_id: String,
    pub filepath: String,
}

impl From<StartedEgress> for StartResponse {
    fn from(started: StartedEgress) -> Self {
        Self {
            ok: true,
            egress_id: started.egress_id.into_inner(),
            filepath: started.filepath,
        }
    }
}

/// Response of `POST /stop`.
#[derive(Debug, Clone, Serialize)]
pub struct StopResponse {
    pub ok: bool,
    pub info: EgressInfo,
}

impl From<EgressInfo> for StopResponse {
    fn from(info: EgressInfo) -> Self {
        Self { ok: true, info }
    }
}

/// Response of `GET /health`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub version: String,
    pub uptime_secs: u64,
}
