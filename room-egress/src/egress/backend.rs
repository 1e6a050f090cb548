//! Recording backend trait and the values exchanged with it.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Result;

/// Layout requested for every composite recording.
pub const GRID_LAYOUT: &str = "grid";

/// Container format of the recorded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OutputFormat {
    #[default]
    Mp4,
}

impl OutputFormat {
    /// File extension, without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
        }
    }
}

/// Opaque egress identifier issued by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EgressHandle(String);

impl EgressHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for EgressHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Request to begin a composite recording of a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomCompositeRequest {
    pub room_name: String,
    pub layout: String,
    pub filepath: String,
    pub format: OutputFormat,
}

impl RoomCompositeRequest {
    /// Grid layout, MP4 output.
    pub fn grid(room_name: impl Into<String>, filepath: impl Into<String>) -> Self {
        Self {
            room_name: room_name.into(),
            layout: GRID_LAYOUT.to_string(),
            filepath: filepath.into(),
            format: OutputFormat::Mp4,
        }
    }
}

/// Recording metadata as reported by the backend.
///
/// Kept as the raw JSON document so callers receive it unmodified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EgressInfo(Value);

impl EgressInfo {
    pub fn from_value(value: Value) -> Self {
        Self(value)
    }

    /// The egress id, accepting both proto and JSON field naming.
    pub fn egress_id(&self) -> Option<&str> {
        self.field("egress_id", "egressId")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
    }

    /// Backend status, e.g. `EGRESS_COMPLETE`.
    pub fn status(&self) -> Option<&str> {
        self.field("status", "status").and_then(|v| v.as_str())
    }

    /// Failure reason reported by the backend, if any.
    pub fn error(&self) -> Option<&str> {
        self.field("error", "error")
            .and_then(|v| v.as_str())
            .filter(|e| !e.is_empty())
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    fn field(&self, snake: &str, camel: &str) -> Option<&Value> {
        self.0.get(snake).or_else(|| self.0.get(camel))
    }
}

/// Operations against the external recording backend.
///
/// Implementations hold no per-session state and never retry.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RecordingBackend: Send + Sync {
    /// Begin a composite recording, returning the backend's handle.
    async fn begin_composite(&self, request: RoomCompositeRequest) -> Result<EgressHandle>;

    /// End the recording identified by `handle`.
    async fn end(&self, handle: EgressHandle) -> Result<EgressInfo>;
}
