//! Egress orchestration: validates start/stop requests, resolves output
//! paths and drives the recording backend.
//!
//! The orchestrator keeps no record of the recordings it starts unless
//! the single-active-per-session guard is enabled. Callers hold on to the
//! returned egress id and hand it back to stop.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

use super::backend::{EgressHandle, EgressInfo, RecordingBackend, RoomCompositeRequest};
use super::path::OutputPathResolver;
use super::registry::ActiveEgressRegistry;
use crate::config::EgressConfig;
use crate::{Error, Result};

/// Result of a successful start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StartedEgress {
    pub egress_id: EgressHandle,
    pub filepath: String,
}

/// Start/stop front for the recording backend.
pub struct EgressOrchestrator {
    backend: Arc<dyn RecordingBackend>,
    resolver: OutputPathResolver,
    backend_timeout: Duration,
    registry: Option<ActiveEgressRegistry>,
}

impl EgressOrchestrator {
    pub fn new(
        backend: Arc<dyn RecordingBackend>,
        resolver: OutputPathResolver,
        backend_timeout: Duration,
    ) -> Self {
        Self {
            backend,
            resolver,
            backend_timeout,
            registry: None,
        }
    }

    /// Build from startup configuration, using the system clock.
    pub fn from_config(backend: Arc<dyn RecordingBackend>, config: &EgressConfig) -> Self {
        let orchestrator = Self::new(
            backend,
            OutputPathResolver::with_system_clock(&config.output_dir),
            config.backend_timeout,
        );
        if config.single_active_per_session {
            orchestrator.with_session_guard()
        } else {
            orchestrator
        }
    }

    /// Refuse overlapping recordings for the same session.
    pub fn with_session_guard(mut self) -> Self {
        self.registry = Some(ActiveEgressRegistry::new());
        self
    }

    pub fn registry(&self) -> Option<&ActiveEgressRegistry> {
        self.registry.as_ref()
    }

    /// Start a grid composite MP4 recording of room `session_id`.
    pub async fn start(&self, session_id: &str) -> Result<StartedEgress> {
        if session_id.trim().is_empty() {
            return Err(Error::invalid_argument("sessionId is required"));
        }

        let reservation = match &self.registry {
            Some(registry) => Some(registry.reserve(session_id)?),
            None => None,
        };

        let output = self.resolver.resolve(session_id);
        let filepath = output.path.to_string_lossy().into_owned();
        let request = RoomCompositeRequest::grid(session_id, filepath.clone());

        let result = self
            .bounded("StartRoomCompositeEgress", self.backend.begin_composite(request))
            .await;

        match result {
            Ok(egress_id) => {
                if let Some(reservation) = reservation {
                    reservation.activate(&egress_id);
                }
                info!(
                    session_id,
                    egress_id = %egress_id,
                    filepath = %filepath,
                    "Recording started"
                );
                Ok(StartedEgress {
                    egress_id,
                    filepath,
                })
            }
            Err(e) => {
                warn!(
                    session_id,
                    error = %e,
                    retryable = e.is_retryable(),
                    caller_error = e.is_caller_error(),
                    "Failed to start recording"
                );
                Err(e)
            }
        }
    }

    /// Stop the recording identified by `egress_id`, returning the backend's
    /// final metadata unchanged.
    pub async fn stop(&self, egress_id: &str) -> Result<EgressInfo> {
        if egress_id.trim().is_empty() {
            return Err(Error::invalid_argument("egressId is required"));
        }

        let handle = EgressHandle::new(egress_id);
        let result = self
            .bounded("StopEgress", self.backend.end(handle.clone()))
            .await;

        // A rejected stop means the backend already finished this egress on its own.
        if let Some(registry) = &self.registry
            && matches!(
                result,
                Ok(_) | Err(Error::HandleNotFound(_) | Error::BackendRejected { .. })
            )
        {
            registry.evict_handle(&handle);
        }

        match &result {
            Ok(info) => info!(
                egress_id,
                status = info.status().unwrap_or("unknown"),
                "Recording stopped"
            ),
            Err(e) => warn!(
                egress_id,
                error = %e,
                retryable = e.is_retryable(),
                caller_error = e.is_caller_error(),
                "Failed to stop recording"
            ),
        }
        result
    }

    /// Run a backend call under the configured timeout.
    async fn bounded<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        tokio::time::timeout(self.backend_timeout, call)
            .await
            .map_err(|_| Error::BackendTimeout {
                operation,
                timeout: self.backend_timeout,
            })?
    }
}
