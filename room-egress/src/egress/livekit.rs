//! LiveKit egress client.
//!
//! Talks to the server's Egress service over Twirp (`POST /twirp/livekit.Egress/<Method>`
//! with JSON bodies). Every call carries a freshly minted access token signed
//! with the configured API secret.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use jsonwebtoken::{EncodingKey, Header, encode};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info, warn};
use url::Url;

use super::backend::{EgressHandle, EgressInfo, RecordingBackend, RoomCompositeRequest};
use crate::config::BackendConfig;
use crate::utils::http_client::build_backend_client;
use crate::{Error, Result};

const EGRESS_SERVICE: &str = "livekit.Egress";
const START_ROOM_COMPOSITE: &str = "StartRoomCompositeEgress";
const STOP_EGRESS: &str = "StopEgress";

/// Lifetime of the per-request access token.
const TOKEN_TTL_SECS: u64 = 10 * 60;

/// Video grant carried by the access token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VideoGrant {
    #[serde(rename = "roomRecord")]
    pub room_record: bool,
}

/// Access token claims understood by the LiveKit server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccessClaims {
    /// API key
    pub iss: String,
    /// Not before (Unix)
    pub nbf: u64,
    /// Expiration (Unix)
    pub exp: u64,
    pub video: VideoGrant,
}

/// Twirp error body.
#[derive(Debug, Deserialize)]
struct TwirpError {
    code: String,
    #[serde(default)]
    msg: String,
}

/// Recording backend implementation for LiveKit servers.
pub struct LiveKitEgressClient {
    client: Client,
    base_url: String,
    api_key: String,
    encoding_key: EncodingKey,
    request_timeout: Duration,
}

impl LiveKitEgressClient {
    /// Create a client with its own HTTP connection pool.
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let client = build_backend_client(config.request_timeout)?;
        Self::with_client(config, client)
    }

    /// Create a client reusing an existing `reqwest::Client`.
    pub fn with_client(config: &BackendConfig, client: Client) -> Result<Self> {
        if config.api_key.is_empty() || config.api_secret.is_empty() {
            return Err(Error::config("backend API key and secret are required"));
        }

        let base_url = http_base_url(&config.url)?;
        info!(url = %base_url, "LiveKit egress client configured");

        Ok(Self {
            client,
            base_url: base_url.as_str().trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            encoding_key: EncodingKey::from_secret(config.api_secret.as_bytes()),
            request_timeout: config.request_timeout,
        })
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/twirp/{}/{}", self.base_url, EGRESS_SERVICE, method)
    }

    /// Mint a short-lived token allowed to record rooms.
    fn access_token(&self) -> Result<String> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| Error::Other(format!("System clock error: {}", e)))?
            .as_secs();

        let claims = AccessClaims {
            iss: self.api_key.clone(),
            nbf: now,
            exp: now + TOKEN_TTL_SECS,
            video: VideoGrant { room_record: true },
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| Error::config(format!("Failed to sign access token: {}", e)))
    }

    /// Issue one Twirp call and return the decoded JSON body.
    ///
    /// `handle` is set for calls addressing an existing egress so that
    /// `not_found` can be reported as an unknown handle.
    async fn call(
        &self,
        method: &'static str,
        body: &Value,
        handle: Option<&EgressHandle>,
    ) -> Result<Value> {
        let token = self.access_token()?;
        let url = self.endpoint(method);
        debug!(%url, "Calling egress backend");

        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .map_err(|e| self.transport_error(method, e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let err = classify_twirp_error(method, status, &text, handle, self.request_timeout);
            warn!(method, %status, error = %err, "Egress backend returned an error");
            return Err(err);
        }

        response.json::<Value>().await.map_err(|e| {
            if e.is_timeout() {
                self.transport_error(method, e)
            } else {
                Error::unavailable(format!("{method} returned an unreadable response: {e}"))
            }
        })
    }

    fn transport_error(&self, method: &'static str, err: reqwest::Error) -> Error {
        if err.is_timeout() {
            Error::BackendTimeout {
                operation: method,
                timeout: self.request_timeout,
            }
        } else {
            Error::unavailable(format!("{method} request failed: {err}"))
        }
    }
}

#[async_trait]
impl RecordingBackend for LiveKitEgressClient {
    async fn begin_composite(&self, request: RoomCompositeRequest) -> Result<EgressHandle> {
        let body = json!({
            "room_name": request.room_name,
            "layout": request.layout,
            "file_outputs": [{
                "file_type": request.format,
                "filepath": request.filepath,
            }],
        });

        let info = EgressInfo::from_value(self.call(START_ROOM_COMPOSITE, &body, None).await?);
        let handle = info.egress_id().map(EgressHandle::new).ok_or_else(|| {
            Error::unavailable(format!("{START_ROOM_COMPOSITE} response carried no egress id"))
        })?;

        info!(
            room = %request.room_name,
            egress_id = %handle,
            status = info.status().unwrap_or("unknown"),
            "Composite egress started"
        );
        Ok(handle)
    }

    async fn end(&self, handle: EgressHandle) -> Result<EgressInfo> {
        let body = json!({ "egress_id": handle.as_str() });
        let info = EgressInfo::from_value(self.call(STOP_EGRESS, &body, Some(&handle)).await?);

        info!(
            egress_id = %handle,
            status = info.status().unwrap_or("unknown"),
            "Egress stopped"
        );
        Ok(info)
    }
}

/// Convert a configured server URL into the HTTP base used for Twirp calls.
///
/// `ws://` and `wss://` become `http://` and `https://`.
pub fn http_base_url(raw: &str) -> Result<Url> {
    let mut url = Url::parse(raw.trim())
        .map_err(|e| Error::config(format!("Invalid backend URL '{raw}': {e}")))?;

    let scheme = match url.scheme() {
        "ws" | "http" => "http",
        "wss" | "https" => "https",
        other => {
            return Err(Error::config(format!(
                "Unsupported backend URL scheme '{other}'"
            )));
        }
    };

    url.set_scheme(scheme)
        .map_err(|_| Error::config(format!("Cannot use scheme {scheme} for '{raw}'")))?;
    Ok(url)
}

/// Map a non-success Twirp response onto the service error taxonomy.
fn classify_twirp_error(
    method: &'static str,
    status: StatusCode,
    body: &str,
    handle: Option<&EgressHandle>,
    timeout: Duration,
) -> Error {
    let parsed = serde_json::from_str::<TwirpError>(body).ok();

    let code = match &parsed {
        Some(err) => err.code.clone(),
        None => code_for_status(status).to_string(),
    };
    let message = parsed
        .map(|err| err.msg)
        .filter(|msg| !msg.is_empty())
        .unwrap_or_else(|| format!("{method} failed with HTTP {status}"));

    match (code.as_str(), handle) {
        ("not_found", Some(handle)) => Error::HandleNotFound(format!("{handle}: {message}")),
        ("deadline_exceeded", _) => Error::BackendTimeout {
            operation: method,
            timeout,
        },
        (
            "unavailable" | "internal" | "unknown" | "dataloss" | "canceled"
            | "resource_exhausted",
            _,
        ) => Error::unavailable(format!("{method}: {message}")),
        _ => Error::rejected(code, message),
    }
}

/// Twirp code implied by a bare HTTP status (no error body).
fn code_for_status(status: StatusCode) -> &'static str {
    match status {
        StatusCode::UNAUTHORIZED => "unauthenticated",
        StatusCode::FORBIDDEN => "permission_denied",
        StatusCode::NOT_FOUND => "bad_route",
        StatusCode::TOO_MANY_REQUESTS => "resource_exhausted",
        s if s.is_client_error() => "invalid_argument",
        _ => "unavailable",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::{Json, Router, extract::State, http::HeaderMap, routing::post};
    use jsonwebtoken::{DecodingKey, Validation, decode};
    use parking_lot::Mutex;
    use tokio::net::TcpListener;

    #[derive(Clone, Default)]
    struct Recorded {
        calls: Arc<Mutex<Vec<(String, Option<String>, Value)>>>,
    }

    fn config(url: &str) -> BackendConfig {
        BackendConfig {
            url: url.to_string(),
            api_key: "APIkey".to_string(),
            api_secret: "test-secret".to_string(),
            request_timeout: Duration::from_secs(5),
        }
    }

    async fn start_handler(
        State(recorded): State<Recorded>,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> (StatusCode, Json<Value>) {
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        recorded
            .calls
            .lock()
            .push((START_ROOM_COMPOSITE.to_string(), auth, body.clone()));

        if body["room_name"] == "busy-room" {
            return (
                StatusCode::PRECONDITION_FAILED,
                Json(json!({"code": "failed_precondition", "msg": "room already has an active egress"})),
            );
        }
        (
            StatusCode::OK,
            Json(json!({"egressId": "EG_abc", "roomName": body["room_name"], "status": "EGRESS_STARTING"})),
        )
    }

    async fn stop_handler(
        State(recorded): State<Recorded>,
        Json(body): Json<Value>,
    ) -> (StatusCode, Json<Value>) {
        recorded
            .calls
            .lock()
            .push((STOP_EGRESS.to_string(), None, body.clone()));

        if body["egress_id"] == "EG_abc" {
            (
                StatusCode::OK,
                Json(json!({"egressId": "EG_abc", "status": "EGRESS_ENDING"})),
            )
        } else {
            (
                StatusCode::NOT_FOUND,
                Json(json!({"code": "not_found", "msg": "egress not found"})),
            )
        }
    }

    async fn spawn_backend() -> (String, Recorded) {
        let recorded = Recorded::default();
        let app = Router::new()
            .route(
                "/twirp/livekit.Egress/StartRoomCompositeEgress",
                post(start_handler),
            )
            .route("/twirp/livekit.Egress/StopEgress", post(stop_handler))
            .with_state(recorded.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("ws://{addr}"), recorded)
    }

    #[test]
    fn test_http_base_url() {
        assert_eq!(
            http_base_url("wss://lk.example.com").unwrap().as_str(),
            "https://lk.example.com/"
        );
        assert_eq!(
            http_base_url("ws://localhost:7880").unwrap().as_str(),
            "http://localhost:7880/"
        );
        assert_eq!(
            http_base_url("https://lk.example.com/base").unwrap().as_str(),
            "https://lk.example.com/base"
        );
        assert!(http_base_url("ftp://lk.example.com").is_err());
        assert!(http_base_url("not a url").is_err());
    }

    #[test]
    fn test_endpoint() {
        let client = LiveKitEgressClient::new(&config("wss://lk.example.com/")).unwrap();
        assert_eq!(
            client.endpoint(STOP_EGRESS),
            "https://lk.example.com/twirp/livekit.Egress/StopEgress"
        );
    }

    #[test]
    fn test_missing_credentials_rejected() {
        let mut cfg = config("wss://lk.example.com");
        cfg.api_secret.clear();
        assert!(matches!(
            LiveKitEgressClient::new(&cfg),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_access_token_claims() {
        let client = LiveKitEgressClient::new(&config("wss://lk.example.com")).unwrap();
        let token = client.access_token().unwrap();

        let data = decode::<AccessClaims>(
            &token,
            &DecodingKey::from_secret(b"test-secret"),
            &Validation::default(),
        )
        .unwrap();
        assert_eq!(data.claims.iss, "APIkey");
        assert!(data.claims.video.room_record);
        assert_eq!(data.claims.exp - data.claims.nbf, TOKEN_TTL_SECS);
    }

    #[test]
    fn test_classify_twirp_errors() {
        const T: Duration = Duration::from_secs(7);
        let handle = EgressHandle::new("EG_x");
        let not_found = r#"{"code":"not_found","msg":"egress not found"}"#;

        assert!(matches!(
            classify_twirp_error(STOP_EGRESS, StatusCode::NOT_FOUND, not_found, Some(&handle), T),
            Error::HandleNotFound(ref m) if m.contains("EG_x")
        ));
        assert!(matches!(
            classify_twirp_error(START_ROOM_COMPOSITE, StatusCode::NOT_FOUND, not_found, None, T),
            Error::BackendRejected { ref code, .. } if code == "not_found"
        ));
        assert!(matches!(
            classify_twirp_error(
                START_ROOM_COMPOSITE,
                StatusCode::SERVICE_UNAVAILABLE,
                r#"{"code":"unavailable","msg":"no response from servers"}"#,
                None,
                T,
            ),
            Error::BackendUnavailable(_)
        ));
        assert!(matches!(
            classify_twirp_error(START_ROOM_COMPOSITE, StatusCode::BAD_GATEWAY, "<html>", None, T),
            Error::BackendUnavailable(_)
        ));
        assert!(matches!(
            classify_twirp_error(START_ROOM_COMPOSITE, StatusCode::UNAUTHORIZED, "", None, T),
            Error::BackendRejected { ref code, .. } if code == "unauthenticated"
        ));
        assert!(matches!(
            classify_twirp_error(STOP_EGRESS, StatusCode::NOT_FOUND, "404 page not found", Some(&handle), T),
            Error::BackendRejected { ref code, .. } if code == "bad_route"
        ));
        assert!(matches!(
            classify_twirp_error(
                STOP_EGRESS,
                StatusCode::GATEWAY_TIMEOUT,
                r#"{"code":"deadline_exceeded","msg":"request timed out"}"#,
                None,
                T,
            ),
            Error::BackendTimeout { operation: STOP_EGRESS, timeout } if timeout == T
        ));
    }

    #[tokio::test]
    async fn test_begin_composite_request_shape() {
        let (url, recorded) = spawn_backend().await;
        let client = LiveKitEgressClient::new(&config(&url)).unwrap();

        let handle = client
            .begin_composite(RoomCompositeRequest::grid(
                "interview-42",
                "/recordings/interview-42/interview-42-1.mp4",
            ))
            .await
            .unwrap();
        assert_eq!(handle.as_str(), "EG_abc");

        let calls = recorded.calls.lock();
        let (method, auth, body) = &calls[0];
        assert_eq!(method, START_ROOM_COMPOSITE);
        assert!(auth.as_deref().unwrap().starts_with("Bearer "));
        assert_eq!(body["room_name"], "interview-42");
        assert_eq!(body["layout"], "grid");
        assert_eq!(body["file_outputs"][0]["file_type"], "MP4");
        assert_eq!(
            body["file_outputs"][0]["filepath"],
            "/recordings/interview-42/interview-42-1.mp4"
        );
    }

    #[tokio::test]
    async fn test_begin_composite_rejected() {
        let (url, _) = spawn_backend().await;
        let client = LiveKitEgressClient::new(&config(&url)).unwrap();

        let err = client
            .begin_composite(RoomCompositeRequest::grid("busy-room", "/out/x.mp4"))
            .await
            .unwrap_err();
        match err {
            Error::BackendRejected { code, message } => {
                assert_eq!(code, "failed_precondition");
                assert!(message.contains("active egress"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_end_known_and_unknown_handle() {
        let (url, _) = spawn_backend().await;
        let client = LiveKitEgressClient::new(&config(&url)).unwrap();

        let info = client.end(EgressHandle::new("EG_abc")).await.unwrap();
        assert_eq!(info.egress_id(), Some("EG_abc"));
        assert_eq!(info.status(), Some("EGRESS_ENDING"));

        let err = client.end(EgressHandle::new("EG_gone")).await.unwrap_err();
        assert!(matches!(err, Error::HandleNotFound(_)));
    }

    #[tokio::test]
    async fn test_unreachable_backend() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = LiveKitEgressClient::new(&config(&format!("http://{addr}"))).unwrap();
        let err = client
            .begin_composite(RoomCompositeRequest::grid("room", "/out/x.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::BackendUnavailable(_)));
    }

    #[tokio::test]
    async fn test_http_timeout_is_classified() {
        let app = Router::new().route(
            "/twirp/livekit.Egress/StopEgress",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Json(json!({}))
            }),
        );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let mut cfg = config(&format!("http://{addr}"));
        cfg.request_timeout = Duration::from_millis(200);
        let client = LiveKitEgressClient::new(&cfg).unwrap();

        let err = client.end(EgressHandle::new("EG_slow")).await.unwrap_err();
        assert!(matches!(
            err,
            Error::BackendTimeout { operation: STOP_EGRESS, .. }
        ));
    }
}
