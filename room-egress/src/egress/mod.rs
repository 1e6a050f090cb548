//! Room composite egress.
//!
//! - `backend`: the recording backend trait and its request/response values
//! - `livekit`: Twirp client for LiveKit servers
//! - `path`: per-session output path resolution
//! - `orchestrator`: start/stop validation and sequencing
//! - `registry`: optional one-recording-per-session guard

pub mod backend;
pub mod livekit;
pub mod orchestrator;
pub mod path;
pub mod registry;

pub use backend::{
    EgressHandle, EgressInfo, OutputFormat, RecordingBackend, RoomCompositeRequest,
};
pub use livekit::LiveKitEgressClient;
pub use orchestrator::{EgressOrchestrator, StartedEgress};
pub use path::{Clock, OutputPathResolver, SystemClock};
pub use registry::ActiveEgressRegistry;
