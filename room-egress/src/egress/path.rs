//! Output path resolution for recordings.
//!
//! Every start attempt gets its own file:
//! `<base>/<session>/<session>-<epoch-millis>.mp4`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;

use super::backend::OutputFormat;

/// Characters replaced when a session id is used as a path segment.
const UNSAFE_SEGMENT_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Source of wall-clock milliseconds.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

/// Clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// A resolved output location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedOutput {
    pub path: PathBuf,
    pub timestamp_ms: i64,
}

/// Maps session identifiers to per-attempt output paths.
pub struct OutputPathResolver {
    base_dir: PathBuf,
    format: OutputFormat,
    clock: Arc<dyn Clock>,
    last_issued: AtomicI64,
}

impl OutputPathResolver {
    pub fn new(base_dir: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Self {
        Self {
            base_dir: base_dir.into(),
            format: OutputFormat::Mp4,
            clock,
            last_issued: AtomicI64::new(i64::MIN),
        }
    }

    /// Resolver using the system clock.
    pub fn with_system_clock(base_dir: impl Into<PathBuf>) -> Self {
        Self::new(base_dir, Arc::new(SystemClock))
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Path for `session_id` at an explicit timestamp.
    pub fn resolve_at(&self, session_id: &str, timestamp_ms: i64) -> PathBuf {
        let segment = sanitize_segment(session_id);
        let file_name = format!("{segment}-{timestamp_ms}.{}", self.format.extension());
        self.base_dir.join(&segment).join(file_name)
    }

    /// Path for `session_id` at the current time.
    ///
    /// Timestamps issued by one resolver are strictly increasing, so two calls
    /// never yield the same path even within the same millisecond.
    pub fn resolve(&self, session_id: &str) -> ResolvedOutput {
        let now = self.clock.now_millis();
        let previous = self
            .last_issued
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| {
                Some(if now > last { now } else { last + 1 })
            })
            .unwrap_or(now);
        let timestamp_ms = if now > previous { now } else { previous + 1 };

        ResolvedOutput {
            path: self.resolve_at(session_id, timestamp_ms),
            timestamp_ms,
        }
    }
}

/// Make a session id safe to use as a single directory/file name component.
///
/// Ordinary ids pass through unchanged; separators and reserved characters
/// become `_` and dot-only names cannot climb out of the base directory.
pub fn sanitize_segment(session_id: &str) -> String {
    let mut out = String::with_capacity(session_id.len());
    for c in session_id.chars() {
        if c.is_control() || UNSAFE_SEGMENT_CHARS.contains(&c) {
            if !out.ends_with('_') {
                out.push('_');
            }
        } else {
            out.push(c);
        }
    }

    let trimmed = out.trim_matches(|c| c == ' ' || c == '.');
    if trimmed.is_empty() {
        "unnamed".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedClock(i64);

    impl Clock for FixedClock {
        fn now_millis(&self) -> i64 {
            self.0
        }
    }

    fn resolver(at: i64) -> OutputPathResolver {
        OutputPathResolver::new("/recordings", Arc::new(FixedClock(at)))
    }

    #[test]
    fn test_layout() {
        let path = resolver(0).resolve_at("interview-42", 1_700_000_000_123);
        assert_eq!(
            path,
            PathBuf::from("/recordings/interview-42/interview-42-1700000000123.mp4")
        );
    }

    #[test]
    fn test_resolve_at_is_deterministic() {
        let r = resolver(0);
        assert_eq!(r.resolve_at("abc", 42), r.resolve_at("abc", 42));
    }

    #[test]
    fn test_same_millisecond_still_unique() {
        let r = resolver(1_000);
        let first = r.resolve("room");
        let second = r.resolve("room");
        let third = r.resolve("room");

        assert_eq!(first.timestamp_ms, 1_000);
        assert_eq!(second.timestamp_ms, 1_001);
        assert_eq!(third.timestamp_ms, 1_002);
        assert_ne!(first.path, second.path);
        for out in [&first, &second, &third] {
            assert_eq!(out.path.parent().unwrap(), Path::new("/recordings/room"));
        }
    }

    #[test]
    fn test_system_clock_paths_distinct() {
        let r = OutputPathResolver::with_system_clock("/out");
        let a = r.resolve("s");
        let b = r.resolve("s");
        assert!(b.timestamp_ms > a.timestamp_ms);
    }

    #[test]
    fn test_traversal_is_neutralized() {
        let path = resolver(0).resolve_at("../../etc", 7);
        assert_eq!(path, PathBuf::from("/recordings/_.._etc/_.._etc-7.mp4"));
        assert_eq!(path.components().count(), 4);

        let path = resolver(0).resolve_at("..", 7);
        assert_eq!(path, PathBuf::from("/recordings/unnamed/unnamed-7.mp4"));
    }

    #[test]
    fn test_sanitize_segment() {
        assert_eq!(sanitize_segment("interview-42"), "interview-42");
        assert_eq!(sanitize_segment("a/b\\c"), "a_b_c");
        assert_eq!(sanitize_segment("x::?y"), "x_y");
        assert_eq!(sanitize_segment("tab\there"), "tab_here");
        assert_eq!(sanitize_segment("会议室"), "会议室");
        assert_eq!(sanitize_segment(" . "), "unnamed");
    }
}
