//! Error types for the playback queue core.
//!
//! Invalid control actions (pause with nothing playing, resume while playing, ...) are not
//! errors; they surface as [`crate::audio::manager::ControlOutcome`] variants.

use thiserror::Error;

/// Errors reported to callers of the queue manager.
#[derive(Error, Debug)]
pub enum QueueError {
    /// The guild's queue already holds the configured maximum of pending tracks
    #[error("Queue is full (maximum {max} tracks)")]
    QueueFull { max: usize },

    /// The voice connection for a fresh queue could not be established
    #[error("Failed to join voice channel: {0}")]
    Connect(#[from] TransportError),

    /// The guild's controller task went away without answering
    #[error("Queue controller unavailable")]
    Unavailable,
}

/// Failures of the voice transport itself.
#[derive(Error, Debug, Clone)]
pub enum TransportError {
    #[error("join failed: {0}")]
    Join(String),
}

/// Why a stream could not be opened for a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireErrorKind {
    /// Removed, private, or region-locked at the source
    Unavailable,
    /// The source answered but the media could not be decoded
    Unsupported,
    /// The source asked us to back off
    Throttled,
    Other,
}

impl AcquireErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AcquireErrorKind::Unavailable => "unavailable",
            AcquireErrorKind::Unsupported => "unsupported",
            AcquireErrorKind::Throttled => "throttled",
            AcquireErrorKind::Other => "other",
        }
    }
}

/// A resolved track's stream could not be opened.
#[derive(Error, Debug, Clone)]
#[error("stream acquisition failed ({}): {message}", .kind.as_str())]
pub struct AcquireError {
    pub kind: AcquireErrorKind,
    pub message: String,
}

impl AcquireError {
    pub fn new(kind: AcquireErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(AcquireErrorKind::Unavailable, message)
    }
}

/// Failures resolving a user query into a track.
#[derive(Error, Debug)]
pub enum ResolveError {
    /// No playable source matched the query
    #[error("No results found for: {0}")]
    NotFound(String),

    /// The resolver backend itself failed (process spawn, bad output, ...)
    #[error("Resolver failed: {0}")]
    Backend(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_error_message_names_kind() {
        let err = AcquireError::unavailable("video is private");
        assert_eq!(
            err.to_string(),
            "stream acquisition failed (unavailable): video is private"
        );
    }

    #[test]
    fn connect_error_wraps_transport_error() {
        let err: QueueError = TransportError::Join("timed out".into()).into();
        assert_eq!(err.to_string(), "Failed to join voice channel: join failed: timed out");
    }
}
