//! Error taxonomy for the queue engine.
//!
//! - [`ValidationError`]: rejected synchronously, queue left untouched.
//! - [`ResolveError`]: per-track resolver/stream failures, recovered locally
//!   by skipping forward when they happen during playback.
//! - [`SessionError`]: the voice session itself is broken; surfaced to the
//!   user and auto-advance stops until an explicit `skip`/`stop`.

use thiserror::Error;

use crate::audio::queue::PlaybackState;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("position {index} is out of range (queue has {len} tracks)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("invalid position: {0}")]
    InvalidIndex(String),

    #[error("invalid skip count: {0}")]
    InvalidCount(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("user is not in a voice channel")]
    NotInVoiceChannel,

    #[error("nothing is playing")]
    NothingPlaying,

    #[error("cannot pause while {0}")]
    NotPlaying(PlaybackState),

    #[error("cannot resume while {0}")]
    NotPaused(PlaybackState),

    #[error("unsupported reference: {0}")]
    UnsupportedReference(String),

    #[error("queue is full (max {max} tracks)")]
    QueueFull { max: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("could not resolve {reference}: {reason}")]
    Resolution { reference: String, reason: String },

    #[error("collection {0} has no playable entries")]
    EmptyCollection(String),

    #[error("stream unavailable for {locator}: {reason}")]
    StreamUnavailable { locator: String, reason: String },

    #[error("resolver timed out after {0:?}")]
    Timeout(std::time::Duration),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("failed to join voice channel: {0}")]
    Join(String),

    #[error("playback failed: {0}")]
    Playback(String),

    #[error("voice session is closed")]
    Closed,
}

/// Umbrella error returned by the public engine operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MusicError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("the queue was stopped while the request was in flight")]
    QueueClosed,
}

/// Result type for engine operations
pub type MusicResult<T> = Result<T, MusicError>;
