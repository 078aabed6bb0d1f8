//! Playback Session contract.
//!
//! A session wraps one live audio sink for a guild. Every `play()` receives
//! a fresh [`TrackSignals`] handle; the session must report exactly one of
//! `Idle` (finished or stopped) or `Error` through it. Each handle carries a
//! generation number so the guild worker can drop late or duplicated
//! signals from an older `play()`.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

use crate::error::SessionError;

use super::worker::GuildMessage;

/// Lifecycle signal emitted by a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Idle,
    Error(String),
}

/// Per-play signal handle handed to [`PlaybackSession::play`].
#[derive(Debug, Clone)]
pub struct TrackSignals {
    tx: UnboundedSender<GuildMessage>,
    generation: u64,
}

impl TrackSignals {
    pub(crate) fn new(tx: UnboundedSender<GuildMessage>, generation: u64) -> Self {
        Self { tx, generation }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn idle(&self) {
        self.emit(SessionEvent::Idle);
    }

    pub fn error(&self, cause: impl Into<String>) {
        self.emit(SessionEvent::Error(cause.into()));
    }

    pub fn emit(&self, event: SessionEvent) {
        let message = GuildMessage::Signal {
            generation: self.generation,
            event,
        };
        // La cola ya fue destruida: la señal no tiene destinatario
        if self.tx.send(message).is_err() {
            debug!("Señal de sesión descartada (generación {})", self.generation);
        }
    }
}

#[async_trait]
pub trait PlaybackSession<S>: Send + Sync {
    async fn play(&self, stream: S, signals: TrackSignals) -> Result<(), SessionError>;

    async fn pause(&self) -> Result<(), SessionError>;

    async fn resume(&self) -> Result<(), SessionError>;

    /// Stops the current track; the session then emits `Idle` for it.
    async fn stop(&self) -> Result<(), SessionError>;

    /// Releases the underlying voice resource.
    async fn destroy(&self) -> Result<(), SessionError>;
}

/// Opens a session when a guild gets its first queue
#[async_trait]
pub trait SessionConnector<S>: Send + Sync {
    async fn connect(&self) -> Result<Arc<dyn PlaybackSession<S>>, SessionError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn signals_are_tagged_with_their_generation() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let signals = TrackSignals::new(tx, 7);
        assert_eq!(signals.generation(), 7);

        signals.error("decoder");
        match rx.try_recv() {
            Ok(GuildMessage::Signal { generation, event }) => {
                assert_eq!(generation, 7);
                assert_eq!(event, SessionEvent::Error("decoder".to_string()));
            }
            _ => panic!("expected a signal message"),
        }
    }

    #[test]
    fn signals_after_the_queue_is_gone_are_dropped() {
        let (tx, rx) = mpsc::unbounded_channel();
        let signals = TrackSignals::new(tx, 1);
        drop(rx);
        signals.idle();
    }
}
