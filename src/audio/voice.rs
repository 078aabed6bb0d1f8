//! Songbird implementation of the Playback Session contract.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex as SyncMutex;
use serenity::model::id::{ChannelId, GuildId};
use songbird::{
    events::CoreEvent,
    input::Input,
    tracks::{PlayMode, TrackHandle},
    Call, Event, EventContext, EventHandler as VoiceEventHandler, Songbird, TrackEvent,
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::session::{PlaybackSession, SessionConnector, SessionEvent, TrackSignals};
use crate::error::SessionError;

/// Reenvía los eventos de songbird de una pista al worker de la guild
struct TrackSignalForwarder {
    signals: TrackSignals,
    errored: bool,
}

#[async_trait]
impl VoiceEventHandler for TrackSignalForwarder {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        debug!(
            "🎚️ Evento de pista (error: {}, generación {})",
            self.errored,
            self.signals.generation()
        );
        if !self.errored {
            self.signals.emit(SessionEvent::Idle);
            return None;
        }

        let mut cause = String::from("error desconocido");
        if let EventContext::Track(tracks) = ctx {
            for (state, _handle) in *tracks {
                if let PlayMode::Errored(e) = &state.playing {
                    cause = format!("{:?}", e);
                }
            }
        }
        self.signals.emit(SessionEvent::Error(cause));
        None
    }
}

/// Handler para desconexiones del driver de voz
struct DisconnectLogger {
    guild_id: GuildId,
}

#[async_trait]
impl VoiceEventHandler for DisconnectLogger {
    async fn act(&self, _ctx: &EventContext<'_>) -> Option<Event> {
        warn!("🔌 Driver de voz desconectado en guild {}", self.guild_id);
        None
    }
}

pub struct SongbirdSession {
    guild_id: GuildId,
    manager: Arc<Songbird>,
    call: Arc<Mutex<Call>>,
    current: SyncMutex<Option<TrackHandle>>,
}

impl SongbirdSession {
    pub fn new(guild_id: GuildId, manager: Arc<Songbird>, call: Arc<Mutex<Call>>) -> Self {
        Self {
            guild_id,
            manager,
            call,
            current: SyncMutex::new(None),
        }
    }

    fn current(&self) -> Result<TrackHandle, SessionError> {
        self.current.lock().clone().ok_or(SessionError::Closed)
    }
}

fn control_error(e: impl std::fmt::Display) -> SessionError {
    SessionError::Playback(e.to_string())
}

#[async_trait]
impl PlaybackSession<Input> for SongbirdSession {
    async fn play(&self, stream: Input, signals: TrackSignals) -> Result<(), SessionError> {
        let handle = {
            let mut call = self.call.lock().await;
            call.play_only_input(stream)
        };

        handle
            .add_event(
                Event::Track(TrackEvent::End),
                TrackSignalForwarder {
                    signals: signals.clone(),
                    errored: false,
                },
            )
            .map_err(control_error)?;
        handle
            .add_event(
                Event::Track(TrackEvent::Error),
                TrackSignalForwarder {
                    signals,
                    errored: true,
                },
            )
            .map_err(control_error)?;

        *self.current.lock() = Some(handle);
        Ok(())
    }

    async fn pause(&self) -> Result<(), SessionError> {
        self.current()?.pause().map_err(control_error)
    }

    async fn resume(&self) -> Result<(), SessionError> {
        self.current()?.play().map_err(control_error)
    }

    async fn stop(&self) -> Result<(), SessionError> {
        self.current()?.stop().map_err(control_error)
    }

    async fn destroy(&self) -> Result<(), SessionError> {
        self.current.lock().take();
        self.manager
            .remove(self.guild_id)
            .await
            .map_err(|e| SessionError::Join(e.to_string()))?;
        info!("👋 Desconectado del canal de voz en guild {}", self.guild_id);
        Ok(())
    }
}

/// Joins the caller's voice channel when a guild gets its first queue.
pub struct VoiceConnector {
    pub manager: Arc<Songbird>,
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
}

#[async_trait]
impl SessionConnector<Input> for VoiceConnector {
    async fn connect(&self) -> Result<Arc<dyn PlaybackSession<Input>>, SessionError> {
        let call = self
            .manager
            .join(self.guild_id, self.channel_id)
            .await
            .map_err(|e| SessionError::Join(e.to_string()))?;

        {
            let mut handler = call.lock().await;
            handler.add_global_event(
                Event::Core(CoreEvent::DriverDisconnect),
                DisconnectLogger {
                    guild_id: self.guild_id,
                },
            );
        }

        debug!(
            "🔊 Conectado al canal de voz {} en guild {}",
            self.channel_id, self.guild_id
        );
        Ok(Arc::new(SongbirdSession::new(
            self.guild_id,
            self.manager.clone(),
            call,
        )))
    }
}
