//! # Bot Module
//!
//! Serenity event handler for Sen Music.
//!
//! Text messages starting with the configured prefix are parsed into a
//! [`commands::Command`] and dispatched by [`handlers`] to the shared
//! [`QueueManager`]. Queue notifications go back to the channel where the
//! queue was created through [`events::ChannelNotifier`].

use serenity::{
    all::{Context, EventHandler, Message, Ready, VoiceState},
    async_trait,
};
use std::sync::Arc;
use tracing::{debug, error, info};
use crate::sources::TrackResolver;

pub mod commands;
pub mod events;
pub mod handlers;

use crate::{
    audio::player::QueueManager, config::Config, error::MusicError, sources::SoundCloudResolver,
};

use self::commands::Command;

/// Main Discord bot handler.
///
/// ## Fields
///
/// - `config`: Bot configuration (token, prefix, limits)
/// - `queues`: per-guild queue engine shared by every command
pub struct SenMusicBot {
    /// Bot configuration loaded from environment variables
    pub config: Arc<Config>,
    pub queues: Arc<QueueManager<SoundCloudResolver>>,
}

impl SenMusicBot {
    pub fn new(config: Config) -> Self {
        let resolver = Arc::new(SoundCloudResolver::new(
            config.resolve_timeout,
            config.max_playlist_size,
        ));
        let queues = Arc::new(QueueManager::new(resolver, config.max_queue_size));

        Self {
            config: Arc::new(config),
            queues,
        }
    }
}

#[async_trait]
impl EventHandler for SenMusicBot {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!("🤖 {} está en línea!", ready.user.name);
        info!("📊 Conectado a {} servidores", ready.guilds.len());
        info!(
            "⌨️ Prefijo de comandos: {} (fuente: {})",
            self.config.command_prefix,
            self.queues.resolver().source_name()
        );
    }

    /// Dispatches prefixed text commands. Bots and DMs are ignored.
    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot || msg.guild_id.is_none() {
            return;
        }

        let command = match Command::parse(&self.config.command_prefix, &msg.content) {
            Ok(Some(command)) => command,
            Ok(None) => return,
            Err(e) => {
                if let Err(e) = handlers::handle_parse_error(&ctx, &msg, e).await {
                    error!("Error respondiendo a comando inválido: {:?}", e);
                }
                return;
            }
        };

        if let Err(e) = handlers::handle_command(&ctx, &msg, command, self).await {
            error!("Error manejando comando: {:?}", e);
        }
    }

    /// Tears the queue down when the bot is disconnected from voice by
    /// someone else.
    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let current_user_id = ctx.cache.current_user().id;
        if new.user_id != current_user_id || old.is_none() || new.channel_id.is_some() {
            return;
        }

        let Some(guild_id) = new.guild_id else { return };
        if !self.queues.has_queue(guild_id) {
            return;
        }

        // Evento tardío de una sesión anterior: la cola actual ya volvió a unirse
        if let Some(manager) = songbird::get(&ctx).await {
            if let Some(call) = manager.get(guild_id) {
                if call.lock().await.current_channel().is_some() {
                    debug!("Desconexión obsoleta ignorada en guild {}", guild_id);
                    return;
                }
            }
        }

        info!("🔌 Bot desconectado en guild {}", guild_id);
        match self.queues.stop(guild_id).await {
            Ok(()) => {}
            // Ya se detuvo por su cuenta
            Err(MusicError::Validation(_)) => debug!("Sin cola que detener en guild {}", guild_id),
            Err(e) => error!("Error al detener reproducción: {:?}", e),
        }
    }
}
