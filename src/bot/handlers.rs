use std::sync::Arc;

use anyhow::Result;
use serenity::{
    builder::{CreateEmbed, CreateMessage},
    model::{
        channel::Message,
        id::{ChannelId, GuildId, UserId},
    },
    prelude::Context,
};
use tracing::{debug, info};
use crate::sources::TrackResolver;

use super::{
    commands::{Command, LoopTarget},
    events::ChannelNotifier,
    SenMusicBot,
};
use crate::{
    audio::{queue::PlaybackState, voice::VoiceConnector},
    error::{MusicError, MusicResult, SessionError, ValidationError},
    ui::embeds,
};

/// Maneja un comando de texto ya parseado
pub async fn handle_command(
    ctx: &Context,
    msg: &Message,
    command: Command,
    bot: &SenMusicBot,
) -> Result<()> {
    let guild_id = msg
        .guild_id
        .ok_or_else(|| anyhow::anyhow!("Comando usado fuera de un servidor"))?;

    info!(
        "📝 Comando {:?} usado por {} en guild {}",
        command, msg.author.name, guild_id
    );

    let result = match command {
        Command::Play(Some(reference)) => handle_play(ctx, msg, guild_id, &reference, bot).await,
        Command::Play(None) => handle_play_without_reference(guild_id, bot).await,
        Command::Resume => handle_resume(guild_id, bot).await,
        Command::Pause => handle_pause(guild_id, bot).await,
        Command::Stop => handle_stop(guild_id, bot).await,
        Command::Queue => handle_queue(guild_id, bot).await,
        Command::Skip(count) => handle_skip(guild_id, count, bot).await,
        Command::Jump(index) => handle_jump(guild_id, index, bot).await,
        Command::Loop { target, enabled } => handle_loop(guild_id, target, enabled, bot).await,
        Command::NowPlaying => handle_nowplaying(guild_id, bot).await,
        Command::Info => Ok(Some(embeds::create_help_embed(&bot.config.command_prefix))),
        Command::Unknown(word) => Ok(Some(embeds::create_info_embed(
            "Comando no reconocido",
            &format!(
                "`{}` no existe. Usa `{}info` para ver los comandos",
                word, bot.config.command_prefix
            ),
        ))),
    };

    let embed = match result {
        Ok(Some(embed)) => embed,
        // La cola ya respondió con su propia notificación
        Ok(None) => return Ok(()),
        Err(e) => {
            debug!("Comando rechazado en guild {}: {}", guild_id, e);
            embeds::create_error_embed(&e)
        }
    };

    reply(ctx, msg.channel_id, embed).await
}

/// Responde con un error de validación del parser
pub async fn handle_parse_error(
    ctx: &Context,
    msg: &Message,
    error: ValidationError,
) -> Result<()> {
    reply(ctx, msg.channel_id, embeds::create_error_embed(&error.into())).await
}

async fn reply(ctx: &Context, channel_id: ChannelId, embed: CreateEmbed) -> Result<()> {
    channel_id
        .send_message(&ctx.http, CreateMessage::new().embed(embed))
        .await?;
    Ok(())
}

async fn handle_play(
    ctx: &Context,
    msg: &Message,
    guild_id: GuildId,
    reference: &str,
    bot: &SenMusicBot,
) -> MusicResult<Option<CreateEmbed>> {
    if !bot.queues.resolver().is_supported(reference) {
        return Err(ValidationError::UnsupportedReference(reference.to_string()).into());
    }

    let channel_id = get_user_voice_channel(ctx, guild_id, msg.author.id)?;
    let manager = songbird::get(ctx)
        .await
        .ok_or_else(|| SessionError::Join("Songbird no inicializado".to_string()))?;

    let connector = VoiceConnector {
        manager,
        guild_id,
        channel_id,
    };
    let notifier = Arc::new(ChannelNotifier::new(ctx.http.clone(), msg.channel_id));

    // La resolución con yt-dlp puede tardar
    let _ = msg.channel_id.broadcast_typing(&ctx.http).await;

    let outcome = bot
        .queues
        .enqueue(guild_id, reference, &connector, notifier)
        .await?;

    info!(
        "➕ {} pista(s) agregadas en guild {}{}",
        outcome.added_titles.len(),
        guild_id,
        outcome
            .collection_title
            .as_deref()
            .map(|title| format!(" desde {}", title))
            .unwrap_or_default()
    );

    Ok(None)
}

/// `play` sin URL: reanuda una pausa o reinicia una cola detenida por un error
async fn handle_play_without_reference(
    guild_id: GuildId,
    bot: &SenMusicBot,
) -> MusicResult<Option<CreateEmbed>> {
    let status = bot.queues.status(guild_id).await?;
    match status.state {
        PlaybackState::Paused => handle_resume(guild_id, bot).await,
        PlaybackState::Stopped => {
            bot.queues.start_if_idle(guild_id).await?;
            let title = status.current.unwrap_or_default();
            Ok(Some(embeds::create_success_embed(
                "Reiniciando",
                &format!("▶️ Volviendo a reproducir **{}**", title),
            )))
        }
        PlaybackState::Playing => Err(ValidationError::NotPaused(status.state).into()),
    }
}

async fn handle_pause(guild_id: GuildId, bot: &SenMusicBot) -> MusicResult<Option<CreateEmbed>> {
    let title = bot.queues.pause(guild_id).await?;
    Ok(Some(embeds::create_success_embed(
        "Pausado",
        &format!("⏸️ **{}**", title),
    )))
}

async fn handle_resume(guild_id: GuildId, bot: &SenMusicBot) -> MusicResult<Option<CreateEmbed>> {
    let title = bot.queues.resume(guild_id).await?;
    Ok(Some(embeds::create_success_embed(
        "Reanudado",
        &format!("▶️ **{}**", title),
    )))
}

async fn handle_stop(guild_id: GuildId, bot: &SenMusicBot) -> MusicResult<Option<CreateEmbed>> {
    bot.queues.stop(guild_id).await?;
    Ok(Some(embeds::create_success_embed(
        "Detenido",
        "⏹️ Cola vaciada, saliendo del canal de voz",
    )))
}

async fn handle_queue(guild_id: GuildId, bot: &SenMusicBot) -> MusicResult<Option<CreateEmbed>> {
    let entries = bot.queues.list_tracks(guild_id).await?;
    Ok(Some(embeds::create_queue_embed(&entries)))
}

async fn handle_skip(
    guild_id: GuildId,
    count: usize,
    bot: &SenMusicBot,
) -> MusicResult<Option<CreateEmbed>> {
    bot.queues.skip(guild_id, count).await?;
    let description = if count == 1 {
        "⏭️ Saltando a la siguiente canción".to_string()
    } else {
        format!("⏭️ Saltando {} canciones", count)
    };
    Ok(Some(embeds::create_success_embed("Saltado", &description)))
}

async fn handle_jump(
    guild_id: GuildId,
    index: usize,
    bot: &SenMusicBot,
) -> MusicResult<Option<CreateEmbed>> {
    let title = bot.queues.jump(guild_id, index).await?;
    Ok(Some(embeds::create_success_embed(
        "Saltando",
        &format!("⤵️ Posición {}: **{}**", index, title),
    )))
}

async fn handle_loop(
    guild_id: GuildId,
    target: LoopTarget,
    enabled: Option<bool>,
    bot: &SenMusicBot,
) -> MusicResult<Option<CreateEmbed>> {
    let enabled = match enabled {
        Some(enabled) => enabled,
        None => {
            let status = bot.queues.status(guild_id).await?;
            match target {
                LoopTarget::Queue => !status.loop_queue,
                LoopTarget::Track => !status.loop_track,
            }
        }
    };

    match target {
        LoopTarget::Queue => bot.queues.set_loop_queue(guild_id, enabled).await?,
        LoopTarget::Track => bot.queues.set_loop_track(guild_id, enabled).await?,
    }

    Ok(Some(embeds::create_loop_embed(target, enabled)))
}

async fn handle_nowplaying(
    guild_id: GuildId,
    bot: &SenMusicBot,
) -> MusicResult<Option<CreateEmbed>> {
    let status = bot.queues.status(guild_id).await?;
    Ok(Some(embeds::create_status_embed(&status)))
}

/// Canal de voz del autor según la caché de la guild
fn get_user_voice_channel(
    ctx: &Context,
    guild_id: GuildId,
    user_id: UserId,
) -> Result<ChannelId, MusicError> {
    let guild = guild_id
        .to_guild_cached(&ctx.cache)
        .ok_or(ValidationError::NotInVoiceChannel)?;

    let channel_id = guild
        .voice_states
        .get(&user_id)
        .and_then(|voice_state| voice_state.channel_id)
        .ok_or(ValidationError::NotInVoiceChannel)?;

    Ok(channel_id)
}
