use serenity::{
    all::Timestamp,
    builder::{CreateEmbed, CreateEmbedFooter},
};

use crate::{
    audio::{
        notify::Notification,
        queue::{PlaybackState, QueueEntry, QueueStatus},
    },
    bot::commands::LoopTarget,
    error::{MusicError, ResolveError, SessionError, ValidationError},
};

/// Paleta de colores estandarizada para el bot
pub mod colors {
    use serenity::all::Colour;

    pub const SUCCESS_GREEN: Colour = Colour::from_rgb(67, 181, 129);
    pub const ERROR_RED: Colour = Colour::from_rgb(220, 53, 69);
    pub const WARNING_ORANGE: Colour = Colour::from_rgb(255, 193, 7);
    pub const INFO_BLUE: Colour = Colour::from_rgb(52, 144, 220);
    pub const MUSIC_PURPLE: Colour = Colour::from_rgb(138, 43, 226);
    pub const NEUTRAL_GRAY: Colour = Colour::from_rgb(108, 117, 125);
}

/// Footer estandarizado para todos los embeds
const STANDARD_FOOTER: &str = "🎵 Sen Music";

/// Marca de la pista actual en la lista de la cola
pub const NOW_PLAYING_MARKER: &str = "--> Reproduciendo";

/// Límite de Discord para la descripción de un embed, con margen
const DESCRIPTION_LIMIT: usize = 4000;
/// Pistas ya sonadas que se muestran antes de la actual en colas largas
const LINES_BEFORE_CURRENT: usize = 3;

fn base_embed(title: impl Into<String>, description: impl Into<String>) -> CreateEmbed {
    CreateEmbed::default()
        .title(title)
        .description(description)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Crea el embed de un evento de la cola
pub fn create_notification_embed(notification: &Notification) -> CreateEmbed {
    match notification {
        Notification::TrackAdded { title } => base_embed(
            "✅ Canción Agregada",
            format!("**{}** se ha agregado a la cola de reproducción", title),
        )
        .color(colors::SUCCESS_GREEN),
        Notification::CollectionAdded { title, count } => base_embed(
            "📋 Playlist Agregada",
            format!("Se agregaron **{}** de **{}** a la cola", plural_tracks(*count), title),
        )
        .color(colors::MUSIC_PURPLE)
        .field("📊 Canciones agregadas", count.to_string(), true),
        Notification::NowPlaying { title } => {
            base_embed("🎵 Reproduciendo Ahora", format!("**{}**", title))
                .color(colors::SUCCESS_GREEN)
        }
        Notification::TrackSkippedDueToError { title } => base_embed(
            "⏭️ Canción Saltada",
            format!("No se pudo reproducir **{}**, pasando a la siguiente", title),
        )
        .color(colors::WARNING_ORANGE),
        Notification::QueueEnded => base_embed(
            "📭 Cola Terminada",
            "No quedan canciones en la cola, saliendo del canal de voz",
        )
        .color(colors::NEUTRAL_GRAY),
        Notification::PlaybackError { title, cause } => base_embed(
            "❌ Error de Reproducción",
            format!(
                "Falló la reproducción de **{}**\nUsa `skip` para continuar o `stop` para salir",
                title
            ),
        )
        .color(colors::ERROR_RED)
        .field("Causa", truncate(cause, 1000), false),
    }
}

fn plural_tracks(count: usize) -> String {
    if count == 1 {
        "1 canción".to_string()
    } else {
        format!("{} canciones", count)
    }
}

fn state_label(state: PlaybackState) -> &'static str {
    match state {
        PlaybackState::Stopped => "detenido",
        PlaybackState::Playing => "reproduciendo",
        PlaybackState::Paused => "en pausa",
    }
}

/// Texto para el usuario de cada error del motor
pub fn error_message(error: &MusicError) -> String {
    match error {
        MusicError::Validation(e) => match e {
            ValidationError::IndexOutOfRange { index, len } => {
                format!("La posición {} no existe, la cola tiene {}", index, plural_tracks(*len))
            }
            ValidationError::InvalidIndex(raw) if raw.is_empty() => {
                "Indica una posición, por ejemplo `jump 3`".to_string()
            }
            ValidationError::InvalidIndex(raw) => format!("`{}` no es una posición válida", raw),
            ValidationError::InvalidCount(raw) => {
                format!("`{}` no es una cantidad válida (mínimo 1)", raw)
            }
            ValidationError::InvalidArgument(raw) => format!("Argumento no válido: `{}`", raw),
            ValidationError::NotInVoiceChannel => "Debes estar en un canal de voz".to_string(),
            ValidationError::NothingPlaying => "No hay nada reproduciéndose".to_string(),
            ValidationError::NotPlaying(state) => {
                format!("No se puede pausar: el reproductor está {}", state_label(*state))
            }
            ValidationError::NotPaused(state) => {
                format!("No hay nada en pausa: el reproductor está {}", state_label(*state))
            }
            ValidationError::UnsupportedReference(reference) => {
                format!("Solo se admiten enlaces de SoundCloud: `{}`", reference)
            }
            ValidationError::QueueFull { max } => {
                format!("La cola está llena (máximo {} canciones)", max)
            }
        },
        MusicError::Resolve(e) => match e {
            ResolveError::EmptyCollection(reference) => {
                format!("La playlist no tiene canciones reproducibles: {}", reference)
            }
            ResolveError::Timeout(limit) => format!(
                "La búsqueda tardó demasiado (más de {})",
                humantime::format_duration(*limit)
            ),
            ResolveError::Resolution { reference, .. } => {
                format!("No se pudo obtener información de {}", reference)
            }
            ResolveError::StreamUnavailable { locator, .. } => {
                format!("No se pudo abrir el audio de {}", locator)
            }
        },
        MusicError::Session(e) => match e {
            SessionError::Join(_) => "No me pude conectar al canal de voz".to_string(),
            SessionError::Playback(cause) => format!("Error del reproductor: {}", cause),
            SessionError::Closed => "La sesión de voz ya no está activa".to_string(),
        },
        MusicError::QueueClosed => "La cola se detuvo antes de completar la petición".to_string(),
    }
}

/// Crea un embed de error
pub fn create_error_embed(error: &MusicError) -> CreateEmbed {
    base_embed("❌ Error", error_message(error)).color(colors::ERROR_RED)
}

/// Crea un embed de éxito
pub fn create_success_embed(title: &str, description: &str) -> CreateEmbed {
    base_embed(format!("✅ {}", title), description).color(colors::SUCCESS_GREEN)
}

/// Crea un embed de información
pub fn create_info_embed(title: &str, description: &str) -> CreateEmbed {
    base_embed(format!("ℹ️ {}", title), description).color(colors::INFO_BLUE)
}

/// Una línea por pista; la actual lleva la marca de reproducción. Si no cabe
/// en un embed se muestra una ventana que empieza poco antes de la pista
/// actual, con resúmenes de lo que queda fuera.
pub fn format_queue_lines(entries: &[QueueEntry]) -> String {
    let current = entries.iter().position(|entry| entry.is_current).unwrap_or(0);
    let full_len: usize = entries.iter().map(|entry| format_line(entry).len()).sum();
    let start = if full_len <= DESCRIPTION_LIMIT {
        0
    } else {
        current.saturating_sub(LINES_BEFORE_CURRENT)
    };

    let mut description = String::new();
    if start > 0 {
        description.push_str(&format!("… {} anteriores\n", start));
    }

    for (shown, entry) in entries.iter().enumerate().skip(start) {
        let line = format_line(entry);
        if description.len() + line.len() > DESCRIPTION_LIMIT {
            description.push_str(&format!("… y {} más", entries.len() - shown));
            break;
        }
        description.push_str(&line);
    }

    description
}

fn format_line(entry: &QueueEntry) -> String {
    if entry.is_current {
        format!("**{}. {}** {}\n", entry.position, entry.title, NOW_PLAYING_MARKER)
    } else {
        format!("{}. {}\n", entry.position, entry.title)
    }
}

/// Crea un embed para mostrar la cola de reproducción
pub fn create_queue_embed(entries: &[QueueEntry]) -> CreateEmbed {
    if entries.is_empty() {
        return base_embed("📋 Cola de Reproducción", "😴 **La cola está vacía**")
            .color(colors::NEUTRAL_GRAY);
    }

    base_embed("📋 Cola de Reproducción", format_queue_lines(entries))
        .color(colors::INFO_BLUE)
        .field("Total", plural_tracks(entries.len()), true)
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "activado"
    } else {
        "desactivado"
    }
}

/// Crea un embed con el estado actual de la cola
pub fn create_status_embed(status: &QueueStatus) -> CreateEmbed {
    let icon = match status.state {
        PlaybackState::Playing => "▶️",
        PlaybackState::Paused => "⏸️",
        PlaybackState::Stopped => "⏹️",
    };
    let current = status
        .current
        .as_deref()
        .map(|title| format!("**{}**", title))
        .unwrap_or_else(|| "Nada".to_string());

    base_embed(format!("{} Estado del Reproductor", icon), current)
        .color(colors::MUSIC_PURPLE)
        .field(
            "📍 Posición",
            format!("{} / {}", (status.cursor + 1).min(status.len), status.len),
            true,
        )
        .field("Estado", state_label(status.state), true)
        .field("🔁 Loop cola", on_off(status.loop_queue), true)
        .field("🔂 Loop canción", on_off(status.loop_track), true)
}

pub fn create_loop_embed(target: LoopTarget, enabled: bool) -> CreateEmbed {
    let (icon, what) = match target {
        LoopTarget::Queue => ("🔁", "Loop de la cola"),
        LoopTarget::Track => ("🔂", "Loop de la canción"),
    };
    base_embed(format!("{} {}", icon, what), format!("{} {}", what, on_off(enabled)))
        .color(colors::INFO_BLUE)
}

/// Crea un embed de ayuda general
pub fn create_help_embed(prefix: &str) -> CreateEmbed {
    let commands = [
        ("play <url>", "p", "Agrega una canción o set de SoundCloud"),
        ("play", "p", "Reanuda si está en pausa"),
        ("pause", "", "Pausa la reproducción"),
        ("resume", "r", "Reanuda la reproducción"),
        ("stop", "s", "Detiene, vacía la cola y sale del canal"),
        ("queue", "q", "Muestra la cola"),
        ("skip [n]", "next", "Salta n canciones"),
        ("jump <n>", "j", "Salta a la posición n"),
        ("loop [queue|track] [on|off]", "", "Configura el loop"),
        ("nowplaying", "np", "Estado actual"),
        ("info", "help", "Esta ayuda"),
    ];

    let description = commands
        .iter()
        .map(|(usage, alias, what)| {
            if alias.is_empty() {
                format!("`{}{}` - {}", prefix, usage, what)
            } else {
                format!("`{}{}` (`{}`) - {}", prefix, usage, alias, what)
            }
        })
        .collect::<Vec<_>>()
        .join("\n");

    base_embed("🎵 Sen Music - Comandos", description)
        .color(colors::INFO_BLUE)
        .field("🎵 Fuentes Soportadas", "• SoundCloud (canciones y sets)", false)
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut short: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    short.push('…');
    short
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn entry(position: usize, title: &str, is_current: bool) -> QueueEntry {
        QueueEntry {
            position,
            title: title.to_string(),
            is_current,
        }
    }

    fn title_of(embed: CreateEmbed) -> String {
        let value = serde_json::to_value(embed).unwrap();
        value["title"].as_str().unwrap_or_default().to_string()
    }

    #[test]
    fn queue_lines_mark_current_track() {
        let lines = format_queue_lines(&[
            entry(1, "Intro", false),
            entry(2, "Night Drive", true),
            entry(3, "Outro", false),
        ]);
        assert_eq!(
            lines,
            "1. Intro\n**2. Night Drive** --> Reproduciendo\n3. Outro\n"
        );
    }

    #[test]
    fn long_queues_are_cut_with_a_summary() {
        let entries: Vec<QueueEntry> = (1..=500)
            .map(|i| entry(i, "una canción con un título bastante largo", false))
            .collect();
        let lines = format_queue_lines(&entries);
        assert!(lines.len() <= DESCRIPTION_LIMIT + 32);
        assert!(lines.ends_with("más"));
        assert!(lines.starts_with("1. "));
    }

    #[test]
    fn long_queues_are_windowed_around_the_current_track() {
        let entries: Vec<QueueEntry> = (1..=500)
            .map(|i| entry(i, "una canción con un título bastante largo", i == 400))
            .collect();
        let lines = format_queue_lines(&entries);

        assert!(lines.len() <= DESCRIPTION_LIMIT + 32);
        assert!(lines.starts_with("… 396 anteriores\n397. "));
        assert!(lines.contains(&format!(
            "**400. una canción con un título bastante largo** {}",
            NOW_PLAYING_MARKER
        )));
        assert!(!lines.contains("\n396. "));
        assert!(lines.ends_with("más"));
    }

    #[test]
    fn current_track_near_the_end_shows_the_tail() {
        let entries: Vec<QueueEntry> = (1..=500)
            .map(|i| entry(i, "una canción con un título bastante largo", i == 500))
            .collect();
        let lines = format_queue_lines(&entries);

        assert!(lines.starts_with("… 496 anteriores\n"));
        assert!(lines.ends_with(&format!(
            "**500. una canción con un título bastante largo** {}\n",
            NOW_PLAYING_MARKER
        )));
    }

    #[test]
    fn validation_errors_have_readable_text() {
        assert_eq!(
            error_message(&ValidationError::IndexOutOfRange { index: 9, len: 3 }.into()),
            "La posición 9 no existe, la cola tiene 3 canciones"
        );
        assert_eq!(
            error_message(&ValidationError::NotPaused(PlaybackState::Playing).into()),
            "No hay nada en pausa: el reproductor está reproduciendo"
        );
        assert_eq!(
            error_message(&ValidationError::InvalidIndex(String::new()).into()),
            "Indica una posición, por ejemplo `jump 3`"
        );
    }

    #[test]
    fn notification_titles() {
        assert_eq!(
            title_of(create_notification_embed(&Notification::QueueEnded)),
            "📭 Cola Terminada"
        );
        assert_eq!(
            title_of(create_notification_embed(&Notification::NowPlaying {
                title: "x".into()
            })),
            "🎵 Reproduciendo Ahora"
        );
    }

    #[test]
    fn help_lists_prefixed_commands() {
        let value = serde_json::to_value(create_help_embed("sen!")).unwrap();
        let description = value["description"].as_str().unwrap();
        assert!(description.contains("`sen!play <url>` (`p`)"));
        assert!(description.contains("`sen!pause` - "));
    }

    #[test]
    fn truncate_keeps_short_text() {
        assert_eq!(truncate("corto", 10), "corto");
        assert_eq!(truncate("abcdef", 4), "abc…");
    }
}
