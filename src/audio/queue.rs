use std::fmt;

use tracing::{debug, info};

use crate::error::ValidationError;

/// Una pista de la cola: locator para reproducir + título para mostrar
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    pub locator: String,
    pub title: String,
}

impl Track {
    pub fn new(locator: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            locator: locator.into(),
            title: title.into(),
        }
    }

    /// Pista sin metadata: el título es la referencia original
    pub fn fallback(reference: &str) -> Self {
        Self::new(reference, reference)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Stopped,
    Playing,
    Paused,
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PlaybackState::Stopped => "stopped",
            PlaybackState::Playing => "playing",
            PlaybackState::Paused => "paused",
        };
        f.write_str(name)
    }
}

/// Operación manual que detuvo la pista actual
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManualAdvance {
    Jump,
    Skip,
}

/// Why the cursor is where it is when a finished track hands over to the next one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionCause {
    /// Loop track: same cursor again.
    Replay,
    /// Jump/skip already placed the cursor; no extra increment.
    Manual(ManualAdvance),
    /// The track ran out on its own; cursor moved forward by one.
    NaturalEnd,
}

/// Resultado de decidir qué suena a continuación
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advance {
    Play { index: usize, track: Track },
    Ended,
}

/// Read-only projection of one queue position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntry {
    /// 1-based
    pub position: usize,
    pub title: String,
    pub is_current: bool,
}

/// Snapshot for `nowplaying`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueStatus {
    pub current: Option<String>,
    pub cursor: usize,
    pub len: usize,
    pub state: PlaybackState,
    pub loop_queue: bool,
    pub loop_track: bool,
}

/// Per-guild queue state.
///
/// `tracks` is append-only (never reordered) and `cursor` only moves through
/// the methods below. The cursor may sit at or past `tracks.len()` after the
/// last track or a long skip; [`GuildQueue::next_to_play`] resolves that by
/// wrapping or ending.
#[derive(Debug, Default)]
pub struct GuildQueue {
    tracks: Vec<Track>,
    cursor: usize,
    loop_queue: bool,
    loop_track: bool,
    pending: Option<ManualAdvance>,
    state: PlaybackState,
}

impl GuildQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Agrega pistas al final de la cola
    pub fn append(&mut self, tracks: impl IntoIterator<Item = Track>) -> usize {
        let before = self.tracks.len();
        self.tracks.extend(tracks);
        let added = self.tracks.len() - before;
        debug!("➕ {} pistas agregadas (total {})", added, self.tracks.len());
        added
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn set_state(&mut self, state: PlaybackState) {
        self.state = state;
    }

    pub fn pending_advance(&self) -> Option<ManualAdvance> {
        self.pending
    }

    pub fn current(&self) -> Option<&Track> {
        self.tracks.get(self.cursor)
    }

    /// Decide qué pista suena en el cursor actual (pasos 1 y 2 del avance)
    pub fn next_to_play(&mut self) -> Advance {
        if self.cursor >= self.tracks.len() {
            if !self.loop_queue || self.is_empty() {
                return Advance::Ended;
            }
            info!("🔁 Fin de la cola, volviendo al inicio");
            self.cursor = 0;
        }

        Advance::Play {
            index: self.cursor,
            track: self.tracks[self.cursor].clone(),
        }
    }

    /// La pista en el cursor no se pudo abrir: pasar a la siguiente
    pub fn skip_failed(&mut self) {
        self.cursor = self.cursor.saturating_add(1);
    }

    /// Handles the end of the current track.
    ///
    /// Precedence: loop track, then a pending manual advance, then the
    /// natural +1. A pending jump/skip is left untouched while loop track is
    /// on and only consumed once looping is disabled.
    pub fn on_track_finished(&mut self) -> TransitionCause {
        self.state = PlaybackState::Stopped;

        if self.loop_track {
            return TransitionCause::Replay;
        }

        match self.pending.take() {
            Some(manual) => TransitionCause::Manual(manual),
            None => {
                self.cursor = self.cursor.saturating_add(1);
                TransitionCause::NaturalEnd
            }
        }
    }

    /// Consume the pending flag without an end-of-track signal (nothing was
    /// live to stop).
    pub fn take_pending(&mut self) -> Option<ManualAdvance> {
        self.pending.take()
    }

    pub fn jump(&mut self, one_based_index: usize) -> Result<(), ValidationError> {
        if one_based_index < 1 || one_based_index > self.tracks.len() {
            return Err(ValidationError::IndexOutOfRange {
                index: one_based_index,
                len: self.tracks.len(),
            });
        }

        self.cursor = one_based_index - 1;
        self.pending = Some(ManualAdvance::Jump);
        Ok(())
    }

    /// No clamping here: [`GuildQueue::next_to_play`] ends or wraps.
    pub fn skip(&mut self, count: usize) -> Result<(), ValidationError> {
        if count < 1 {
            return Err(ValidationError::InvalidCount(count.to_string()));
        }

        self.cursor = self.cursor.saturating_add(count);
        self.pending = Some(ManualAdvance::Skip);
        Ok(())
    }

    pub fn pause(&mut self) -> Result<(), ValidationError> {
        match self.state {
            PlaybackState::Playing => {
                self.state = PlaybackState::Paused;
                Ok(())
            }
            other => Err(ValidationError::NotPlaying(other)),
        }
    }

    pub fn resume(&mut self) -> Result<(), ValidationError> {
        match self.state {
            PlaybackState::Paused => {
                self.state = PlaybackState::Playing;
                Ok(())
            }
            other => Err(ValidationError::NotPaused(other)),
        }
    }

    pub fn set_loop_queue(&mut self, enabled: bool) {
        self.loop_queue = enabled;
    }

    pub fn set_loop_track(&mut self, enabled: bool) {
        self.loop_track = enabled;
    }

    pub fn clear(&mut self) {
        self.tracks.clear();
        self.cursor = 0;
        self.pending = None;
        self.state = PlaybackState::Stopped;
    }

    pub fn entries(&self) -> Vec<QueueEntry> {
        self.tracks
            .iter()
            .enumerate()
            .map(|(index, track)| QueueEntry {
                position: index + 1,
                title: track.title.clone(),
                is_current: index == self.cursor,
            })
            .collect()
    }

    pub fn status(&self) -> QueueStatus {
        QueueStatus {
            current: self.current().map(|track| track.title.clone()),
            cursor: self.cursor,
            len: self.tracks.len(),
            state: self.state,
            loop_queue: self.loop_queue,
            loop_track: self.loop_track,
        }
    }
}
