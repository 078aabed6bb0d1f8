//! Per-guild worker task.
//!
//! Each guild queue is owned by one task that processes commands and
//! session signals strictly in order, so `cursor`/`tracks` never see two
//! writers. The only suspension points inside a transition are stream
//! acquisition and the session calls; stream acquisition races against the
//! guild's cancellation token so `stop` wins over an in-flight open.

use std::sync::Arc;

use dashmap::DashMap;
use serenity::model::id::GuildId;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, error, info, warn};

use super::{
    notify::{Notification, Notifier},
    player::GuildHandle,
    queue::{Advance, GuildQueue, PlaybackState, QueueEntry, QueueStatus, Track, TransitionCause},
    session::{PlaybackSession, SessionEvent, TrackSignals},
};
use crate::{
    error::{MusicResult, ValidationError},
    sources::TrackResolver,
};

pub(crate) type Reply<T> = oneshot::Sender<MusicResult<T>>;

/// Nuevas pistas para agregar a la cola
#[derive(Debug, Clone)]
pub(crate) struct Batch {
    pub tracks: Vec<Track>,
    /// `Some(title)` when the batch came from a collection.
    pub collection: Option<String>,
}

#[derive(Debug)]
pub(crate) enum GuildMessage {
    Append { batch: Batch, reply: Reply<usize> },
    StartIfIdle,
    Pause { reply: Reply<String> },
    Resume { reply: Reply<String> },
    Jump { index: usize, reply: Reply<String> },
    Skip { count: usize, reply: Reply<()> },
    SetLoopQueue { enabled: bool, reply: Reply<()> },
    SetLoopTrack { enabled: bool, reply: Reply<()> },
    List { reply: Reply<Vec<QueueEntry>> },
    Status { reply: Reply<QueueStatus> },
    Signal { generation: u64, event: SessionEvent },
}

#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Exit,
}

pub(crate) struct GuildWorker<R: TrackResolver> {
    pub guild_id: GuildId,
    pub queue_id: u64,
    pub max_queue_size: usize,
    pub queue: GuildQueue,
    pub resolver: Arc<R>,
    pub session: Arc<dyn PlaybackSession<R::Stream>>,
    pub notifier: Arc<dyn Notifier>,
    pub tx: mpsc::UnboundedSender<GuildMessage>,
    pub rx: mpsc::UnboundedReceiver<GuildMessage>,
    pub cancel: CancellationToken,
    /// Marks the handle's `done` token when the worker is dropped.
    pub _done: DropGuard,
    pub registry: Arc<DashMap<GuildId, GuildHandle>>,
    /// Generación del último `play()`
    pub generation: u64,
    /// Generation whose `Idle`/`Error` is still expected.
    pub live: Option<u64>,
}

impl<R: TrackResolver> GuildWorker<R> {
    pub async fn run(mut self) {
        info!("🎛️ Cola creada para guild {}", self.guild_id);

        loop {
            let message = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    self.shutdown().await;
                    break;
                }
                message = self.rx.recv() => message,
            };

            let Some(message) = message else { break };
            if self.handle(message).await == Flow::Exit {
                break;
            }
        }

        info!("🛑 Worker de guild {} finalizado", self.guild_id);
    }

    async fn handle(&mut self, message: GuildMessage) -> Flow {
        match message {
            GuildMessage::Append { batch, reply } => {
                let result = self.append(batch).await;
                let appended = result.is_ok();
                let _ = reply.send(result);
                if appended {
                    return self.start_if_idle().await;
                }
            }
            GuildMessage::StartIfIdle => return self.start_if_idle().await,
            GuildMessage::Pause { reply } => {
                let _ = reply.send(self.pause().await);
            }
            GuildMessage::Resume { reply } => {
                let _ = reply.send(self.resume().await);
            }
            GuildMessage::Jump { index, reply } => {
                let result: MusicResult<()> = self.queue.jump(index).map_err(Into::into);
                let title = self.queue.current().map(|t| t.title.clone());
                let accepted = result.is_ok();
                let _ = reply.send(result.map(|_| title.unwrap_or_default()));
                if accepted {
                    return self.interrupt().await;
                }
            }
            GuildMessage::Skip { count, reply } => {
                let result: MusicResult<()> = self.queue.skip(count).map_err(Into::into);
                let accepted = result.is_ok();
                let _ = reply.send(result);
                if accepted {
                    return self.interrupt().await;
                }
            }
            GuildMessage::SetLoopQueue { enabled, reply } => {
                self.queue.set_loop_queue(enabled);
                info!("🔁 Loop de cola = {} en guild {}", enabled, self.guild_id);
                let _ = reply.send(Ok(()));
            }
            GuildMessage::SetLoopTrack { enabled, reply } => {
                self.queue.set_loop_track(enabled);
                info!("🔂 Loop de pista = {} en guild {}", enabled, self.guild_id);
                let _ = reply.send(Ok(()));
            }
            GuildMessage::List { reply } => {
                let _ = reply.send(Ok(self.queue.entries()));
            }
            GuildMessage::Status { reply } => {
                let _ = reply.send(Ok(self.queue.status()));
            }
            GuildMessage::Signal { generation, event } => {
                return self.on_signal(generation, event).await;
            }
        }

        Flow::Continue
    }

    async fn append(&mut self, batch: Batch) -> MusicResult<usize> {
        if self.queue.len() + batch.tracks.len() > self.max_queue_size {
            return Err(ValidationError::QueueFull {
                max: self.max_queue_size,
            }
            .into());
        }

        let notification = match (&batch.collection, batch.tracks.first()) {
            (Some(title), _) => Notification::CollectionAdded {
                title: title.clone(),
                count: batch.tracks.len(),
            },
            (None, Some(track)) => Notification::TrackAdded {
                title: track.title.clone(),
            },
            (None, None) => return Ok(0),
        };

        let added = self.queue.append(batch.tracks);
        self.notifier.notify(notification).await;
        Ok(added)
    }

    /// Reproduce solo si no hay una pista viva (ni sonando ni en pausa)
    async fn start_if_idle(&mut self) -> Flow {
        if self.live.is_some() || self.queue.state() != PlaybackState::Stopped {
            debug!("Guild {} ya está reproduciendo, nada que iniciar", self.guild_id);
            return Flow::Continue;
        }
        self.advance_and_play().await
    }

    async fn pause(&mut self) -> MusicResult<String> {
        self.queue.pause()?;
        if let Err(e) = self.session.pause().await {
            self.queue.set_state(PlaybackState::Playing);
            return Err(e.into());
        }
        info!("⏸️ Reproducción pausada en guild {}", self.guild_id);
        Ok(self.current_title())
    }

    async fn resume(&mut self) -> MusicResult<String> {
        self.queue.resume()?;
        if let Err(e) = self.session.resume().await {
            self.queue.set_state(PlaybackState::Paused);
            return Err(e.into());
        }
        info!("▶️ Reproducción reanudada en guild {}", self.guild_id);
        Ok(self.current_title())
    }

    fn current_title(&self) -> String {
        self.queue
            .current()
            .map(|track| track.title.clone())
            .unwrap_or_default()
    }

    /// Jump/skip: stop the live track and let its `Idle` carry the advance,
    /// or advance right away when nothing is live to produce that signal.
    async fn interrupt(&mut self) -> Flow {
        if self.live.is_some() {
            match self.session.stop().await {
                Ok(()) => return Flow::Continue,
                Err(e) => {
                    warn!("⚠️ No se pudo detener la pista actual: {}", e);
                    self.live = None;
                }
            }
        }

        self.queue.take_pending();
        self.queue.set_state(PlaybackState::Stopped);
        self.advance_and_play().await
    }

    async fn on_signal(&mut self, generation: u64, event: SessionEvent) -> Flow {
        if self.live != Some(generation) {
            debug!(
                "Señal {:?} obsoleta (generación {}, viva {:?}) en guild {}",
                event, generation, self.live, self.guild_id
            );
            return Flow::Continue;
        }
        self.live = None;

        match event {
            SessionEvent::Idle => {
                let cause = self.queue.on_track_finished();
                match cause {
                    TransitionCause::Replay => debug!("🔂 Repitiendo pista en guild {}", self.guild_id),
                    TransitionCause::Manual(kind) => {
                        debug!("⏭️ Avance manual ({:?}) en guild {}", kind, self.guild_id)
                    }
                    TransitionCause::NaturalEnd => debug!("Pista terminada en guild {}", self.guild_id),
                }
                self.advance_and_play().await
            }
            SessionEvent::Error(cause) => {
                // Error de sesión: se informa y no se avanza automáticamente
                let title = self.current_title();
                error!("❌ Error del reproductor en guild {}: {}", self.guild_id, cause);
                self.queue.set_state(PlaybackState::Stopped);
                self.notifier
                    .notify(Notification::PlaybackError { title, cause })
                    .await;
                Flow::Continue
            }
        }
    }

    /// Core transition: play the track at the cursor, skipping forward over
    /// tracks whose stream cannot be opened. Bounded by the queue length so
    /// an all-failing looped queue still terminates.
    async fn advance_and_play(&mut self) -> Flow {
        let mut attempts = 0;

        loop {
            let (index, track) = match self.queue.next_to_play() {
                Advance::Play { index, track } => (index, track),
                Advance::Ended => return self.finish().await,
            };

            if attempts >= self.queue.len() {
                warn!(
                    "⚠️ Ninguna pista de la cola se pudo abrir en guild {}",
                    self.guild_id
                );
                return self.finish().await;
            }
            attempts += 1;

            debug!("🎵 Abriendo stream #{} {} en guild {}", index + 1, track.title, self.guild_id);
            let opened = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    self.shutdown().await;
                    return Flow::Exit;
                }
                opened = self.resolver.open_stream(&track.locator) => opened,
            };

            let stream = match opened {
                Ok(stream) => stream,
                Err(e) => {
                    warn!("⏭️ Saltando {}: {}", track.title, e);
                    self.queue.skip_failed();
                    self.notifier
                        .notify(Notification::TrackSkippedDueToError { title: track.title })
                        .await;
                    continue;
                }
            };

            self.generation += 1;
            let signals = TrackSignals::new(self.tx.clone(), self.generation);

            if let Err(e) = self.session.play(stream, signals).await {
                error!("❌ La sesión rechazó {}: {}", track.title, e);
                self.queue.set_state(PlaybackState::Stopped);
                self.notifier
                    .notify(Notification::PlaybackError {
                        title: track.title,
                        cause: e.to_string(),
                    })
                    .await;
                return Flow::Continue;
            }

            self.live = Some(self.generation);
            self.queue.set_state(PlaybackState::Playing);
            info!("🎵 Reproduciendo: {} en guild {}", track.title, self.guild_id);
            self.notifier
                .notify(Notification::NowPlaying { title: track.title })
                .await;
            return Flow::Continue;
        }
    }

    /// Queue exhausted without loop. New requests are refused right away;
    /// the registry entry stays until the voice session is destroyed so the
    /// next queue for this guild waits for it instead of sharing the call.
    async fn finish(&mut self) -> Flow {
        info!("📭 Cola terminada en guild {}", self.guild_id);
        self.rx.close();
        if let Err(e) = self.session.destroy().await {
            warn!("⚠️ Error al cerrar la sesión de voz: {}", e);
        }
        self.notifier.notify(Notification::QueueEnded).await;
        self.release();
        Flow::Exit
    }

    /// Explicit stop: the handle was already removed by the manager.
    async fn shutdown(&mut self) {
        info!("⏹️ Deteniendo cola de guild {}", self.guild_id);
        self.queue.clear();
        self.live = None;
        if let Err(e) = self.session.stop().await {
            debug!("stop() durante el cierre: {}", e);
        }
        if let Err(e) = self.session.destroy().await {
            warn!("⚠️ Error al cerrar la sesión de voz: {}", e);
        }
    }

    fn release(&self) {
        let queue_id = self.queue_id;
        self.registry
            .remove_if(&self.guild_id, |_, handle| handle.queue_id == queue_id);
    }
}
