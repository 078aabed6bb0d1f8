use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use dashmap::DashMap;
use serenity::model::id::GuildId;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{
    notify::Notifier,
    queue::{GuildQueue, QueueEntry, QueueStatus, Track},
    session::SessionConnector,
    worker::{Batch, GuildMessage, GuildWorker, Reply},
};
use crate::{
    error::{MusicError, MusicResult, ResolveError, ValidationError},
    sources::TrackResolver,
};

/// Handle to a live guild worker, stored in the registry.
#[derive(Debug, Clone)]
pub(crate) struct GuildHandle {
    pub queue_id: u64,
    tx: mpsc::UnboundedSender<GuildMessage>,
    stop: CancellationToken,
    /// Cancelled once the worker has released the voice session and exited.
    done: CancellationToken,
}

impl GuildHandle {
    fn is_live(&self) -> bool {
        !self.tx.is_closed() && !self.stop.is_cancelled()
    }

    fn was_stopped(&self) -> bool {
        self.stop.is_cancelled()
    }

    /// Espera a que el worker termine de cerrar la sesión
    async fn retired(&self) {
        self.done.cancelled().await;
    }

    async fn request<T>(&self, build: impl FnOnce(Reply<T>) -> GuildMessage) -> MusicResult<T> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(build(reply))
            .map_err(|_| MusicError::QueueClosed)?;
        response.await.map_err(|_| MusicError::QueueClosed)?
    }
}

/// Resultado de `enqueue`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnqueueOutcome {
    pub added_titles: Vec<String>,
    pub is_collection: bool,
    /// Set for collections.
    pub collection_title: Option<String>,
}

/// Guild queue engine.
///
/// Owns the guild → queue map. Every queue is driven by its own worker
/// task; this type only resolves references, creates queues (one at a time
/// per guild) and forwards operations.
pub struct QueueManager<R: TrackResolver> {
    resolver: Arc<R>,
    registry: Arc<DashMap<GuildId, GuildHandle>>,
    creation_locks: DashMap<GuildId, Arc<Mutex<()>>>,
    next_queue_id: AtomicU64,
    max_queue_size: usize,
}

impl<R: TrackResolver> QueueManager<R> {
    pub fn new(resolver: Arc<R>, max_queue_size: usize) -> Self {
        Self {
            resolver,
            registry: Arc::new(DashMap::new()),
            creation_locks: DashMap::new(),
            next_queue_id: AtomicU64::new(1),
            max_queue_size,
        }
    }

    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    /// Verifica si hay una cola activa para la guild
    pub fn has_queue(&self, guild_id: GuildId) -> bool {
        self.live_handle(guild_id).is_some()
    }

    pub fn active_guilds(&self) -> usize {
        self.registry.len()
    }

    fn live_handle(&self, guild_id: GuildId) -> Option<GuildHandle> {
        self.registry
            .get(&guild_id)
            .map(|entry| entry.value().clone())
            .filter(GuildHandle::is_live)
    }

    fn handle(&self, guild_id: GuildId) -> MusicResult<GuildHandle> {
        self.live_handle(guild_id)
            .ok_or_else(|| ValidationError::NothingPlaying.into())
    }

    /// Resolves `reference`, appends the result to the guild queue (creating
    /// the queue and its session on first use) and starts playback if idle.
    ///
    /// A single track whose metadata cannot be resolved is still queued with
    /// the reference as its title; only an empty collection is an error. If
    /// the queue that existed when the call started is stopped while the
    /// reference is being resolved, the result is discarded.
    pub async fn enqueue(
        &self,
        guild_id: GuildId,
        reference: &str,
        connector: &dyn SessionConnector<R::Stream>,
        notifier: Arc<dyn Notifier>,
    ) -> MusicResult<EnqueueOutcome> {
        if !self.resolver.is_supported(reference) {
            return Err(ValidationError::UnsupportedReference(reference.to_string()).into());
        }

        let existing = self.live_handle(guild_id);
        let batch = self.resolve(reference).await?;

        let outcome = EnqueueOutcome {
            added_titles: batch.tracks.iter().map(|t| t.title.clone()).collect(),
            is_collection: batch.collection.is_some(),
            collection_title: batch.collection.clone(),
        };

        if let Some(handle) = &existing {
            if handle.was_stopped() {
                info!(
                    "🗑️ La cola de guild {} se detuvo durante la resolución, descartando {}",
                    guild_id, reference
                );
                return Err(MusicError::QueueClosed);
            }
        }

        // Una sola reintentada: la cola pudo agotarse justo antes del envío
        for attempt in 0..2 {
            let handle = self
                .get_or_create(guild_id, connector, notifier.clone())
                .await?;
            let batch = batch.clone();

            match handle
                .request(|reply| GuildMessage::Append { batch, reply })
                .await
            {
                Err(MusicError::QueueClosed) if attempt == 0 && !handle.was_stopped() => {
                    debug!("La cola de guild {} terminó durante el envío, recreando", guild_id);
                }
                result => {
                    result?;
                    return Ok(outcome);
                }
            }
        }

        Err(MusicError::QueueClosed)
    }

    async fn resolve(&self, reference: &str) -> MusicResult<Batch> {
        if self.resolver.is_collection(reference) {
            let collection = self.resolver.resolve_collection(reference).await?;
            if collection.tracks.is_empty() {
                return Err(ResolveError::EmptyCollection(reference.to_string()).into());
            }
            return Ok(Batch {
                tracks: collection
                    .tracks
                    .into_iter()
                    .map(|t| Track::new(t.locator, t.title))
                    .collect(),
                collection: Some(collection.title),
            });
        }

        let track = match self.resolver.resolve_single(reference).await {
            Ok(resolved) => Track::new(resolved.locator, resolved.title),
            Err(e) => {
                warn!("⚠️ Sin metadata para {}: {}", reference, e);
                Track::fallback(reference)
            }
        };

        Ok(Batch {
            tracks: vec![track],
            collection: None,
        })
    }

    /// Busca la cola viva o la crea bajo el candado de la guild
    async fn get_or_create(
        &self,
        guild_id: GuildId,
        connector: &dyn SessionConnector<R::Stream>,
        notifier: Arc<dyn Notifier>,
    ) -> MusicResult<GuildHandle> {
        if let Some(handle) = self.live_handle(guild_id) {
            return Ok(handle);
        }

        let lock = self.creation_lock(guild_id);
        let _guard = lock.lock().await;

        // Otra petición pudo crearla mientras esperábamos el candado
        if let Some(handle) = self.live_handle(guild_id) {
            return Ok(handle);
        }

        // La cola anterior sigue cerrando su sesión de voz: no compartir el Call
        if let Some(retiring) = self.registry.get(&guild_id).map(|e| e.value().clone()) {
            debug!(
                "Esperando a que la cola #{} de guild {} termine",
                retiring.queue_id, guild_id
            );
            retiring.retired().await;
        }

        let session = connector.connect().await?;
        let (tx, rx) = mpsc::unbounded_channel();
        let stop = CancellationToken::new();
        let done = CancellationToken::new();
        let handle = GuildHandle {
            queue_id: self.next_queue_id.fetch_add(1, Ordering::Relaxed),
            tx: tx.clone(),
            stop: stop.clone(),
            done: done.clone(),
        };

        let worker = GuildWorker {
            guild_id,
            queue_id: handle.queue_id,
            max_queue_size: self.max_queue_size,
            queue: GuildQueue::new(),
            resolver: self.resolver.clone(),
            session,
            notifier,
            tx,
            rx,
            cancel: stop,
            _done: done.drop_guard(),
            registry: self.registry.clone(),
            generation: 0,
            live: None,
        };

        self.registry.insert(guild_id, handle.clone());
        tokio::spawn(worker.run());
        debug!("Cola #{} creada para guild {}", handle.queue_id, guild_id);

        Ok(handle)
    }

    fn creation_lock(&self, guild_id: GuildId) -> Arc<Mutex<()>> {
        self.creation_locks
            .entry(guild_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Starts playback at the cursor unless a track is live (playing or
    /// paused). Used to restart a queue halted by a session error.
    pub async fn start_if_idle(&self, guild_id: GuildId) -> MusicResult<()> {
        let handle = self.handle(guild_id)?;
        handle
            .tx
            .send(GuildMessage::StartIfIdle)
            .map_err(|_| MusicError::QueueClosed)
    }

    /// Pausa la reproducción; devuelve el título actual
    pub async fn pause(&self, guild_id: GuildId) -> MusicResult<String> {
        self.handle(guild_id)?
            .request(|reply| GuildMessage::Pause { reply })
            .await
    }

    /// Reanuda la reproducción; devuelve el título actual
    pub async fn resume(&self, guild_id: GuildId) -> MusicResult<String> {
        self.handle(guild_id)?
            .request(|reply| GuildMessage::Resume { reply })
            .await
    }

    /// Clears the queue, stops playback and destroys the session. Effective
    /// even while the worker is opening a stream. Holds the guild's creation
    /// lock until the session is gone, so a following `enqueue` joins voice
    /// afresh.
    pub async fn stop(&self, guild_id: GuildId) -> MusicResult<()> {
        let lock = self.creation_lock(guild_id);
        let _guard = lock.lock().await;

        let Some((_, handle)) = self.registry.remove_if(&guild_id, |_, h| h.is_live()) else {
            // Una cola agotada que aún está cerrando no cuenta como activa
            if let Some(retiring) = self.registry.get(&guild_id).map(|e| e.value().clone()) {
                retiring.retired().await;
            }
            return Err(ValidationError::NothingPlaying.into());
        };

        handle.stop.cancel();
        // Esperar a que el worker libere la sesión
        handle.retired().await;
        info!("⏹️ Cola detenida en guild {}", guild_id);
        Ok(())
    }

    /// Salta a la posición `one_based_index`; devuelve su título
    pub async fn jump(&self, guild_id: GuildId, one_based_index: usize) -> MusicResult<String> {
        self.handle(guild_id)?
            .request(|reply| GuildMessage::Jump {
                index: one_based_index,
                reply,
            })
            .await
    }

    /// Salta `count` pistas
    pub async fn skip(&self, guild_id: GuildId, count: usize) -> MusicResult<()> {
        if count < 1 {
            return Err(ValidationError::InvalidCount(count.to_string()).into());
        }
        self.handle(guild_id)?
            .request(|reply| GuildMessage::Skip { count, reply })
            .await
    }

    pub async fn set_loop_queue(&self, guild_id: GuildId, enabled: bool) -> MusicResult<()> {
        self.handle(guild_id)?
            .request(|reply| GuildMessage::SetLoopQueue { enabled, reply })
            .await
    }

    pub async fn set_loop_track(&self, guild_id: GuildId, enabled: bool) -> MusicResult<()> {
        self.handle(guild_id)?
            .request(|reply| GuildMessage::SetLoopTrack { enabled, reply })
            .await
    }

    pub async fn list_tracks(&self, guild_id: GuildId) -> MusicResult<Vec<QueueEntry>> {
        self.handle(guild_id)?
            .request(|reply| GuildMessage::List { reply })
            .await
    }

    pub async fn status(&self, guild_id: GuildId) -> MusicResult<QueueStatus> {
        self.handle(guild_id)?
            .request(|reply| GuildMessage::Status { reply })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        audio::{
            notify::{MockNotifier, Notification},
            queue::PlaybackState,
            session::{PlaybackSession, TrackSignals},
        },
        error::SessionError,
        sources::{ResolvedCollection, ResolvedTrack},
    };
    use async_trait::async_trait;
    use mockall::Sequence;
    use pretty_assertions::assert_eq;

    struct StaticResolver;

    #[async_trait]
    impl TrackResolver for StaticResolver {
        type Stream = ();

        fn is_supported(&self, reference: &str) -> bool {
            reference.starts_with("test://")
        }

        fn is_collection(&self, _reference: &str) -> bool {
            false
        }

        async fn resolve_single(&self, reference: &str) -> Result<ResolvedTrack, ResolveError> {
            Ok(ResolvedTrack {
                locator: reference.to_string(),
                title: "Song".to_string(),
            })
        }

        async fn resolve_collection(
            &self,
            reference: &str,
        ) -> Result<ResolvedCollection, ResolveError> {
            Err(ResolveError::EmptyCollection(reference.to_string()))
        }

        async fn open_stream(&self, _locator: &str) -> Result<(), ResolveError> {
            Ok(())
        }

        fn source_name(&self) -> &'static str {
            "test"
        }
    }

    struct SilentSession;

    #[async_trait]
    impl PlaybackSession<()> for SilentSession {
        async fn play(&self, _stream: (), _signals: TrackSignals) -> Result<(), SessionError> {
            Ok(())
        }

        async fn pause(&self) -> Result<(), SessionError> {
            Ok(())
        }

        async fn resume(&self) -> Result<(), SessionError> {
            Ok(())
        }

        async fn stop(&self) -> Result<(), SessionError> {
            Ok(())
        }

        async fn destroy(&self) -> Result<(), SessionError> {
            Ok(())
        }
    }

    struct SilentConnector;

    #[async_trait]
    impl SessionConnector<()> for SilentConnector {
        async fn connect(&self) -> Result<Arc<dyn PlaybackSession<()>>, SessionError> {
            Ok(Arc::new(SilentSession))
        }
    }

    fn manager() -> QueueManager<StaticResolver> {
        QueueManager::new(Arc::new(StaticResolver), 10)
    }

    #[tokio::test]
    async fn enqueue_notifies_added_then_now_playing() {
        let guild_id = GuildId::new(1);
        let mut notifier = MockNotifier::new();
        let mut seq = Sequence::new();
        notifier
            .expect_notify()
            .withf(|n| {
                *n == Notification::TrackAdded {
                    title: "Song".into(),
                }
            })
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());
        notifier
            .expect_notify()
            .withf(|n| matches!(n, Notification::NowPlaying { title } if title == "Song"))
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());
        let notifier = Arc::new(notifier);

        let manager = manager();
        let outcome = manager
            .enqueue(guild_id, "test://song", &SilentConnector, notifier.clone())
            .await
            .unwrap();
        assert_eq!(
            outcome,
            EnqueueOutcome {
                added_titles: vec!["Song".into()],
                is_collection: false,
                collection_title: None,
            }
        );

        let status = manager.status(guild_id).await.unwrap();
        assert_eq!(status.state, PlaybackState::Playing);
        assert_eq!(status.current.as_deref(), Some("Song"));

        manager.stop(guild_id).await.unwrap();
        assert!(!manager.has_queue(guild_id));
        // Las expectativas se verifican al soltar el último Arc
        drop(notifier);
    }

    #[tokio::test]
    async fn unsupported_reference_never_notifies() {
        let manager = manager();
        let notifier = Arc::new(MockNotifier::new());

        let result = manager
            .enqueue(GuildId::new(2), "lofi beats", &SilentConnector, notifier)
            .await;

        assert_eq!(
            result,
            Err(ValidationError::UnsupportedReference("lofi beats".into()).into())
        );
        assert_eq!(manager.active_guilds(), 0);
    }

    #[tokio::test]
    async fn stop_without_queue_reports_nothing_playing() {
        assert_eq!(
            manager().stop(GuildId::new(3)).await,
            Err(ValidationError::NothingPlaying.into())
        );
    }
}
