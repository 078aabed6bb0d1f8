//! Fakes for the resolver, voice session and notifier seams.

#![allow(dead_code)]

use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use parking_lot::Mutex;
use sen_music::{
    audio::{
        notify::{Notification, Notifier},
        player::QueueManager,
        session::{PlaybackSession, SessionConnector, TrackSignals},
    },
    error::{ResolveError, SessionError},
    sources::{ResolvedCollection, ResolvedTrack, TrackResolver},
};
use serenity::model::id::GuildId;
use tokio::sync::{mpsc, Notify};

pub const WAIT: Duration = Duration::from_secs(2);

pub fn guild() -> GuildId {
    GuildId::new(4242)
}

pub fn track(name: &str) -> String {
    format!("fake://{}", name)
}

/// Resolver over `fake://` references. Titles are the reference without the
/// scheme, `/sets/` references come from `collections`.
#[derive(Default)]
pub struct FakeResolver {
    pub collections: Mutex<HashMap<String, ResolvedCollection>>,
    pub broken_metadata: Mutex<HashSet<String>>,
    pub broken_streams: Mutex<HashSet<String>>,
    pub opened: Mutex<Vec<String>>,
    /// When set, `resolve_single` waits on it after signalling `resolving`.
    pub resolve_gate: Mutex<Option<Arc<Notify>>>,
    pub resolving: Arc<Notify>,
    /// When set, `open_stream` waits on it after signalling `opening`.
    pub stream_gate: Mutex<Option<Arc<Notify>>>,
    pub opening: Arc<Notify>,
}

impl FakeResolver {
    pub fn add_collection(&self, reference: &str, title: &str, names: &[&str]) {
        let tracks = names
            .iter()
            .map(|name| ResolvedTrack {
                locator: track(name),
                title: name.to_string(),
            })
            .collect();
        self.collections.lock().insert(
            reference.to_string(),
            ResolvedCollection {
                title: title.to_string(),
                tracks,
            },
        );
    }

    pub fn break_stream(&self, name: &str) {
        self.broken_streams.lock().insert(track(name));
    }

    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().clone()
    }
}

#[async_trait]
impl TrackResolver for FakeResolver {
    type Stream = String;

    fn is_supported(&self, reference: &str) -> bool {
        reference.starts_with("fake://")
    }

    fn is_collection(&self, reference: &str) -> bool {
        reference.contains("/sets/")
    }

    async fn resolve_single(&self, reference: &str) -> Result<ResolvedTrack, ResolveError> {
        let gate = self.resolve_gate.lock().clone();
        if let Some(gate) = gate {
            self.resolving.notify_one();
            gate.notified().await;
        }

        if self.broken_metadata.lock().contains(reference) {
            return Err(ResolveError::Resolution {
                reference: reference.to_string(),
                reason: "404".to_string(),
            });
        }

        Ok(ResolvedTrack {
            locator: reference.to_string(),
            title: reference.trim_start_matches("fake://").to_string(),
        })
    }

    async fn resolve_collection(
        &self,
        reference: &str,
    ) -> Result<ResolvedCollection, ResolveError> {
        self.collections
            .lock()
            .get(reference)
            .cloned()
            .filter(|collection| !collection.tracks.is_empty())
            .ok_or_else(|| ResolveError::EmptyCollection(reference.to_string()))
    }

    async fn open_stream(&self, locator: &str) -> Result<String, ResolveError> {
        let gate = self.stream_gate.lock().clone();
        if let Some(gate) = gate {
            self.opening.notify_one();
            gate.notified().await;
        }

        self.opened.lock().push(locator.to_string());
        if self.broken_streams.lock().contains(locator) {
            return Err(ResolveError::StreamUnavailable {
                locator: locator.to_string(),
                reason: "gone".to_string(),
            });
        }
        Ok(locator.to_string())
    }

    fn source_name(&self) -> &'static str {
        "fake"
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCall {
    Play(String),
    Pause,
    Resume,
    Stop,
    Destroy,
}

/// Session that behaves like a voice player: `stop()` ends the current track
/// and reports `Idle` for it.
#[derive(Default)]
pub struct FakeSession {
    pub calls: Mutex<Vec<SessionCall>>,
    current: Mutex<Option<TrackSignals>>,
    pub reject_play: AtomicBool,
    /// When set, `destroy()` waits here after signalling `destroying`.
    pub destroy_gate: Mutex<Option<Arc<Notify>>>,
    pub destroying: Arc<Notify>,
}

impl FakeSession {
    pub fn calls(&self) -> Vec<SessionCall> {
        self.calls.lock().clone()
    }

    pub fn plays(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                SessionCall::Play(locator) => Some(locator),
                _ => None,
            })
            .collect()
    }

    pub fn signals(&self) -> Option<TrackSignals> {
        self.current.lock().clone()
    }

    /// The current track runs out on its own.
    pub fn finish_current(&self) {
        let signals = self.current.lock().take();
        if let Some(signals) = signals {
            signals.idle();
        }
    }

    pub fn fail_current(&self, cause: &str) {
        let signals = self.current.lock().take();
        if let Some(signals) = signals {
            signals.error(cause);
        }
    }
}

#[async_trait]
impl PlaybackSession<String> for FakeSession {
    async fn play(&self, stream: String, signals: TrackSignals) -> Result<(), SessionError> {
        self.calls.lock().push(SessionCall::Play(stream));
        if self.reject_play.load(Ordering::SeqCst) {
            return Err(SessionError::Playback("decoder".to_string()));
        }
        *self.current.lock() = Some(signals);
        Ok(())
    }

    async fn pause(&self) -> Result<(), SessionError> {
        self.calls.lock().push(SessionCall::Pause);
        Ok(())
    }

    async fn resume(&self) -> Result<(), SessionError> {
        self.calls.lock().push(SessionCall::Resume);
        Ok(())
    }

    async fn stop(&self) -> Result<(), SessionError> {
        self.calls.lock().push(SessionCall::Stop);
        let signals = self.current.lock().take();
        match signals {
            Some(signals) => {
                signals.idle();
                Ok(())
            }
            None => Err(SessionError::Closed),
        }
    }

    async fn destroy(&self) -> Result<(), SessionError> {
        let gate = self.destroy_gate.lock().clone();
        if let Some(gate) = gate {
            self.destroying.notify_one();
            gate.notified().await;
        }

        self.calls.lock().push(SessionCall::Destroy);
        self.current.lock().take();
        Ok(())
    }
}

pub struct FakeConnector {
    pub session: Arc<FakeSession>,
    pub connects: AtomicUsize,
}

impl FakeConnector {
    pub fn new(session: Arc<FakeSession>) -> Self {
        Self {
            session,
            connects: AtomicUsize::new(0),
        }
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionConnector<String> for FakeConnector {
    async fn connect(&self) -> Result<Arc<dyn PlaybackSession<String>>, SessionError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(self.session.clone())
    }
}

pub struct RecordingNotifier {
    tx: mpsc::UnboundedSender<Notification>,
    /// When set, `QueueEnded` is recorded and then held until notified.
    pub ended_gate: Mutex<Option<Arc<Notify>>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notification: Notification) {
        let ended = notification == Notification::QueueEnded;
        let _ = self.tx.send(notification);

        let gate = self.ended_gate.lock().clone();
        if let (true, Some(gate)) = (ended, gate) {
            gate.notified().await;
        }
    }
}

/// Everything a scenario needs, wired together.
pub struct Harness {
    pub manager: Arc<QueueManager<FakeResolver>>,
    pub resolver: Arc<FakeResolver>,
    pub session: Arc<FakeSession>,
    pub connector: Arc<FakeConnector>,
    pub notifier: Arc<RecordingNotifier>,
    pub events: mpsc::UnboundedReceiver<Notification>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_max_queue(1000)
    }

    pub fn with_max_queue(max_queue_size: usize) -> Self {
        let resolver = Arc::new(FakeResolver::default());
        let session = Arc::new(FakeSession::default());
        let connector = Arc::new(FakeConnector::new(session.clone()));
        let (tx, events) = mpsc::unbounded_channel();

        Self {
            manager: Arc::new(QueueManager::new(resolver.clone(), max_queue_size)),
            resolver,
            session,
            connector,
            notifier: Arc::new(RecordingNotifier {
                tx,
                ended_gate: Mutex::new(None),
            }),
            events,
        }
    }

    pub async fn enqueue(
        &self,
        reference: &str,
    ) -> sen_music::error::MusicResult<sen_music::audio::player::EnqueueOutcome> {
        self.manager
            .enqueue(
                guild(),
                reference,
                self.connector.as_ref(),
                self.notifier.clone(),
            )
            .await
    }

    /// Next notification, failing the test if none arrives in time.
    pub async fn next_event(&mut self) -> Notification {
        tokio::time::timeout(WAIT, self.events.recv())
            .await
            .expect("timed out waiting for a notification")
            .expect("notifier channel closed")
    }

    pub async fn expect_event(&mut self, expected: Notification) {
        let got = self.next_event().await;
        pretty_assertions::assert_eq!(got, expected);
    }

    /// Asserts that nothing else is notified for a short while.
    pub async fn expect_quiet(&mut self) {
        let extra = tokio::time::timeout(Duration::from_millis(100), self.events.recv()).await;
        assert!(extra.is_err(), "unexpected notification: {:?}", extra);
    }

    /// Waits until the worker has left the registry, session torn down.
    pub async fn wait_until_removed(&self) {
        tokio::time::timeout(WAIT, async {
            while self.manager.has_queue(guild()) || self.manager.active_guilds() > 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("queue was never removed");
    }
}

pub fn added(title: &str) -> Notification {
    Notification::TrackAdded {
        title: title.to_string(),
    }
}

pub fn playing(title: &str) -> Notification {
    Notification::NowPlaying {
        title: title.to_string(),
    }
}

pub fn skipped(title: &str) -> Notification {
    Notification::TrackSkippedDueToError {
        title: title.to_string(),
    }
}
