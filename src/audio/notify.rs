use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

/// Eventos que el motor envía al canal de texto de la cola
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    TrackAdded { title: String },
    CollectionAdded { title: String, count: usize },
    NowPlaying { title: String },
    TrackSkippedDueToError { title: String },
    QueueEnded,
    PlaybackError { title: String, cause: String },
}

/// Sink for engine notifications, bound to a guild queue at creation.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: Notification);
}
