use std::sync::Arc;

use serenity::{
    async_trait, builder::CreateMessage, http::Http, model::id::ChannelId,
};
use tracing::{debug, warn};

use crate::{
    audio::notify::{Notification, Notifier},
    ui::embeds,
};

/// Publica los eventos de la cola en el canal de texto donde se creó
pub struct ChannelNotifier {
    pub http: Arc<Http>,
    pub channel_id: ChannelId,
}

impl ChannelNotifier {
    pub fn new(http: Arc<Http>, channel_id: ChannelId) -> Self {
        Self { http, channel_id }
    }
}

#[async_trait]
impl Notifier for ChannelNotifier {
    async fn notify(&self, notification: Notification) {
        debug!("📨 {:?} → canal {}", notification, self.channel_id);
        let embed = embeds::create_notification_embed(&notification);

        if let Err(e) = self
            .channel_id
            .send_message(&self.http, CreateMessage::new().embed(embed))
            .await
        {
            warn!("Error al enviar notificación al canal {}: {:?}", self.channel_id, e);
        }
    }
}
