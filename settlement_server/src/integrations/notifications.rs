//! Customer notifications.
//!
//! Promotions are announced to the customer through the storefront's notification service. Delivery is fire-and-forget:
//! the settlement has already been committed by the time the event arrives, and a failed delivery is only logged.
use std::time::Duration;

use futures::{future::BoxFuture, FutureExt};
use log::*;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use settlement_engine::events::{EventHandlers, EventHooks, TierPromotedEvent};

pub const NOTIFICATION_EVENT_BUFFER_SIZE: usize = 25;
const NOTIFICATION_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub user_id: String,
    pub title: String,
    pub body: String,
    pub link: String,
}

impl Notification {
    pub fn for_promotion(ev: &TierPromotedEvent) -> Self {
        let tier = ev.change.to.to_string();
        let mut title = tier.clone();
        if let Some(first) = title.get_mut(0..1) {
            first.make_ascii_uppercase();
        }
        Self {
            user_id: ev.change.user_id.clone(),
            title: format!("Welcome to {title}!"),
            body: format!(
                "Your purchases have earned you {tier} membership. You now collect more points on every order."
            ),
            link: "/account/membership".to_string(),
        }
    }
}

#[derive(Clone)]
pub struct NotificationDispatcher {
    client: Client,
    url: Option<String>,
}

impl NotificationDispatcher {
    pub fn new(url: Option<String>) -> Self {
        let client = Client::builder().timeout(NOTIFICATION_TIMEOUT).build().unwrap_or_else(|e| {
            warn!("📣️ Could not configure the notification client. {e}. Using the defaults");
            Client::new()
        });
        Self { client, url }
    }

    pub async fn dispatch(&self, note: Notification) {
        let Some(url) = self.url.as_deref() else {
            info!("📣️ [{}] {}: {}", note.user_id, note.title, note.body);
            return;
        };
        match self.client.post(url).json(&note).send().await {
            Ok(res) if res.status().is_success() => debug!("📣️ Notification sent to {}", note.user_id),
            Ok(res) => warn!("📣️ Notification for {} was refused. Status {}", note.user_id, res.status()),
            Err(e) => warn!("📣️ Could not send notification to {}. {e}", note.user_id),
        }
    }
}

/// Creates the event handlers that notify customers of tier promotions.
pub fn create_notification_event_handlers(dispatcher: NotificationDispatcher) -> EventHandlers {
    let mut hooks = EventHooks::default();
    hooks.on_tier_promoted(move |ev| -> BoxFuture<'static, ()> {
        let note = Notification::for_promotion(&ev);
        debug!("📣️ {} was promoted to {} by {}", ev.change.user_id, ev.change.to, ev.settlement_id);
        let dispatcher = dispatcher.clone();
        async move { dispatcher.dispatch(note).await }.boxed()
    });
    EventHandlers::new(NOTIFICATION_EVENT_BUFFER_SIZE, hooks)
}
