//! Push message handling and notification rendering
//!
//! Push delivery is independent of the cache layer: a push event renders
//! exactly one OS notification, and a notification click routes back into
//! the application shell.

use crate::clients::ClientRegistry;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

/// Title used when the payload carries none.
pub const DEFAULT_TITLE: &str = "Silo Monitor";
/// Body used when the payload carries none.
pub const DEFAULT_BODY: &str = "New notification";
/// Icon attached to every rendered notification.
pub const NOTIFICATION_ICON: &str = "/icon-192.png";

/// Error type for notification rendering
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Notification permission revoked")]
    PermissionRevoked,

    #[error("Rendering failed: {0}")]
    Rendering(String),
}

/// Structured push payload; both fields are optional on the wire.
#[derive(Debug, Deserialize)]
struct PushMessage {
    title: Option<String>,
    body: Option<String>,
}

/// A notification handed to the OS surface. Transient, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Tag identifying the rendered notification for later dismissal.
    pub tag: String,
    pub title: String,
    pub body: String,
    pub icon: String,
}

/// Trait for the OS-level notification surface
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn show(&self, notification: &Notification) -> Result<(), NotifyError>;

    async fn dismiss(&self, tag: &str) -> Result<(), NotifyError>;
}

/// Notifier that writes notifications to the log. Used by the cache priming
/// binary, where no OS notification surface is attached.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn show(&self, notification: &Notification) -> Result<(), NotifyError> {
        info!("🔔 {}: {}", notification.title, notification.body);
        Ok(())
    }

    async fn dismiss(&self, _tag: &str) -> Result<(), NotifyError> {
        Ok(())
    }
}

/// Renders push messages and routes notification clicks back into the app.
pub struct PushDelivery {
    notifier: Arc<dyn Notifier>,
    clients: Arc<ClientRegistry>,
    root_url: Url,
}

impl PushDelivery {
    pub fn new(notifier: Arc<dyn Notifier>, clients: Arc<ClientRegistry>, root_url: Url) -> Self {
        Self {
            notifier,
            clients,
            root_url,
        }
    }

    /// Build the notification for a raw push payload.
    ///
    /// JSON payloads contribute `title` and `body`; anything else is
    /// treated as plain text and becomes the body under the default title.
    /// Missing fields get the fixed defaults.
    pub fn notification_for_payload(payload: &[u8]) -> Notification {
        let (title, body) = match serde_json::from_slice::<PushMessage>(payload) {
            Ok(message) => (message.title, message.body),
            Err(_) => {
                let text = String::from_utf8_lossy(payload).trim().to_string();
                (None, if text.is_empty() { None } else { Some(text) })
            }
        };

        Notification {
            tag: Uuid::new_v4().to_string(),
            title: title.unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            body: body.unwrap_or_else(|| DEFAULT_BODY.to_string()),
            icon: NOTIFICATION_ICON.to_string(),
        }
    }

    /// Handle one push event: exactly one notification is rendered.
    ///
    /// A rendering failure is logged and never crashes the worker.
    pub async fn handle_push(&self, payload: &[u8]) -> Notification {
        let notification = Self::notification_for_payload(payload);
        debug!("Rendering notification {}: {}", notification.tag, notification.title);

        if let Err(e) = self.notifier.show(&notification).await {
            warn!("Notification rendering failed: {}", e);
        }
        notification
    }

    /// Handle a click on a rendered notification: dismiss it, then bring
    /// the application root to the foreground. Returns the client id that
    /// ended up focused.
    pub async fn handle_click(&self, tag: &str) -> String {
        if let Err(e) = self.notifier.dismiss(tag).await {
            warn!("Failed to dismiss notification {}: {}", tag, e);
        }
        self.clients.focus_or_open(&self.root_url)
    }
}
