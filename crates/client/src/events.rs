//! Client events observed by the top-level application.
//!
//! The HTTP layer never renders UI or navigates. Instead it publishes
//! [`ClientEvent`]s on a broadcast channel: transient notifications for
//! failed requests, and [`ClientEvent::SessionInvalidated`] when the backend
//! rejected the credential. The application decides how to show a toast or
//! where to navigate.

use tokio::sync::broadcast;

/// Buffered events per subscriber before the slowest one starts lagging.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// A transient, non-blocking user-facing message (toast).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Text to show.
    pub message: String,
}

impl Notification {
    /// Create a notification.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Events published by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// A request failed and the user should be told.
    Notify(Notification),
    /// The backend answered 401. Credential and identity have been cleared;
    /// the application should navigate to `login_path`.
    SessionInvalidated {
        /// Login entry point.
        login_path: String,
    },
}

/// Broadcast fan-out for [`ClientEvent`]s.
///
/// Cheap to clone. Publishing with no subscribers is not an error.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ClientEvent>,
}

impl EventBus {
    /// Create a new event bus.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Subscribe to events published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.sender.subscribe()
    }

    /// Publish an event to every current subscriber.
    pub fn emit(&self, event: ClientEvent) {
        if self.sender.send(event).is_err() {
            tracing::trace!("client event dropped, no subscribers");
        }
    }

    /// Publish a notification.
    pub fn notify(&self, notification: Notification) {
        self.emit(ClientEvent::Notify(notification));
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_without_subscribers_is_fine() {
        let bus = EventBus::new();
        bus.notify(Notification::new("nobody listening"));
    }

    #[tokio::test]
    async fn test_subscribers_receive_events() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        bus.notify(Notification::new("Request failed"));
        bus.emit(ClientEvent::SessionInvalidated {
            login_path: "/login".to_string(),
        });

        assert_eq!(
            rx.recv().await.unwrap(),
            ClientEvent::Notify(Notification::new("Request failed"))
        );
        assert_eq!(
            rx.recv().await.unwrap(),
            ClientEvent::SessionInvalidated {
                login_path: "/login".to_string()
            }
        );
    }
}
