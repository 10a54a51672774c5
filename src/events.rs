//! Publish-on-mutation notifications.
//!
//! Every mutation of the catalog, an attachment, or an export publishes one
//! [`AppEvent`] to whoever is subscribed at that moment. Late subscribers do
//! not see earlier events.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use tokio::sync::broadcast;
use tracing::debug;

const DEFAULT_CAPACITY: usize = 64;

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppEvent {
    /// A catalog fetch completed and replaced the session catalog.
    CatalogLoaded { count: usize },
    /// An attachment was stored (`timestamp` set) or removed (`None`).
    AttachmentChanged {
        name: String,
        timestamp: Option<DateTime<Utc>>,
    },
    /// A report was written to `path`.
    ReportExported { pages: usize, path: PathBuf },
}

impl AppEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CatalogLoaded { .. } => "catalog_loaded",
            Self::AttachmentChanged { .. } => "attachment_changed",
            Self::ReportExported { .. } => "report_exported",
        }
    }
}

#[derive(Clone, Debug)]
pub struct EventBus {
    sender: broadcast::Sender<AppEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.sender.subscribe()
    }

    /// Deliver `event` to current subscribers and return how many there were.
    pub fn publish(&self, event: AppEvent) -> usize {
        let kind = event.kind();
        match self.sender.send(event) {
            Ok(receivers) => receivers,
            Err(_) => {
                debug!("no subscribers for {} event", kind);
                0
            }
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn only_current_subscribers_receive_events() {
        let bus = EventBus::default();
        assert_eq!(bus.publish(AppEvent::CatalogLoaded { count: 1 }), 0);

        let mut rx = bus.subscribe();
        let delivered = bus.publish(AppEvent::AttachmentChanged {
            name: "Apple".into(),
            timestamp: None,
        });

        assert_eq!(delivered, 1);
        assert_eq!(
            rx.recv().await.unwrap(),
            AppEvent::AttachmentChanged {
                name: "Apple".into(),
                timestamp: None,
            }
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn events_serialize_with_a_type_tag() {
        let json = serde_json::to_value(AppEvent::CatalogLoaded { count: 3 }).unwrap();
        assert_eq!(json, serde_json::json!({"type": "catalog_loaded", "count": 3}));
    }
}
