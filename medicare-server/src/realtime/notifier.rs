use medicare_core::Topic;

use super::protocol::{NoticeKind, ServerMessage};
use super::registry::ConnectionRegistry;

/// A change signal for one topic
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub topic: Topic,
    pub kind: NoticeKind,
    /// Session key of the actor that caused the change
    pub causing_session: Option<String>,
}

impl Notice {
    pub fn refresh(topic: Topic) -> Self {
        Self {
            topic,
            kind: NoticeKind::Refresh,
            causing_session: None,
        }
    }

    pub fn redirect(topic: Topic) -> Self {
        Self {
            topic,
            kind: NoticeKind::Redirect,
            causing_session: None,
        }
    }

    pub fn caused_by(mut self, session_key: Option<&str>) -> Self {
        self.causing_session = session_key.map(str::to_string);
        self
    }
}

/// Outcome of one fan-out
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    pub delivered: usize,
    /// Connections held by the causing session
    pub skipped: usize,
    /// Outboxes already closed
    pub failed: usize,
}

/// Push `{type, from}` to every subscriber of the topic except the causing session.
pub fn fan_out(registry: &ConnectionRegistry, notice: &Notice) -> Delivery {
    let mut delivery = Delivery::default();

    let message = ServerMessage {
        kind: notice.kind,
        from: notice.topic.clone(),
    };
    let payload = match serde_json::to_string(&message) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::error!(topic = %notice.topic, "Failed to encode notice: {}", e);
            return delivery;
        }
    };

    for connection in registry.find_by_topic(&notice.topic) {
        if notice.causing_session.as_deref() == Some(connection.credentials.session_key.as_str()) {
            delivery.skipped += 1;
            continue;
        }

        if connection.outbox.send(payload.clone()).is_ok() {
            delivery.delivered += 1;
        } else {
            delivery.failed += 1;
            tracing::debug!(
                socket = %connection.socket,
                topic = %notice.topic,
                "Dropped notice for closed socket"
            );
        }
    }

    delivery
}
