//! Realtime change notifications over WebSocket.
//!
//! One hub task owns the connection registry. Sockets and HTTP handlers
//! talk to it only through `HubCommand`s, so registry updates and fan-out
//! are applied strictly in arrival order.

pub mod notifier;
pub mod protocol;
pub mod registry;
pub mod socket;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

pub use notifier::{fan_out, Delivery, Notice};
pub use protocol::{NoticeKind, RealtimeCredentials};
pub use registry::{ConnectionRegistry, Outbox, Registration, SocketId};

enum HubCommand {
    Credentials {
        socket: SocketId,
        outbox: Outbox,
        credentials: RealtimeCredentials,
    },
    Subscribe {
        socket: SocketId,
        page: String,
    },
    Close {
        socket: SocketId,
    },
    Notify(Notice),
    ConnectionCount(oneshot::Sender<usize>),
    AccountIds(oneshot::Sender<Vec<String>>),
}

/// Handle to the hub task. Cheap to clone.
#[derive(Clone)]
pub struct RealtimeHub {
    commands: mpsc::UnboundedSender<HubCommand>,
    next_socket: Arc<AtomicU64>,
}

impl RealtimeHub {
    /// Start the hub task on the current runtime.
    pub fn spawn() -> Self {
        let (commands, rx) = mpsc::unbounded_channel();
        tokio::spawn(run(ConnectionRegistry::new(), rx));
        Self {
            commands,
            next_socket: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn next_socket_id(&self) -> SocketId {
        SocketId(self.next_socket.fetch_add(1, Ordering::Relaxed))
    }

    pub fn credentials(&self, socket: SocketId, outbox: Outbox, credentials: RealtimeCredentials) {
        self.send(HubCommand::Credentials {
            socket,
            outbox,
            credentials,
        });
    }

    pub fn subscribe(&self, socket: SocketId, page: String) {
        self.send(HubCommand::Subscribe { socket, page });
    }

    pub fn close(&self, socket: SocketId) {
        self.send(HubCommand::Close { socket });
    }

    /// Fire-and-forget: enqueue the notice and return.
    pub fn notify(&self, notice: Notice) {
        self.send(HubCommand::Notify(notice));
    }

    pub async fn connection_count(&self) -> usize {
        let (tx, rx) = oneshot::channel();
        self.send(HubCommand::ConnectionCount(tx));
        rx.await.unwrap_or(0)
    }

    /// Distinct account ids holding at least one live connection
    pub async fn active_account_ids(&self) -> Vec<String> {
        let (tx, rx) = oneshot::channel();
        self.send(HubCommand::AccountIds(tx));
        rx.await.unwrap_or_default()
    }

    fn send(&self, command: HubCommand) {
        if self.commands.send(command).is_err() {
            tracing::error!("Realtime hub is not running");
        }
    }
}

async fn run(mut registry: ConnectionRegistry, mut rx: mpsc::UnboundedReceiver<HubCommand>) {
    while let Some(command) = rx.recv().await {
        match command {
            HubCommand::Credentials {
                socket,
                outbox,
                credentials,
            } => {
                let account = credentials.id.clone();
                let registration = registry.on_credentials(socket, outbox, credentials);
                tracing::info!(
                    socket = %socket,
                    account = %account,
                    registration = ?registration,
                    connections = registry.len(),
                    "Realtime credentials"
                );
            }
            HubCommand::Subscribe { socket, page } => {
                if registry.on_subscribe(socket, page.clone()) {
                    tracing::debug!(socket = %socket, topic = %page, "Subscribed");
                } else {
                    tracing::warn!(
                        socket = %socket,
                        topic = %page,
                        "Subscribe before credentials ignored"
                    );
                }
            }
            HubCommand::Close { socket } => {
                if registry.on_close(socket) {
                    tracing::info!(socket = %socket, connections = registry.len(), "Connection removed");
                }
            }
            HubCommand::Notify(notice) => {
                let delivery = fan_out(&registry, &notice);
                tracing::debug!(
                    topic = %notice.topic,
                    kind = ?notice.kind,
                    delivered = delivery.delivered,
                    skipped = delivery.skipped,
                    failed = delivery.failed,
                    "Notice fanned out"
                );
            }
            HubCommand::ConnectionCount(reply) => {
                let _ = reply.send(registry.len());
            }
            HubCommand::AccountIds(reply) => {
                let _ = reply.send(registry.account_ids());
            }
        }
    }
    tracing::debug!("Realtime hub stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use medicare_core::Topic;

    fn credentials(id: &str, key: &str) -> RealtimeCredentials {
        RealtimeCredentials {
            id: id.to_string(),
            session_key: key.to_string(),
        }
    }

    #[tokio::test]
    async fn test_socket_ids_are_unique() {
        let hub = RealtimeHub::spawn();
        let a = hub.next_socket_id();
        let b = hub.clone().next_socket_id();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_commands_apply_in_order() {
        let hub = RealtimeHub::spawn();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        let a = hub.next_socket_id();
        let b = hub.next_socket_id();

        hub.credentials(a, tx_a, credentials("u1", "tok-A"));
        hub.subscribe(a, "appointments".to_string());
        hub.credentials(b, tx_b, credentials("s1", "tok-B"));
        hub.subscribe(b, "appointments".to_string());
        hub.notify(Notice::refresh(Topic::appointments()).caused_by(Some("tok-A")));

        // Queries queue behind the notice, so it has been fanned out by now
        assert_eq!(hub.connection_count().await, 2);
        assert_eq!(
            rx_b.try_recv().unwrap(),
            r#"{"type":"refresh","from":"appointments"}"#
        );
        assert!(rx_a.try_recv().is_err());

        hub.close(a);
        assert_eq!(hub.connection_count().await, 1);
        assert_eq!(hub.active_account_ids().await, vec!["s1"]);
    }

    #[tokio::test]
    async fn test_reconnect_keeps_one_entry() {
        let hub = RealtimeHub::spawn();
        let (old_tx, _old_rx) = mpsc::unbounded_channel();
        let (new_tx, mut new_rx) = mpsc::unbounded_channel();
        let old = hub.next_socket_id();
        let new = hub.next_socket_id();

        hub.credentials(old, old_tx, credentials("u1", "tok-A"));
        hub.subscribe(old, "users/u1".to_string());
        hub.credentials(new, new_tx, credentials("u1", "tok-A"));
        hub.close(old);
        hub.notify(Notice::refresh(Topic::new("users/u1")));

        assert_eq!(hub.connection_count().await, 1);
        assert_eq!(
            new_rx.try_recv().unwrap(),
            r#"{"type":"refresh","from":"users/u1"}"#
        );
    }
}
