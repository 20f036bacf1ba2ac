//! In-memory table of live realtime connections.
//!
//! Entries are removed only when their socket closes or when another
//! socket adopts them. Owned exclusively by the hub task.

use medicare_core::Topic;
use std::fmt;
use tokio::sync::mpsc;

use super::protocol::RealtimeCredentials;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SocketId(pub u64);

impl fmt::Display for SocketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ws-{}", self.0)
    }
}

/// Sender half of a socket's writer task
pub type Outbox = mpsc::UnboundedSender<String>;

#[derive(Debug)]
pub struct Connection {
    pub socket: SocketId,
    pub outbox: Outbox,
    pub credentials: RealtimeCredentials,
    /// Watched topic, empty until the first subscribe
    pub page: String,
}

/// What `on_credentials` did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// Same socket, credentials replaced
    Updated,
    /// Existing entry for the session key moved onto a new socket
    Adopted { previous: SocketId },
    Created,
}

#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: Vec<Connection>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_credentials(
        &mut self,
        socket: SocketId,
        outbox: Outbox,
        credentials: RealtimeCredentials,
    ) -> Registration {
        if let Some(connection) = self.connections.iter_mut().find(|c| c.socket == socket) {
            connection.credentials = credentials;
            return Registration::Updated;
        }

        if let Some(connection) = self
            .connections
            .iter_mut()
            .find(|c| c.credentials.session_key == credentials.session_key)
        {
            let previous = connection.socket;
            connection.socket = socket;
            connection.outbox = outbox;
            connection.credentials = credentials;
            return Registration::Adopted { previous };
        }

        self.connections.push(Connection {
            socket,
            outbox,
            credentials,
            page: String::new(),
        });
        Registration::Created
    }

    /// Set the watched topic. Returns false when the socket never sent credentials.
    pub fn on_subscribe(&mut self, socket: SocketId, page: String) -> bool {
        match self.connections.iter_mut().find(|c| c.socket == socket) {
            Some(connection) => {
                connection.page = page;
                true
            }
            None => false,
        }
    }

    /// Drop the entry owning `socket`, if any.
    pub fn on_close(&mut self, socket: SocketId) -> bool {
        let before = self.connections.len();
        self.connections.retain(|c| c.socket != socket);
        self.connections.len() != before
    }

    pub fn find_by_topic<'a>(&'a self, topic: &'a Topic) -> impl Iterator<Item = &'a Connection> + 'a {
        self.connections
            .iter()
            .filter(move |c| *topic == *c.page.as_str())
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Distinct account ids with a live connection, in registration order.
    pub fn account_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = Vec::new();
        for connection in &self.connections {
            if !ids.contains(&connection.credentials.id) {
                ids.push(connection.credentials.id.clone());
            }
        }
        ids
    }
}
