//! JSON text frames exchanged over `/ws`.

use medicare_core::Topic;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Identity a client presents over the socket
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RealtimeCredentials {
    pub id: String,
    #[serde(rename = "sessionKey")]
    pub session_key: String,
}

/// Client → server
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    Credentials { credentials: RealtimeCredentials },
    Subscribe { page: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClientFrame {
    Known(ClientMessage),
    /// Anything else, kept for logging. Non-JSON text arrives as `{"message": raw}`.
    Unknown(Value),
}

pub fn parse_client_frame(raw: &str) -> ClientFrame {
    let value = match serde_json::from_str::<Value>(raw) {
        Ok(value) => value,
        Err(_) => return ClientFrame::Unknown(json!({ "message": raw })),
    };
    match ClientMessage::deserialize(&value) {
        Ok(message) => ClientFrame::Known(message),
        Err(_) => ClientFrame::Unknown(value),
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NoticeKind {
    /// The resource changed; re-fetch it
    Refresh,
    /// The resource was deleted; navigate away
    Redirect,
}

/// Server → client
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerMessage {
    #[serde(rename = "type")]
    pub kind: NoticeKind,
    pub from: Topic,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_frame() {
        let frame = parse_client_frame(
            r#"{"type":"credentials","credentials":{"id":"u1","sessionKey":"tok-A"}}"#,
        );
        assert_eq!(
            frame,
            ClientFrame::Known(ClientMessage::Credentials {
                credentials: RealtimeCredentials {
                    id: "u1".to_string(),
                    session_key: "tok-A".to_string(),
                },
            })
        );
    }

    #[test]
    fn test_subscribe_frame() {
        let frame = parse_client_frame(r#"{"type":"subscribe","page":"patients/p1"}"#);
        assert_eq!(
            frame,
            ClientFrame::Known(ClientMessage::Subscribe {
                page: "patients/p1".to_string(),
            })
        );
    }

    #[test]
    fn test_non_json_is_wrapped() {
        assert_eq!(
            parse_client_frame("hello there"),
            ClientFrame::Unknown(json!({ "message": "hello there" }))
        );
    }

    #[test]
    fn test_unknown_json_kept() {
        let frame = parse_client_frame(r#"{"type":"ping"}"#);
        assert_eq!(frame, ClientFrame::Unknown(json!({ "type": "ping" })));

        // Credentials without a session key are not a credentials frame
        let frame = parse_client_frame(r#"{"type":"credentials","credentials":{"id":"u1"}}"#);
        assert!(matches!(frame, ClientFrame::Unknown(_)));
    }

    #[test]
    fn test_server_message_shape() {
        let message = ServerMessage {
            kind: NoticeKind::Redirect,
            from: Topic::patient("p1"),
        };
        assert_eq!(
            serde_json::to_string(&message).unwrap(),
            r#"{"type":"redirect","from":"patients/p1"}"#
        );
    }
}
