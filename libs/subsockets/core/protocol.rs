//! Wire protocol messages
//!
//! JSON objects over the persistent message-oriented connection, tagged by
//! `type` and correlated (where applicable) by a caller-chosen subscription
//! id. The client only ever sends `connection_init`, `start` and `stop`;
//! everything else flows server to client.

use crate::traits::Headers;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Messages sent by the client
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Opens the handshake; must be acknowledged before subscription traffic
    ConnectionInit,
    /// Registers a subscription with the server
    Start { id: String, payload: StartPayload },
    /// Tears down one acknowledged subscription
    Stop { id: String },
}

/// Payload of a start message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartPayload {
    /// Serialized subscription body (`{ query, variables }` as a JSON string)
    pub data: String,
    pub extensions: StartExtensions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartExtensions {
    /// Authorization header set produced by the auth strategy
    pub authorization: Headers,
}

/// Messages received from the server
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Handshake acknowledgment, may carry a negotiated keep-alive interval
    ConnectionAck {
        #[serde(default)]
        payload: Option<AckPayload>,
    },
    /// Handshake or connection-level rejection
    ConnectionError {
        #[serde(default)]
        payload: Option<Value>,
    },
    /// Start acknowledgment for one subscription
    StartAck { id: String },
    /// Data for one subscription
    Data { id: String, payload: Value },
    /// Keep-alive liveness signal
    #[serde(rename = "ka")]
    KeepAlive,
    /// Subscription-level error; connection-level when the id is absent
    Error {
        #[serde(default)]
        id: Option<String>,
        #[serde(default)]
        payload: Option<Value>,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct AckPayload {
    #[serde(rename = "connectionTimeoutMs", default)]
    pub connection_timeout_ms: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn test_connection_init_shape() {
        let text = serde_json::to_string(&ClientMessage::ConnectionInit).unwrap();
        assert_eq!(text, r#"{"type":"connection_init"}"#);
    }

    #[test]
    fn test_start_message_shape() {
        let mut authorization = HashMap::new();
        authorization.insert("host".to_string(), "api.example.com".to_string());
        let msg = ClientMessage::Start {
            id: "s1".to_string(),
            payload: StartPayload {
                data: r#"{"query":"{onCreate}","variables":{}}"#.to_string(),
                extensions: StartExtensions { authorization },
            },
        };

        let value: Value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "start");
        assert_eq!(value["id"], "s1");
        assert_eq!(
            value["payload"]["extensions"]["authorization"]["host"],
            "api.example.com"
        );
        assert!(value["payload"]["data"].is_string());
    }

    #[test]
    fn test_parse_connection_ack_with_timeout() {
        let msg: ServerMessage = serde_json::from_str(
            r#"{"type":"connection_ack","payload":{"connectionTimeoutMs":1000}}"#,
        )
        .unwrap();
        match msg {
            ServerMessage::ConnectionAck { payload } => {
                assert_eq!(payload.unwrap().connection_timeout_ms, Some(1000));
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_parse_keep_alive() {
        let msg: ServerMessage = serde_json::from_str(r#"{"type":"ka"}"#).unwrap();
        assert!(matches!(msg, ServerMessage::KeepAlive));
    }

    #[test]
    fn test_parse_data() {
        let msg: ServerMessage =
            serde_json::from_str(r#"{"type":"data","id":"s1","payload":{"data":{"n":1}}}"#)
                .unwrap();
        match msg {
            ServerMessage::Data { id, payload } => {
                assert_eq!(id, "s1");
                assert_eq!(payload, json!({"data": {"n": 1}}));
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_parse_error_without_id_is_connection_level() {
        let msg: ServerMessage =
            serde_json::from_str(r#"{"type":"error","payload":{"errors":[]}}"#).unwrap();
        match msg {
            ServerMessage::Error { id, .. } => assert!(id.is_none()),
            other => panic!("unexpected message: {:?}", other),
        }
    }
}
