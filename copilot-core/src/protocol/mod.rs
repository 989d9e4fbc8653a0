//! Webview message protocol
//!
//! A closed tagged union in each direction. Inbound messages are parsed
//! once at the edge by [`parse_inbound`]; outbound messages go through a
//! [`PushSender`] to whatever [`Webview`] the host provides.

pub mod inbound;
pub mod outbound;

use std::sync::Arc;

use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::mpsc;

pub use inbound::InboundMessage;
pub use outbound::{ErrorPayload, OutboundMessage};

use crate::error::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("message is not valid JSON: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("message is not an object with a string `type`")]
    MissingType,

    #[error("unknown message type: {0}")]
    UnknownType(String),

    #[error("invalid `{kind}` payload: {source}")]
    InvalidPayload {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Validate a raw `{type, data}` value. Missing or null `data` becomes `{}`.
pub fn parse_inbound(raw: Value) -> Result<InboundMessage, ProtocolError> {
    let Value::Object(mut object) = raw else {
        return Err(ProtocolError::MissingType);
    };
    let kind = match object.remove("type") {
        Some(Value::String(kind)) => kind,
        _ => return Err(ProtocolError::MissingType),
    };
    let data = match object.remove("data") {
        None | Some(Value::Null) => Value::Object(Map::new()),
        Some(data) => data,
    };
    match InboundMessage::from_parts(&kind, data) {
        Ok(Some(message)) => Ok(message),
        Ok(None) => Err(ProtocolError::UnknownType(kind)),
        Err(source) => Err(ProtocolError::InvalidPayload { kind, source }),
    }
}

/// Parse one newline-delimited JSON line.
pub fn parse_line(line: &str) -> Result<InboundMessage, ProtocolError> {
    let raw: Value = serde_json::from_str(line).map_err(ProtocolError::Malformed)?;
    parse_inbound(raw)
}

/// Where push messages end up.
pub trait Webview: Send + Sync {
    fn post(&self, message: OutboundMessage);
}

/// Webview backed by an unbounded channel; the receiver drains it.
pub struct ChannelWebview {
    tx: mpsc::UnboundedSender<OutboundMessage>,
}

impl ChannelWebview {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<OutboundMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Webview for ChannelWebview {
    fn post(&self, message: OutboundMessage) {
        if self.tx.send(message).is_err() {
            tracing::debug!("Webview closed, dropping push message");
        }
    }
}

/// Typed `send` handed to every handler.
#[derive(Clone)]
pub struct PushSender {
    webview: Arc<dyn Webview>,
}

impl PushSender {
    pub fn new(webview: Arc<dyn Webview>) -> Self {
        Self { webview }
    }

    pub fn send(&self, message: OutboundMessage) {
        self.webview.post(message);
    }

    /// Push `error{message, error, suggestion}` for a failed operation.
    pub fn error(&self, message: &str, error: &Error) {
        tracing::warn!(error = %error, "{}", message);
        self.send(OutboundMessage::from_error(message, error));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_data_defaults_to_empty() {
        let msg = parse_inbound(json!({"type": "v2GetSessionList"})).unwrap();
        assert_eq!(msg.kind(), "v2GetSessionList");
        let msg = parse_inbound(json!({"type": "getProviders", "data": null})).unwrap();
        assert_eq!(msg.kind(), "getProviders");
    }

    #[test]
    fn test_rejects_bad_shapes() {
        assert!(matches!(parse_inbound(json!([1, 2])), Err(ProtocolError::MissingType)));
        assert!(matches!(parse_inbound(json!({"type": 3})), Err(ProtocolError::MissingType)));
        assert!(matches!(
            parse_inbound(json!({"type": "launchRockets"})),
            Err(ProtocolError::UnknownType(kind)) if kind == "launchRockets"
        ));
        assert!(matches!(
            parse_inbound(json!({"type": "v2SetGoal", "data": {"goal": 5}})),
            Err(ProtocolError::InvalidPayload { .. })
        ));
        assert!(matches!(parse_line("{not json"), Err(ProtocolError::Malformed(_))));
    }

    #[tokio::test]
    async fn test_channel_webview_preserves_order() {
        let (webview, mut rx) = ChannelWebview::new();
        let push = PushSender::new(Arc::new(webview));
        push.send(OutboundMessage::LoadingProgress {
            progress: 20,
            message: "a".to_string(),
        });
        push.send(OutboundMessage::LocalDataCleared);
        assert!(matches!(rx.recv().await, Some(OutboundMessage::LoadingProgress { progress: 20, .. })));
        assert_eq!(rx.recv().await, Some(OutboundMessage::LocalDataCleared));
    }
}
