//! Inbound message router
//!
//! Parses raw webview messages once and hands each to the first registered
//! handler that claims it. Handler failures become `error` pushes; the
//! router itself never fails.

use std::sync::Arc;

use serde_json::Value;

use crate::error::Error;
use crate::handlers::{default_handlers, HostContext, MessageHandler};
use crate::protocol::{parse_inbound, parse_line, InboundMessage, ProtocolError, PushSender};

pub struct Router {
    handlers: Vec<Arc<dyn MessageHandler>>,
    push: PushSender,
}

impl Router {
    pub fn new(push: PushSender) -> Self {
        Self {
            handlers: Vec::new(),
            push,
        }
    }

    /// Router with every built-in handler registered.
    pub fn with_default_handlers(ctx: Arc<HostContext>, push: PushSender) -> Self {
        let mut router = Self::new(push);
        for handler in default_handlers(ctx) {
            router.register(handler);
        }
        router
    }

    /// Later registrations are asked after earlier ones.
    pub fn register(&mut self, handler: Arc<dyn MessageHandler>) {
        tracing::debug!(handler = handler.name(), "Registered message handler");
        self.handlers.push(handler);
    }

    pub fn push(&self) -> &PushSender {
        &self.push
    }

    /// Returns whether any handler claimed the message.
    pub async fn dispatch(&self, message: InboundMessage) -> bool {
        let kind = message.kind();
        for handler in self.handlers.iter().filter(|h| h.can_handle(&message)) {
            tracing::debug!(kind, handler = handler.name(), "Dispatching message");
            match handler.handle(&message, &self.push).await {
                Ok(true) => return true,
                Ok(false) => continue,
                Err(e) => {
                    self.push.error(&format!("Failed to handle {}", kind), &e);
                    return true;
                }
            }
        }
        tracing::warn!(kind, "No handler for message");
        false
    }

    pub async fn dispatch_value(&self, raw: Value) -> bool {
        match parse_inbound(raw) {
            Ok(message) => self.dispatch(message).await,
            Err(e) => {
                self.reject(e);
                false
            }
        }
    }

    /// One newline-delimited JSON message.
    pub async fn dispatch_line(&self, line: &str) -> bool {
        match parse_line(line) {
            Ok(message) => self.dispatch(message).await,
            Err(e) => {
                self.reject(e);
                false
            }
        }
    }

    fn reject(&self, error: ProtocolError) {
        match error {
            ProtocolError::InvalidPayload { kind, source } => {
                let error = Error::InvalidInput(source.to_string());
                self.push.error(&format!("Invalid {} message", kind), &error);
            }
            other => tracing::warn!(error = %other, "Dropping unrecognized message"),
        }
    }
}
