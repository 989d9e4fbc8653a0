//! # copilot-core
//!
//! Host-side core of the Prompt Copilot editor extension.
//!
//! This library provides:
//! - The webview message protocol and the router that dispatches it
//! - Session, project and prompt tracking with goal progress
//! - Prompt scoring and rewriting through pluggable LLM providers
//! - Work summaries and cloud sync of sanitized sessions
//! - Configuration, logging and a SQLite-backed store for the stdio host
//!
//! ## Architecture
//!
//! Everything the editor provides (storage, notifications, the chat panel)
//! sits behind the traits in [`host`]. A [`HostContext`] wires the services
//! once; the [`Router`] hands each inbound message to the handler that owns
//! it, and handlers answer through a [`protocol::PushSender`]. State changes
//! are broadcast as [`session::StateEvent`]s and relayed by [`forward`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use copilot_core::host::HostCapabilities;
//! use copilot_core::protocol::{ChannelWebview, PushSender};
//! use copilot_core::{Config, HostContext, Router};
//!
//! # async fn run() -> copilot_core::Result<()> {
//! let ctx = Arc::new(HostContext::builder(HostCapabilities::in_memory(), Config::default()).build().await?);
//! let (webview, mut pushes) = ChannelWebview::new();
//! let router = Router::with_default_handlers(ctx, PushSender::new(Arc::new(webview)));
//!
//! router.dispatch_line(r#"{"type": "v2GetSessionList"}"#).await;
//! let reply = pushes.recv().await;
//! # Ok(())
//! # }
//! ```

// Re-export commonly used items at the crate root
pub use config::Config;
pub use error::{Error, Result};
pub use handlers::HostContext;
pub use protocol::{InboundMessage, OutboundMessage};
pub use router::Router;

// Public modules
pub mod analysis;
pub mod config;
pub mod db;
pub mod error;
pub mod format;
pub mod forward;
pub mod goals;
pub mod handlers;
pub mod host;
pub mod llm;
pub mod logging;
pub mod persistence;
pub mod protocol;
pub mod router;
pub mod session;
pub mod settings;
pub mod summary;
pub mod sync;
pub mod types;

mod lock;
