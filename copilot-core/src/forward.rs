//! State-event forwarding
//!
//! Relays every session-state event to the webview and turns goal events
//! into their dedicated pushes. Session-count changes drop the cached sync
//! status, and ended sessions release their goal-prompt state.

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::handlers::HostContext;
use crate::protocol::outbound::{GoalInferencePush, GoalProgressPush};
use crate::protocol::{OutboundMessage, PushSender};
use crate::session::StateEvent;

/// Pushes produced by one state event, in send order.
pub fn pushes_for(event: &StateEvent) -> Vec<OutboundMessage> {
    let mut out = vec![OutboundMessage::SessionEvent(event.clone())];
    match event {
        StateEvent::GoalProgressAnalyzed { session_id, analysis } => {
            out.push(OutboundMessage::V2GoalProgressAnalysis(GoalProgressPush {
                session_id: session_id.clone(),
                analysis: analysis.clone(),
            }));
        }
        StateEvent::GoalInferred { session_id, inference } => {
            out.push(OutboundMessage::V2GoalInference(GoalInferencePush {
                session_id: Some(session_id.clone()),
                inference: inference.clone(),
            }));
        }
        _ => {}
    }
    out
}

/// Forward events until the bus closes.
pub fn spawn(ctx: Arc<HostContext>, push: PushSender) -> JoinHandle<()> {
    let mut events = ctx.sessions.events().subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    if event.changes_session_count() {
                        ctx.sync_cache.invalidate();
                    }
                    if let StateEvent::SessionEnded { session_id } = &event {
                        ctx.goals.session_closed(session_id).await;
                    }
                    for message in pushes_for(&event) {
                        push.send(message);
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Event forwarder fell behind, some state events were dropped");
                }
                Err(RecvError::Closed) => break,
            }
        }
        tracing::debug!("State event forwarder stopped");
    })
}
