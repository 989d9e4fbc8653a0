//! Daily / standup / weekly / monthly / custom summaries.

use std::sync::Arc;

use async_trait::async_trait;

use super::{HostContext, MessageHandler};
use crate::error::Result;
use crate::protocol::{InboundMessage, OutboundMessage, PushSender};

const TYPES: &[&str] = &["getSummary"];

pub struct SummaryHandler {
    ctx: Arc<HostContext>,
}

impl SummaryHandler {
    pub fn new(ctx: Arc<HostContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl MessageHandler for SummaryHandler {
    fn name(&self) -> &'static str {
        "summaries"
    }

    fn handled_types(&self) -> &'static [&'static str] {
        TYPES
    }

    async fn handle(&self, message: &InboundMessage, push: &PushSender) -> Result<bool> {
        let InboundMessage::GetSummary(request) = message else {
            return Ok(false);
        };
        let progress = |progress: u8, message: &str| {
            push.send(OutboundMessage::LoadingProgress {
                progress,
                message: message.to_string(),
            })
        };
        match self.ctx.summaries.generate(request, &progress).await {
            Ok(data) => push.send(OutboundMessage::SummaryData(data)),
            Err(e) => push.error("Failed to generate summary", &e),
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::testing::{context, drain};
    use crate::host::HostCapabilities;
    use crate::summary::{SummaryKind, SummaryRequest};

    #[tokio::test]
    async fn test_progress_then_data() {
        let ctx = context(HostCapabilities::in_memory(), None).await;
        let handler = SummaryHandler::new(ctx);
        let (push, mut rx) = crate::handlers::testing::push();

        let msg = InboundMessage::GetSummary(SummaryRequest {
            kind: SummaryKind::Standup,
            ..Default::default()
        });
        assert!(handler.handle(&msg, &push).await.unwrap());

        let out = drain(&mut rx);
        let milestones: Vec<u8> = out
            .iter()
            .filter_map(|m| match m {
                OutboundMessage::LoadingProgress { progress, .. } => Some(*progress),
                _ => None,
            })
            .collect();
        assert_eq!(milestones, vec![20, 40, 60, 80, 100]);
        match out.last() {
            Some(OutboundMessage::SummaryData(data)) => {
                assert_eq!(data.total_sessions, 0);
                assert!(!data.ai_generated);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_custom_without_dates_is_an_error_push() {
        let ctx = context(HostCapabilities::in_memory(), None).await;
        let handler = SummaryHandler::new(ctx);
        let (push, mut rx) = crate::handlers::testing::push();

        let msg = InboundMessage::GetSummary(SummaryRequest {
            kind: SummaryKind::Custom,
            ..Default::default()
        });
        handler.handle(&msg, &push).await.unwrap();
        assert!(matches!(
            drain(&mut rx).last(),
            Some(OutboundMessage::Error(e)) if e.message == "Failed to generate summary"
        ));
    }
}
