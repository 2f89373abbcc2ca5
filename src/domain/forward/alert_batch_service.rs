use tracing::{error, info, info_span, Instrument, Span};

use crate::api::dto::alertmanager_dto::{Alert, WebhookPayload};
use crate::domain::lifecycle::LifecycleDispatcher;

/// How a webhook batch was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome {
    /// No alerts in the payload.
    Empty,
    Delivered,
    Failed,
    /// Handed to a background task.
    Accepted,
}

/// Forwards every alert of a batch, one at a time and in payload order.
#[derive(Clone)]
pub struct AlertForwarder {
    dispatcher: LifecycleDispatcher,
    asynchronous: bool,
}

impl AlertForwarder {
    pub fn new(dispatcher: LifecycleDispatcher, asynchronous: bool) -> Self {
        Self {
            dispatcher,
            asynchronous,
        }
    }

    pub async fn handle_batch(&self, payload: WebhookPayload) -> BatchOutcome {
        if payload.alerts.is_empty() {
            info!(receiver = %payload.receiver, "no alerts in payload");
            return BatchOutcome::Empty;
        }

        info!(
            receiver = %payload.receiver,
            status = %payload.status,
            alerts = payload.alerts.len(),
            "forwarding alerts"
        );

        if self.asynchronous {
            let forwarder = self.clone();
            tokio::spawn(
                async move {
                    forwarder.forward_alerts(&payload.alerts).await;
                }
                .instrument(Span::current()),
            );
            return BatchOutcome::Accepted;
        }

        if self.forward_alerts(&payload.alerts).await {
            BatchOutcome::Delivered
        } else {
            BatchOutcome::Failed
        }
    }

    /// `true` only if every alert was delivered. A failure never stops the
    /// remaining alerts.
    pub async fn forward_alerts(&self, alerts: &[Alert]) -> bool {
        let mut all_delivered = true;

        for alert in alerts {
            let span = info_span!("alert", alert_fingerprint = %alert.fingerprint);
            if let Err(e) = self.dispatcher.dispatch(alert).instrument(span.clone()).await {
                span.in_scope(|| error!(error = %e, "failed to forward alert"));
                all_delivered = false;
            }
        }

        all_delivered
    }
}
