use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, Instrument, Span};

use crate::api::dto::alertmanager_dto::{Alert, AlertStatus};
use crate::domain::delivery::{NotificationTransport, RelayRequest};
use crate::domain::notification::{ForwardError, LifecyclePolicy, NotificationComposer};

/// Requests issued against the relay for one alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleAction {
    Update,
    /// Update now, clear once the delay has passed.
    UpdateThenClear(Duration),
    Delete,
}

/// Delete wins over clear when both are configured for resolved alerts.
pub fn classify(status: AlertStatus, policy: &LifecyclePolicy) -> LifecycleAction {
    match status {
        AlertStatus::Firing => LifecycleAction::Update,
        AlertStatus::Resolved if policy.delete_resolved => LifecycleAction::Delete,
        AlertStatus::Resolved if policy.clear_resolved => {
            LifecycleAction::UpdateThenClear(policy.clear_delay)
        }
        AlertStatus::Resolved => LifecycleAction::Update,
    }
}

#[derive(Clone)]
pub struct LifecycleDispatcher {
    composer: NotificationComposer,
    transport: Arc<dyn NotificationTransport>,
}

impl LifecycleDispatcher {
    pub fn new(composer: NotificationComposer, transport: Arc<dyn NotificationTransport>) -> Self {
        Self {
            composer,
            transport,
        }
    }

    /// Returns once the immediate request finishes. A scheduled clear is not
    /// awaited and only reports through logs.
    pub async fn dispatch(&self, alert: &Alert) -> Result<(), ForwardError> {
        let action = classify(alert.status, &self.composer.rules().lifecycle);
        debug!(?action, status = alert.status.as_code(), "dispatching alert");

        match action {
            LifecycleAction::Update => self.update(alert).await,
            LifecycleAction::Delete => {
                let url = self.composer.target_url(alert)?;
                self.transport.send(RelayRequest::delete(url)).await?;
                info!("deleted notification");
                Ok(())
            }
            LifecycleAction::UpdateThenClear(delay) => {
                self.update(alert).await?;
                let url = self.composer.target_url(alert)?;
                self.schedule_clear(RelayRequest::clear(url), delay);
                Ok(())
            }
        }
    }

    async fn update(&self, alert: &Alert) -> Result<(), ForwardError> {
        let notification = self.composer.compose(alert)?;
        let topic = notification.topic.clone();
        self.transport.send(notification.into_request()).await?;
        info!(%topic, "published notification");
        Ok(())
    }

    fn schedule_clear(&self, request: RelayRequest, delay: Duration) {
        let transport = Arc::clone(&self.transport);
        debug!(url = %request.url, ?delay, "scheduling clear");

        tokio::spawn(
            async move {
                tokio::time::sleep(delay).await;
                let url = request.url.clone();
                match transport.send(request).await {
                    Ok(()) => info!(%url, "cleared notification"),
                    Err(e) => error!(%url, error = %e, "failed to clear notification"),
                }
            }
            .instrument(Span::current()),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NtfyConfig;
    use crate::domain::delivery::NtfyDeliveryClient;
    use crate::domain::notification::NotificationRules;
    use std::time::Instant;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn policy(delete_resolved: bool, clear_resolved: bool) -> LifecyclePolicy {
        LifecyclePolicy {
            delete_resolved,
            clear_resolved,
            clear_delay: Duration::from_secs(5),
            ..LifecyclePolicy::default()
        }
    }

    #[test]
    fn classification_table() {
        let delay = Duration::from_secs(5);
        let cases = [
            (AlertStatus::Firing, false, false, LifecycleAction::Update),
            (AlertStatus::Firing, true, true, LifecycleAction::Update),
            (AlertStatus::Resolved, true, false, LifecycleAction::Delete),
            (AlertStatus::Resolved, true, true, LifecycleAction::Delete),
            (AlertStatus::Resolved, false, true, LifecycleAction::UpdateThenClear(delay)),
            (AlertStatus::Resolved, false, false, LifecycleAction::Update),
        ];

        for (status, delete, clear, expected) in cases {
            assert_eq!(classify(status, &policy(delete, clear)), expected, "{status:?} {delete} {clear}");
        }
    }

    fn dispatcher(server: &MockServer, configure: impl FnOnce(&mut NtfyConfig)) -> LifecycleDispatcher {
        let mut cfg = NtfyConfig::default();
        cfg.baseurl = server.uri();
        cfg.notification.topic = "alerts".into();
        cfg.update_existing_notification = true;
        configure(&mut cfg);

        let rules = Arc::new(NotificationRules::compile(&cfg).unwrap());
        LifecycleDispatcher::new(NotificationComposer::new(rules), Arc::new(NtfyDeliveryClient::default()))
    }

    fn resolved() -> Alert {
        Alert {
            status: AlertStatus::Resolved,
            fingerprint: "c0ffee".into(),
            labels: [("alertname".to_string(), "HighLatency".to_string())].into(),
            ..Alert::default()
        }
    }

    #[tokio::test]
    async fn resolved_with_delete_only_deletes() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/alerts/c0ffee"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let d = dispatcher(&server, |c| {
            c.delete_resolved_notification = true;
            c.clear_resolved_notification = true;
        });
        d.dispatch(&resolved()).await.unwrap();
    }

    #[tokio::test]
    async fn resolved_with_clear_updates_then_clears_after_delay() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/alerts/c0ffee"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/alerts/c0ffee/clear"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let d = dispatcher(&server, |c| {
            c.clear_resolved_notification = true;
            c.clear_delay = Duration::from_millis(300);
        });

        let started = Instant::now();
        d.dispatch(&resolved()).await.unwrap();
        assert!(started.elapsed() < Duration::from_millis(300));

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method.as_str(), "POST");

        tokio::time::sleep(Duration::from_millis(800)).await;
        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].method.as_str(), "PUT");
        assert!(requests[1].body.is_empty());
    }

    #[tokio::test]
    async fn failed_update_skips_clear() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let d = dispatcher(&server, |c| {
            c.clear_resolved_notification = true;
            c.clear_delay = Duration::from_millis(50);
        });

        let err = d.dispatch(&resolved()).await.unwrap_err();
        assert!(matches!(err, ForwardError::Delivery(_)));
        tokio::time::sleep(Duration::from_millis(200)).await;
    }

    #[tokio::test]
    async fn firing_publishes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/alerts/c0ffee"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let d = dispatcher(&server, |c| c.delete_resolved_notification = true);
        let alert = Alert {
            status: AlertStatus::Firing,
            ..resolved()
        };
        d.dispatch(&alert).await.unwrap();
    }
}
