use std::sync::Arc;

use crate::config::{BasicAuth, Config};
use crate::domain::delivery::{DeliveryError, NotificationTransport, NtfyDeliveryClient, RelayAuth};
use crate::domain::forward::AlertForwarder;
use crate::domain::lifecycle::LifecycleDispatcher;
use crate::domain::notification::{NotificationComposer, NotificationRules};

#[derive(Clone)]
pub struct AppState {
    pub alert_forwarder: Arc<AlertForwarder>,
    /// `None` leaves the webhook open.
    pub hook_auth: Option<Arc<BasicAuth>>,
}

pub fn build_app_state(config: &Config, rules: Arc<NotificationRules>) -> Result<AppState, DeliveryError> {
    let transport = NtfyDeliveryClient::with_timeout(
        config.ntfy.timeout,
        RelayAuth::from_config(config.ntfy.auth.as_ref()),
    )?;

    Ok(build_app_state_with(config, rules, Arc::new(transport)))
}

pub fn build_app_state_with(
    config: &Config,
    rules: Arc<NotificationRules>,
    transport: Arc<dyn NotificationTransport>,
) -> AppState {
    let dispatcher = LifecycleDispatcher::new(NotificationComposer::new(rules), transport);

    AppState {
        alert_forwarder: Arc::new(AlertForwarder::new(dispatcher, config.ntfy.asynchronous)),
        hook_auth: config.http.basic_auth().cloned().map(Arc::new),
    }
}
