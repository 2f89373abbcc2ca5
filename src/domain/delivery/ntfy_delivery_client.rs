use std::time::Duration;

use async_trait::async_trait;
use http::header::AUTHORIZATION;
use reqwest::Client;
use tracing::debug;

use super::{DeliveryError, NotificationTransport, RelayRequest};
use crate::config::NtfyAuth;

/// Credentials attached to every relay request.
#[derive(Clone, Default, PartialEq, Eq)]
pub enum RelayAuth {
    #[default]
    None,
    Basic { username: String, password: String },
    Bearer(String),
}

impl RelayAuth {
    /// Basic auth wins when both a username/password pair and a token are set.
    pub fn from_config(auth: Option<&NtfyAuth>) -> Self {
        let Some(auth) = auth else {
            return Self::None;
        };

        if !auth.username.is_empty() && !auth.password.is_empty() {
            Self::Basic {
                username: auth.username.clone(),
                password: auth.password.clone(),
            }
        } else if !auth.token.is_empty() {
            Self::Bearer(auth.token.clone())
        } else {
            Self::None
        }
    }
}

impl std::fmt::Debug for RelayAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Basic { username, .. } => write!(f, "Basic({username}, <redacted>)"),
            Self::Bearer(_) => f.write_str("Bearer(<redacted>)"),
        }
    }
}

pub struct NtfyDeliveryClient {
    client: Client,
    auth: RelayAuth,
}

impl Default for NtfyDeliveryClient {
    fn default() -> Self {
        Self {
            client: Client::new(),
            auth: RelayAuth::None,
        }
    }
}

impl NtfyDeliveryClient {
    pub fn new(client: Client, auth: RelayAuth) -> Self {
        Self { client, auth }
    }

    /// Shared client with a per-request timeout.
    pub fn with_timeout(timeout: Duration, auth: RelayAuth) -> Result<Self, DeliveryError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::new(client, auth))
    }
}

#[async_trait]
impl NotificationTransport for NtfyDeliveryClient {
    async fn send(&self, request: RelayRequest) -> Result<(), DeliveryError> {
        let RelayRequest {
            method,
            url,
            body,
            headers,
        } = request;

        let mut logged_headers = headers.clone();
        if logged_headers.contains_key(AUTHORIZATION) || self.auth != RelayAuth::None {
            logged_headers.insert(AUTHORIZATION, http::HeaderValue::from_static("<redacted>"));
        }
        debug!(%method, %url, headers = ?logged_headers, body = body.as_deref().unwrap_or(""), "sending relay request");

        let mut builder = self.client.request(method, url).headers(headers);
        builder = match &self.auth {
            RelayAuth::None => builder,
            RelayAuth::Basic { username, password } => builder.basic_auth(username, Some(password)),
            RelayAuth::Bearer(token) => builder.bearer_auth(token),
        };
        if let Some(body) = body {
            builder = builder.body(body);
        }

        let resp = builder.send().await?;
        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        debug!(status_code = status.as_u16(), body = %text, "relay responded");

        if status.is_success() {
            return Ok(());
        }

        Err(DeliveryError::Status {
            code: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("unknown").to_string(),
        })
    }
}
