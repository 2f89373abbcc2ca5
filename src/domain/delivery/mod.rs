//! Outbound requests to the notification relay.

pub mod ntfy_delivery_client;

use async_trait::async_trait;
use http::{HeaderMap, Method};
use reqwest::Url;
use thiserror::Error;

pub use ntfy_delivery_client::{NtfyDeliveryClient, RelayAuth};

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("request to relay failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("relay responded {code} {reason}")]
    Status { code: u16, reason: String },
}

/// One request against the relay. Clear and delete carry no body.
#[derive(Debug, Clone)]
pub struct RelayRequest {
    pub method: Method,
    pub url: Url,
    pub body: Option<String>,
    pub headers: HeaderMap,
}

impl RelayRequest {
    pub fn publish(url: Url, body: String, headers: HeaderMap) -> Self {
        Self {
            method: Method::POST,
            url,
            body: Some(body),
            headers,
        }
    }

    pub fn clear(mut url: Url) -> Self {
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("clear");
        }
        Self {
            method: Method::PUT,
            url,
            body: None,
            headers: HeaderMap::new(),
        }
    }

    pub fn delete(url: Url) -> Self {
        Self {
            method: Method::DELETE,
            url,
            body: None,
            headers: HeaderMap::new(),
        }
    }
}

#[async_trait]
pub trait NotificationTransport: Send + Sync {
    /// Issues the request once. Only a 2xx response counts as delivered.
    async fn send(&self, request: RelayRequest) -> Result<(), DeliveryError>;
}
