use http::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Url;
use serde::Serialize;
use tracing::warn;

use super::TAG_SEPARATOR;
use crate::domain::delivery::RelayRequest;

pub const HEADER_TITLE: HeaderName = HeaderName::from_static("x-title");
pub const HEADER_TAGS: HeaderName = HeaderName::from_static("x-tags");
pub const HEADER_PRIORITY: HeaderName = HeaderName::from_static("x-priority");
pub const HEADER_ACTIONS: HeaderName = HeaderName::from_static("x-actions");

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NtfyAction {
    pub action: String,
    pub label: String,
    pub url: String,
}

/// Everything the relay needs to publish one alert.
#[derive(Debug, Clone)]
pub struct OutboundNotification {
    pub url: Url,
    pub topic: String,
    pub title: Option<String>,
    pub body: String,
    pub priority: Option<String>,
    pub tags: Vec<String>,
    /// Operator-configured headers, applied after the standard ones.
    pub headers: Vec<(HeaderName, HeaderValue)>,
    pub actions: Vec<NtfyAction>,
}

impl OutboundNotification {
    pub fn into_request(self) -> RelayRequest {
        let mut headers = HeaderMap::new();

        if let Some(title) = self.title.as_deref().filter(|t| !t.is_empty()) {
            set_header(&mut headers, HEADER_TITLE, title);
        }
        if !self.tags.is_empty() {
            set_header(&mut headers, HEADER_TAGS, &self.tags.join(&TAG_SEPARATOR.to_string()));
        }
        if let Some(priority) = self.priority.as_deref().filter(|p| !p.is_empty()) {
            set_header(&mut headers, HEADER_PRIORITY, priority);
        }
        if !self.actions.is_empty() {
            match serde_json::to_string(&self.actions) {
                Ok(encoded) => set_header(&mut headers, HEADER_ACTIONS, &encoded),
                Err(e) => warn!(error = %e, "failed to encode actions, skipping"),
            }
        }

        for (name, value) in self.headers {
            headers.insert(name, value);
        }

        RelayRequest::publish(self.url, self.body, headers)
    }
}

/// Header value with line breaks folded away.
pub fn header_value(raw: &str) -> Option<HeaderValue> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != '\n' && *c != '\r').collect();
    HeaderValue::from_bytes(cleaned.as_bytes()).ok()
}

fn set_header(headers: &mut HeaderMap, name: HeaderName, value: &str) {
    match header_value(value) {
        Some(v) => {
            headers.insert(name, v);
        }
        None => warn!(header = %name, "value is not a valid header, skipping"),
    }
}
