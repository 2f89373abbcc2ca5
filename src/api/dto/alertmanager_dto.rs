//! Alertmanager webhook payload DTOs

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use serde_with::{serde_as, DefaultOnNull};

/// Alert status as reported by Alertmanager.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    #[default]
    Firing,
    Resolved,
}

impl AlertStatus {
    pub fn as_code(&self) -> &'static str {
        match self {
            Self::Firing => "firing",
            Self::Resolved => "resolved",
        }
    }
}

/// One alert of a webhook notification.
#[serde_as]
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Alert {
    pub status: AlertStatus,
    #[serde_as(as = "DefaultOnNull")]
    pub labels: BTreeMap<String, String>,
    #[serde_as(as = "DefaultOnNull")]
    pub annotations: BTreeMap<String, String>,
    #[serde(rename = "startsAt")]
    pub starts_at: DateTime<Utc>,
    #[serde(rename = "endsAt")]
    pub ends_at: DateTime<Utc>,
    #[serde(rename = "generatorURL")]
    pub generator_url: String,
    pub fingerprint: String,
}

impl Alert {
    /// Flattens the alert into the field map observed by expressions and templates.
    pub fn fields(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}

/// Body of an Alertmanager webhook request.
#[serde_as]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookPayload {
    pub receiver: String,
    pub status: String,
    #[serde_as(as = "DefaultOnNull")]
    pub alerts: Vec<Alert>,
    #[serde(rename = "groupLabels")]
    #[serde_as(as = "DefaultOnNull")]
    pub group_labels: BTreeMap<String, String>,
    #[serde(rename = "commonLabels")]
    #[serde_as(as = "DefaultOnNull")]
    pub common_labels: BTreeMap<String, String>,
    #[serde(rename = "commonAnnotations")]
    #[serde_as(as = "DefaultOnNull")]
    pub common_annotations: BTreeMap<String, String>,
    #[serde(rename = "externalURL")]
    pub external_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAYLOAD: &str = r#"{
  "version": "4",
  "groupKey": "{}:{alertname=\"HighLatency\"}",
  "truncatedAlerts": 0,
  "status": "firing",
  "receiver": "ntfy",
  "groupLabels": {"alertname": "HighLatency"},
  "commonLabels": {"alertname": "HighLatency", "severity": "critical"},
  "commonAnnotations": null,
  "externalURL": "http://alertmanager:9093",
  "alerts": [
    {
      "status": "resolved",
      "labels": {"alertname": "HighLatency", "severity": "critical", "service": "api"},
      "annotations": {"summary": "p99 above 2s"},
      "startsAt": "2024-03-01T10:00:00Z",
      "endsAt": "0001-01-01T00:00:00Z",
      "generatorURL": "http://prometheus:9090/graph",
      "fingerprint": "c0ffee"
    }
  ]
}"#;

    #[test]
    fn decodes_alertmanager_payload() {
        let payload: WebhookPayload = serde_json::from_str(PAYLOAD).unwrap();

        assert_eq!(payload.receiver, "ntfy");
        assert!(payload.common_annotations.is_empty());
        assert_eq!(payload.alerts.len(), 1);

        let alert = &payload.alerts[0];
        assert_eq!(alert.status, AlertStatus::Resolved);
        assert_eq!(alert.labels.get("service").map(String::as_str), Some("api"));
        assert_eq!(alert.generator_url, "http://prometheus:9090/graph");
    }

    #[test]
    fn missing_alerts_decode_as_empty() {
        let payload: WebhookPayload = serde_json::from_str(r#"{"receiver": "ntfy"}"#).unwrap();
        assert!(payload.alerts.is_empty());

        let payload: WebhookPayload = serde_json::from_str(r#"{"alerts": null}"#).unwrap();
        assert!(payload.alerts.is_empty());
    }

    #[test]
    fn fields_use_wire_names() {
        let payload: WebhookPayload = serde_json::from_str(PAYLOAD).unwrap();
        let fields = payload.alerts[0].fields();

        assert_eq!(fields.get("status"), Some(&Value::from("resolved")));
        assert_eq!(fields.get("fingerprint"), Some(&Value::from("c0ffee")));
        assert!(fields.contains_key("generatorURL"));
        assert!(fields.contains_key("startsAt"));
        assert_eq!(
            fields.get("labels").and_then(|l| l.get("severity")),
            Some(&Value::from("critical"))
        );
    }
}
