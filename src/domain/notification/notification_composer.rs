use std::sync::Arc;

use http::{HeaderName, HeaderValue};
use reqwest::Url;
use tracing::{debug, warn};

use super::field_outcome::{FieldOutcome, OmitReason};
use super::notification_rules::{ActionRule, NotificationRules, TagRule};
use super::outbound_notification::{header_value, NtfyAction, OutboundNotification};
use super::{ForwardError, TAG_SEPARATOR};
use crate::api::dto::alertmanager_dto::Alert;
use crate::domain::expression::{AlertFields, Expression};
use crate::domain::template::Template;

/// Builds relay notifications from alerts using the compiled rule set.
///
/// Only the topic, the title/description and custom headers can abort an
/// alert. Tags, priority and actions degrade to being left out.
#[derive(Debug, Clone)]
pub struct NotificationComposer {
    rules: Arc<NotificationRules>,
}

impl NotificationComposer {
    pub fn new(rules: Arc<NotificationRules>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &NotificationRules {
        &self.rules
    }

    /// Relay resource for the alert, without composing any other field.
    pub fn target_url(&self, alert: &Alert) -> Result<Url, ForwardError> {
        let fields = alert.fields();
        self.resolve_target(alert, &fields).map(|(_, url)| url)
    }

    pub fn compose(&self, alert: &Alert) -> Result<OutboundNotification, ForwardError> {
        let fields = alert.fields();
        let (topic, url) = self.resolve_target(alert, &fields)?;

        let title = render_required("title", &self.rules.title, &fields)?;
        let description = render_required("description", &self.rules.description, &fields)?;
        // The relay shows a placeholder for an empty body, so the title moves there.
        let (title, body) = if description.is_empty() {
            (None, title)
        } else {
            (Some(title).filter(|t| !t.is_empty()), description)
        };

        let priority = self.resolve_priority(&fields).fold("priority")?;
        let tags = self.resolve_tags(alert, &fields)?;
        let headers = self.render_headers(&fields)?;
        let actions = self.resolve_actions(&fields)?;

        Ok(OutboundNotification {
            url,
            topic,
            title,
            body,
            priority,
            tags,
            headers,
            actions,
        })
    }

    fn resolve_target(&self, alert: &Alert, fields: &AlertFields) -> Result<(String, Url), ForwardError> {
        let topic = self
            .rules
            .topic
            .resolve(fields)
            .map_err(|source| ForwardError::TopicEval {
                expression: self.rules.topic.text().to_string(),
                source,
            })?;
        let topic = topic.trim().to_string();
        if topic.is_empty() {
            return Err(ForwardError::EmptyTopic);
        }

        let url = self.rules.relay_url(&topic, &alert.fingerprint)?;
        debug!(%topic, %url, "resolved relay target");
        Ok((topic, url))
    }

    fn resolve_priority(&self, fields: &AlertFields) -> FieldOutcome<String> {
        let Some(selector) = &self.rules.priority else {
            return FieldOutcome::Omitted(OmitReason::Unset);
        };

        match selector.resolve(fields) {
            Ok(p) if p.trim().is_empty() => FieldOutcome::Omitted(OmitReason::Unset),
            Ok(p) => FieldOutcome::Value(p.trim().to_string()),
            Err(e) => FieldOutcome::Omitted(OmitReason::Failed(format!(
                "evaluate {:?}: {e}",
                selector.text()
            ))),
        }
    }

    fn resolve_tags(&self, alert: &Alert, fields: &AlertFields) -> Result<Vec<String>, ForwardError> {
        let mut tags = Vec::with_capacity(self.rules.tags.len() + alert.labels.len());

        for rule in &self.rules.tags {
            if let Some(tag) = resolve_tag(rule, fields).fold(&format!("tag {}", rule.tag))? {
                tags.push(tag);
            }
        }

        if self.rules.convert_labels_to_tags {
            if let Some(label_tags) = self.label_tags(alert).fold("label tags")? {
                tags.extend(label_tags);
            }
        }

        Ok(tags)
    }

    fn label_tags(&self, alert: &Alert) -> FieldOutcome<Vec<String>> {
        if let Some(template) = &self.rules.labels_template {
            return match template.render(&alert.labels) {
                Ok(out) => FieldOutcome::Value(
                    out.split(TAG_SEPARATOR)
                        .map(str::trim)
                        .filter(|t| !t.is_empty())
                        .map(String::from)
                        .collect(),
                ),
                Err(e) => FieldOutcome::Omitted(OmitReason::Failed(e.to_string())),
            };
        }

        FieldOutcome::Value(
            alert
                .labels
                .iter()
                .filter(|(k, v)| !k.contains(TAG_SEPARATOR) && !v.contains(TAG_SEPARATOR))
                .map(|(k, v)| format!("{k} = {v}"))
                .collect(),
        )
    }

    fn render_headers(&self, fields: &AlertFields) -> Result<Vec<(HeaderName, HeaderValue)>, ForwardError> {
        self.rules
            .headers
            .iter()
            .map(|(name, template)| render_header(name, template, fields).fold(name.as_str()))
            .filter_map(Result::transpose)
            .collect()
    }

    fn resolve_actions(&self, fields: &AlertFields) -> Result<Vec<NtfyAction>, ForwardError> {
        let mut actions = Vec::with_capacity(self.rules.actions.len());
        for rule in &self.rules.actions {
            if let Some(action) = resolve_action(rule, fields).fold(&format!("action {}", rule.label))? {
                actions.push(action);
            }
        }
        Ok(actions)
    }
}

fn render_required(field: &str, template: &Template, fields: &AlertFields) -> Result<String, ForwardError> {
    template.render(fields).map_err(|source| ForwardError::Render {
        field: field.to_string(),
        source,
    })
}

/// `None` when the guard passes, otherwise why it did not.
fn check_guard(condition: Option<&Expression>, fields: &AlertFields) -> Option<OmitReason> {
    let expr = condition?;
    match expr.eval_bool(fields) {
        Ok(true) => None,
        Ok(false) => Some(OmitReason::ConditionFalse),
        Err(e) => Some(OmitReason::Failed(format!("evaluate {:?}: {e}", expr.text()))),
    }
}

fn resolve_tag(rule: &TagRule, fields: &AlertFields) -> FieldOutcome<String> {
    match check_guard(rule.condition.as_ref(), fields) {
        Some(reason) => FieldOutcome::Omitted(reason),
        None => FieldOutcome::Value(rule.tag.clone()),
    }
}

fn resolve_action(rule: &ActionRule, fields: &AlertFields) -> FieldOutcome<NtfyAction> {
    if let Some(reason) = check_guard(rule.condition.as_ref(), fields) {
        return FieldOutcome::Omitted(reason);
    }

    match rule.url.render(fields) {
        Ok(url) => FieldOutcome::Value(NtfyAction {
            action: rule.action.clone(),
            label: rule.label.clone(),
            url: url.trim().to_string(),
        }),
        Err(e) => {
            warn!(action = %rule.label, error = %e, "failed to render action url");
            FieldOutcome::Omitted(OmitReason::Failed(e.to_string()))
        }
    }
}

fn render_header(name: &HeaderName, template: &Template, fields: &AlertFields) -> FieldOutcome<(HeaderName, HeaderValue)> {
    let rendered = match template.render(fields) {
        Ok(r) => r,
        Err(source) => {
            return FieldOutcome::Fatal(ForwardError::Render {
                field: format!("header {name}"),
                source,
            })
        }
    };

    match header_value(&rendered) {
        Some(value) => FieldOutcome::Value((name.clone(), value)),
        None => FieldOutcome::Fatal(ForwardError::InvalidHeader {
            name: name.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::dto::alertmanager_dto::AlertStatus;
    use crate::config::{ActionConfig, NtfyConfig, TagConfig};
    use std::collections::{BTreeMap, HashSet};

    fn alert(status: AlertStatus, labels: &[(&str, &str)], annotations: &[(&str, &str)]) -> Alert {
        Alert {
            status,
            labels: labels.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            annotations: annotations.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            fingerprint: "c0ffee".into(),
            ..Alert::default()
        }
    }

    fn config() -> NtfyConfig {
        let mut cfg = NtfyConfig::default();
        cfg.baseurl = "https://ntfy.example".into();
        cfg.notification.topic = "alerts".into();
        cfg
    }

    fn composer(cfg: &NtfyConfig) -> NotificationComposer {
        NotificationComposer::new(Arc::new(NotificationRules::compile(cfg).unwrap()))
    }

    #[test]
    fn labels_become_tags() {
        let n = composer(&config())
            .compose(&alert(AlertStatus::Firing, &[("severity", "critical"), ("service", "api")], &[]))
            .unwrap();

        let tags: HashSet<_> = n.tags.iter().map(String::as_str).collect();
        assert_eq!(tags, HashSet::from(["severity = critical", "service = api"]));
    }

    #[test]
    fn labels_with_separator_are_not_tags() {
        let n = composer(&config())
            .compose(&alert(
                AlertStatus::Firing,
                &[("hosts", "a,b"), ("x,y", "z"), ("env", "prod")],
                &[],
            ))
            .unwrap();
        assert_eq!(n.tags, ["env = prod"]);
    }

    #[test]
    fn configured_tags_come_first_in_order() {
        let mut cfg = config();
        cfg.notification.tags = vec![
            TagConfig { tag: "rotating_light".into(), condition: Some(r#"labels.severity == "critical""#.into()) },
            TagConfig { tag: "never".into(), condition: Some(r#"labels.severity == "info""#.into()) },
            TagConfig { tag: "broken".into(), condition: Some("labels.missing > 1".into()) },
            TagConfig { tag: "always".into(), condition: None },
        ];
        let n = composer(&cfg)
            .compose(&alert(AlertStatus::Firing, &[("severity", "critical")], &[("description", "disk full")]))
            .unwrap();

        assert_eq!(n.tags, ["rotating_light", "always", "severity = critical"]);
        assert_eq!(n.body, "disk full");
    }

    #[test]
    fn empty_description_promotes_title() {
        let n = composer(&config())
            .compose(&alert(AlertStatus::Firing, &[("alertname", "HighLatency")], &[]))
            .unwrap();
        assert_eq!(n.body, "HighLatency");
        assert_eq!(n.title, None);
        assert!(!n.into_request().headers.contains_key("x-title"));
    }

    #[test]
    fn title_and_description_render_separately() {
        let n = composer(&config())
            .compose(&alert(
                AlertStatus::Firing,
                &[("alertname", "HighLatency")],
                &[("description", "p99 above 2s")],
            ))
            .unwrap();
        assert_eq!(n.title.as_deref(), Some("HighLatency"));
        assert_eq!(n.body, "p99 above 2s");
    }

    #[test]
    fn comment_only_title_renders_empty() {
        let mut cfg = config();
        cfg.notification.templates.title = "{{/* empty */}}".into();
        let n = composer(&cfg)
            .compose(&alert(AlertStatus::Firing, &[], &[("description", "body")]))
            .unwrap();
        assert_eq!(n.title, None);
        assert_eq!(n.body, "body");
    }

    #[test]
    fn priority_literal_and_expression() {
        let n = composer(&config()).compose(&alert(AlertStatus::Firing, &[], &[])).unwrap();
        assert_eq!(n.priority.as_deref(), Some("default"));

        let mut cfg = config();
        cfg.notification.priority =
            Some(r#"labels.severity == "critical" ? "urgent" : "default""#.into());
        let c = composer(&cfg);
        let n = c.compose(&alert(AlertStatus::Firing, &[("severity", "critical")], &[])).unwrap();
        assert_eq!(n.priority.as_deref(), Some("urgent"));

        // Missing label: evaluation fails and the priority is dropped.
        let n = c.compose(&alert(AlertStatus::Firing, &[], &[])).unwrap();
        assert_eq!(n.priority, None);
    }

    #[test]
    fn topic_expression_and_failures() {
        let mut cfg = config();
        cfg.notification.topic = r#""team-" + labels.team"#.into();
        let c = composer(&cfg);

        let url = c.target_url(&alert(AlertStatus::Firing, &[("team", "infra")], &[])).unwrap();
        assert_eq!(url.as_str(), "https://ntfy.example/team-infra");

        let err = c.compose(&alert(AlertStatus::Firing, &[], &[])).unwrap_err();
        assert!(matches!(err, ForwardError::TopicEval { .. }));

        let mut cfg = config();
        cfg.notification.topic = r#"labels.team == "x" ? "x" : """#.into();
        let err = composer(&cfg)
            .compose(&alert(AlertStatus::Firing, &[("team", "y")], &[]))
            .unwrap_err();
        assert!(matches!(err, ForwardError::EmptyTopic));
    }

    #[test]
    fn update_existing_targets_fingerprint() {
        let mut cfg = config();
        cfg.update_existing_notification = true;
        let n = composer(&cfg).compose(&alert(AlertStatus::Firing, &[], &[])).unwrap();
        assert_eq!(n.url.as_str(), "https://ntfy.example/alerts/c0ffee");
    }

    #[test]
    fn custom_labels_template() {
        let mut cfg = config();
        cfg.notification.templates.labels =
            Some(r#"{{#each this}}{{#if (ne @key "internal")}}{{@key}}:{{this}},{{/if}}{{/each}}"#.into());
        let n = composer(&cfg)
            .compose(&alert(AlertStatus::Firing, &[("internal", "x"), ("severity", "critical")], &[]))
            .unwrap();
        assert_eq!(n.tags, ["severity:critical"]);
    }

    #[test]
    fn headers_render_and_fail_hard() {
        let mut cfg = config();
        cfg.notification.templates.headers =
            BTreeMap::from([("X-Click".to_string(), "  {{annotations.dashboard}}\n".to_string())]);
        let c = composer(&cfg);
        let n = c
            .compose(&alert(AlertStatus::Firing, &[], &[("dashboard", "https://grafana/d/1")]))
            .unwrap();
        assert_eq!(n.headers.len(), 1);
        assert_eq!(n.headers[0].0.as_str(), "x-click");
        assert_eq!(n.headers[0].1, "https://grafana/d/1");

        let mut cfg = config();
        cfg.notification.templates.headers =
            BTreeMap::from([("X-Icon".to_string(), "{{upper labels}}".to_string())]);
        let err = composer(&cfg).compose(&alert(AlertStatus::Firing, &[], &[])).unwrap_err();
        assert!(matches!(err, ForwardError::Render { .. }));
    }

    #[test]
    fn actions_skip_failed_guards_and_renders() {
        let mut cfg = config();
        cfg.notification.templates.actions = vec![
            ActionConfig {
                action: "view".into(),
                label: "Runbook".into(),
                url: " {{annotations.runbook}} ".into(),
                condition: Some(r#"status == "firing""#.into()),
            },
            ActionConfig {
                action: "view".into(),
                label: "Broken guard".into(),
                url: "https://x".into(),
                condition: Some("labels.nope".into()),
            },
            ActionConfig {
                action: "http".into(),
                label: "Broken url".into(),
                url: "{{upper labels}}".into(),
                condition: None,
            },
            ActionConfig {
                action: "view".into(),
                label: "Resolved only".into(),
                url: "https://y".into(),
                condition: Some(r#"status == "resolved""#.into()),
            },
        ];

        let n = composer(&cfg)
            .compose(&alert(AlertStatus::Firing, &[], &[("runbook", "https://wiki/rb")]))
            .unwrap();
        assert_eq!(
            n.actions,
            [NtfyAction {
                action: "view".into(),
                label: "Runbook".into(),
                url: "https://wiki/rb".into(),
            }]
        );
    }

    #[test]
    fn broken_tag_guard_does_not_block_delivery() {
        let mut cfg = config();
        cfg.notification.convert_labels_to_tags = false;
        cfg.notification.tags = vec![TagConfig {
            tag: "broken".into(),
            condition: Some(r#"labels.severity + 1 > 2"#.into()),
        }];
        let n = composer(&cfg)
            .compose(&alert(
                AlertStatus::Firing,
                &[("alertname", "A"), ("severity", "x")],
                &[("description", "B")],
            ))
            .unwrap();
        assert!(n.tags.is_empty());
        assert_eq!(n.title.as_deref(), Some("A"));
        assert_eq!(n.body, "B");
    }

    #[test]
    fn numeric_label_guard_selects_tag() {
        let mut cfg = config();
        cfg.notification.convert_labels_to_tags = false;
        cfg.notification.tags = vec![TagConfig {
            tag: "scaled".into(),
            condition: Some("labels.replicas > 2".into()),
        }];
        let compose = |replicas: &str| {
            composer(&cfg)
                .compose(&alert(
                    AlertStatus::Firing,
                    &[("alertname", "A"), ("replicas", replicas)],
                    &[("description", "B")],
                ))
                .unwrap()
                .tags
        };
        assert_eq!(compose("3"), ["scaled"]);
        assert!(compose("2").is_empty());
    }
}
