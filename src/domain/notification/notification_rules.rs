use std::time::Duration;

use http::HeaderName;
use reqwest::Url;

use super::ForwardError;
use crate::config::{ConfigError, NtfyConfig};
use crate::domain::expression::selector::StringSelector;
use crate::domain::expression::Expression;
use crate::domain::template::Template;

/// What happens to the relay notification as an alert changes state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LifecyclePolicy {
    /// Address notifications by fingerprint so later states replace earlier ones.
    pub update_existing: bool,
    pub delete_resolved: bool,
    pub clear_resolved: bool,
    pub clear_delay: Duration,
}

#[derive(Debug, Clone)]
pub struct TagRule {
    pub tag: String,
    pub condition: Option<Expression>,
}

#[derive(Debug)]
pub struct ActionRule {
    pub action: String,
    pub label: String,
    pub url: Template,
    pub condition: Option<Expression>,
}

/// Compiled notification settings. Built once at startup and shared read-only.
#[derive(Debug)]
pub struct NotificationRules {
    pub base_url: Url,
    pub topic: StringSelector,
    pub priority: Option<StringSelector>,
    pub tags: Vec<TagRule>,
    pub convert_labels_to_tags: bool,
    pub labels_template: Option<Template>,
    pub title: Template,
    pub description: Template,
    pub headers: Vec<(HeaderName, Template)>,
    pub actions: Vec<ActionRule>,
    pub lifecycle: LifecyclePolicy,
}

impl NotificationRules {
    pub fn compile(cfg: &NtfyConfig) -> Result<Self, ConfigError> {
        let base_url = Url::parse(&cfg.baseurl).map_err(|e| ConfigError::BaseUrl {
            url: cfg.baseurl.clone(),
            reason: e.to_string(),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(ConfigError::BaseUrl {
                url: cfg.baseurl.clone(),
                reason: "cannot carry a path".into(),
            });
        }

        let n = &cfg.notification;
        let topic = selector("notification.topic", &n.topic)?;
        let priority = match n.priority.as_deref().map(str::trim) {
            Some(p) if !p.is_empty() => Some(selector("notification.priority", p)?),
            _ => None,
        };

        let tags = n
            .tags
            .iter()
            .enumerate()
            .map(|(i, t)| {
                Ok(TagRule {
                    tag: t.tag.clone(),
                    condition: condition(&format!("notification.tags[{i}].condition"), t.condition.as_deref())?,
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        let templates = &n.templates;
        let labels_template = templates
            .labels
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(|s| template("templates.labels", s))
            .transpose()?;

        let headers = templates
            .headers
            .iter()
            .map(|(name, source)| {
                let header = HeaderName::from_bytes(name.as_bytes())
                    .map_err(|_| ConfigError::HeaderName(name.clone()))?;
                Ok((header, template(&format!("templates.headers.{name}"), source)?))
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        let actions = templates
            .actions
            .iter()
            .enumerate()
            .map(|(i, a)| {
                Ok(ActionRule {
                    action: a.action.clone(),
                    label: a.label.clone(),
                    url: template(&format!("templates.actions[{i}].url"), &a.url)?,
                    condition: condition(&format!("templates.actions[{i}].condition"), a.condition.as_deref())?,
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        Ok(Self {
            base_url,
            topic,
            priority,
            tags,
            convert_labels_to_tags: n.convert_labels_to_tags,
            labels_template,
            title: template("templates.title", &templates.title)?,
            description: template("templates.description", &templates.description)?,
            headers,
            actions,
            lifecycle: LifecyclePolicy {
                update_existing: cfg.update_existing_notification,
                delete_resolved: cfg.delete_resolved_notification,
                clear_resolved: cfg.clear_resolved_notification,
                clear_delay: cfg.clear_delay,
            },
        })
    }

    /// `<base>/<topic>`, or `<base>/<topic>/<fingerprint>` when updating in place.
    pub fn relay_url(&self, topic: &str, fingerprint: &str) -> Result<Url, ForwardError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| ForwardError::RelayUrl(format!("{} cannot be a base", self.base_url)))?;
            segments.pop_if_empty().push(topic);
            if self.lifecycle.update_existing && !fingerprint.is_empty() {
                segments.push(fingerprint);
            }
        }
        Ok(url)
    }
}

fn selector(field: &str, source: &str) -> Result<StringSelector, ConfigError> {
    StringSelector::compile(source).map_err(|source| ConfigError::Expression {
        field: field.to_string(),
        source,
    })
}

fn condition(field: &str, source: Option<&str>) -> Result<Option<Expression>, ConfigError> {
    source
        .filter(|s| !s.trim().is_empty())
        .map(|s| {
            Expression::compile(s).map_err(|source| ConfigError::Expression {
                field: field.to_string(),
                source,
            })
        })
        .transpose()
}

fn template(field: &str, source: &str) -> Result<Template, ConfigError> {
    Template::compile(source).map_err(|source| ConfigError::Template {
        field: field.to_string(),
        source,
    })
}
