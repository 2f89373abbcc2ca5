//! Text templates for notification titles, bodies, headers and action URLs.

pub mod helpers;

use std::fmt;
use std::sync::OnceLock;

use handlebars::Handlebars;
use regex::Regex;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

const TEMPLATE_NAME: &str = "notification";

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("parse template: {0}")]
    Compile(#[source] Box<handlebars::TemplateError>),

    #[error("execute template: {0}")]
    Render(#[source] Box<handlebars::RenderError>),
}

/// A compiled template bound to the helper library. Rendered output is trimmed.
pub struct Template {
    source: String,
    registry: Handlebars<'static>,
}

impl Template {
    pub fn compile(source: &str) -> Result<Self, TemplateError> {
        let mut registry = Handlebars::new();
        registry.register_escape_fn(handlebars::no_escape);
        helpers::register_helpers(&mut registry);
        registry
            .register_template_string(TEMPLATE_NAME, normalize_source(source))
            .map_err(|e| TemplateError::Compile(Box::new(e)))?;

        Ok(Self {
            source: source.to_string(),
            registry,
        })
    }

    pub fn render<T: Serialize>(&self, data: &T) -> Result<String, TemplateError> {
        self.registry
            .render(TEMPLATE_NAME, data)
            .map(|out| out.trim().to_string())
            .map_err(|e| {
                debug!(template = %self.source, error = %e, "template render failed");
                TemplateError::Render(Box::new(e))
            })
    }
}

impl fmt::Debug for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Template")
            .field("source", &self.source)
            .finish()
    }
}

fn comment_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?s)\{\{-?\s*/\*.*?\*/\s*-?\}\}").expect("comment pattern is a valid regex")
    })
}

/// Accepts `{{/* comment */}}` blocks and `{{- ... -}}` trim markers.
fn normalize_source(source: &str) -> String {
    comment_pattern()
        .replace_all(source, "")
        .replace("{{- ", "{{~ ")
        .replace(" -}}", " ~}}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn render(source: &str, data: serde_json::Value) -> String {
        Template::compile(source).unwrap().render(&data).unwrap()
    }

    #[test]
    fn renders_alert_fields_without_escaping() {
        let data = json!({
            "status": "firing",
            "labels": {"alertname": "HighLatency", "service": "api<1>"},
        });
        assert_eq!(
            render("[{{status}}] {{labels.alertname}} on {{labels.service}}", data),
            "[firing] HighLatency on api<1>"
        );
    }

    #[test]
    fn comment_only_template_renders_empty() {
        assert_eq!(render("{{/* empty */}}", json!({})), "");
        assert_eq!(render("  {{- /* multi\nline */ -}}  ", json!({})), "");
    }

    #[test]
    fn output_is_trimmed() {
        assert_eq!(render("\n  {{labels.a}}  \n", json!({"labels": {"a": "x"}})), "x");
    }

    #[test]
    fn missing_fields_render_empty() {
        assert_eq!(render("{{labels.nope}}", json!({"labels": {}})), "");
    }

    #[test]
    fn string_helpers() {
        let data = json!({"labels": {"env": "production", "hosts": "a,b, c", "msg": "  Disk Full "}});

        assert_eq!(render("{{capitalize labels.env}}", data.clone()), "Production");
        assert_eq!(render("{{upper labels.env}}", data.clone()), "PRODUCTION");
        assert_eq!(render("{{lower (trim labels.msg)}}", data.clone()), "disk full");
        assert_eq!(
            render(r#"{{join (split labels.hosts ",") "|"}}"#, data.clone()),
            "a|b| c"
        );
        assert_eq!(
            render(r#"{{replace labels.env "prod" "stag"}}"#, data.clone()),
            "staguction"
        );
        assert_eq!(
            render(
                r#"{{#if (contains labels.env "duct")}}yes{{else}}no{{/if}}"#,
                data.clone()
            ),
            "yes"
        );
        assert_eq!(
            render(
                r#"{{#if (hasPrefix labels.env "prod")}}p{{/if}}{{#if (hasSuffix labels.env "x")}}x{{/if}}"#,
                data.clone()
            ),
            "p"
        );
        assert_eq!(
            render(r#"{{printf "%s=%d" labels.env 3}}"#, data),
            "production=3"
        );
    }

    #[test]
    fn iterates_label_maps() {
        let labels = json!({"internal": "debug", "severity": "critical"});
        assert_eq!(
            render(
                r#"{{#each this}}{{#if (ne @key "internal")}}{{@key}}={{this}}, {{/if}}{{/each}}"#,
                labels
            ),
            "severity=critical,"
        );
    }

    #[test]
    fn malformed_templates_fail_to_compile() {
        assert!(matches!(
            Template::compile("{{#if labels.a}}unclosed"),
            Err(TemplateError::Compile(_))
        ));
        assert!(Template::compile("{{labels.a").is_err());
    }

    #[test]
    fn helper_type_errors_fail_at_render() {
        let tmpl = Template::compile("{{upper labels}}").unwrap();
        assert!(matches!(
            tmpl.render(&json!({"labels": {"a": "b"}})),
            Err(TemplateError::Render(_))
        ));
    }
}
