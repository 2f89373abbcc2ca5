//! Process configuration: YAML files merged over built-in defaults, then
//! overridden by command line flags.

pub mod cli;
pub mod loader;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use validator::Validate;

use crate::domain::expression::CompileError;
use crate::domain::template::TemplateError;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse config file {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("decode config: {0}")]
    Decode(#[source] serde_yaml::Error),

    #[error("invalid config: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("bad expression for {field}: {source}")]
    Expression {
        field: String,
        #[source]
        source: CompileError,
    },

    #[error("bad template for {field}: {source}")]
    Template {
        field: String,
        #[source]
        source: TemplateError,
    },

    #[error("invalid base url {url:?}: {reason}")]
    BaseUrl { url: String, reason: String },

    #[error("invalid header name {0:?}")]
    HeaderName(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct Config {
    #[validate(nested)]
    pub http: HttpConfig,
    pub log: LogConfig,
    #[validate(nested)]
    pub ntfy: NtfyConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BasicAuth {
    pub username: String,
    pub password: String,
}

impl BasicAuth {
    /// Basic auth is only applied when both username and password are set.
    pub fn is_valid(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct HttpConfig {
    #[validate(length(min = 1))]
    pub addr: String,
    pub auth: Option<BasicAuth>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            addr: ":8000".into(),
            auth: None,
        }
    }
}

impl HttpConfig {
    /// Socket address to bind; a bare `:port` listens on all interfaces.
    pub fn listen_addr(&self) -> String {
        if self.addr.starts_with(':') {
            format!("0.0.0.0{}", self.addr)
        } else {
            self.addr.clone()
        }
    }

    pub fn basic_auth(&self) -> Option<&BasicAuth> {
        self.auth.as_ref().filter(|a| a.is_valid())
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Console,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub format: LogFormat,
    /// Write daily rolling files here instead of stderr.
    pub directory: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: LogFormat::Console,
            directory: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct NtfyAuth {
    pub username: String,
    pub password: String,
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct NtfyConfig {
    #[validate(url)]
    pub baseurl: String,
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    #[serde(rename = "async")]
    pub asynchronous: bool,
    pub auth: Option<NtfyAuth>,
    pub update_existing_notification: bool,
    pub delete_resolved_notification: bool,
    pub clear_resolved_notification: bool,
    #[serde(with = "humantime_serde")]
    pub clear_delay: Duration,
    #[validate(nested)]
    pub notification: NotificationConfig,
}

impl Default for NtfyConfig {
    fn default() -> Self {
        Self {
            baseurl: "https://ntfy.sh".into(),
            timeout: Duration::from_secs(10),
            asynchronous: false,
            auth: None,
            update_existing_notification: false,
            delete_resolved_notification: false,
            clear_resolved_notification: false,
            clear_delay: Duration::ZERO,
            notification: NotificationConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TagConfig {
    pub tag: String,
    pub condition: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct NotificationConfig {
    pub topic: String,
    pub priority: Option<String>,
    pub tags: Vec<TagConfig>,
    pub convert_labels_to_tags: bool,
    #[validate(nested)]
    pub templates: TemplatesConfig,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            topic: default_topic(),
            priority: Some("default".into()),
            tags: Vec::new(),
            convert_labels_to_tags: true,
            templates: TemplatesConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, Validate)]
#[serde(default)]
pub struct ActionConfig {
    #[validate(length(min = 1))]
    pub action: String,
    #[validate(length(min = 1))]
    pub label: String,
    pub url: String,
    pub condition: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct TemplatesConfig {
    pub title: String,
    pub description: String,
    /// Renders label tags from the label map; output is split on `,`.
    pub labels: Option<String>,
    pub headers: BTreeMap<String, String>,
    #[validate(nested)]
    pub actions: Vec<ActionConfig>,
}

impl Default for TemplatesConfig {
    fn default() -> Self {
        Self {
            title: "{{labels.alertname}}".into(),
            description: "{{annotations.description}}".into(),
            labels: None,
            headers: BTreeMap::new(),
            actions: Vec::new(),
        }
    }
}

/// `alertmanager-ntfy-<hostname>`
pub fn default_topic() -> String {
    let hostname = std::env::var("HOSTNAME")
        .ok()
        .or_else(|| std::fs::read_to_string("/etc/hostname").ok())
        .map(|h| h.trim().to_string())
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "error".into());

    format!("alertmanager-ntfy-{hostname}")
}
