//! Turning one alert into the fields of a relay notification.

pub mod field_outcome;
pub mod notification_composer;
pub mod notification_rules;
pub mod outbound_notification;

use thiserror::Error;

use crate::domain::delivery::DeliveryError;
use crate::domain::expression::EvalError;
use crate::domain::template::TemplateError;

pub use notification_composer::NotificationComposer;
pub use notification_rules::{LifecyclePolicy, NotificationRules};

/// Separator between tags in the `X-Tags` header.
pub const TAG_SEPARATOR: char = ',';

/// Aborts one operation for one alert. Never crosses alert boundaries.
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("evaluate topic {expression:?}: {source}")]
    TopicEval {
        expression: String,
        #[source]
        source: EvalError,
    },

    #[error("topic resolved to an empty string")]
    EmptyTopic,

    #[error("build relay url: {0}")]
    RelayUrl(String),

    #[error("render {field}: {source}")]
    Render {
        field: String,
        #[source]
        source: TemplateError,
    },

    #[error("header {name} has an invalid value")]
    InvalidHeader { name: String },

    #[error(transparent)]
    Delivery(#[from] DeliveryError),
}
