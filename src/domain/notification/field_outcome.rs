use tracing::{debug, warn};

use super::ForwardError;

/// Why an optional field was left out of the notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OmitReason {
    Unset,
    ConditionFalse,
    Failed(String),
}

/// Result of resolving one notification field.
#[derive(Debug)]
pub enum FieldOutcome<T> {
    Value(T),
    Omitted(OmitReason),
    Fatal(ForwardError),
}

impl<T> FieldOutcome<T> {
    /// `Ok(None)` when the field is omitted, `Err` only for fatal outcomes.
    pub fn fold(self, field: &str) -> Result<Option<T>, ForwardError> {
        match self {
            Self::Value(value) => Ok(Some(value)),
            Self::Omitted(OmitReason::Unset) => Ok(None),
            Self::Omitted(OmitReason::ConditionFalse) => {
                debug!(field, "condition false, skipping");
                Ok(None)
            }
            Self::Omitted(OmitReason::Failed(reason)) => {
                warn!(field, %reason, "skipping field");
                Ok(None)
            }
            Self::Fatal(err) => Err(err),
        }
    }
}
