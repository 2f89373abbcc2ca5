pub mod alert_batch_service;

pub use alert_batch_service::{AlertForwarder, BatchOutcome};
