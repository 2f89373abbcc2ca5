use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

fn parse_duration(s: &str) -> Result<Duration, humantime_serde::re::humantime::DurationError> {
    humantime_serde::re::humantime::parse_duration(s)
}

/// Forward Alertmanager webhooks to ntfy.
#[derive(Debug, Clone, Default, Parser)]
#[command(name = "alertmanager-ntfy", version, about)]
pub struct Args {
    /// Configuration files, merged in order.
    #[arg(long, env = "ALERTMANAGER_NTFY_CONFIGS", value_delimiter = ',', default_value = "config.yml")]
    pub configs: Vec<PathBuf>,

    #[arg(long, env = "ALERTMANAGER_NTFY_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Listen address, e.g. `:8000`.
    #[arg(long, env = "ALERTMANAGER_NTFY_HTTP_ADDR")]
    pub http_addr: Option<String>,

    #[arg(long, env = "ALERTMANAGER_NTFY_NTFY_BASEURL")]
    pub ntfy_baseurl: Option<String>,

    #[arg(long, env = "ALERTMANAGER_NTFY_NTFY_TOPIC")]
    pub ntfy_topic: Option<String>,

    #[arg(long, env = "ALERTMANAGER_NTFY_NTFY_PRIORITY")]
    pub ntfy_priority: Option<String>,

    #[arg(long, env = "ALERTMANAGER_NTFY_NTFY_TIMEOUT", value_parser = parse_duration)]
    pub ntfy_timeout: Option<Duration>,
}
