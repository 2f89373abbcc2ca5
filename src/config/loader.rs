use std::path::Path;

use serde_yaml::{Mapping, Value};
use tracing::debug;
use validator::Validate;

use super::cli::Args;
use super::{Config, ConfigError};

/// Defaults, then each file in order, then command line flags.
pub fn load_config(args: &Args) -> Result<Config, ConfigError> {
    let mut merged = serde_yaml::to_value(Config::default()).map_err(ConfigError::Decode)?;

    for path in &args.configs {
        let layer = read_layer(path)?;
        merge(&mut merged, layer);
    }

    let mut config: Config = serde_yaml::from_value(merged).map_err(ConfigError::Decode)?;
    apply_args(&mut config, args);
    config.validate()?;

    Ok(config)
}

pub fn read_layer(path: &Path) -> Result<Value, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), "loaded config file");

    let value: Value = serde_yaml::from_str(&text).map_err(|source| ConfigError::Yaml {
        path: path.to_path_buf(),
        source,
    })?;

    // An empty document parses as null.
    Ok(if value.is_null() {
        Value::Mapping(Mapping::new())
    } else {
        value
    })
}

/// Mappings merge key by key; anything else is replaced.
pub fn merge(base: &mut Value, layer: Value) {
    match (base, layer) {
        (Value::Mapping(base), Value::Mapping(layer)) => {
            for (key, value) in layer {
                match base.get_mut(&key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, layer) => *base = layer,
    }
}

fn apply_args(config: &mut Config, args: &Args) {
    if let Some(level) = &args.log_level {
        config.log.level = level.clone();
    }
    if let Some(addr) = &args.http_addr {
        config.http.addr = addr.clone();
    }
    if let Some(baseurl) = &args.ntfy_baseurl {
        config.ntfy.baseurl = baseurl.clone();
    }
    if let Some(topic) = &args.ntfy_topic {
        config.ntfy.notification.topic = topic.clone();
    }
    if let Some(priority) = &args.ntfy_priority {
        config.ntfy.notification.priority = Some(priority.clone());
    }
    if let Some(timeout) = args.ntfy_timeout {
        config.ntfy.timeout = timeout;
    }
}
