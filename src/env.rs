//! Environment variable names used by this crate for convenient
//! configuration from services.
//!
//! These are purely helpers; the core types remain decoupled from
//! environment access.

use crate::error::ConfigError;
use crate::init::LogConfig;
use crate::sink::DeliveryMode;
use std::collections::BTreeMap;
use tokio::time::Duration;

/// Mirror records as logstash JSON (`true`/`false`).
pub const GLOG_LOGSTASH_ENV: &str = "GLOG_LOGSTASH";

/// Verbosity level; 10 enables DEBUG, 100 enables TRACE.
pub const GLOG_V_ENV: &str = "GLOG_V";

/// Also write glog text lines to stderr.
pub const GLOG_LOGTOSTDERR_ENV: &str = "GLOG_LOGTOSTDERR";

/// Add a human-readable console layer.
pub const GLOG_STDOUT_ENV: &str = "GLOG_STDOUT";

/// Write every JSON event through instead of buffering.
pub const GLOG_LOGSTASH_IMMEDIATE_ENV: &str = "GLOG_LOGSTASH_IMMEDIATE";

/// Background flush period in milliseconds.
pub const GLOG_FLUSH_INTERVAL_MS_ENV: &str = "GLOG_FLUSH_INTERVAL_MS";

/// Extra JSON fields, `key=value` pairs separated by commas.
pub const GLOG_EXTRA_FIELDS_ENV: &str = "GLOG_EXTRA_FIELDS";

/// Optional `@source` override.
pub const GLOG_SOURCE_ENV: &str = "GLOG_SOURCE";

impl LogConfig {
    /// Build a config from the `GLOG_*` environment variables. Unset
    /// variables keep their [`Default`] values.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = LogConfig::default();

        if let Some(v) = lookup(GLOG_LOGSTASH_ENV) {
            config.logstash = parse_bool(GLOG_LOGSTASH_ENV, &v)?;
        }
        if let Some(v) = lookup(GLOG_V_ENV) {
            config.verbosity = v.trim().parse().map_err(|_| invalid(GLOG_V_ENV, &v))?;
        }
        if let Some(v) = lookup(GLOG_LOGTOSTDERR_ENV) {
            config.to_stderr = parse_bool(GLOG_LOGTOSTDERR_ENV, &v)?;
        }
        if let Some(v) = lookup(GLOG_STDOUT_ENV) {
            config.enable_stdout = parse_bool(GLOG_STDOUT_ENV, &v)?;
        }
        if let Some(v) = lookup(GLOG_LOGSTASH_IMMEDIATE_ENV) {
            if parse_bool(GLOG_LOGSTASH_IMMEDIATE_ENV, &v)? {
                config.delivery = DeliveryMode::Immediate;
            }
        }
        if let Some(v) = lookup(GLOG_FLUSH_INTERVAL_MS_ENV) {
            let ms: u64 = v
                .trim()
                .parse()
                .map_err(|_| invalid(GLOG_FLUSH_INTERVAL_MS_ENV, &v))?;
            config.flush_interval = Duration::from_millis(ms);
        }
        if let Some(v) = lookup(GLOG_EXTRA_FIELDS_ENV) {
            config.extra_fields = parse_extra_fields(&v)?;
        }
        if let Some(v) = lookup(GLOG_SOURCE_ENV) {
            if !v.trim().is_empty() {
                config.source = Some(v.trim().to_string());
            }
        }

        Ok(config)
    }
}

fn invalid(key: &'static str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key,
        value: value.to_string(),
    }
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(invalid(key, value)),
    }
}

/// Parse `instance=ps34,role=webservice`. Empty entries are ignored.
pub fn parse_extra_fields(value: &str) -> Result<BTreeMap<String, String>, ConfigError> {
    let mut fields = BTreeMap::new();
    for entry in value.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (key, val) = entry
            .split_once('=')
            .ok_or_else(|| ConfigError::InvalidExtraField(entry.to_string()))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(ConfigError::InvalidExtraField(entry.to_string()));
        }
        fields.insert(key.to_string(), val.trim().to_string());
    }
    Ok(fields)
}
