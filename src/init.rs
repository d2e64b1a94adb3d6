use crate::context;
use crate::error::InitError;
use crate::layer::GlogLayer;
use crate::logstash::{self, FlushDaemon, LogstashPublisher};
use crate::sink::{BufferedSink, DeliveryMode};
use crate::transcode::Transcoder;
use crate::verbosity;
use std::collections::BTreeMap;
use std::io;
use std::sync::Arc;
use tokio::time::Duration;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

/// Logging configuration.
///
/// **Fields**
/// - `logstash`: mirror every record as a JSON event (the `-logstash` switch).
/// - `verbosity`: initial verbosity; 10 enables DEBUG, 100 enables TRACE.
/// - `to_stderr`: also write the glog text lines to stderr.
/// - `enable_stdout`: add a `tracing_subscriber::fmt` layer for console output.
/// - `delivery`: queue events until flushed, or write each one through.
/// - `flush_interval`: period of the background flush in buffered mode.
/// - `extra_fields`: static fields added to every JSON event.
/// - `source`: `@source` value; the host name when `None`.
#[derive(Clone, Debug)]
pub struct LogConfig {
    pub logstash: bool,
    pub verbosity: i32,
    pub to_stderr: bool,
    pub enable_stdout: bool,
    pub delivery: DeliveryMode,
    pub flush_interval: Duration,
    pub extra_fields: BTreeMap<String, String>,
    pub source: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            logstash: false,
            verbosity: 0,
            to_stderr: false,
            enable_stdout: false,
            delivery: DeliveryMode::Buffered,
            flush_interval: logstash::DEFAULT_FLUSH_INTERVAL,
            extra_fields: BTreeMap::new(),
            source: None,
        }
    }
}

impl LogConfig {
    /// Build the publisher described by this config. JSON goes to stderr
    /// until a writer is set.
    pub fn publisher(&self) -> LogstashPublisher {
        let mut transcoder = Transcoder::new(context::global());
        if let Some(source) = &self.source {
            transcoder = transcoder.with_source(source.clone());
        }
        let publisher = LogstashPublisher::new(
            transcoder,
            BufferedSink::with_mode(Box::new(io::stderr()), self.delivery),
        );
        publisher.set_enabled(self.logstash);
        publisher
    }
}

/// Initialize global `tracing` subscriber and the process-wide publisher
/// from `config`.
///
/// **Effects**
///
/// Installs the publisher returned by [`logstash::global`] and a
/// [`Registry`] with [`GlogLayer`] as the global default subscriber. In
/// buffered mode a flush daemon is started: a Tokio task when called inside
/// a runtime, a thread otherwise. Only then are the global verbosity set and
/// `extra_fields` merged into the global registry.
///
/// **Errors**
///
/// Fails if the process-wide publisher was already used or installed, a
/// global subscriber is already set, or the flush thread cannot be spawned.
/// On failure the global verbosity and extra fields are left untouched.
pub fn init_tracing_with_config(config: LogConfig) -> Result<Option<FlushDaemon>, InitError> {
    let publisher = logstash::install(config.publisher())?;
    let layer = GlogLayer::new(Arc::clone(&publisher), verbosity::global()).with_stderr(config.to_stderr);

    // Two subscriber shapes, so the types line up in each branch.
    if config.enable_stdout {
        let fmt_layer = tracing_subscriber::fmt::layer();
        let subscriber = Registry::default().with(layer).with(fmt_layer);
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = Registry::default().with(layer);
        tracing::subscriber::set_global_default(subscriber)?;
    }

    let daemon = match config.delivery {
        DeliveryMode::Buffered => Some(logstash::start_flush_daemon(&publisher, config.flush_interval)?),
        DeliveryMode::Immediate => None,
    };

    verbosity::set_verbosity(config.verbosity);
    context::global().extend(config.extra_fields);
    Ok(daemon)
}

/// Initialize logging from the `GLOG_*` environment variables.
///
/// Invalid values are reported on stderr and replaced by defaults.
pub fn init_tracing() -> Result<Option<FlushDaemon>, InitError> {
    let config = LogConfig::from_env().unwrap_or_else(|e| {
        eprintln!("[glog error] {e}, using default logging configuration");
        LogConfig::default()
    });
    init_tracing_with_config(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_keep_json_off() {
        let config = LogConfig::default();
        assert!(!config.logstash);
        assert_eq!(config.verbosity, 0);
        assert_eq!(config.delivery, DeliveryMode::Buffered);
        assert!(config.extra_fields.is_empty());
    }

    #[test]
    fn publisher_follows_config() {
        let config = LogConfig {
            logstash: true,
            source: Some("ps34.example".to_string()),
            delivery: DeliveryMode::Immediate,
            ..LogConfig::default()
        };
        let publisher = config.publisher();
        assert!(publisher.is_enabled());
        assert_eq!(publisher.transcoder().source(), "ps34.example");
        assert_eq!(publisher.sink().mode(), DeliveryMode::Immediate);

        assert!(!LogConfig::default().publisher().is_enabled());
    }
}
