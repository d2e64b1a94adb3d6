use thiserror::Error;

/// Reasons a text record could not be decoded as a structured glog line.
///
/// None of these are surfaced on the logging path: the parser's lossy entry
/// point turns them into an unstructured record.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("record is too short for a glog header ({len} bytes)")]
    Truncated { len: usize },

    #[error("malformed glog date/time header")]
    BadHeader,

    #[error("missing '{delimiter}' delimiter after offset {offset}")]
    MissingDelimiter { delimiter: char, offset: usize },

    #[error("invalid {field} number: {text:?}")]
    InvalidNumber { field: &'static str, text: String },
}

/// Error returned when a parsed record could not be rendered as JSON.
#[derive(Error, Debug)]
pub enum TranscodeError {
    #[error("failed to encode logstash event: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Error returned when installing process-wide logging state.
#[derive(Error, Debug)]
pub enum InitError {
    #[error("global tracing subscriber already set: {0}")]
    SubscriberAlreadySet(#[from] tracing::subscriber::SetGlobalDefaultError),

    #[error("process-wide logstash publisher already initialized")]
    PublisherAlreadyInstalled,

    #[error("unable to start logstash flush thread: {0}")]
    FlushThread(#[from] std::io::Error),
}

/// Error returned when reading configuration from the environment.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },

    #[error("invalid extra field entry {0:?}, expected key=value")]
    InvalidExtraField(String),
}
