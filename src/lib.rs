//! Verbosity-gated DEBUG/TRACE tiers for `tracing`, plus a transcoder that
//! mirrors every glog-style text record as a single-line logstash JSON event
//! through a buffered, non-blocking sink.

pub mod error;
pub mod verbosity;
pub mod record;
pub mod parser;
pub mod context;
pub mod transcode;
pub mod sink;
pub mod logstash;
pub mod layer;

pub mod init;
pub mod env;

pub use context::ExtraFields;
pub use layer::GlogLayer;
pub use logstash::LogstashPublisher;
pub use record::{Location, ParsedFields, Severity};
pub use sink::{BufferedSink, DeliveryMode, FlushReport};
pub use transcode::Transcoder;

#[doc(hidden)]
pub mod __private {
    pub use tracing;
}
