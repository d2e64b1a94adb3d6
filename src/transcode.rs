use crate::context::ExtraFields;
use crate::error::TranscodeError;
use crate::parser;
use crate::record::ParsedFields;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Value of the `@type` field of every event.
pub const EVENT_TYPE: &str = "glog";

/// Keys owned by the event schema; extra fields using them are not rendered.
pub const RESERVED_KEYS: [&str; 6] = [
    "@source",
    "@type",
    "@timestamp",
    "@fields",
    "stack",
    "@message",
];

/// Time source used to stamp events.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub fn system_clock() -> Clock {
    Arc::new(Utc::now)
}

/// Host name of this machine, or `unknownhost` if it cannot be read.
pub fn default_source() -> String {
    hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .unwrap_or_else(|| "unknownhost".to_string())
}

#[derive(Serialize)]
struct Fields<'a> {
    level: &'static str,
    threadid: u64,
    file: &'a str,
    line: u32,
}

/// Renders glog text records as single-line logstash JSON events:
///
/// ```text
/// {"@source":..,"@type":"glog","@timestamp":..,"@fields":{..},"stack":..,<extra>..,"@message":..}\n
/// ```
///
/// The timestamp is taken from the [`Clock`] at transcode time; the
/// date/time in the text record is ignored.
#[derive(Clone)]
pub struct Transcoder {
    source: String,
    clock: Clock,
    extra: Arc<ExtraFields>,
}

impl Transcoder {
    pub fn new(extra: Arc<ExtraFields>) -> Self {
        Self {
            source: default_source(),
            clock: system_clock(),
            extra,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn extra_fields(&self) -> &Arc<ExtraFields> {
        &self.extra
    }

    /// Parse one text record and render it. A record that does not fit the
    /// glog layout is rendered as unstructured text.
    pub fn transcode(&self, record: &[u8], stack: Option<&[u8]>) -> Result<Vec<u8>, TranscodeError> {
        self.render(&parser::parse_lossy(record), stack)
    }

    pub fn render(&self, fields: &ParsedFields, stack: Option<&[u8]>) -> Result<Vec<u8>, TranscodeError> {
        let timestamp = (self.clock)().to_rfc3339_opts(SecondsFormat::AutoSi, true);
        let extra = self.extra.snapshot();

        let mut buf = Vec::with_capacity(256 + fields.message.len());
        let mut ser = serde_json::Serializer::new(&mut buf);
        let mut map = ser.serialize_map(None)?;
        map.serialize_entry("@source", &self.source)?;
        map.serialize_entry("@type", EVENT_TYPE)?;
        map.serialize_entry("@timestamp", &timestamp)?;
        if let Some(location) = &fields.location {
            map.serialize_entry(
                "@fields",
                &Fields {
                    level: fields.severity.as_str(),
                    threadid: location.thread_id,
                    file: &location.file,
                    line: location.line,
                },
            )?;
        }
        if let Some(stack) = stack.filter(|s| !s.is_empty()) {
            map.serialize_entry("stack", &String::from_utf8_lossy(stack))?;
        }
        for (key, value) in extra.iter().filter(|(k, _)| !RESERVED_KEYS.contains(&k.as_str())) {
            map.serialize_entry(key, value)?;
        }
        map.serialize_entry("@message", &fields.message)?;
        map.end()?;

        buf.push(b'\n');
        Ok(buf)
    }
}

impl fmt::Debug for Transcoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transcoder")
            .field("source", &self.source)
            .field("extra", &self.extra)
            .finish_non_exhaustive()
    }
}
