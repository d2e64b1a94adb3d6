use crate::logstash::LogstashPublisher;
use crate::record::Severity;
use crate::verbosity::{self, Verbosity};
use chrono::{DateTime, Local};
use std::backtrace::Backtrace;
use std::fmt::Write as _;
use std::io::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::field::{Field, Visit};
use tracing::subscriber::Interest;
use tracing::{Event, Level, Metadata, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

/// Name of the boolean event field that marks an event as FATAL.
pub const FATAL_FIELD: &str = "fatal";

/// `tracing_subscriber` layer that renders every event as a glog text line
/// (`Lmmdd hh:mm:ss.uuuuuu threadid file:line] msg`) and hands it to a
/// [`LogstashPublisher`].
///
/// `tracing` DEBUG events need verbosity >= [`verbosity::DEBUG`] and TRACE
/// events verbosity >= [`verbosity::TRACE`]; below that they are disabled
/// before any field is recorded. An event with `fatal = true` is logged as
/// FATAL together with a backtrace of the calling thread.
pub struct GlogLayer {
    publisher: Arc<LogstashPublisher>,
    verbosity: Arc<Verbosity>,
    to_stderr: bool,
    /// Events that passed the verbosity gate.
    pub total_events: Arc<AtomicU64>,
    /// Events handed to an enabled publisher.
    pub published_events: Arc<AtomicU64>,
    /// DEBUG/TRACE events rejected by the verbosity gate.
    pub gated_events: Arc<AtomicU64>,
}

impl GlogLayer {
    pub fn new(publisher: Arc<LogstashPublisher>, verbosity: Arc<Verbosity>) -> Self {
        Self {
            publisher,
            verbosity,
            to_stderr: false,
            total_events: Arc::new(AtomicU64::new(0)),
            published_events: Arc::new(AtomicU64::new(0)),
            gated_events: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Also write each text line to stderr.
    pub fn with_stderr(mut self, to_stderr: bool) -> Self {
        self.to_stderr = to_stderr;
        self
    }

    pub fn publisher(&self) -> &Arc<LogstashPublisher> {
        &self.publisher
    }
}

fn required_verbosity(level: &Level) -> Option<i32> {
    if *level == Level::TRACE {
        Some(verbosity::TRACE)
    } else if *level == Level::DEBUG {
        Some(verbosity::DEBUG)
    } else {
        None
    }
}

fn severity_of(level: &Level) -> Severity {
    if *level == Level::ERROR {
        Severity::Error
    } else if *level == Level::WARN {
        Severity::Warning
    } else {
        Severity::Info
    }
}

/// Render one glog text line, terminated by a newline.
///
/// The thread id column is right-aligned to seven characters.
pub fn format_line(
    severity: Severity,
    at: DateTime<Local>,
    thread_id: u64,
    file: &str,
    line: u32,
    message: &str,
) -> String {
    let tag = severity.tag().unwrap_or('I');
    let mut out = String::with_capacity(40 + file.len() + message.len());
    let _ = write!(
        out,
        "{tag}{} {thread_id:>7} {file}:{line}] {message}",
        at.format("%m%d %H:%M:%S%.6f")
    );
    if !out.ends_with('\n') {
        out.push('\n');
    }
    out
}

impl<S> Layer<S> for GlogLayer
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn register_callsite(&self, metadata: &'static Metadata<'static>) -> Interest {
        // the gate can open later, so these must be re-checked per event
        if required_verbosity(metadata.level()).is_some() {
            Interest::sometimes()
        } else {
            Interest::always()
        }
    }

    fn enabled(&self, metadata: &Metadata<'_>, _ctx: Context<'_, S>) -> bool {
        match required_verbosity(metadata.level()) {
            Some(level) if !self.verbosity.is_enabled(level) => {
                if metadata.is_event() {
                    self.gated_events.fetch_add(1, Ordering::Relaxed);
                }
                false
            }
            _ => true,
        }
    }

    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        self.total_events.fetch_add(1, Ordering::Relaxed);
        if !self.to_stderr && !self.publisher.is_enabled() {
            return;
        }

        let mut visitor = LineVisitor::default();
        event.record(&mut visitor);

        let meta = event.metadata();
        let severity = if visitor.fatal {
            Severity::Fatal
        } else {
            severity_of(meta.level())
        };
        let file = meta
            .file()
            .map(|f| f.rsplit(['/', '\\']).next().unwrap_or(f))
            .unwrap_or("???");
        let line = format_line(
            severity,
            Local::now(),
            u64::from(std::process::id()),
            file,
            meta.line().unwrap_or(1),
            &visitor.text(),
        );

        if self.to_stderr {
            let _ = std::io::stderr().write_all(line.as_bytes());
        }
        if self.publisher.is_enabled() {
            let stack = visitor
                .fatal
                .then(|| Backtrace::force_capture().to_string());
            self.publisher
                .write_with_stack(line.as_bytes(), stack.as_deref().map(str::as_bytes));
            self.published_events.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Collects the message and the remaining fields as `key=value` pairs.
#[derive(Default)]
struct LineVisitor {
    message: String,
    fields: Vec<(&'static str, String)>,
    fatal: bool,
}

impl LineVisitor {
    fn text(&self) -> String {
        let mut text = self.message.clone();
        for (key, value) in &self.fields {
            if !text.is_empty() {
                text.push(' ');
            }
            let _ = write!(text, "{key}={value}");
        }
        text
    }
}

impl Visit for LineVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.push((field.name(), value.to_string()));
        }
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        if field.name() == FATAL_FIELD {
            self.fatal = value;
        } else {
            self.fields.push((field.name(), value.to_string()));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        } else {
            self.fields.push((field.name(), format!("{:?}", value)));
        }
    }
}
