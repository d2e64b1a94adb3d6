use crate::context::{self, ExtraFields};
use crate::error::InitError;
use crate::sink::{BufferedSink, Destination, FlushReport};
use crate::transcode::Transcoder;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};

/// Flush period of the process-wide publisher's daemon.
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(5);

const MIN_FLUSH_INTERVAL: Duration = Duration::from_millis(10);

static GLOBAL: OnceLock<Arc<LogstashPublisher>> = OnceLock::new();

/// Mirrors every text record as a logstash JSON event.
///
/// The publisher is disabled until [`set_enabled`](Self::set_enabled) is
/// called; while disabled, records are ignored without being parsed.
#[derive(Debug)]
pub struct LogstashPublisher {
    enabled: AtomicBool,
    transcoder: Transcoder,
    sink: BufferedSink,
}

impl LogstashPublisher {
    pub fn new(transcoder: Transcoder, sink: BufferedSink) -> Self {
        Self {
            enabled: AtomicBool::new(false),
            transcoder,
            sink,
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn transcoder(&self) -> &Transcoder {
        &self.transcoder
    }

    pub fn extra_fields(&self) -> &Arc<ExtraFields> {
        self.transcoder.extra_fields()
    }

    pub fn sink(&self) -> &BufferedSink {
        &self.sink
    }

    /// Redirect JSON output. Pending events are not flushed first.
    pub fn set_writer(&self, destination: Destination) {
        self.sink.set_destination(destination);
    }

    /// Transcode one text record (plus the stack trace captured for it, if
    /// any) and queue the event. Never fails and never blocks on I/O in
    /// buffered mode.
    pub fn write_with_stack(&self, record: &[u8], stack: Option<&[u8]>) {
        if !self.is_enabled() {
            return;
        }
        match self.transcoder.transcode(record, stack) {
            Ok(event) => self.sink.write(event),
            Err(e) => {
                eprintln!("[glog error] unable to transcode logstash message: {e}");
                eprint!("{}", String::from_utf8_lossy(record));
            }
        }
    }

    pub fn write(&self, record: &[u8]) {
        self.write_with_stack(record, None);
    }

    /// Synchronously deliver every queued event.
    pub fn flush(&self) -> FlushReport {
        self.sink.flush()
    }
}

/// Process-wide publisher.
///
/// Unless [`install`] ran first, this is created on first use with the host
/// name as source, the global extra fields and buffered delivery to stderr,
/// so no event is lost before [`set_logstash_writer`] is called. A flush
/// thread drains it every [`DEFAULT_FLUSH_INTERVAL`].
pub fn global() -> Arc<LogstashPublisher> {
    Arc::clone(GLOBAL.get_or_init(|| {
        let publisher = Arc::new(LogstashPublisher::new(
            Transcoder::new(context::global()),
            BufferedSink::stderr(),
        ));
        if let Err(e) = spawn_flush_thread(&publisher, DEFAULT_FLUSH_INTERVAL) {
            eprintln!("[glog error] unable to start logstash flush thread: {e}");
        }
        publisher
    }))
}

/// Make `publisher` the process-wide publisher. Fails once [`global`] has
/// been initialized, by an earlier `install` or by first use.
pub fn install(publisher: LogstashPublisher) -> Result<Arc<LogstashPublisher>, InitError> {
    let publisher = Arc::new(publisher);
    GLOBAL
        .set(Arc::clone(&publisher))
        .map_err(|_| InitError::PublisherAlreadyInstalled)?;
    Ok(publisher)
}

pub fn set_logstash_writer(destination: Destination) {
    global().set_writer(destination);
}

pub fn set_enabled(enabled: bool) {
    global().set_enabled(enabled);
}

pub fn is_enabled() -> bool {
    global().is_enabled()
}

pub fn flush() -> FlushReport {
    global().flush()
}

/// Handle of the background flush started for a buffered publisher.
#[derive(Debug)]
pub enum FlushDaemon {
    /// Tokio task, see [`spawn_flush_daemon`].
    Task(JoinHandle<()>),
    /// OS thread, see [`spawn_flush_thread`].
    Thread(thread::JoinHandle<()>),
}

/// Flush `publisher` every `interval` on a background task.
///
/// Intervals below 10ms are raised to 10ms. Destination I/O runs on the
/// blocking pool so the runtime's workers are not stalled by a slow writer.
pub fn spawn_flush_daemon(publisher: Arc<LogstashPublisher>, interval: Duration) -> JoinHandle<()> {
    let interval = interval.max(MIN_FLUSH_INTERVAL);
    tokio::spawn(async move {
        loop {
            sleep(interval).await;
            if publisher.sink().pending() == 0 {
                continue;
            }
            let publisher = Arc::clone(&publisher);
            if let Err(e) = tokio::task::spawn_blocking(move || publisher.flush()).await {
                eprintln!("[glog error] logstash flush task failed: {e}");
            }
        }
    })
}

/// Flush `publisher` every `interval` on a dedicated thread, for callers
/// without a Tokio runtime.
///
/// The thread holds a weak reference and exits once the publisher is dropped.
pub fn spawn_flush_thread(
    publisher: &Arc<LogstashPublisher>,
    interval: Duration,
) -> io::Result<thread::JoinHandle<()>> {
    let interval = interval.max(MIN_FLUSH_INTERVAL);
    let publisher = Arc::downgrade(publisher);
    thread::Builder::new()
        .name("glog-logstash-flush".to_string())
        .spawn(move || loop {
            thread::sleep(interval);
            match publisher.upgrade() {
                Some(publisher) => {
                    publisher.flush();
                }
                None => break,
            }
        })
}

/// Start the flush daemon that fits the calling context: a Tokio task
/// inside a runtime, a thread otherwise.
pub fn start_flush_daemon(publisher: &Arc<LogstashPublisher>, interval: Duration) -> io::Result<FlushDaemon> {
    match tokio::runtime::Handle::try_current() {
        Ok(_) => Ok(FlushDaemon::Task(spawn_flush_daemon(Arc::clone(publisher), interval))),
        Err(_) => spawn_flush_thread(publisher, interval).map(FlushDaemon::Thread),
    }
}
