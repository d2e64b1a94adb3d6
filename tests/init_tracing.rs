use glog_logstash::init::{init_tracing_with_config, LogConfig};
use glog_logstash::logstash::{self, FlushDaemon};
use glog_logstash::{context, verbosity, DeliveryMode};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::BTreeMap;
use std::io;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Clone, Default)]
struct Capture(Arc<Mutex<Vec<u8>>>);

impl io::Write for Capture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Capture {
    fn events(&self) -> Vec<Value> {
        self.0
            .lock()
            .split(|&b| b == b'\n')
            .filter(|l| !l.is_empty())
            .map(|l| serde_json::from_slice(l).unwrap())
            .collect()
    }
}

// Installs process-wide state, so this binary holds a single test.
#[test]
fn init_wires_layer_publisher_gate_and_flush_thread() {
    let mut extra_fields = BTreeMap::new();
    extra_fields.insert("instance".to_string(), "ps34".to_string());

    let daemon = init_tracing_with_config(LogConfig {
        logstash: true,
        verbosity: verbosity::DEBUG,
        delivery: DeliveryMode::Buffered,
        flush_interval: Duration::from_millis(20),
        extra_fields,
        source: Some("test.here.com".to_string()),
        ..LogConfig::default()
    })
    .unwrap();
    assert!(
        matches!(daemon, Some(FlushDaemon::Thread(_))),
        "no runtime, so the queue is drained by a thread"
    );

    let capture = Capture::default();
    logstash::set_logstash_writer(Box::new(capture.clone()));

    tracing::info!("request completed");
    glog_logstash::debug!("debug {}", "shown");
    glog_logstash::trace!("trace {}", "hidden");
    tracing::trace!("native trace hidden");

    // no explicit flush: the daemon delivers the queued events
    for _ in 0..200 {
        if capture.events().len() >= 2 {
            break;
        }
        thread::sleep(Duration::from_millis(10));
    }
    assert_eq!(logstash::global().sink().pending(), 0);

    let events = capture.events();
    let messages: Vec<_> = events.iter().map(|e| e["@message"].clone()).collect();
    assert_eq!(messages, vec!["request completed", "debug shown"]);
    assert_eq!(events[0]["@source"], "test.here.com");
    assert_eq!(events[0]["instance"], "ps34");
    assert_eq!(events[0]["@fields"]["level"], "INFO");
    assert_eq!(events[0]["@fields"]["file"], "init_tracing.rs");

    // a rejected second init leaves the process-wide state alone
    let mut rogue = BTreeMap::new();
    rogue.insert("role".to_string(), "rogue".to_string());
    let second = init_tracing_with_config(LogConfig {
        verbosity: -1,
        extra_fields: rogue,
        ..LogConfig::default()
    });
    assert!(second.is_err());
    assert_eq!(verbosity::verbosity(), verbosity::DEBUG);
    assert_eq!(context::global().get("role"), None);
    assert_eq!(context::global().get("instance").as_deref(), Some("ps34"));
}
