use std::io;
use std::time::Instant;
use tokio::time::{sleep, Duration};
use tracing::info;

use glog_logstash::init::{init_tracing_with_config, LogConfig};
use glog_logstash::{logstash, verbosity};

#[tokio::main]
async fn main() {
    let config = LogConfig {
        logstash: true,
        flush_interval: Duration::from_millis(200),
        ..LogConfig::default()
    };
    init_tracing_with_config(config).expect("init logging");
    logstash::set_logstash_writer(Box::new(io::sink()));

    let n: u64 = 100_000;

    // gate closed: a single comparison per call, arguments never formatted
    let start = Instant::now();
    for i in 0..n {
        glog_logstash::debug!(iteration = i, "gated debug");
    }
    let gated = start.elapsed();

    verbosity::set_verbosity(verbosity::DEBUG);
    let start = Instant::now();
    for i in 0..n {
        info!(iteration = i, "logstash load test");
    }
    let elapsed = start.elapsed();

    println!("gated: {} calls in {:?}", n, gated);
    println!(
        "mirrored: {} events in {:?} (~{:.0} ev/s)",
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64()
    );

    // Give the flush daemon a tick, then drain whatever is left
    sleep(Duration::from_millis(300)).await;
    let report = logstash::flush();
    println!("final flush: {:?}", report);
}
