use parking_lot::Mutex;
use std::io::{self, Write};
use std::mem;

/// Underlying byte destination of a [`BufferedSink`]: a file, socket, pipe or
/// in-memory buffer.
pub type Destination = Box<dyn Write + Send>;

/// When queued events reach the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeliveryMode {
    /// Events wait in memory until [`BufferedSink::flush`].
    #[default]
    Buffered,
    /// Every write is flushed right away, so at most one event is pending.
    Immediate,
}

/// Outcome of one flush. Failed chunks have already been reported on stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlushReport {
    pub written: usize,
    pub failed: usize,
}

/// Collects serialized events in memory and releases them to a destination
/// on flush.
///
/// `write` never blocks on the destination and never fails. `flush` swaps
/// the queue out under its lock, so writers are not held up by slow
/// destination I/O. Delivery is best effort: a chunk the destination rejects
/// is reported on stderr together with its payload and then dropped.
pub struct BufferedSink {
    pending: Mutex<Vec<Vec<u8>>>,
    destination: Mutex<Destination>,
    mode: DeliveryMode,
}

impl BufferedSink {
    pub fn new(destination: Destination) -> Self {
        Self::with_mode(destination, DeliveryMode::default())
    }

    pub fn with_mode(destination: Destination, mode: DeliveryMode) -> Self {
        Self {
            pending: Mutex::new(Vec::new()),
            destination: Mutex::new(destination),
            mode,
        }
    }

    /// Sink writing to the process's standard error.
    pub fn stderr() -> Self {
        Self::new(Box::new(io::stderr()))
    }

    pub fn mode(&self) -> DeliveryMode {
        self.mode
    }

    /// Queue one event.
    pub fn write(&self, event: impl Into<Vec<u8>>) {
        let event = event.into();
        if event.is_empty() {
            return;
        }
        self.pending.lock().push(event);
        if self.mode == DeliveryMode::Immediate {
            self.flush();
        }
    }

    /// Number of events waiting for the next flush.
    pub fn pending(&self) -> usize {
        self.pending.lock().len()
    }

    /// Replace the destination. Events already queued are not flushed first;
    /// they go to the new destination on the next flush.
    pub fn set_destination(&self, destination: Destination) {
        *self.destination.lock() = destination;
    }

    /// Write every queued event, in queue order, to the destination.
    pub fn flush(&self) -> FlushReport {
        // Holding the destination across the swap keeps concurrent flushes
        // from reordering their snapshots.
        let mut destination = self.destination.lock();
        let batch = mem::take(&mut *self.pending.lock());
        if batch.is_empty() {
            return FlushReport::default();
        }

        let mut report = FlushReport::default();
        for chunk in &batch {
            match destination.write_all(chunk) {
                Ok(()) => report.written += 1,
                Err(e) => {
                    report.failed += 1;
                    report_lost(&e, chunk);
                }
            }
        }
        if let Err(e) = destination.flush() {
            eprintln!("[glog error] unable to flush logstash destination: {e}");
        }
        report
    }
}

impl Default for BufferedSink {
    fn default() -> Self {
        Self::stderr()
    }
}

impl std::fmt::Debug for BufferedSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferedSink")
            .field("pending", &self.pending())
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

fn report_lost(err: &io::Error, chunk: &[u8]) {
    eprintln!("[glog error] unable to flush buffered logstash message: {err}");
    eprint!("{}", String::from_utf8_lossy(chunk));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl Capture {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().clone()).unwrap()
        }
    }

    impl Write for Capture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Rejects any chunk containing `poison`.
    struct Picky {
        inner: Capture,
        poison: &'static str,
        attempts: Arc<Mutex<usize>>,
    }

    impl Write for Picky {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            *self.attempts.lock() += 1;
            if String::from_utf8_lossy(buf).contains(self.poison) {
                return Err(io::Error::new(io::ErrorKind::Other, "simulated fail"));
            }
            self.inner.write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn write_queues_until_flush() {
        let capture = Capture::default();
        let sink = BufferedSink::new(Box::new(capture.clone()));

        sink.write(b"one\n".to_vec());
        sink.write(b"two\n".to_vec());
        assert_eq!(sink.pending(), 2);
        assert_eq!(capture.contents(), "");

        let report = sink.flush();
        assert_eq!(report, FlushReport { written: 2, failed: 0 });
        assert_eq!(capture.contents(), "one\ntwo\n");
        assert_eq!(sink.pending(), 0);
    }

    #[test]
    fn flushing_empty_queue_writes_nothing() {
        let attempts = Arc::new(Mutex::new(0));
        let sink = BufferedSink::new(Box::new(Picky {
            inner: Capture::default(),
            poison: "never",
            attempts: Arc::clone(&attempts),
        }));

        assert_eq!(sink.flush(), FlushReport::default());
        assert_eq!(sink.flush(), FlushReport::default());
        assert_eq!(*attempts.lock(), 0);
    }

    #[test]
    fn failing_chunk_does_not_stop_the_rest() {
        let capture = Capture::default();
        let attempts = Arc::new(Mutex::new(0));
        let sink = BufferedSink::new(Box::new(Picky {
            inner: capture.clone(),
            poison: "world",
            attempts: Arc::clone(&attempts),
        }));

        sink.write(b"hello\n".to_vec());
        sink.write(b"world\n".to_vec());
        sink.write(b"again\n".to_vec());

        let report = sink.flush();
        assert_eq!(report, FlushReport { written: 2, failed: 1 });
        assert_eq!(*attempts.lock(), 3);
        assert_eq!(capture.contents(), "hello\nagain\n");

        // the failed chunk is dropped, not retried
        assert_eq!(sink.pending(), 0);
        assert_eq!(sink.flush(), FlushReport::default());
    }

    #[test]
    fn swapping_destination_keeps_pending_events() {
        let first = Capture::default();
        let second = Capture::default();
        let sink = BufferedSink::new(Box::new(first.clone()));

        sink.write(b"queued\n".to_vec());
        sink.set_destination(Box::new(second.clone()));
        sink.flush();

        assert_eq!(first.contents(), "");
        assert_eq!(second.contents(), "queued\n");
    }

    #[test]
    fn immediate_mode_delivers_on_write() {
        let capture = Capture::default();
        let sink = BufferedSink::with_mode(Box::new(capture.clone()), DeliveryMode::Immediate);

        sink.write(b"now\n".to_vec());
        assert_eq!(sink.pending(), 0);
        assert_eq!(capture.contents(), "now\n");
    }

    #[test]
    fn concurrent_writers_keep_events_whole_and_ordered() {
        let capture = Capture::default();
        let sink = Arc::new(BufferedSink::new(Box::new(capture.clone())));

        let handles: Vec<_> = (0..4)
            .map(|w| {
                let sink = Arc::clone(&sink);
                thread::spawn(move || {
                    for i in 0..250 {
                        sink.write(format!("{w}:{i}\n"));
                        if i % 50 == 0 {
                            sink.flush();
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        sink.flush();

        let contents = capture.contents();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 1000);
        for w in 0..4 {
            let seq: Vec<usize> = lines
                .iter()
                .filter_map(|l| l.split_once(':'))
                .filter(|(writer, _)| *writer == w.to_string())
                .map(|(_, i)| i.parse().unwrap())
                .collect();
            assert_eq!(seq, (0..250).collect::<Vec<_>>());
        }
    }
}
