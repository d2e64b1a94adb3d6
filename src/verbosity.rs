use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, LazyLock};

/// Verbosity level at which [`debug!`](crate::debug) messages are emitted.
pub const DEBUG: i32 = 10;

/// Verbosity level at which [`trace!`](crate::trace) messages are emitted.
pub const TRACE: i32 = 100;

static GLOBAL: LazyLock<Arc<Verbosity>> = LazyLock::new(|| Arc::new(Verbosity::new(0)));

/// Integer verbosity threshold consulted before any leveled call does work.
///
/// A level `L` is active when the current verbosity is `>= L`. Negative
/// values are accepted and simply keep every sub-informational tier off.
#[derive(Debug, Default)]
pub struct Verbosity {
    level: AtomicI32,
}

impl Verbosity {
    pub const fn new(level: i32) -> Self {
        Self {
            level: AtomicI32::new(level),
        }
    }

    pub fn set(&self, level: i32) {
        self.level.store(level, Ordering::Relaxed);
    }

    pub fn get(&self) -> i32 {
        self.level.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn is_enabled(&self, level: i32) -> bool {
        self.get() >= level
    }
}

/// Process-wide gate, initialized to verbosity 0.
pub fn global() -> Arc<Verbosity> {
    Arc::clone(&GLOBAL)
}

pub fn set_verbosity(level: i32) {
    GLOBAL.set(level);
}

pub fn verbosity() -> i32 {
    GLOBAL.get()
}

#[inline]
pub fn is_enabled(level: i32) -> bool {
    GLOBAL.is_enabled(level)
}

/// True if the global verbosity is [`DEBUG`] or higher.
#[inline]
pub fn debug_enabled() -> bool {
    is_enabled(DEBUG)
}

/// True if the global verbosity is [`TRACE`] or higher.
#[inline]
pub fn trace_enabled() -> bool {
    is_enabled(TRACE)
}

/// Emit an INFO event when the global verbosity is at least `level`.
///
/// The arguments are only evaluated after the gate check passes.
///
/// ```ignore
/// glog_logstash::verbose!(2, "cache miss for {}", key);
/// ```
#[macro_export]
macro_rules! verbose {
    ($level:expr, $($arg:tt)+) => {
        if $crate::verbosity::is_enabled($level) {
            $crate::__private::tracing::info!($($arg)+);
        }
    };
}

/// Emit an INFO event when the global verbosity is at least [`DEBUG`].
#[macro_export]
macro_rules! debug {
    ($($arg:tt)+) => {
        $crate::verbose!($crate::verbosity::DEBUG, $($arg)+)
    };
}

/// Emit an INFO event when the global verbosity is at least [`TRACE`].
#[macro_export]
macro_rules! trace {
    ($($arg:tt)+) => {
        $crate::verbose!($crate::verbosity::TRACE, $($arg)+)
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::cell::Cell;

    #[test]
    fn gate_opens_at_threshold() {
        let gate = Verbosity::new(0);
        for v in [-5, 0, 9, 10, 11, 99, 100, 101, 1000] {
            gate.set(v);
            assert_eq!(gate.is_enabled(DEBUG), v >= DEBUG, "verbosity {v}");
            assert_eq!(gate.is_enabled(TRACE), v >= TRACE, "verbosity {v}");
        }
    }

    #[test]
    #[serial]
    fn global_helpers_follow_set_verbosity() {
        set_verbosity(DEBUG);
        assert!(debug_enabled());
        assert!(!trace_enabled());

        set_verbosity(TRACE);
        assert!(debug_enabled());
        assert!(trace_enabled());

        set_verbosity(0);
        assert!(!debug_enabled());
        assert_eq!(verbosity(), 0);
    }

    #[test]
    #[serial]
    fn closed_gate_does_not_evaluate_arguments() {
        let evaluated = Cell::new(0);
        let expensive = || {
            evaluated.set(evaluated.get() + 1);
            "value"
        };

        set_verbosity(0);
        crate::debug!("skipped {}", expensive());
        crate::trace!("skipped {}", expensive());
        crate::verbose!(1, "skipped {}", expensive());
        assert_eq!(evaluated.get(), 0);

        set_verbosity(DEBUG);
        crate::trace!("skipped {}", expensive());
        assert_eq!(evaluated.get(), 0);

        set_verbosity(0);
    }
}
