//! Logger that mirrors every emitted record into the diagnostic log ring.

use log::{LevelFilter, Log, Metadata, Record};

use crate::diagnostics::{lock_ring, Severity, SharedLogRing};

/// Forwards records to the terminal logger and appends them to the ring.
pub struct LogRelay {
    inner: Box<dyn Log>,
    ring: SharedLogRing,
}

impl LogRelay {
    pub fn new(inner: Box<dyn Log>, ring: SharedLogRing) -> Self {
        Self { inner, ring }
    }

    /// Installs the relay as the global logger.
    ///
    /// `max_level` should be the inner logger's filter so disabled records are
    /// rejected before formatting.
    pub fn install(self, max_level: LevelFilter) -> Result<(), String> {
        log::set_boxed_logger(Box::new(self))
            .map_err(|err| format!("failed to install log relay: {err}"))?;
        log::set_max_level(max_level);
        Ok(())
    }
}

impl Log for LogRelay {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.inner.enabled(metadata)
    }

    fn log(&self, record: &Record) {
        if !self.inner.enabled(record.metadata()) {
            return;
        }
        self.inner.log(record);
        lock_ring(&self.ring).add_log(Severity::from(record.level()), record.args().to_string());
    }

    fn flush(&self) {
        self.inner.flush();
    }
}
