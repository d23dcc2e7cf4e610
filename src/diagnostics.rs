//! On-device diagnostics: the bounded log ring and the debug overlay state.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use serde::Serialize;

pub const DEFAULT_LOG_CAPACITY: usize = 100;
const CORNER_SIZE_PX: f64 = 100.0;
const CORNER_TAP_WINDOW: Duration = Duration::from_secs(1);
const CORNER_TAPS_TO_TOGGLE: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Log,
    Info,
    Warn,
    Error,
}

impl From<log::Level> for Severity {
    fn from(level: log::Level) -> Self {
        match level {
            log::Level::Error => Self::Error,
            log::Level::Warn => Self::Warn,
            log::Level::Info => Self::Info,
            log::Level::Debug | log::Level::Trace => Self::Log,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    pub severity: Severity,
    /// Wall-clock `HH:MM:SS` (UTC).
    pub timestamp: String,
    pub message: String,
}

/// FIFO of the most recent log entries.
#[derive(Debug)]
pub struct LogRing {
    entries: VecDeque<LogEntry>,
    capacity: usize,
}

pub type SharedLogRing = Arc<Mutex<LogRing>>;

impl Default for LogRing {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_LOG_CAPACITY)
    }
}

impl LogRing {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn shared(capacity: usize) -> SharedLogRing {
        Arc::new(Mutex::new(Self::with_capacity(capacity)))
    }

    pub fn add_log(&mut self, severity: Severity, message: impl Into<String>) {
        self.push(LogEntry {
            severity,
            timestamp: wall_clock_timestamp(),
            message: message.into(),
        });
    }

    pub fn push(&mut self, entry: LogEntry) {
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[cfg(test)]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Resizes the ring, dropping the oldest entries that no longer fit.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    /// Oldest first.
    pub fn entries(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

pub fn lock_ring(ring: &SharedLogRing) -> MutexGuard<'_, LogRing> {
    match ring.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn wall_clock_timestamp() -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default();
    let day_secs = secs % 86_400;
    format!(
        "{:02}:{:02}:{:02}",
        day_secs / 3600,
        (day_secs % 3600) / 60,
        day_secs % 60
    )
}

/// Why the overlay was last opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ShowReason {
    User,
    Protocol,
    PlaybackError,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiagnosticOverlay {
    visible: bool,
    last_show_reason: Option<ShowReason>,
    scroll: usize,
}

impl DiagnosticOverlay {
    pub fn visible(&self) -> bool {
        self.visible
    }

    pub fn last_show_reason(&self) -> Option<ShowReason> {
        self.last_show_reason
    }

    pub fn scroll(&self) -> usize {
        self.scroll
    }

    pub fn show(&mut self, reason: ShowReason) {
        self.visible = true;
        self.last_show_reason = Some(reason);
    }

    pub fn hide(&mut self) {
        self.visible = false;
        self.last_show_reason = None;
    }

    pub fn toggle(&mut self) {
        if self.visible {
            self.hide();
        } else {
            self.show(ShowReason::User);
        }
    }

    /// Closes the overlay only when a playback error opened it.
    pub fn dismiss_error_view(&mut self) -> bool {
        if self.visible && self.last_show_reason == Some(ShowReason::PlaybackError) {
            self.hide();
            return true;
        }
        false
    }

    pub fn scroll_by(&mut self, delta: isize, entry_count: usize) {
        let max = entry_count.saturating_sub(1);
        self.scroll = self.scroll.saturating_add_signed(delta).min(max);
    }

    pub fn reset_scroll(&mut self) {
        self.scroll = 0;
    }
}

/// Detects the triple tap in the top-right corner that toggles the overlay.
#[derive(Debug, Default)]
pub struct CornerTapDetector {
    taps: u32,
    last_tap: Option<Instant>,
}

impl CornerTapDetector {
    /// Registers a pointer tap. Returns true when the gesture completes.
    pub fn register_tap(&mut self, x: f64, y: f64, width: f64, now: Instant) -> bool {
        if x <= width - CORNER_SIZE_PX || y >= CORNER_SIZE_PX {
            return false;
        }
        let within_window = self
            .last_tap
            .is_some_and(|last| now.saturating_duration_since(last) <= CORNER_TAP_WINDOW);
        self.taps = if within_window { self.taps + 1 } else { 1 };
        self.last_tap = Some(now);
        if self.taps >= CORNER_TAPS_TO_TOGGLE {
            self.taps = 0;
            self.last_tap = None;
            return true;
        }
        false
    }
}
