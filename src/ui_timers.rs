//! Restart-on-trigger timers for transient UI feedback.
//!
//! Each restart bumps a generation and hands the new deadline to one shared
//! scheduler thread, which posts `TimerElapsed` with that generation. A newer
//! deadline for the same kind replaces the pending one, so held-down keys
//! never queue up expiries. The generation check in `expire` still guards
//! against an expiry that was already on the bus when the timer restarted.

use std::collections::HashMap;
use std::sync::mpsc::{sync_channel, Receiver as StdReceiver, RecvTimeoutError, SyncSender};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, warn};
use tokio::sync::broadcast::Sender;

use crate::protocol::{Message, TimerKind, UiMessage};

const SCHEDULE_QUEUE_DEPTH: usize = 64;

#[derive(Debug, Clone, Copy)]
struct ScheduleRequest {
    kind: TimerKind,
    generation: u64,
    deadline: Instant,
}

/// Handle to the scheduler thread. The thread exits once every handle is gone.
#[derive(Debug, Clone)]
pub struct TimerScheduler {
    requests: SyncSender<ScheduleRequest>,
}

impl TimerScheduler {
    pub fn spawn(bus_producer: Sender<Message>) -> Self {
        let (requests, request_receiver) = sync_channel(SCHEDULE_QUEUE_DEPTH);
        thread::spawn(move || run_scheduler(request_receiver, bus_producer));
        Self { requests }
    }

    fn schedule(&self, request: ScheduleRequest) {
        if self.requests.send(request).is_err() {
            warn!(
                "UiTimers: scheduler thread is gone, {:?} will not expire",
                request.kind
            );
        }
    }
}

fn run_scheduler(request_receiver: StdReceiver<ScheduleRequest>, bus_producer: Sender<Message>) {
    let mut pending: HashMap<TimerKind, (u64, Instant)> = HashMap::new();
    loop {
        let next_deadline = pending.values().map(|(_, deadline)| *deadline).min();
        let received = match next_deadline {
            Some(deadline) => {
                request_receiver.recv_timeout(deadline.saturating_duration_since(Instant::now()))
            }
            None => request_receiver
                .recv()
                .map_err(|_| RecvTimeoutError::Disconnected),
        };
        match received {
            Ok(request) => {
                pending.insert(request.kind, (request.generation, request.deadline));
            }
            Err(RecvTimeoutError::Timeout) => {
                let now = Instant::now();
                pending.retain(|kind, (generation, deadline)| {
                    if *deadline > now {
                        return true;
                    }
                    let _ = bus_producer.send(Message::Ui(UiMessage::TimerElapsed {
                        kind: *kind,
                        generation: *generation,
                    }));
                    false
                });
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    debug!("UiTimers: scheduler stopped");
}

#[derive(Debug)]
pub struct DebounceTimer {
    kind: TimerKind,
    delay: Duration,
    generation: u64,
    armed: bool,
    scheduler: TimerScheduler,
}

impl DebounceTimer {
    pub fn new(kind: TimerKind, delay: Duration, scheduler: TimerScheduler) -> Self {
        Self {
            kind,
            delay,
            generation: 0,
            armed: false,
            scheduler,
        }
    }

    /// Replaces any pending expiry with a fresh one.
    pub fn restart(&mut self) -> u64 {
        self.generation = self.generation.wrapping_add(1);
        self.armed = true;
        self.scheduler.schedule(ScheduleRequest {
            kind: self.kind,
            generation: self.generation,
            deadline: Instant::now() + self.delay,
        });
        self.generation
    }

    /// Accepts an expiry notification. Stale generations return false.
    pub fn expire(&mut self, generation: u64) -> bool {
        if !self.armed || generation != self.generation {
            return false;
        }
        self.armed = false;
        true
    }
}

/// The two UI debounces, sharing one scheduler thread.
#[derive(Debug)]
pub struct UiTimers {
    pub seek_feedback: DebounceTimer,
    pub user_inactivity: DebounceTimer,
}

impl UiTimers {
    pub fn new(seek_feedback_ms: u64, inactivity_timeout_ms: u64, bus_producer: Sender<Message>) -> Self {
        let scheduler = TimerScheduler::spawn(bus_producer);
        Self {
            seek_feedback: DebounceTimer::new(
                TimerKind::SeekFeedback,
                Duration::from_millis(seek_feedback_ms),
                scheduler.clone(),
            ),
            user_inactivity: DebounceTimer::new(
                TimerKind::UserInactivity,
                Duration::from_millis(inactivity_timeout_ms),
                scheduler,
            ),
        }
    }

    pub fn get_mut(&mut self, kind: TimerKind) -> &mut DebounceTimer {
        match kind {
            TimerKind::SeekFeedback => &mut self.seek_feedback,
            TimerKind::UserInactivity => &mut self.user_inactivity,
        }
    }
}
