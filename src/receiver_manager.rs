//! Receiver dispatch loop.
//!
//! Owns the `ReceiverContext` and is the only thread that mutates it. Sender
//! commands, engine and runtime events, subtitle fetch results, local input
//! and timer expiries all arrive on the bus and are handled one at a time.

use std::panic::{self, AssertUnwindSafe};
use std::thread;
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::sync::broadcast::error::TryRecvError;
use tokio::sync::broadcast::Receiver;

use crate::command_interceptor;
use crate::event_relay::{self, Transition};
use crate::panic_payload_to_string;
use crate::diagnostics::ShowReason;
use crate::protocol::{InboundRequest, MalformedRequest, Message, SubtitleMessage, UiMessage};
use crate::receiver_context::ReceiverContext;
use crate::ui_projection::UiSnapshot;

const IDLE_LOOP_SLEEP: Duration = Duration::from_millis(25);

pub struct ReceiverManager {
    bus_consumer: Receiver<Message>,
    ctx: ReceiverContext,
    last_snapshot: Option<UiSnapshot>,
    shutdown_requested: bool,
}

impl ReceiverManager {
    pub fn new(bus_consumer: Receiver<Message>, ctx: ReceiverContext) -> Self {
        Self {
            bus_consumer,
            ctx,
            last_snapshot: None,
            shutdown_requested: false,
        }
    }

    /// Runs `handler` against the context, containing any panic so one bad
    /// message cannot take the dispatch loop down.
    fn guarded<F>(&mut self, label: &str, handler: F)
    where
        F: FnOnce(&mut ReceiverContext),
    {
        let ctx = &mut self.ctx;
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| handler(ctx))) {
            error!(
                "ReceiverManager: {} handler panicked: {}",
                label,
                panic_payload_to_string(payload.as_ref())
            );
        }
    }

    /// Intercepts a sender request and always hands a request back to the
    /// runtime, falling back to the unmodified one if interception panicked.
    fn handle_command(&mut self, request: InboundRequest) {
        if !self.ctx.commands_enabled() {
            warn!(
                "ReceiverManager: dropping {} request, receiver did not start",
                request.type_name()
            );
            return;
        }
        debug!(
            "ReceiverManager: {} request {:?}",
            request.type_name(),
            request.request_id()
        );
        let original = request.clone();
        let ctx = &mut self.ctx;
        let completed = match panic::catch_unwind(AssertUnwindSafe(|| {
            command_interceptor::intercept(ctx, request)
        })) {
            Ok(intercepted) => intercepted,
            Err(payload) => {
                error!(
                    "ReceiverManager: {} interceptor panicked, completing original request: {}",
                    original.type_name(),
                    panic_payload_to_string(payload.as_ref())
                );
                original
            }
        };
        self.ctx.runtime.complete_request(completed);
    }

    /// Completes an undecodable media request as-is. Broken payloads for the
    /// intercepted types are surfaced on the overlay; other types pass through.
    fn handle_malformed_command(&mut self, request: MalformedRequest) {
        let type_name = request.type_name.as_deref().unwrap_or("<untyped>");
        if !self.ctx.commands_enabled() {
            warn!(
                "ReceiverManager: dropping {} request, receiver did not start",
                type_name
            );
            return;
        }
        if request
            .type_name
            .as_deref()
            .map_or(true, InboundRequest::is_intercepted_type)
        {
            error!(
                "ReceiverManager: malformed {} request {:?}: {}",
                type_name, request.request_id, request.error
            );
            self.ctx.overlay.show(ShowReason::Protocol);
        } else {
            debug!(
                "ReceiverManager: passing {} request {:?} through unhandled",
                type_name, request.request_id
            );
        }
        self.ctx.runtime.complete_raw_request(&request.raw);
    }

    fn handle_message(&mut self, message: Message) {
        match message {
            Message::Command(request) => self.handle_command(request),
            Message::MalformedCommand(request) => self.handle_malformed_command(request),
            Message::Custom(custom) => self.guarded("custom message", |ctx| {
                ctx.subtitles.handle_custom_message(&custom);
            }),
            Message::Engine(event) => self.guarded("engine event", |ctx| {
                event_relay::relay(ctx, Transition::from(event));
            }),
            Message::Runtime(event) => self.guarded("runtime event", |ctx| {
                event_relay::relay(ctx, Transition::from(event));
            }),
            Message::Subtitle(SubtitleMessage::DocumentFetched { url, result }) => {
                self.guarded("subtitle document", |ctx| {
                    ctx.subtitles.apply_document(&url, result);
                });
            }
            Message::Input(input) => self.guarded("input", |ctx| ctx.handle_input(input)),
            Message::Ui(UiMessage::TimerElapsed { kind, generation }) => {
                self.ctx.handle_timer_elapsed(kind, generation);
            }
            Message::Ui(UiMessage::SnapshotChanged(_)) => {}
            Message::Shutdown => {
                info!("ReceiverManager: shutdown requested");
                self.shutdown_requested = true;
            }
        }
    }

    /// Forwards events the engine queued since the last pass.
    fn pump_engine_events(&mut self) {
        let events = self.ctx.engine.drain_events();
        for event in events {
            self.guarded("engine event", |ctx| {
                event_relay::relay(ctx, Transition::from(event));
            });
        }
    }

    fn publish_snapshot_if_changed(&mut self) {
        let snapshot = self.ctx.snapshot();
        if self.last_snapshot.as_ref() == Some(&snapshot) {
            return;
        }
        self.last_snapshot = Some(snapshot.clone());
        let _ = self
            .ctx
            .bus_producer
            .send(Message::Ui(UiMessage::SnapshotChanged(snapshot)));
    }

    /// Drains the bus. Returns true once the loop should stop.
    fn process_pending_bus_messages(&mut self) -> bool {
        loop {
            match self.bus_consumer.try_recv() {
                Ok(message) => {
                    self.handle_message(message);
                    if self.shutdown_requested {
                        return true;
                    }
                }
                Err(TryRecvError::Empty) => return false,
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!("ReceiverManager: bus lagged by {} messages", skipped);
                }
                Err(TryRecvError::Closed) => return true,
            }
        }
    }

    /// Starts the receiver and runs the blocking dispatch loop.
    pub fn run(&mut self) {
        self.ctx.start();
        info!("ReceiverManager: started");
        loop {
            if self.process_pending_bus_messages() {
                break;
            }
            self.pump_engine_events();
            self.publish_snapshot_if_changed();
            thread::sleep(IDLE_LOOP_SLEEP);
        }
        info!("ReceiverManager: stopped");
    }
}
