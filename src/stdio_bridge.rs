//! Line-delimited JSON bridge between the receiver and its host process.
//!
//! Stdin carries sender messages, runtime events and local input, one JSON
//! object per line. Stdout carries everything the runtime would send back to
//! senders plus UI snapshots, also one object per line.

use std::io::{self, BufRead, Write};
use std::thread::{self, JoinHandle};

use log::{debug, info, warn};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::broadcast::{Receiver, Sender};

use crate::app_state::Lifecycle;
use crate::cast_runtime::{CastRuntime, PlayerSnapshot, ReceiverOptions};
use crate::config::LoggerLevel;
use crate::protocol::{
    CustomMessage, EngineEvent, InboundRequest, InputMessage, MalformedRequest, Message,
    RuntimeEvent, TrackDescriptor, TrackId, UiMessage,
};

pub const MEDIA_NAMESPACE: &str = "urn:x-cast:com.google.cast.media";

#[derive(Debug, Deserialize)]
struct ClickPayload {
    x: f64,
    y: f64,
    #[serde(default)]
    width: f64,
    #[serde(default)]
    height: f64,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum BridgeLine {
    Cast { namespace: String, data: Value },
    Key { key: String },
    Click { click: ClickPayload },
    Event { event: RuntimeEvent },
    EngineEvent {
        #[serde(rename = "engineEvent")]
        engine_event: EngineEvent,
    },
}

/// Decodes one stdin line into a bus message.
pub fn parse_bridge_line(line: &str, custom_namespace: &str) -> Result<Message, String> {
    let parsed: BridgeLine =
        serde_json::from_str(line).map_err(|err| format!("Invalid bridge line: {err}"))?;
    match parsed {
        BridgeLine::Cast { namespace, data } => {
            // Senders may deliver the payload as a JSON-encoded string.
            let data = match data {
                Value::String(text) => serde_json::from_str(&text)
                    .map_err(|err| format!("Invalid {namespace} payload: {err}"))?,
                other => other,
            };
            if namespace == MEDIA_NAMESPACE {
                // Undecodable media requests still travel on so they get completed.
                Ok(match InboundRequest::deserialize(&data) {
                    Ok(request) => Message::Command(request),
                    Err(err) => Message::MalformedCommand(MalformedRequest::from_raw(
                        data,
                        err.to_string(),
                    )),
                })
            } else if namespace == custom_namespace {
                serde_json::from_value::<CustomMessage>(data)
                    .map(Message::Custom)
                    .map_err(|err| format!("Invalid custom message: {err}"))
            } else {
                Err(format!("Unknown namespace {namespace}"))
            }
        }
        BridgeLine::Key { key } => Ok(Message::Input(InputMessage::Key(key))),
        BridgeLine::Click { click } => Ok(Message::Input(InputMessage::Click {
            x: click.x,
            y: click.y,
            width: click.width,
            height: click.height,
        })),
        BridgeLine::Event { event } => Ok(Message::Runtime(event)),
        BridgeLine::EngineEvent { engine_event } => Ok(Message::Engine(engine_event)),
    }
}

/// Reads stdin until EOF, then asks the receiver to shut down.
pub fn spawn_stdin_reader(bus_producer: Sender<Message>, custom_namespace: String) -> JoinHandle<()> {
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let line = match line {
                Ok(line) => line,
                Err(err) => {
                    warn!("StdioBridge: failed to read stdin: {}", err);
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            match parse_bridge_line(&line, &custom_namespace) {
                Ok(message) => {
                    if bus_producer.send(message).is_err() {
                        break;
                    }
                }
                Err(err) => warn!("StdioBridge: {}", err),
            }
        }
        info!("StdioBridge: stdin closed");
        let _ = bus_producer.send(Message::Shutdown);
    })
}

/// Prints every published UI snapshot as a `UI_SNAPSHOT` line.
pub fn spawn_snapshot_printer(mut bus_consumer: Receiver<Message>) -> JoinHandle<()> {
    thread::spawn(move || loop {
        match bus_consumer.blocking_recv() {
            Ok(Message::Ui(UiMessage::SnapshotChanged(snapshot))) => {
                println!("{}", json!({ "type": "UI_SNAPSHOT", "snapshot": snapshot }));
            }
            Ok(Message::Shutdown) | Err(RecvError::Closed) => break,
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                debug!("StdioBridge: snapshot printer skipped {} messages", skipped);
            }
        }
    })
}

fn player_state(lifecycle: Lifecycle) -> &'static str {
    match lifecycle {
        Lifecycle::Loading | Lifecycle::Idle | Lifecycle::Error => "IDLE",
        Lifecycle::ContentLoading | Lifecycle::Buffering => "BUFFERING",
        Lifecycle::Playing => "PLAYING",
        Lifecycle::Paused => "PAUSED",
    }
}

fn finite_or_null(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

fn logger_level_name(level: LoggerLevel) -> &'static str {
    match level {
        LoggerLevel::Debug => "DEBUG",
        LoggerLevel::Info => "INFO",
        LoggerLevel::Warning => "WARNING",
        LoggerLevel::Error => "ERROR",
        LoggerLevel::None => "NONE",
    }
}

/// Cast runtime that reports to the host process as JSON lines.
pub struct StdioCastRuntime<W: Write + Send> {
    out: W,
    media_tracks: Vec<TrackDescriptor>,
    active_track_ids: Vec<TrackId>,
}

impl StdioCastRuntime<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> StdioCastRuntime<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            media_tracks: Vec::new(),
            active_track_ids: Vec::new(),
        }
    }

    fn emit(&mut self, value: &Value) -> Result<(), String> {
        writeln!(self.out, "{value}")
            .and_then(|_| self.out.flush())
            .map_err(|err| format!("Failed to write to host: {err}"))
    }

    fn emit_or_warn(&mut self, value: &Value) {
        if let Err(err) = self.emit(value) {
            warn!("StdioCastRuntime: {}", err);
        }
    }
}

impl<W: Write + Send> CastRuntime for StdioCastRuntime<W> {
    fn start(&mut self, options: &ReceiverOptions) -> Result<(), String> {
        self.emit(&json!({
            "type": "RECEIVER_STARTED",
            "customNamespace": options.custom_namespace,
            "useShakaForHls": options.use_shaka_for_hls,
            "disableIdleTimeout": options.disable_idle_timeout,
            "maxInactivity": options.max_inactivity_secs,
            "playbackConfig": {
                "bufferingGoal": options.buffering_goal_secs,
                "rebufferingGoal": options.rebuffering_goal_secs,
                "bufferBehind": options.buffer_behind_secs,
                "retryParameters": {
                    "maxAttempts": options.retry.max_attempts,
                    "baseDelay": options.retry.base_delay_ms,
                    "backoffFactor": options.retry.backoff_factor,
                    "fuzzFactor": options.retry.fuzz_factor,
                },
            },
        }))
    }

    fn set_logger_level(&mut self, level: LoggerLevel) {
        self.emit_or_warn(&json!({
            "type": "LOGGER_LEVEL",
            "level": logger_level_name(level),
        }));
    }

    fn complete_request(&mut self, request: InboundRequest) {
        self.emit_or_warn(&json!({
            "type": "REQUEST_COMPLETED",
            "request": request,
        }));
    }

    fn complete_raw_request(&mut self, raw: &Value) {
        self.emit_or_warn(&json!({
            "type": "REQUEST_COMPLETED",
            "request": raw,
        }));
    }

    fn set_media_tracks(&mut self, tracks: &[TrackDescriptor]) {
        self.media_tracks = tracks.to_vec();
    }

    fn set_active_track_ids(&mut self, ids: &[TrackId]) {
        self.active_track_ids = ids.to_vec();
    }

    fn broadcast_status(&mut self, snapshot: &PlayerSnapshot) {
        let status = json!({
            "type": "MEDIA_STATUS",
            "status": {
                "playerState": player_state(snapshot.lifecycle),
                "currentTime": finite_or_null(snapshot.current_time),
                "duration": finite_or_null(snapshot.duration),
                "paused": snapshot.paused,
                "activeTrackIds": self.active_track_ids,
                "media": { "tracks": self.media_tracks },
            },
        });
        self.emit_or_warn(&status);
    }
}
