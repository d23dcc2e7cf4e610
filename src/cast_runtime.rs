//! Interface to the Cast Application Framework runtime.
//!
//! The runtime owns transport, sender sessions and media-status broadcasts.
//! The receiver feeds it request completions, track state and player
//! snapshots; it never builds media-status messages itself.

use crate::app_state::Lifecycle;
use crate::config::{LoggerLevel, ReceiverConfig};
use crate::protocol::{InboundRequest, TrackDescriptor, TrackId};

/// Streaming retry policy forwarded to the engine through the runtime.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryParameters {
    pub max_attempts: u32,
    pub base_delay_ms: u32,
    pub backoff_factor: f64,
    pub fuzz_factor: f64,
}

/// Start options handed to the runtime once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct ReceiverOptions {
    pub custom_namespace: String,
    pub use_shaka_for_hls: bool,
    pub disable_idle_timeout: bool,
    pub max_inactivity_secs: u32,
    pub buffering_goal_secs: f64,
    pub rebuffering_goal_secs: f64,
    pub buffer_behind_secs: f64,
    pub retry: RetryParameters,
}

impl ReceiverOptions {
    pub fn from_config(config: &ReceiverConfig) -> Self {
        Self {
            custom_namespace: config.receiver.custom_namespace.clone(),
            use_shaka_for_hls: config.receiver.use_shaka_for_hls,
            disable_idle_timeout: config.receiver.disable_idle_timeout,
            max_inactivity_secs: config.receiver.max_inactivity_secs,
            buffering_goal_secs: config.playback.buffering_goal_secs,
            rebuffering_goal_secs: config.playback.rebuffering_goal_secs,
            buffer_behind_secs: config.playback.buffer_behind_secs,
            retry: RetryParameters {
                max_attempts: config.playback.retry_max_attempts,
                base_delay_ms: config.playback.retry_base_delay_ms,
                backoff_factor: config.playback.retry_backoff_factor,
                fuzz_factor: config.playback.retry_fuzz_factor,
            },
        }
    }
}

/// Engine-bound playback state read at broadcast time.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerSnapshot {
    pub current_time: f64,
    pub duration: f64,
    pub paused: bool,
    pub lifecycle: Lifecycle,
}

/// Cast runtime handle injected into the receiver.
pub trait CastRuntime: Send {
    /// Starts the receiver session. Failure is fatal for command handling.
    fn start(&mut self, options: &ReceiverOptions) -> Result<(), String>;
    fn set_logger_level(&mut self, level: LoggerLevel);
    /// Hands an intercepted request back so default handling can continue.
    fn complete_request(&mut self, request: InboundRequest);
    /// Hands back a media request that could not be decoded, untouched.
    fn complete_raw_request(&mut self, raw: &serde_json::Value);
    fn set_media_tracks(&mut self, tracks: &[TrackDescriptor]);
    fn set_active_track_ids(&mut self, ids: &[TrackId]);
    fn broadcast_status(&mut self, snapshot: &PlayerSnapshot);
}
