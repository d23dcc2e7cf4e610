//! Command surface of the local media player engine.
//!
//! Buffering, ABR and decode belong to the engine. The receiver only issues
//! commands and consumes the engine's events in emission order.

use crate::protocol::{EngineEvent, TextTrackSubtype, TrackId};

/// One engine-side text or audio track.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineTrack {
    /// Cast-style numeric id when the engine exposes one.
    pub engine_id: Option<TrackId>,
    /// Text track role; `None` for audio tracks.
    pub text_kind: Option<TextTrackSubtype>,
    pub label: String,
    pub language: String,
    /// Source locator for out-of-band tracks.
    pub source: Option<String>,
    /// `showing` for text tracks, `enabled` for audio tracks.
    pub active: bool,
}

impl EngineTrack {
    pub fn audio(label: &str, language: &str, active: bool) -> Self {
        Self {
            engine_id: None,
            text_kind: None,
            label: label.to_string(),
            language: language.to_string(),
            source: None,
            active,
        }
    }

    pub fn text(kind: TextTrackSubtype, label: &str, language: &str, source: Option<&str>) -> Self {
        Self {
            engine_id: None,
            text_kind: Some(kind),
            label: label.to_string(),
            language: language.to_string(),
            source: source.map(ToString::to_string),
            active: false,
        }
    }
}

/// Player engine handle injected into the receiver.
///
/// Every method must return promptly: the receiver calls these from its single
/// dispatch loop.
pub trait PlayerEngine: Send {
    fn set_source(&mut self, url: &str, mime_type: &str);
    fn add_text_track(
        &mut self,
        kind: TextTrackSubtype,
        label: &str,
        locator: &str,
        language: &str,
    );
    fn play(&mut self);
    fn pause(&mut self);
    fn seek(&mut self, time: f64);
    fn current_time(&self) -> f64;
    /// Duration in seconds, NaN while unknown.
    fn duration(&self) -> f64;
    fn is_paused(&self) -> bool;
    fn text_tracks(&self) -> Vec<EngineTrack>;
    fn audio_tracks(&self) -> Vec<EngineTrack>;
    /// Shows or disables the text track at `index`.
    fn set_text_track_showing(&mut self, index: usize, showing: bool);
    fn set_audio_track_enabled(&mut self, index: usize, enabled: bool);
    /// Returns pending events in emission order.
    fn drain_events(&mut self) -> Vec<EngineEvent>;
}
