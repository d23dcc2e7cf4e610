//! Clock-driven player engine used when no media pipeline is attached.
//!
//! It honours the full command surface and emits the engine event vocabulary
//! in order, so the reconciliation layer runs end to end from a terminal.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::player_engine::{EngineTrack, PlayerEngine};
use crate::protocol::{EngineEvent, TextTrackSubtype};

const TIME_UPDATE_INTERVAL: Duration = Duration::from_millis(250);

pub struct HeadlessEngine {
    source: Option<String>,
    position: f64,
    playing_since: Option<Instant>,
    text_tracks: Vec<EngineTrack>,
    audio_tracks: Vec<EngineTrack>,
    pending: VecDeque<EngineEvent>,
    last_time_update: Instant,
}

impl Default for HeadlessEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessEngine {
    pub fn new() -> Self {
        Self {
            source: None,
            position: 0.0,
            playing_since: None,
            text_tracks: Vec::new(),
            audio_tracks: Vec::new(),
            pending: VecDeque::new(),
            last_time_update: Instant::now(),
        }
    }

    fn push_time_update(&mut self) {
        self.last_time_update = Instant::now();
        self.pending.push_back(EngineEvent::TimeUpdate {
            current_time: self.current_time(),
            duration: self.duration(),
        });
    }
}

impl PlayerEngine for HeadlessEngine {
    fn set_source(&mut self, url: &str, mime_type: &str) {
        debug!("HeadlessEngine: source {} ({})", url, mime_type);
        self.source = Some(url.to_string());
        self.position = 0.0;
        self.playing_since = None;
        self.text_tracks.clear();
        self.audio_tracks = vec![EngineTrack::audio("Default", "", true)];
        self.pending.push_back(EngineEvent::LoadStart);
        self.pending.push_back(EngineEvent::LoadedMetadata);
    }

    fn add_text_track(
        &mut self,
        kind: TextTrackSubtype,
        label: &str,
        locator: &str,
        language: &str,
    ) {
        self.text_tracks
            .push(EngineTrack::text(kind, label, language, Some(locator)));
    }

    fn play(&mut self) {
        if self.source.is_none() {
            warn!("HeadlessEngine: play requested without a source");
            return;
        }
        if self.playing_since.is_none() {
            self.playing_since = Some(Instant::now());
            self.pending.push_back(EngineEvent::Playing);
        }
    }

    fn pause(&mut self) {
        if self.playing_since.is_some() {
            self.position = self.current_time();
            self.playing_since = None;
            self.pending.push_back(EngineEvent::Pause);
        }
    }

    fn seek(&mut self, time: f64) {
        self.position = time.max(0.0);
        if self.playing_since.is_some() {
            self.playing_since = Some(Instant::now());
        }
        self.push_time_update();
    }

    fn current_time(&self) -> f64 {
        match self.playing_since {
            Some(since) => self.position + since.elapsed().as_secs_f64(),
            None => self.position,
        }
    }

    fn duration(&self) -> f64 {
        f64::NAN
    }

    fn is_paused(&self) -> bool {
        self.playing_since.is_none()
    }

    fn text_tracks(&self) -> Vec<EngineTrack> {
        self.text_tracks.clone()
    }

    fn audio_tracks(&self) -> Vec<EngineTrack> {
        self.audio_tracks.clone()
    }

    fn set_text_track_showing(&mut self, index: usize, showing: bool) {
        if let Some(track) = self.text_tracks.get_mut(index) {
            track.active = showing;
        }
    }

    fn set_audio_track_enabled(&mut self, index: usize, enabled: bool) {
        if let Some(track) = self.audio_tracks.get_mut(index) {
            track.active = enabled;
        }
    }

    fn drain_events(&mut self) -> Vec<EngineEvent> {
        if self.playing_since.is_some() && self.last_time_update.elapsed() >= TIME_UPDATE_INTERVAL
        {
            self.push_time_update();
        }
        self.pending.drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::HeadlessEngine;
    use crate::player_engine::PlayerEngine;
    use crate::protocol::EngineEvent;

    #[test]
    fn test_source_then_play_emits_events_in_order() {
        let mut engine = HeadlessEngine::new();
        engine.play();
        assert!(engine.drain_events().is_empty());

        engine.set_source("https://cdn/a.mp4", "video/mp4");
        engine.play();
        engine.play();
        assert_eq!(
            engine.drain_events(),
            vec![
                EngineEvent::LoadStart,
                EngineEvent::LoadedMetadata,
                EngineEvent::Playing
            ]
        );
        assert_eq!(engine.audio_tracks().len(), 1);
        assert!(!engine.is_paused());
    }

    #[test]
    fn test_pause_freezes_clock_and_seek_reports_position() {
        let mut engine = HeadlessEngine::new();
        engine.set_source("https://cdn/a.mp4", "video/mp4");
        engine.seek(42.0);
        engine.pause();
        let events = engine.drain_events();
        assert!(matches!(
            events.last(),
            Some(EngineEvent::TimeUpdate { current_time, .. }) if *current_time == 42.0
        ));
        assert_eq!(engine.current_time(), 42.0);
        assert!(engine.duration().is_nan());
    }
}
