//! Recording fakes for the injected engine, runtime and fetcher.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::broadcast;

use crate::cast_runtime::{CastRuntime, PlayerSnapshot, ReceiverOptions};
use crate::config::{LoggerLevel, ReceiverConfig};
use crate::player_engine::{EngineTrack, PlayerEngine};
use crate::protocol::{EngineEvent, InboundRequest, Message, TextTrackSubtype, TrackDescriptor, TrackId};
use crate::receiver_context::ReceiverContext;
use crate::subtitles::fetcher::DocumentFetcher;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[derive(Debug)]
pub struct EngineLog {
    pub sources: Vec<(String, String)>,
    pub added_text_tracks: Vec<(TextTrackSubtype, String, String, String)>,
    pub play_calls: usize,
    pub pause_calls: usize,
    pub seeks: Vec<f64>,
    pub current_time: f64,
    pub duration: f64,
    pub paused: bool,
    pub text_tracks: Vec<EngineTrack>,
    pub audio_tracks: Vec<EngineTrack>,
    pub pending_events: Vec<EngineEvent>,
    /// Makes `play` panic, for exercising handler isolation.
    pub panic_on_play: bool,
}

impl Default for EngineLog {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            added_text_tracks: Vec::new(),
            play_calls: 0,
            pause_calls: 0,
            seeks: Vec::new(),
            current_time: 0.0,
            duration: f64::NAN,
            paused: true,
            text_tracks: Vec::new(),
            audio_tracks: Vec::new(),
            pending_events: Vec::new(),
            panic_on_play: false,
        }
    }
}

#[derive(Clone, Default)]
pub struct FakeEngine {
    pub log: Arc<Mutex<EngineLog>>,
}

impl FakeEngine {
    pub fn log(&self) -> MutexGuard<'_, EngineLog> {
        lock(&self.log)
    }

    pub fn with_tracks(text_tracks: Vec<EngineTrack>, audio_tracks: Vec<EngineTrack>) -> Self {
        let engine = Self::default();
        {
            let mut log = engine.log();
            log.text_tracks = text_tracks;
            log.audio_tracks = audio_tracks;
        }
        engine
    }

    pub fn showing_text_indices(&self) -> Vec<usize> {
        self.log()
            .text_tracks
            .iter()
            .enumerate()
            .filter(|(_, track)| track.active)
            .map(|(index, _)| index)
            .collect()
    }

    pub fn enabled_audio_indices(&self) -> Vec<usize> {
        self.log()
            .audio_tracks
            .iter()
            .enumerate()
            .filter(|(_, track)| track.active)
            .map(|(index, _)| index)
            .collect()
    }
}

impl PlayerEngine for FakeEngine {
    fn set_source(&mut self, url: &str, mime_type: &str) {
        let mut log = self.log();
        log.sources.push((url.to_string(), mime_type.to_string()));
        log.text_tracks.clear();
    }

    fn add_text_track(
        &mut self,
        kind: TextTrackSubtype,
        label: &str,
        locator: &str,
        language: &str,
    ) {
        let mut log = self.log();
        log.added_text_tracks.push((
            kind,
            label.to_string(),
            locator.to_string(),
            language.to_string(),
        ));
        log.text_tracks
            .push(EngineTrack::text(kind, label, language, Some(locator)));
    }

    fn play(&mut self) {
        let mut log = self.log();
        if log.panic_on_play {
            drop(log);
            panic!("engine rejected play");
        }
        log.play_calls += 1;
        log.paused = false;
    }

    fn pause(&mut self) {
        let mut log = self.log();
        log.pause_calls += 1;
        log.paused = true;
    }

    fn seek(&mut self, time: f64) {
        let mut log = self.log();
        log.seeks.push(time);
        log.current_time = time;
    }

    fn current_time(&self) -> f64 {
        self.log().current_time
    }

    fn duration(&self) -> f64 {
        self.log().duration
    }

    fn is_paused(&self) -> bool {
        self.log().paused
    }

    fn text_tracks(&self) -> Vec<EngineTrack> {
        self.log().text_tracks.clone()
    }

    fn audio_tracks(&self) -> Vec<EngineTrack> {
        self.log().audio_tracks.clone()
    }

    fn set_text_track_showing(&mut self, index: usize, showing: bool) {
        if let Some(track) = self.log().text_tracks.get_mut(index) {
            track.active = showing;
        }
    }

    fn set_audio_track_enabled(&mut self, index: usize, enabled: bool) {
        if let Some(track) = self.log().audio_tracks.get_mut(index) {
            track.active = enabled;
        }
    }

    fn drain_events(&mut self) -> Vec<EngineEvent> {
        std::mem::take(&mut self.log().pending_events)
    }
}

#[derive(Debug, Default)]
pub struct RuntimeLog {
    pub fail_start: Option<String>,
    pub started_with: Option<ReceiverOptions>,
    pub logger_levels: Vec<LoggerLevel>,
    pub completed: Vec<InboundRequest>,
    pub raw_completed: Vec<serde_json::Value>,
    pub media_tracks: Vec<TrackDescriptor>,
    pub active_ids: Vec<TrackId>,
    pub broadcasts: Vec<PlayerSnapshot>,
}

#[derive(Clone, Default)]
pub struct FakeRuntime {
    pub log: Arc<Mutex<RuntimeLog>>,
}

impl FakeRuntime {
    pub fn log(&self) -> MutexGuard<'_, RuntimeLog> {
        lock(&self.log)
    }
}

impl CastRuntime for FakeRuntime {
    fn start(&mut self, options: &ReceiverOptions) -> Result<(), String> {
        let mut log = self.log();
        if let Some(err) = log.fail_start.clone() {
            return Err(err);
        }
        log.started_with = Some(options.clone());
        Ok(())
    }

    fn set_logger_level(&mut self, level: LoggerLevel) {
        self.log().logger_levels.push(level);
    }

    fn complete_request(&mut self, request: InboundRequest) {
        self.log().completed.push(request);
    }

    fn complete_raw_request(&mut self, raw: &serde_json::Value) {
        self.log().raw_completed.push(raw.clone());
    }

    fn set_media_tracks(&mut self, tracks: &[TrackDescriptor]) {
        self.log().media_tracks = tracks.to_vec();
    }

    fn set_active_track_ids(&mut self, ids: &[TrackId]) {
        self.log().active_ids = ids.to_vec();
    }

    fn broadcast_status(&mut self, snapshot: &PlayerSnapshot) {
        self.log().broadcasts.push(snapshot.clone());
    }
}

/// Fetcher serving fixed documents keyed by URL.
#[derive(Default)]
pub struct FakeFetcher {
    pub documents: HashMap<String, Result<String, String>>,
}

impl FakeFetcher {
    pub fn with_document(url: &str, body: &str) -> Self {
        let mut documents = HashMap::new();
        documents.insert(url.to_string(), Ok(body.to_string()));
        Self { documents }
    }
}

impl DocumentFetcher for FakeFetcher {
    fn fetch(&self, url: &str) -> Result<String, String> {
        self.documents
            .get(url)
            .cloned()
            .unwrap_or_else(|| Err(format!("no document for {url}")))
    }
}

/// A context wired to fakes, plus the handles needed to inspect them.
pub struct Harness {
    pub ctx: ReceiverContext,
    pub engine: FakeEngine,
    pub runtime: FakeRuntime,
}

pub fn harness_with(engine: FakeEngine, fetcher: FakeFetcher) -> Harness {
    let runtime = FakeRuntime::default();
    let (bus_sender, _) = broadcast::channel::<Message>(256);
    let ctx = ReceiverContext::new(
        ReceiverConfig::default(),
        Box::new(engine.clone()),
        Box::new(runtime.clone()),
        Arc::new(fetcher),
        bus_sender,
    );
    Harness {
        ctx,
        engine,
        runtime,
    }
}

pub fn harness() -> Harness {
    harness_with(FakeEngine::default(), FakeFetcher::default())
}

/// Harness whose receiver already started successfully.
pub fn ready_harness() -> Harness {
    let mut harness = harness();
    harness.ctx.start();
    harness
}
