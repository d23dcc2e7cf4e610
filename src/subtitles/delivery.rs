//! Out-of-band subtitle delivery driven by custom-namespace messages.
//!
//! Fetches run on worker threads and post their result back on the bus, so
//! callers never wait on the network. Results are applied in arrival order;
//! a slower earlier fetch simply overwrites a faster later one.

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use log::{debug, error, info, warn};
use tokio::sync::broadcast::Sender;

use crate::protocol::{CustomMessage, Message, SubtitleMessage, TrackId};
use crate::subtitles::cue_parser::{active_cue_at, parse_cues, SubtitleCue};
use crate::subtitles::fetcher::DocumentFetcher;

pub const SUBTITLES_MESSAGE_TYPE: &str = "subtitles";
pub const SUBTITLE_SIZE_MESSAGE_TYPE: &str = "subtitleSize";

pub struct SubtitleDelivery {
    cues: Vec<SubtitleCue>,
    active_track: Option<TrackId>,
    in_flight: HashSet<String>,
    current_text: String,
    last_time: f64,
    visible: bool,
    size: f64,
    fetcher: Arc<dyn DocumentFetcher>,
    bus_producer: Sender<Message>,
}

impl SubtitleDelivery {
    pub fn new(fetcher: Arc<dyn DocumentFetcher>, bus_producer: Sender<Message>, size: f64) -> Self {
        Self {
            cues: Vec::new(),
            active_track: None,
            in_flight: HashSet::new(),
            current_text: String::new(),
            last_time: 0.0,
            visible: false,
            size,
            fetcher,
            bus_producer,
        }
    }

    pub fn current_text(&self) -> &str {
        &self.current_text
    }

    #[cfg(test)]
    pub fn visible(&self) -> bool {
        self.visible
    }

    pub fn size(&self) -> f64 {
        self.size
    }

    #[cfg(test)]
    pub fn cue_count(&self) -> usize {
        self.cues.len()
    }

    /// Track whose locator the current cues came from, if any.
    pub fn active_track(&self) -> Option<TrackId> {
        self.active_track
    }

    /// Starts fetching a cue document. An empty URL turns subtitles off.
    pub fn load_from_url(&mut self, url: &str) {
        let url = url.trim();
        if url.is_empty() {
            self.clear();
            return;
        }
        self.active_track = None;
        self.request(url);
    }

    /// Starts fetching the document behind an out-of-band text track.
    pub fn load_track(&mut self, track_id: TrackId, locator: &str) {
        let locator = locator.trim();
        if locator.is_empty() {
            warn!(
                "SubtitleDelivery: track {} has no locator, nothing to load",
                track_id
            );
            return;
        }
        self.active_track = Some(track_id);
        self.request(locator);
    }

    fn request(&mut self, url: &str) {
        info!("SubtitleDelivery: loading subtitles from {}", url);
        self.in_flight.insert(url.to_string());
        let fetcher = Arc::clone(&self.fetcher);
        let bus_producer = self.bus_producer.clone();
        let url = url.to_string();
        thread::spawn(move || {
            let result = fetcher.fetch(&url);
            let _ = bus_producer.send(Message::Subtitle(SubtitleMessage::DocumentFetched {
                url,
                result,
            }));
        });
    }

    /// Applies a fetch completion. Returns whether the cue set changed.
    pub fn apply_document(&mut self, url: &str, result: Result<String, String>) -> bool {
        if !self.in_flight.remove(url) {
            debug!(
                "SubtitleDelivery: ignoring document for {} fetched after subtitles were cleared",
                url
            );
            return false;
        }
        match result {
            Ok(document) => {
                self.cues = parse_cues(&document);
                self.visible = true;
                self.current_text = active_cue_at(&self.cues, self.last_time).to_string();
                info!("SubtitleDelivery: loaded {} subtitle cues", self.cues.len());
                true
            }
            Err(err) => {
                error!(
                    "SubtitleDelivery: failed to load subtitles from URL {}: {}",
                    url, err
                );
                false
            }
        }
    }

    /// Recomputes the active cue for `time`. Returns whether the text changed.
    pub fn on_time_update(&mut self, time: f64) -> bool {
        self.last_time = time;
        let next = if self.visible {
            active_cue_at(&self.cues, time)
        } else {
            ""
        };
        if next == self.current_text {
            return false;
        }
        self.current_text = next.to_string();
        true
    }

    /// Drops all cues, pending fetches and the active-track marker.
    pub fn clear(&mut self) {
        if !self.cues.is_empty() || !self.in_flight.is_empty() {
            debug!("SubtitleDelivery: clearing subtitles");
        }
        self.cues.clear();
        self.in_flight.clear();
        self.active_track = None;
        self.current_text.clear();
        self.visible = false;
    }

    pub fn set_size(&mut self, size: f64) -> bool {
        if !size.is_finite() || size <= 0.0 {
            warn!("SubtitleDelivery: ignoring invalid subtitle size {}", size);
            return false;
        }
        self.size = size;
        true
    }

    /// Handles a `{type, data}` message from the custom namespace.
    pub fn handle_custom_message(&mut self, message: &CustomMessage) {
        match message.kind.as_str() {
            SUBTITLES_MESSAGE_TYPE => {
                let url = message
                    .data
                    .get("subtitlesUrl")
                    .and_then(|value| value.as_str())
                    .unwrap_or_default();
                self.load_from_url(url);
            }
            SUBTITLE_SIZE_MESSAGE_TYPE => {
                match message.data.get("subtitleSize").and_then(|value| value.as_f64()) {
                    Some(size) => {
                        self.set_size(size);
                    }
                    None => warn!(
                        "SubtitleDelivery: subtitleSize message without a numeric size: {}",
                        message.data
                    ),
                }
            }
            other => warn!("SubtitleDelivery: ignoring unknown custom message type '{}'", other),
        }
    }
}
