//! Application state model: the single source of truth for lifecycle,
//! playback clock, display metadata and the last error.
//!
//! All writes go through named setters. The receiver manager is the only
//! owner, so setters take `&mut self` and never perform I/O.

use log::{debug, warn};

use crate::protocol::MediaMetadata;

/// Coarse-grained application phase. Exactly one tag is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Receiver is initializing.
    Loading,
    /// Receiver is ready and no content is playing.
    Idle,
    /// A load was accepted and the engine is fetching the source.
    ContentLoading,
    Buffering,
    Playing,
    Paused,
    Error,
}

impl Lifecycle {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Loading => "loading",
            Self::Idle => "idle",
            Self::ContentLoading => "content-loading",
            Self::Buffering => "buffering",
            Self::Playing => "playing",
            Self::Paused => "paused",
            Self::Error => "error",
        }
    }
}

/// Display metadata for the current item.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisplayMetadata {
    pub title: String,
    pub subtitle: String,
    pub thumbnail_url: String,
}

impl DisplayMetadata {
    /// Builds display metadata from a load payload. Missing fields are empty.
    pub fn from_media_metadata(metadata: Option<&MediaMetadata>) -> Self {
        let Some(metadata) = metadata else {
            return Self::default();
        };
        Self {
            title: metadata.title.clone().unwrap_or_default(),
            subtitle: metadata.subtitle.clone().unwrap_or_default(),
            thumbnail_url: metadata
                .images
                .first()
                .map(|image| image.url.clone())
                .unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppState {
    lifecycle: Lifecycle,
    current_time: f64,
    duration: f64,
    error_message: Option<String>,
    metadata: DisplayMetadata,
    content_loaded: bool,
    seek_feedback_visible: bool,
    user_inactive: bool,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl AppState {
    pub fn new() -> Self {
        Self {
            lifecycle: Lifecycle::Loading,
            current_time: 0.0,
            duration: f64::NAN,
            error_message: None,
            metadata: DisplayMetadata::default(),
            content_loaded: false,
            seek_feedback_visible: false,
            user_inactive: false,
        }
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    /// Duration in seconds, NaN while unknown.
    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn metadata(&self) -> &DisplayMetadata {
        &self.metadata
    }

    pub fn seek_feedback_visible(&self) -> bool {
        self.seek_feedback_visible
    }

    pub fn user_inactive(&self) -> bool {
        self.user_inactive
    }

    /// Receiver finished initializing.
    pub fn set_ready(&mut self) {
        self.lifecycle = Lifecycle::Idle;
    }

    /// Starts a new play session. Metadata is replaced wholesale, the clock is
    /// reset and any previous error is cleared.
    pub fn begin_load(&mut self, metadata: DisplayMetadata, duration_hint: Option<f64>) {
        self.metadata = metadata;
        self.current_time = 0.0;
        self.duration = duration_hint
            .filter(|value| value.is_finite() && *value > 0.0)
            .unwrap_or(f64::NAN);
        self.error_message = None;
        self.content_loaded = true;
        self.lifecycle = Lifecycle::ContentLoading;
    }

    /// Engine started fetching the source. Ignored until a load succeeded.
    pub fn set_content_loading(&mut self) {
        if self.content_loaded {
            self.error_message = None;
            self.lifecycle = Lifecycle::ContentLoading;
        }
    }

    pub fn set_playing(&mut self) -> bool {
        self.set_content_state(Lifecycle::Playing)
    }

    pub fn set_paused(&mut self) -> bool {
        self.set_content_state(Lifecycle::Paused)
    }

    pub fn set_buffering(&mut self) -> bool {
        self.set_content_state(Lifecycle::Buffering)
    }

    fn set_content_state(&mut self, next: Lifecycle) -> bool {
        if !self.content_loaded {
            warn!(
                "AppState: ignoring transition to {} before any successful load",
                next.as_str()
            );
            return false;
        }
        if next == Lifecycle::Playing {
            self.error_message = None;
        }
        self.lifecycle = next;
        true
    }

    /// Playback reached the end; content state is cleared.
    pub fn set_ended(&mut self) {
        self.lifecycle = Lifecycle::Idle;
    }

    /// Records an unrecoverable fault. The message is never empty.
    pub fn fail(&mut self, message: &str) {
        let message = message.trim();
        let message = if message.is_empty() {
            "Unknown error".to_string()
        } else {
            message.to_string()
        };
        debug!("AppState: entering error state: {}", message);
        self.error_message = Some(message);
        self.lifecycle = Lifecycle::Error;
    }

    /// Time-update hot path: two field writes, no allocation.
    pub fn update_clock(&mut self, current_time: f64, duration: f64) {
        if current_time.is_finite() {
            self.current_time = current_time.max(0.0);
        }
        if duration.is_finite() && duration > 0.0 {
            self.duration = duration;
        }
    }

    pub fn set_seek_feedback_visible(&mut self, visible: bool) {
        self.seek_feedback_visible = visible;
    }

    pub fn set_user_inactive(&mut self, inactive: bool) {
        self.user_inactive = inactive;
    }

    pub fn is_playing(&self) -> bool {
        self.lifecycle == Lifecycle::Playing
    }

    /// Playback progress in percent, 0 when the duration is unknown or zero.
    pub fn progress_percent(&self) -> f64 {
        if !self.duration.is_finite() || self.duration <= 0.0 || !self.current_time.is_finite()
        {
            return 0.0;
        }
        (self.current_time / self.duration * 100.0).clamp(0.0, 100.0)
    }

    pub fn elapsed_text(&self) -> String {
        format_time(self.current_time)
    }

    pub fn duration_text(&self) -> String {
        format_time(self.duration)
    }

    pub fn status_text(&self) -> &'static str {
        match self.lifecycle {
            Lifecycle::Loading => "Initializing receiver...",
            Lifecycle::Idle => "Ready to Cast",
            Lifecycle::ContentLoading => "Loading...",
            Lifecycle::Buffering => "Buffering...",
            Lifecycle::Playing => "Playing",
            Lifecycle::Paused => "Paused",
            Lifecycle::Error => "Error occurred",
        }
    }
}

/// Formats seconds as `M:SS`, or `H:MM:SS` from one hour on.
pub fn format_time(seconds: f64) -> String {
    if !seconds.is_finite() || seconds < 0.0 {
        return "0:00".to_string();
    }
    let total = seconds.floor() as u64;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes}:{secs:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::{format_time, AppState, DisplayMetadata, Lifecycle};
    use crate::protocol::{MediaImage, MediaMetadata};

    fn loaded_state() -> AppState {
        let mut state = AppState::new();
        state.set_ready();
        state.begin_load(DisplayMetadata::default(), None);
        state
    }

    #[test]
    fn test_new_state_starts_loading_with_unknown_duration() {
        let state = AppState::new();
        assert_eq!(state.lifecycle(), Lifecycle::Loading);
        assert!(state.duration().is_nan());
        assert_eq!(state.current_time(), 0.0);
        assert!(state.error_message().is_none());
    }

    #[test]
    fn test_playing_is_unreachable_before_load() {
        let mut state = AppState::new();
        state.set_ready();
        assert!(!state.set_playing());
        assert!(!state.set_paused());
        assert!(!state.set_buffering());
        assert_eq!(state.lifecycle(), Lifecycle::Idle);
    }

    #[test]
    fn test_fail_always_carries_non_empty_message() {
        let mut state = loaded_state();
        state.fail("   ");
        assert_eq!(state.lifecycle(), Lifecycle::Error);
        assert_eq!(state.error_message(), Some("Unknown error"));
    }

    #[test]
    fn test_content_loading_before_any_load_keeps_error() {
        let mut state = AppState::new();
        state.fail("Receiver failed to start");
        state.set_content_loading();
        assert_eq!(state.lifecycle(), Lifecycle::Error);
        assert_eq!(state.error_message(), Some("Receiver failed to start"));
    }

    #[test]
    fn test_begin_load_clears_error_and_resets_clock() {
        let mut state = loaded_state();
        state.update_clock(42.0, 100.0);
        state.fail("Error 3: decode");
        state.begin_load(DisplayMetadata::default(), None);
        assert_eq!(state.lifecycle(), Lifecycle::ContentLoading);
        assert!(state.error_message().is_none());
        assert_eq!(state.current_time(), 0.0);
        assert!(state.duration().is_nan());
    }

    #[test]
    fn test_playing_recovers_from_error_after_load() {
        let mut state = loaded_state();
        state.fail("CAF Error: 905");
        assert!(state.set_playing());
        assert_eq!(state.lifecycle(), Lifecycle::Playing);
        assert!(state.error_message().is_none());
    }

    #[test]
    fn test_progress_is_guarded_against_unknown_and_zero_duration() {
        let mut state = loaded_state();
        state.update_clock(10.0, f64::NAN);
        assert_eq!(state.progress_percent(), 0.0);
        state.update_clock(10.0, 0.0);
        assert_eq!(state.progress_percent(), 0.0);
        state.update_clock(25.0, 100.0);
        assert!((state.progress_percent() - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_display_metadata_takes_first_image_as_thumbnail() {
        let metadata = MediaMetadata {
            title: Some("X".to_string()),
            images: vec![
                MediaImage {
                    url: "u".to_string(),
                },
                MediaImage {
                    url: "v".to_string(),
                },
            ],
            ..MediaMetadata::default()
        };
        let display = DisplayMetadata::from_media_metadata(Some(&metadata));
        assert_eq!(display.title, "X");
        assert_eq!(display.thumbnail_url, "u");
        assert!(display.subtitle.is_empty());
    }

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(f64::NAN), "0:00");
        assert_eq!(format_time(f64::INFINITY), "0:00");
        assert_eq!(format_time(5.9), "0:05");
        assert_eq!(format_time(65.0), "1:05");
        assert_eq!(format_time(3_725.0), "1:02:05");
    }

    #[test]
    fn test_status_text_follows_lifecycle() {
        let mut state = AppState::new();
        assert_eq!(state.status_text(), "Initializing receiver...");
        state.set_ready();
        assert_eq!(state.status_text(), "Ready to Cast");
        state.fail("boom");
        assert_eq!(state.status_text(), "Error occurred");
    }
}
