//! Everything the dispatch loop owns, plus the shared side effects that the
//! command interceptor, event relay and remote control all trigger.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use log::{debug, info, warn, LevelFilter};
use tokio::sync::broadcast::Sender;

use crate::app_state::AppState;
use crate::cast_runtime::{CastRuntime, PlayerSnapshot, ReceiverOptions};
use crate::command_interceptor::clamp_seek_target;
use crate::config::{LoggerLevel, ReceiverConfig};
use crate::diagnostics::{
    lock_ring, CornerTapDetector, DiagnosticOverlay, LogRing, SharedLogRing, ShowReason,
};
use crate::player_engine::PlayerEngine;
use crate::protocol::{InputMessage, Message, TimerKind, TrackId};
use crate::remote_control::{map_key, MenuContext, RemoteAction, RemoteMenu};
use crate::subtitles::{DocumentFetcher, SubtitleDelivery};
use crate::track_reconciler::TrackReconciler;
use crate::ui_projection::{ProjectionSources, UiSnapshot};
use crate::ui_timers::UiTimers;

type StatusLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

pub struct ReceiverContext {
    pub config: ReceiverConfig,
    pub state: AppState,
    pub engine: Box<dyn PlayerEngine>,
    pub runtime: Box<dyn CastRuntime>,
    pub tracks: TrackReconciler,
    pub subtitles: SubtitleDelivery,
    pub overlay: DiagnosticOverlay,
    pub corner_taps: CornerTapDetector,
    pub log_ring: SharedLogRing,
    pub menu: RemoteMenu,
    pub timers: UiTimers,
    /// Active ids requested by LOAD, applied after track discovery.
    pub pending_active_track_ids: Option<Vec<TrackId>>,
    pub bus_producer: Sender<Message>,
    debug_mode: bool,
    commands_enabled: bool,
    status_limiter: StatusLimiter,
}

impl ReceiverContext {
    pub fn new(
        config: ReceiverConfig,
        engine: Box<dyn PlayerEngine>,
        runtime: Box<dyn CastRuntime>,
        fetcher: Arc<dyn DocumentFetcher>,
        bus_producer: Sender<Message>,
    ) -> Self {
        let subtitles =
            SubtitleDelivery::new(fetcher, bus_producer.clone(), config.subtitles.default_size);
        let timers = UiTimers::new(
            config.ui.seek_feedback_ms,
            config.ui.inactivity_timeout_ms,
            bus_producer.clone(),
        );
        let status_quota =
            Quota::with_period(Duration::from_millis(config.ui.status_broadcast_interval_ms))
                .unwrap_or_else(|| Quota::per_second(NonZeroU32::MIN))
                .allow_burst(NonZeroU32::MIN);
        Self {
            log_ring: LogRing::shared(config.diagnostics.log_capacity),
            debug_mode: config.diagnostics.debug,
            config,
            state: AppState::new(),
            engine,
            runtime,
            tracks: TrackReconciler::new(),
            subtitles,
            overlay: DiagnosticOverlay::default(),
            corner_taps: CornerTapDetector::default(),
            menu: RemoteMenu::default(),
            timers,
            pending_active_track_ids: None,
            bus_producer,
            commands_enabled: false,
            status_limiter: RateLimiter::direct(status_quota),
        }
    }

    /// Shares the ring the process logger writes into.
    pub fn with_log_ring(mut self, log_ring: SharedLogRing) -> Self {
        self.log_ring = log_ring;
        self
    }

    #[cfg(test)]
    pub fn debug_mode(&self) -> bool {
        self.debug_mode
    }

    pub fn commands_enabled(&self) -> bool {
        self.commands_enabled
    }

    /// Starts the cast runtime. Failure leaves the receiver in `Error` with
    /// command handling disabled.
    pub fn start(&mut self) {
        let options = ReceiverOptions::from_config(&self.config);
        let level = if self.debug_mode {
            LoggerLevel::Debug
        } else {
            self.config.receiver.logger_level
        };
        self.runtime.set_logger_level(level);
        match self.runtime.start(&options) {
            Ok(()) => {
                self.commands_enabled = true;
                self.state.set_ready();
                info!(
                    "ReceiverContext: receiver started on namespace {}",
                    options.custom_namespace
                );
                if self.debug_mode {
                    self.open_debug_view();
                }
            }
            Err(err) => {
                self.commands_enabled = false;
                self.state
                    .fail(&format!("Failed to initialize cast receiver: {err}"));
                self.overlay.show(ShowReason::PlaybackError);
                log::error!("ReceiverContext: cast runtime failed to start: {}", err);
            }
        }
    }

    /// Raises runtime and local log verbosity and opens the diagnostic view.
    pub fn enable_debug_mode(&mut self, source: &str) {
        if self.debug_mode {
            return;
        }
        self.debug_mode = true;
        info!("ReceiverContext: debug mode enabled by {}", source);
        self.runtime.set_logger_level(LoggerLevel::Debug);
        self.open_debug_view();
    }

    fn open_debug_view(&mut self) {
        if log::max_level() < LevelFilter::Debug {
            log::set_max_level(LevelFilter::Debug);
        }
        if !self.overlay.visible() {
            self.overlay.show(ShowReason::User);
        }
    }

    pub fn player_snapshot(&self) -> PlayerSnapshot {
        let engine_duration = self.engine.duration();
        PlayerSnapshot {
            current_time: self.engine.current_time(),
            duration: if engine_duration.is_finite() {
                engine_duration
            } else {
                self.state.duration()
            },
            paused: self.engine.is_paused(),
            lifecycle: self.state.lifecycle(),
        }
    }

    pub fn broadcast_status(&mut self) {
        let snapshot = self.player_snapshot();
        self.runtime.broadcast_status(&snapshot);
    }

    /// Broadcast used by the time-update path, at most one per interval.
    pub fn broadcast_status_throttled(&mut self) {
        if self.status_limiter.check().is_ok() {
            self.broadcast_status();
        }
    }

    /// Feeds the runtime the discovered tracks and the active selection.
    pub fn publish_tracks(&mut self) {
        let tracks = self.tracks.tracks();
        let active_ids = self.tracks.selection().active_ids();
        self.runtime.set_media_tracks(&tracks);
        self.runtime.set_active_track_ids(&active_ids);
    }

    /// Keeps the custom subtitle channel in step with the text selection.
    pub fn sync_subtitles_with_selection(&mut self) {
        match self.tracks.selection().text {
            Some(id) => {
                if self.subtitles.active_track() == Some(id) {
                    return;
                }
                let locator = self
                    .tracks
                    .descriptor(id)
                    .and_then(|descriptor| descriptor.content_locator.clone());
                if let Some(locator) = locator {
                    self.subtitles.load_track(id, &locator);
                }
            }
            None => {
                if self.subtitles.active_track().is_some() {
                    self.subtitles.clear();
                }
            }
        }
    }

    pub fn note_user_activity(&mut self) {
        self.state.set_user_inactive(false);
        self.timers.user_inactivity.restart();
    }

    pub fn show_seek_feedback(&mut self) {
        self.state.set_seek_feedback_visible(true);
        self.timers.seek_feedback.restart();
    }

    pub fn handle_timer_elapsed(&mut self, kind: TimerKind, generation: u64) {
        if !self.timers.get_mut(kind).expire(generation) {
            return;
        }
        match kind {
            TimerKind::SeekFeedback => self.state.set_seek_feedback_visible(false),
            TimerKind::UserInactivity => self.state.set_user_inactive(true),
        }
    }

    /// Seeks to `target`, clamped to the known duration.
    pub fn seek_clamped(&mut self, target: f64) -> f64 {
        let duration = self.player_snapshot().duration;
        let clamped = clamp_seek_target(target, duration);
        self.engine.seek(clamped);
        self.show_seek_feedback();
        clamped
    }

    pub fn menu_context(&self) -> MenuContext {
        let audio = self.tracks.audio_menu();
        let subtitles = self.tracks.subtitle_menu();
        MenuContext {
            audio_rows: audio.len(),
            subtitle_rows: subtitles.len(),
            active_audio_row: audio.iter().position(|row| row.active).unwrap_or(0),
            active_subtitle_row: subtitles.iter().position(|row| row.active).unwrap_or(0),
            diagnostics_visible: self.overlay.visible(),
        }
    }

    pub fn handle_input(&mut self, input: InputMessage) {
        match input {
            InputMessage::Key(key) => {
                self.note_user_activity();
                let Some(remote_key) = map_key(&key) else {
                    debug!("ReceiverContext: unmapped key '{}'", key);
                    return;
                };
                let context = self.menu_context();
                let action = self.menu.handle_key(remote_key, &context);
                self.apply_remote_action(action);
            }
            InputMessage::Click {
                x,
                y,
                width,
                height: _,
            } => {
                if self.corner_taps.register_tap(x, y, width, Instant::now()) {
                    self.overlay.toggle();
                }
            }
        }
    }

    fn apply_remote_action(&mut self, action: RemoteAction) {
        match action {
            RemoteAction::None => {}
            RemoteAction::TogglePlayPause => {
                if self.engine.is_paused() {
                    self.engine.play();
                } else {
                    self.engine.pause();
                }
            }
            RemoteAction::Play => self.engine.play(),
            RemoteAction::Pause => self.engine.pause(),
            RemoteAction::SeekStep(direction) => {
                let target =
                    self.engine.current_time() + direction * self.config.playback.seek_step_secs;
                self.seek_clamped(target);
            }
            RemoteAction::SelectAudio(row) => {
                if self
                    .tracks
                    .select_audio_position(self.engine.as_mut(), row)
                    .is_none()
                {
                    warn!("ReceiverContext: no audio track at menu row {}", row);
                }
                self.publish_tracks();
            }
            RemoteAction::SelectSubtitle(row) => {
                self.tracks
                    .select_subtitle_position(self.engine.as_mut(), row);
                self.publish_tracks();
                self.sync_subtitles_with_selection();
            }
            RemoteAction::ScrollDiagnostics(delta) => {
                let entry_count = lock_ring(&self.log_ring).len();
                self.overlay.scroll_by(delta, entry_count);
            }
            RemoteAction::ToggleDiagnostics => self.overlay.toggle(),
            RemoteAction::HideDiagnostics => self.overlay.hide(),
            RemoteAction::ClearLogs => {
                lock_ring(&self.log_ring).clear();
                self.overlay.reset_scroll();
            }
        }
    }

    pub fn snapshot(&self) -> UiSnapshot {
        UiSnapshot::project(&ProjectionSources {
            state: &self.state,
            subtitles: &self.subtitles,
            tracks: &self.tracks,
            menu: &self.menu,
            overlay: &self.overlay,
            log_ring: &self.log_ring,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::app_state::Lifecycle;
    use crate::config::LoggerLevel;
    use crate::diagnostics::{lock_ring, Severity, ShowReason};
    use crate::player_engine::{EngineTrack, PlayerEngine};
    use crate::protocol::{InputMessage, TextTrackSubtype, TimerKind};
    use crate::test_support::{harness, harness_with, ready_harness, FakeEngine, FakeFetcher};

    fn press(ctx: &mut crate::receiver_context::ReceiverContext, key: &str) {
        ctx.handle_input(InputMessage::Key(key.to_string()));
    }

    #[test]
    fn test_start_failure_enters_error_and_disables_commands() {
        let mut harness = harness();
        harness.runtime.log().fail_start = Some("cast runtime missing".to_string());
        harness.ctx.start();

        assert_eq!(harness.ctx.state.lifecycle(), Lifecycle::Error);
        assert!(harness
            .ctx
            .state
            .error_message()
            .is_some_and(|message| message.contains("cast runtime missing")));
        assert!(!harness.ctx.commands_enabled());
        assert!(harness.ctx.overlay.visible());
    }

    #[test]
    fn test_start_success_goes_idle_with_configured_logger_level() {
        let harness = ready_harness();
        assert_eq!(harness.ctx.state.lifecycle(), Lifecycle::Idle);
        assert!(harness.ctx.commands_enabled());
        let log = harness.runtime.log();
        assert_eq!(log.logger_levels, vec![LoggerLevel::Warning]);
        assert!(log.started_with.is_some());
    }

    #[test]
    fn test_debug_mode_raises_runtime_logger_and_opens_overlay() {
        let mut harness = ready_harness();
        harness.ctx.enable_debug_mode("test");
        harness.ctx.enable_debug_mode("test again");
        assert!(harness.ctx.debug_mode());
        assert_eq!(harness.ctx.overlay.last_show_reason(), Some(ShowReason::User));
        assert_eq!(
            harness.runtime.log().logger_levels,
            vec![LoggerLevel::Warning, LoggerLevel::Debug]
        );
    }

    #[test]
    fn test_stale_timer_generations_are_ignored() {
        let mut harness = ready_harness();
        harness.ctx.show_seek_feedback();
        harness.ctx.handle_timer_elapsed(TimerKind::SeekFeedback, 0);
        assert!(harness.ctx.state.seek_feedback_visible());

        let current = harness.ctx.timers.seek_feedback.restart();
        harness.ctx.handle_timer_elapsed(TimerKind::SeekFeedback, current);
        assert!(!harness.ctx.state.seek_feedback_visible());
    }

    #[test]
    fn test_remote_keys_seek_by_step_and_toggle_playback() {
        let mut harness = ready_harness();
        harness.engine.log().current_time = 5.0;
        press(&mut harness.ctx, "ArrowLeft");
        assert_eq!(harness.engine.log().seeks, vec![0.0]);
        press(&mut harness.ctx, "MediaFastForward");
        assert_eq!(harness.engine.log().seeks, vec![0.0, 10.0]);
        assert!(harness.ctx.state.seek_feedback_visible());

        press(&mut harness.ctx, "Enter");
        assert_eq!(harness.engine.log().play_calls, 1);
        press(&mut harness.ctx, "Enter");
        assert_eq!(harness.engine.log().pause_calls, 1);
        assert!(!harness.ctx.state.user_inactive());
    }

    #[test]
    fn test_subtitle_menu_selection_reaches_engine_and_runtime() {
        let mut english = EngineTrack::text(TextTrackSubtype::Subtitles, "English", "en", None);
        english.engine_id = Some(1);
        let audio = EngineTrack::audio("Main", "en", true);
        let engine = FakeEngine::with_tracks(vec![english], vec![audio]);
        let mut harness = harness_with(engine, FakeFetcher::default());
        harness.ctx.start();
        harness.ctx.tracks.register_load(&[]);
        harness.ctx.tracks.discover_tracks(harness.ctx.engine.as_ref());

        press(&mut harness.ctx, "s");
        press(&mut harness.ctx, "ArrowDown");
        press(&mut harness.ctx, "Enter");

        assert_eq!(harness.engine.showing_text_indices(), vec![0]);
        assert_eq!(harness.runtime.log().active_ids, vec![2, 1]);
        assert!(!harness.ctx.menu.visible());
    }

    #[test]
    fn test_clear_key_empties_log_ring_only_while_overlay_open() {
        let mut harness = ready_harness();
        lock_ring(&harness.ctx.log_ring).add_log(Severity::Info, "kept");
        press(&mut harness.ctx, "c");
        assert_eq!(lock_ring(&harness.ctx.log_ring).len(), 1);

        press(&mut harness.ctx, "d");
        press(&mut harness.ctx, "c");
        assert!(lock_ring(&harness.ctx.log_ring).is_empty());
    }

    #[test]
    fn test_player_snapshot_falls_back_to_state_duration() {
        let mut harness = ready_harness();
        harness
            .ctx
            .state
            .begin_load(Default::default(), Some(90.0));
        let snapshot = harness.ctx.player_snapshot();
        assert!((snapshot.duration - 90.0).abs() < f64::EPSILON);
        assert!(harness.ctx.engine.is_paused());
    }
}
