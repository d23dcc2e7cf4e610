//! Translates engine and runtime events into application-state transitions.
//!
//! Both event vocabularies collapse into one closed `Transition` enum, and
//! `relay` is the only place that applies them. Time updates take the cheap
//! path: a clock write, the cue lookup and a rate-limited status broadcast.

use log::{debug, error, info};

use crate::diagnostics::ShowReason;
use crate::protocol::{EngineEvent, RuntimeEvent};
use crate::receiver_context::ReceiverContext;

const GENERIC_PLAYBACK_ERROR: &str = "An error occurred during playback";

#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    ContentLoading,
    MetadataReady,
    Playing,
    Paused,
    Buffering,
    Clock { current_time: f64, duration: f64 },
    Ended,
    Failed(String),
}

impl From<EngineEvent> for Transition {
    fn from(event: EngineEvent) -> Self {
        match event {
            EngineEvent::LoadStart => Self::ContentLoading,
            EngineEvent::LoadedMetadata => Self::MetadataReady,
            EngineEvent::Playing => Self::Playing,
            EngineEvent::Pause => Self::Paused,
            EngineEvent::Waiting => Self::Buffering,
            EngineEvent::TimeUpdate {
                current_time,
                duration,
            } => Self::Clock {
                current_time,
                duration,
            },
            EngineEvent::Ended => Self::Ended,
            EngineEvent::Error { code, message } => Self::Failed(engine_error_message(code, message)),
        }
    }
}

impl From<RuntimeEvent> for Transition {
    fn from(event: RuntimeEvent) -> Self {
        match event {
            RuntimeEvent::PlayerLoadComplete => Self::MetadataReady,
            RuntimeEvent::Playing => Self::Playing,
            RuntimeEvent::Pause => Self::Paused,
            RuntimeEvent::Buffering => Self::Buffering,
            RuntimeEvent::Ended => Self::Ended,
            RuntimeEvent::TimeUpdate {
                current_media_time,
                duration,
            } => Self::Clock {
                current_time: current_media_time.unwrap_or(0.0),
                duration: duration.unwrap_or(f64::NAN),
            },
            RuntimeEvent::Error {
                detailed_error_code,
                reason,
            } => {
                if let Some(reason) = reason.as_deref() {
                    debug!("EventRelay: runtime error reason: {}", reason);
                }
                let code = detailed_error_code
                    .filter(|code| *code != 0)
                    .map_or_else(|| "Unknown error".to_string(), |code| code.to_string());
                Self::Failed(format!("CAF Error: {code}"))
            }
        }
    }
}

fn engine_error_message(code: Option<u32>, message: Option<String>) -> String {
    let message = message.filter(|message| !message.trim().is_empty());
    match (code, message) {
        (Some(code), Some(message)) => format!("Error {code}: {message}"),
        (Some(code), None) => format!("Error {code}: {GENERIC_PLAYBACK_ERROR}"),
        (None, Some(message)) => message,
        (None, None) => GENERIC_PLAYBACK_ERROR.to_string(),
    }
}

/// Applies one transition to the receiver state.
pub fn relay(ctx: &mut ReceiverContext, transition: Transition) {
    match transition {
        Transition::Clock {
            current_time,
            duration,
        } => {
            ctx.state.update_clock(current_time, duration);
            ctx.subtitles.on_time_update(ctx.state.current_time());
            ctx.broadcast_status_throttled();
            return;
        }
        Transition::ContentLoading => {
            debug!("EventRelay: content loading");
            ctx.state.set_content_loading();
        }
        Transition::MetadataReady => {
            ctx.state
                .update_clock(ctx.engine.current_time(), ctx.engine.duration());
            ctx.tracks.discover_tracks(ctx.engine.as_ref());
            if let Some(active_ids) = ctx.pending_active_track_ids.take() {
                ctx.tracks.apply_selection(ctx.engine.as_mut(), &active_ids);
            }
            ctx.publish_tracks();
            ctx.sync_subtitles_with_selection();
        }
        Transition::Playing => {
            if ctx.state.set_playing() && ctx.overlay.dismiss_error_view() {
                info!("EventRelay: playback resumed, closing error diagnostics");
            }
        }
        Transition::Paused => {
            ctx.state.set_paused();
        }
        Transition::Buffering => {
            ctx.state.set_buffering();
        }
        Transition::Ended => {
            info!("EventRelay: playback ended");
            ctx.state.set_ended();
        }
        Transition::Failed(message) => {
            error!("EventRelay: {}", message);
            ctx.state.fail(&message);
            ctx.overlay.show(ShowReason::PlaybackError);
        }
    }
    ctx.broadcast_status();
}

#[cfg(test)]
mod tests {
    use super::{relay, Transition};
    use crate::app_state::Lifecycle;
    use crate::diagnostics::ShowReason;
    use crate::command_interceptor::intercept;
    use crate::player_engine::{EngineTrack, PlayerEngine};
    use crate::protocol::{
        EngineEvent, InboundRequest, LoadRequest, MediaInformation, RuntimeEvent,
        TextTrackSubtype, TrackDescriptor, TrackKind,
    };
    use crate::test_support::{ready_harness, Harness};

    fn loaded() -> Harness {
        let mut harness = ready_harness();
        intercept(
            &mut harness.ctx,
            InboundRequest::Load(LoadRequest {
                media: Some(MediaInformation {
                    content_id: "https://cdn/a.mp4".to_string(),
                    ..MediaInformation::default()
                }),
                ..LoadRequest::default()
            }),
        );
        harness
    }

    #[test]
    fn test_engine_events_map_to_transitions() {
        assert_eq!(Transition::from(EngineEvent::LoadStart), Transition::ContentLoading);
        assert_eq!(Transition::from(EngineEvent::Waiting), Transition::Buffering);
        assert_eq!(
            Transition::from(EngineEvent::Error {
                code: Some(3),
                message: Some("decode".to_string())
            }),
            Transition::Failed("Error 3: decode".to_string())
        );
        assert_eq!(
            Transition::from(EngineEvent::Error {
                code: None,
                message: None
            }),
            Transition::Failed("An error occurred during playback".to_string())
        );
    }

    #[test]
    fn test_runtime_error_codes() {
        assert_eq!(
            Transition::from(RuntimeEvent::Error {
                detailed_error_code: Some(905),
                reason: None
            }),
            Transition::Failed("CAF Error: 905".to_string())
        );
        assert_eq!(
            Transition::from(RuntimeEvent::Error {
                detailed_error_code: None,
                reason: Some("GENERIC".to_string())
            }),
            Transition::Failed("CAF Error: Unknown error".to_string())
        );
    }

    #[test]
    fn test_error_then_playing_clears_auto_shown_diagnostics() {
        let mut harness = loaded();
        relay(&mut harness.ctx, EngineEvent::Playing.into());
        relay(
            &mut harness.ctx,
            EngineEvent::Error {
                code: Some(2),
                message: Some("network".to_string()),
            }
            .into(),
        );
        assert_eq!(harness.ctx.state.lifecycle(), Lifecycle::Error);
        assert_eq!(harness.ctx.state.error_message(), Some("Error 2: network"));
        assert_eq!(
            harness.ctx.overlay.last_show_reason(),
            Some(ShowReason::PlaybackError)
        );

        relay(&mut harness.ctx, RuntimeEvent::Playing.into());
        assert_eq!(harness.ctx.state.lifecycle(), Lifecycle::Playing);
        assert!(harness.ctx.state.error_message().is_none());
        assert!(!harness.ctx.overlay.visible());
        assert_eq!(harness.ctx.overlay.last_show_reason(), None);
    }

    #[test]
    fn test_playing_keeps_user_opened_diagnostics() {
        let mut harness = loaded();
        harness.ctx.overlay.show(ShowReason::User);
        relay(&mut harness.ctx, EngineEvent::Playing.into());
        assert!(harness.ctx.overlay.visible());
    }

    #[test]
    fn test_content_states_require_a_load() {
        let mut harness = ready_harness();
        relay(&mut harness.ctx, EngineEvent::Playing.into());
        relay(&mut harness.ctx, EngineEvent::Waiting.into());
        assert_eq!(harness.ctx.state.lifecycle(), Lifecycle::Idle);
    }

    #[test]
    fn test_lifecycle_follows_events_and_ended_returns_to_idle() {
        let mut harness = loaded();
        relay(&mut harness.ctx, EngineEvent::LoadStart.into());
        assert_eq!(harness.ctx.state.lifecycle(), Lifecycle::ContentLoading);
        relay(&mut harness.ctx, EngineEvent::Waiting.into());
        assert_eq!(harness.ctx.state.lifecycle(), Lifecycle::Buffering);
        relay(&mut harness.ctx, EngineEvent::Playing.into());
        assert_eq!(harness.ctx.state.lifecycle(), Lifecycle::Playing);
        relay(&mut harness.ctx, RuntimeEvent::Pause.into());
        assert_eq!(harness.ctx.state.lifecycle(), Lifecycle::Paused);
        relay(&mut harness.ctx, EngineEvent::Ended.into());
        assert_eq!(harness.ctx.state.lifecycle(), Lifecycle::Idle);
        assert!(harness.runtime.log().broadcasts.len() >= 5);
    }

    #[test]
    fn test_time_updates_write_clock_and_throttle_broadcasts() {
        let mut harness = loaded();
        let before = harness.runtime.log().broadcasts.len();
        for tick in 1..=20 {
            relay(
                &mut harness.ctx,
                Transition::Clock {
                    current_time: f64::from(tick) * 0.25,
                    duration: 60.0,
                },
            );
        }
        assert!((harness.ctx.state.current_time() - 5.0).abs() < f64::EPSILON);
        assert!((harness.ctx.state.duration() - 60.0).abs() < f64::EPSILON);
        let sent = harness.runtime.log().broadcasts.len() - before;
        assert!(sent <= 2, "expected throttled broadcasts, got {sent}");
    }

    #[test]
    fn test_metadata_ready_discovers_tracks_and_applies_load_selection() {
        let mut harness = ready_harness();
        intercept(
            &mut harness.ctx,
            InboundRequest::Load(LoadRequest {
                media: Some(MediaInformation {
                    content_id: "https://cdn/a.mp4".to_string(),
                    tracks: Some(vec![TrackDescriptor {
                        id: 5,
                        kind: TrackKind::Text,
                        subtype: Some(TextTrackSubtype::Subtitles),
                        name: Some("English".to_string()),
                        language: Some("en".to_string()),
                        content_locator: Some("https://cdn/en.vtt".to_string()),
                        content_type: None,
                    }]),
                    ..MediaInformation::default()
                }),
                active_track_ids: Some(vec![5]),
                ..LoadRequest::default()
            }),
        );
        harness
            .engine
            .log()
            .audio_tracks
            .push(EngineTrack::audio("Default", "", true));

        relay(&mut harness.ctx, EngineEvent::LoadedMetadata.into());

        let media_tracks = harness.runtime.log().media_tracks.clone();
        assert_eq!(media_tracks.len(), 2);
        assert_eq!(media_tracks[0].id, 5);
        assert_eq!(harness.runtime.log().active_ids, vec![6, 5]);
        assert_eq!(harness.engine.showing_text_indices(), vec![0]);
        assert_eq!(harness.ctx.subtitles.active_track(), Some(5));
        assert!(harness.engine.text_tracks()[0].active);
    }
}
