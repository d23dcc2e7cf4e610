//! Handlers for sender-originated media commands.
//!
//! Every handler is a `(context, request) -> request` transformation: the
//! returned request is handed back to the cast runtime so its own protocol
//! bookkeeping continues, even when the request was rejected.

use log::{debug, error, info, warn};

use crate::app_state::DisplayMetadata;
use crate::diagnostics::ShowReason;
use crate::launch_params::debug_requested;
use crate::protocol::{
    EditTracksInfoRequest, InboundRequest, LoadRequest, PlaybackRequest, SeekRequest,
    TrackDescriptor,
};
use crate::receiver_context::ReceiverContext;

/// Routes a request to its handler.
pub fn intercept(ctx: &mut ReceiverContext, request: InboundRequest) -> InboundRequest {
    debug!(
        "CommandInterceptor: {} request {:?}",
        request.type_name(),
        request.request_id()
    );
    ctx.note_user_activity();
    match request {
        InboundRequest::Load(request) => InboundRequest::Load(on_load(ctx, request)),
        InboundRequest::Play(request) => InboundRequest::Play(on_play(ctx, request)),
        InboundRequest::Pause(request) => InboundRequest::Pause(on_pause(ctx, request)),
        InboundRequest::Seek(request) => InboundRequest::Seek(on_seek(ctx, request)),
        InboundRequest::EditTracksInfo(request) => {
            InboundRequest::EditTracksInfo(on_edit_tracks_info(ctx, request))
        }
    }
}

pub fn on_load(ctx: &mut ReceiverContext, mut request: LoadRequest) -> LoadRequest {
    let Some(media) = request
        .media
        .as_mut()
        .filter(|media| !media.content_id.trim().is_empty())
    else {
        error!(
            "CommandInterceptor: rejecting LOAD {:?} without a content locator",
            request.request_id
        );
        ctx.overlay.show(ShowReason::Protocol);
        return request;
    };

    let content_type_missing = media
        .content_type
        .as_deref()
        .map_or(true, |content_type| content_type.trim().is_empty());
    if content_type_missing {
        media.content_type = Some(ctx.config.playback.default_content_type.clone());
    }
    let content_id = media.content_id.trim().to_string();
    let content_type = media.content_type.clone().unwrap_or_default();
    let display = DisplayMetadata::from_media_metadata(media.metadata.as_ref());
    let duration_hint = media.duration;
    let declared: Vec<TrackDescriptor> = media.tracks.clone().unwrap_or_default();

    if debug_requested(&content_id) {
        ctx.enable_debug_mode("content URL");
    }

    info!(
        "CommandInterceptor: loading {} as {} with {} declared tracks",
        content_id,
        content_type,
        declared.len()
    );
    ctx.subtitles.clear();
    ctx.menu.close();
    ctx.state.begin_load(display, duration_hint);
    ctx.tracks.register_load(&declared);
    ctx.pending_active_track_ids = request.active_track_ids.clone();
    ctx.publish_tracks();

    ctx.engine.set_source(&content_id, &content_type);
    let out_of_band: Vec<TrackDescriptor> = ctx.tracks.out_of_band_text_tracks().cloned().collect();
    for descriptor in &out_of_band {
        ctx.engine.add_text_track(
            descriptor.subtype.unwrap_or_default(),
            descriptor.name.as_deref().unwrap_or_default(),
            descriptor.content_locator.as_deref().unwrap_or_default(),
            descriptor.language.as_deref().unwrap_or_default(),
        );
    }

    if let Some(start) = request
        .current_time
        .filter(|start| start.is_finite() && *start > 0.0)
    {
        ctx.engine.seek(start);
    }
    if request.autoplay.unwrap_or(ctx.config.playback.autoplay) {
        ctx.engine.play();
    }
    ctx.broadcast_status();
    request
}

/// Idempotent: the engine ignores play while already playing.
pub fn on_play(ctx: &mut ReceiverContext, request: PlaybackRequest) -> PlaybackRequest {
    ctx.engine.play();
    request
}

pub fn on_pause(ctx: &mut ReceiverContext, request: PlaybackRequest) -> PlaybackRequest {
    ctx.engine.pause();
    request
}

pub fn on_seek(ctx: &mut ReceiverContext, mut request: SeekRequest) -> SeekRequest {
    let target = request
        .current_time
        .filter(|time| time.is_finite())
        .or_else(|| {
            request
                .relative_time
                .filter(|offset| offset.is_finite())
                .map(|offset| ctx.engine.current_time() + offset)
        });
    let Some(target) = target else {
        warn!(
            "CommandInterceptor: SEEK {:?} without a numeric target, ignoring",
            request.request_id
        );
        ctx.overlay.show(ShowReason::Protocol);
        return request;
    };

    let applied = ctx.seek_clamped(target);
    if applied != target {
        debug!(
            "CommandInterceptor: seek target {:.3} clamped to {:.3}",
            target, applied
        );
    }
    request.current_time = Some(applied);
    request.relative_time = None;
    request
}

pub fn on_edit_tracks_info(
    ctx: &mut ReceiverContext,
    request: EditTracksInfoRequest,
) -> EditTracksInfoRequest {
    if let Some(font_scale) = request
        .text_track_style
        .as_ref()
        .and_then(|style| style.font_scale)
    {
        ctx.subtitles.set_size(font_scale);
    }
    if let Some(active_ids) = request.active_track_ids.as_deref() {
        ctx.tracks.apply_selection(ctx.engine.as_mut(), active_ids);
        ctx.publish_tracks();
        ctx.sync_subtitles_with_selection();
    }
    request
}

/// Clamps a seek target into `[0, duration]`, or to `>= 0` while the
/// duration is unknown.
pub fn clamp_seek_target(target: f64, duration: f64) -> f64 {
    if duration.is_finite() && duration > 0.0 {
        target.clamp(0.0, duration)
    } else {
        target.max(0.0)
    }
}
