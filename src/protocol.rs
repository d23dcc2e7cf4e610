//! Event-bus protocol shared by all receiver components.
//!
//! This module defines every payload exchanged between the sender bridge, the
//! player engine, the cast runtime, subtitle fetch workers, timers and the
//! receiver manager. Inbound sender requests are also the wire types: they
//! deserialize straight from the Cast media namespace JSON.

use serde::{Deserialize, Serialize};

use crate::ui_projection::UiSnapshot;

/// Numeric track identifier, unique within one loaded media item.
pub type TrackId = u32;

/// Top-level envelope for all bus traffic.
#[derive(Debug, Clone)]
pub enum Message {
    Command(InboundRequest),
    MalformedCommand(MalformedRequest),
    Custom(CustomMessage),
    Engine(EngineEvent),
    Runtime(RuntimeEvent),
    Subtitle(SubtitleMessage),
    Input(InputMessage),
    Ui(UiMessage),
    Shutdown,
}

/// Sender-originated media command, tagged by its Cast `type` field.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InboundRequest {
    Load(LoadRequest),
    Play(PlaybackRequest),
    Pause(PlaybackRequest),
    Seek(SeekRequest),
    EditTracksInfo(EditTracksInfoRequest),
}

impl InboundRequest {
    /// Cast message type name, used for logging and acknowledgements.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Load(_) => "LOAD",
            Self::Play(_) => "PLAY",
            Self::Pause(_) => "PAUSE",
            Self::Seek(_) => "SEEK",
            Self::EditTracksInfo(_) => "EDIT_TRACKS_INFO",
        }
    }

    pub fn request_id(&self) -> Option<i64> {
        match self {
            Self::Load(request) => request.request_id,
            Self::Play(request) | Self::Pause(request) => request.request_id,
            Self::Seek(request) => request.request_id,
            Self::EditTracksInfo(request) => request.request_id,
        }
    }

    /// Whether `type_name` names a request the receiver rewrites before completion.
    pub fn is_intercepted_type(type_name: &str) -> bool {
        matches!(type_name, "LOAD" | "PLAY" | "PAUSE" | "SEEK" | "EDIT_TRACKS_INFO")
    }
}

/// Media-namespace payload that did not decode into an [`InboundRequest`].
///
/// The raw payload is kept so it can still be completed to the runtime.
#[derive(Debug, Clone, PartialEq)]
pub struct MalformedRequest {
    pub type_name: Option<String>,
    pub request_id: Option<i64>,
    pub raw: serde_json::Value,
    pub error: String,
}

impl MalformedRequest {
    pub fn from_raw(raw: serde_json::Value, error: String) -> Self {
        Self {
            type_name: raw
                .get("type")
                .and_then(|value| value.as_str())
                .map(str::to_string),
            request_id: raw.get("requestId").and_then(|value| value.as_i64()),
            raw,
            error,
        }
    }
}

/// LOAD request payload.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<i64>,
    /// Media descriptor. A request without media (or without a content locator)
    /// is rejected before reaching the engine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<MediaInformation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autoplay: Option<bool>,
    /// Start position in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_track_ids: Option<Vec<TrackId>>,
}

/// Media descriptor carried by LOAD.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaInformation {
    /// Content locator (URI).
    #[serde(default)]
    pub content_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_type: Option<String>,
    /// Sender-provided duration hint in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MediaMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracks: Option<Vec<TrackDescriptor>>,
}

/// Display metadata for the loaded item.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata_type: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(default)]
    pub images: Vec<MediaImage>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct MediaImage {
    pub url: String,
}

/// Track kind as used by the Cast protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrackKind {
    Text,
    Audio,
    Video,
}

/// Text track role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TextTrackSubtype {
    #[default]
    Subtitles,
    Captions,
    Descriptions,
    Chapters,
    Metadata,
}

impl TextTrackSubtype {
    /// Whether tracks of this subtype are user-selectable subtitles.
    pub fn is_selectable(self) -> bool {
        matches!(self, Self::Subtitles | Self::Captions)
    }
}

/// Abstract track descriptor shared with the sender.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackDescriptor {
    #[serde(rename = "trackId")]
    pub id: TrackId,
    #[serde(rename = "type")]
    pub kind: TrackKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<TextTrackSubtype>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Locator for out-of-band tracks.
    #[serde(
        rename = "trackContentId",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub content_locator: Option<String>,
    #[serde(
        rename = "trackContentType",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub content_type: Option<String>,
}

/// PLAY / PAUSE payload.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<i64>,
}

/// SEEK payload.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeekRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<i64>,
    /// Absolute target in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_time: Option<f64>,
    /// Offset from the current position, used when `current_time` is absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relative_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume_state: Option<String>,
}

/// EDIT_TRACKS_INFO payload.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EditTracksInfoRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_track_ids: Option<Vec<TrackId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_track_style: Option<TextTrackStyle>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextTrackStyle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_scale: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreground_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
}

/// Raw custom-namespace message `{type, data}`.
///
/// The type stays a string so unknown types survive decoding and can be
/// reported instead of failing the whole message.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CustomMessage {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

/// Events emitted by the local player engine, in emission order.
///
/// Engines that run out of process report these over the bridge with the
/// same `type` tagging as runtime events.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EngineEvent {
    LoadStart,
    LoadedMetadata,
    Playing,
    Pause,
    Waiting,
    #[serde(rename_all = "camelCase")]
    TimeUpdate { current_time: f64, duration: f64 },
    Ended,
    Error {
        #[serde(default)]
        code: Option<u32>,
        #[serde(default)]
        message: Option<String>,
    },
}

/// Events emitted by the cast runtime's player manager.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuntimeEvent {
    PlayerLoadComplete,
    Playing,
    Pause,
    Buffering,
    Ended,
    #[serde(rename_all = "camelCase")]
    TimeUpdate {
        #[serde(default)]
        current_media_time: Option<f64>,
        #[serde(default)]
        duration: Option<f64>,
    },
    #[serde(rename_all = "camelCase")]
    Error {
        #[serde(default)]
        detailed_error_code: Option<i64>,
        #[serde(default)]
        reason: Option<String>,
    },
}

/// Subtitle fetch completions.
#[derive(Debug, Clone)]
pub enum SubtitleMessage {
    DocumentFetched {
        url: String,
        result: Result<String, String>,
    },
}

/// Local remote-control and pointer input.
#[derive(Debug, Clone, PartialEq)]
pub enum InputMessage {
    Key(String),
    Click {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    },
}

/// Debounce timer identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    SeekFeedback,
    UserInactivity,
}

/// UI-facing notifications.
#[derive(Debug, Clone)]
#[allow(clippy::large_enum_variant)]
pub enum UiMessage {
    TimerElapsed { kind: TimerKind, generation: u64 },
    SnapshotChanged(UiSnapshot),
}
