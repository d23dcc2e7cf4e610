//! Read-only projection of receiver state for the on-screen UI.

use serde::Serialize;

use crate::app_state::{AppState, Lifecycle};
use crate::diagnostics::{lock_ring, DiagnosticOverlay, LogEntry, ShowReason, SharedLogRing};
use crate::remote_control::{MenuPage, RemoteMenu, MAIN_MENU_ROWS};
use crate::subtitles::SubtitleDelivery;
use crate::track_reconciler::{TrackMenuEntry, TrackReconciler};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MenuSnapshot {
    pub page: MenuPage,
    pub rows: Vec<TrackMenuEntry>,
    pub selected_index: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagnosticsSnapshot {
    pub visible: bool,
    pub show_reason: Option<ShowReason>,
    pub scroll: usize,
    /// Only populated while the overlay is visible.
    pub entries: Vec<LogEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UiSnapshot {
    pub lifecycle: &'static str,
    pub status_text: &'static str,
    pub title: String,
    pub subtitle: String,
    pub thumbnail_url: String,
    pub elapsed_text: String,
    pub duration_text: String,
    pub progress_percent: f64,
    pub is_playing: bool,
    pub error_message: Option<String>,
    pub controls_visible: bool,
    pub seek_feedback_visible: bool,
    pub subtitle_text: String,
    pub subtitle_size: f64,
    pub menu: Option<MenuSnapshot>,
    pub diagnostics: DiagnosticsSnapshot,
}

/// Inputs of one projection pass.
pub struct ProjectionSources<'a> {
    pub state: &'a AppState,
    pub subtitles: &'a SubtitleDelivery,
    pub tracks: &'a TrackReconciler,
    pub menu: &'a RemoteMenu,
    pub overlay: &'a DiagnosticOverlay,
    pub log_ring: &'a SharedLogRing,
}

impl UiSnapshot {
    pub fn project(sources: &ProjectionSources<'_>) -> Self {
        let state = sources.state;
        let metadata = state.metadata();
        let controls_visible = state.seek_feedback_visible()
            || !state.user_inactive()
            || state.lifecycle() == Lifecycle::Paused;

        Self {
            lifecycle: state.lifecycle().as_str(),
            status_text: state.status_text(),
            title: metadata.title.clone(),
            subtitle: metadata.subtitle.clone(),
            thumbnail_url: metadata.thumbnail_url.clone(),
            elapsed_text: state.elapsed_text(),
            duration_text: state.duration_text(),
            progress_percent: state.progress_percent(),
            is_playing: state.is_playing(),
            error_message: state.error_message().map(ToString::to_string),
            controls_visible,
            seek_feedback_visible: state.seek_feedback_visible(),
            subtitle_text: sources.subtitles.current_text().to_string(),
            subtitle_size: sources.subtitles.size(),
            menu: project_menu(sources.menu, sources.tracks),
            diagnostics: project_diagnostics(sources.overlay, sources.log_ring),
        }
    }
}

fn project_menu(menu: &RemoteMenu, tracks: &TrackReconciler) -> Option<MenuSnapshot> {
    if !menu.visible() {
        return None;
    }
    let rows = match menu.page() {
        MenuPage::Main => MAIN_MENU_ROWS
            .iter()
            .map(|label| TrackMenuEntry {
                label: (*label).to_string(),
                active: false,
            })
            .collect(),
        MenuPage::Audio => tracks.audio_menu(),
        MenuPage::Subtitles => tracks.subtitle_menu(),
    };
    Some(MenuSnapshot {
        page: menu.page(),
        rows,
        selected_index: menu.selected_index(),
    })
}

fn project_diagnostics(overlay: &DiagnosticOverlay, log_ring: &SharedLogRing) -> DiagnosticsSnapshot {
    let entries = if overlay.visible() {
        lock_ring(log_ring).entries().cloned().collect()
    } else {
        Vec::new()
    };
    DiagnosticsSnapshot {
        visible: overlay.visible(),
        show_reason: overlay.last_show_reason(),
        scroll: overlay.scroll(),
        entries,
    }
}
