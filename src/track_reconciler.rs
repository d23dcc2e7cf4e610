//! Maps sender-facing track descriptors onto engine track handles.
//!
//! Numeric ids are canonical. During discovery an engine track without a
//! numeric id adopts the id of the LOAD-declared descriptor with the same
//! locator, or else a synthetic id that stays stable across repeated passes.
//! Selection afterwards matches by numeric id only.

use std::collections::HashSet;

use log::{debug, warn};

use crate::player_engine::{EngineTrack, PlayerEngine};
use crate::protocol::{TextTrackSubtype, TrackDescriptor, TrackId, TrackKind};

/// Active track ids per kind. Text is exclusive; `None` means subtitles off.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackSelection {
    pub text: Option<TrackId>,
    pub audio: Option<TrackId>,
}

impl TrackSelection {
    /// Flattened id list as reported to the runtime.
    pub fn active_ids(&self) -> Vec<TrackId> {
        self.audio.into_iter().chain(self.text).collect()
    }
}

/// One row of the audio or subtitle settings page.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct TrackMenuEntry {
    pub label: String,
    pub active: bool,
}

#[derive(Debug, Clone)]
struct ReconciledTrack {
    descriptor: TrackDescriptor,
    engine_index: usize,
    engine_label: String,
    engine_source: Option<String>,
}

impl ReconciledTrack {
    fn matches_engine_slot(&self, kind: TrackKind, index: usize, track: &EngineTrack) -> bool {
        self.descriptor.kind == kind
            && self.engine_index == index
            && self.engine_label == track.label
            && self.engine_source == track.source
    }
}

#[derive(Debug, Default)]
pub struct TrackReconciler {
    declared: Vec<TrackDescriptor>,
    discovered: Vec<ReconciledTrack>,
    selection: TrackSelection,
    discovery_done: bool,
}

impl TrackReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces all track state with the descriptors of a new LOAD.
    pub fn register_load(&mut self, declared: &[TrackDescriptor]) {
        let mut seen = HashSet::new();
        self.declared = declared
            .iter()
            .filter(|descriptor| {
                let fresh = seen.insert(descriptor.id);
                if !fresh {
                    warn!(
                        "TrackReconciler: dropping duplicate declared track id {}",
                        descriptor.id
                    );
                }
                fresh
            })
            .cloned()
            .collect();
        self.discovered.clear();
        self.selection = TrackSelection::default();
        self.discovery_done = false;
        debug!(
            "TrackReconciler: registered {} declared tracks",
            self.declared.len()
        );
    }

    /// LOAD-declared text tracks that carry an out-of-band locator.
    pub fn out_of_band_text_tracks(&self) -> impl Iterator<Item = &TrackDescriptor> {
        self.declared.iter().filter(|descriptor| {
            descriptor.kind == TrackKind::Text
                && descriptor
                    .content_locator
                    .as_deref()
                    .is_some_and(|locator| !locator.trim().is_empty())
        })
    }

    pub fn selection(&self) -> &TrackSelection {
        &self.selection
    }

    #[cfg(test)]
    pub fn discovery_done(&self) -> bool {
        self.discovery_done
    }

    /// Descriptors of all discovered tracks, text first.
    pub fn tracks(&self) -> Vec<TrackDescriptor> {
        self.discovered
            .iter()
            .map(|track| track.descriptor.clone())
            .collect()
    }

    /// Looks a track up among discovered tracks, then declared ones.
    pub fn descriptor(&self, id: TrackId) -> Option<&TrackDescriptor> {
        self.discovered
            .iter()
            .map(|track| &track.descriptor)
            .find(|descriptor| descriptor.id == id)
            .or_else(|| self.declared.iter().find(|descriptor| descriptor.id == id))
    }

    /// Enumerates engine text and audio tracks and assigns each a numeric id.
    ///
    /// Returns the descriptor list to expose to the runtime.
    pub fn discover_tracks(&mut self, engine: &dyn PlayerEngine) -> Vec<TrackDescriptor> {
        let text_tracks = engine.text_tracks();
        let audio_tracks = engine.audio_tracks();

        let mut reserved: HashSet<TrackId> = self
            .declared
            .iter()
            .map(|descriptor| descriptor.id)
            .chain(self.discovered.iter().map(|track| track.descriptor.id))
            .chain(
                text_tracks
                    .iter()
                    .chain(audio_tracks.iter())
                    .filter_map(|track| track.engine_id),
            )
            .collect();
        let mut assigned: HashSet<TrackId> = HashSet::new();
        let previous = std::mem::take(&mut self.discovered);
        let mut discovered = Vec::with_capacity(text_tracks.len() + audio_tracks.len());

        for (kind, tracks) in [
            (TrackKind::Text, &text_tracks),
            (TrackKind::Audio, &audio_tracks),
        ] {
            for (index, track) in tracks.iter().enumerate() {
                let candidate = track
                    .engine_id
                    .or_else(|| self.declared_id_for_locator(kind, track.source.as_deref()))
                    .or_else(|| {
                        previous
                            .iter()
                            .find(|known| known.matches_engine_slot(kind, index, track))
                            .map(|known| known.descriptor.id)
                    })
                    .filter(|id| !assigned.contains(id));
                let id = match candidate {
                    Some(id) => id,
                    None => allocate_id(&mut reserved, &assigned),
                };
                assigned.insert(id);
                discovered.push(ReconciledTrack {
                    descriptor: self.describe(kind, id, index, track),
                    engine_index: index,
                    engine_label: track.label.clone(),
                    engine_source: track.source.clone(),
                });
            }
        }

        self.discovered = discovered;
        self.discovery_done = true;
        self.selection = TrackSelection {
            text: self
                .discovered
                .iter()
                .filter(|known| known.descriptor.kind == TrackKind::Text)
                .filter(|known| {
                    text_tracks
                        .get(known.engine_index)
                        .is_some_and(|track| track.active)
                })
                .map(|known| known.descriptor.id)
                .last(),
            audio: self
                .discovered
                .iter()
                .filter(|known| known.descriptor.kind == TrackKind::Audio)
                .find(|known| {
                    audio_tracks
                        .get(known.engine_index)
                        .is_some_and(|track| track.active)
                })
                .map(|known| known.descriptor.id),
        };
        debug!(
            "TrackReconciler: discovered {} text and {} audio tracks",
            text_tracks.len(),
            audio_tracks.len()
        );
        self.tracks()
    }

    fn declared_id_for_locator(&self, kind: TrackKind, source: Option<&str>) -> Option<TrackId> {
        let source = source?;
        self.declared
            .iter()
            .find(|descriptor| {
                descriptor.kind == kind && descriptor.content_locator.as_deref() == Some(source)
            })
            .map(|descriptor| descriptor.id)
    }

    fn describe(
        &self,
        kind: TrackKind,
        id: TrackId,
        index: usize,
        track: &EngineTrack,
    ) -> TrackDescriptor {
        let declared = self
            .declared
            .iter()
            .find(|descriptor| descriptor.id == id && descriptor.kind == kind);
        let name = if !track.label.trim().is_empty() {
            track.label.clone()
        } else if let Some(name) = declared.and_then(|descriptor| descriptor.name.clone()) {
            name
        } else if kind == TrackKind::Audio {
            format!("Audio {}", index + 1)
        } else {
            format!("Subtitle {}", index + 1)
        };
        let language = if track.language.trim().is_empty() {
            declared.and_then(|descriptor| descriptor.language.clone())
        } else {
            Some(track.language.clone())
        };
        TrackDescriptor {
            id,
            kind,
            subtype: match kind {
                TrackKind::Text => Some(track.text_kind.unwrap_or_default()),
                _ => None,
            },
            name: Some(name),
            language,
            content_locator: track.source.clone(),
            content_type: declared.and_then(|descriptor| descriptor.content_type.clone()),
        }
    }

    /// Applies a sender selection to the engine.
    ///
    /// Text: all tracks are disabled, then the last matching id is shown.
    /// Audio: the last matching id becomes the only enabled track; without a
    /// match the previous audio selection is kept. Unknown ids are ignored.
    pub fn apply_selection(
        &mut self,
        engine: &mut dyn PlayerEngine,
        active_ids: &[TrackId],
    ) -> TrackSelection {
        if !self.discovery_done {
            self.discover_tracks(engine);
        }

        let mut text_target = None;
        let mut audio_target = None;
        let mut text_matches = 0usize;
        for id in active_ids {
            match self.discovered_kind(*id) {
                Some(TrackKind::Text) => {
                    text_matches += 1;
                    text_target = Some(*id);
                }
                Some(TrackKind::Audio) => audio_target = Some(*id),
                Some(TrackKind::Video) => {}
                None => {
                    let declared_video = self
                        .declared
                        .iter()
                        .any(|descriptor| descriptor.id == *id && descriptor.kind == TrackKind::Video);
                    if declared_video {
                        debug!("TrackReconciler: ignoring video track id {}", id);
                    } else {
                        warn!("TrackReconciler: ignoring unknown track id {}", id);
                    }
                }
            }
        }
        if text_matches > 1 {
            warn!(
                "TrackReconciler: {} text tracks requested, keeping the last one",
                text_matches
            );
        }

        self.show_text(engine, text_target);
        if let Some(audio_id) = audio_target {
            self.enable_audio(engine, audio_id);
        }
        self.selection.clone()
    }

    fn discovered_kind(&self, id: TrackId) -> Option<TrackKind> {
        self.discovered
            .iter()
            .find(|known| known.descriptor.id == id)
            .map(|known| known.descriptor.kind)
    }

    fn show_text(&mut self, engine: &mut dyn PlayerEngine, target: Option<TrackId>) {
        for index in 0..engine.text_tracks().len() {
            engine.set_text_track_showing(index, false);
        }
        let target_index = target.and_then(|id| self.engine_index(TrackKind::Text, id));
        if let Some(index) = target_index {
            engine.set_text_track_showing(index, true);
        }
        self.selection.text = target_index.and(target);
    }

    fn enable_audio(&mut self, engine: &mut dyn PlayerEngine, id: TrackId) {
        let Some(target_index) = self.engine_index(TrackKind::Audio, id) else {
            return;
        };
        let audio_count = engine.audio_tracks().len();
        if target_index >= audio_count {
            warn!(
                "TrackReconciler: audio track {} vanished from the engine, keeping previous selection",
                id
            );
            return;
        }
        for index in 0..audio_count {
            engine.set_audio_track_enabled(index, index == target_index);
        }
        self.selection.audio = Some(id);
    }

    fn engine_index(&self, kind: TrackKind, id: TrackId) -> Option<usize> {
        self.discovered
            .iter()
            .find(|known| known.descriptor.kind == kind && known.descriptor.id == id)
            .map(|known| known.engine_index)
    }

    fn audio_ids(&self) -> Vec<TrackId> {
        self.discovered
            .iter()
            .filter(|known| known.descriptor.kind == TrackKind::Audio)
            .map(|known| known.descriptor.id)
            .collect()
    }

    fn subtitle_ids(&self) -> Vec<TrackId> {
        self.discovered
            .iter()
            .filter(|known| {
                known.descriptor.kind == TrackKind::Text
                    && known
                        .descriptor
                        .subtype
                        .unwrap_or(TextTrackSubtype::Subtitles)
                        .is_selectable()
            })
            .map(|known| known.descriptor.id)
            .collect()
    }

    /// Enables the audio track at `position` in the audio menu.
    pub fn select_audio_position(
        &mut self,
        engine: &mut dyn PlayerEngine,
        position: usize,
    ) -> Option<TrackId> {
        let id = *self.audio_ids().get(position)?;
        self.enable_audio(engine, id);
        Some(id)
    }

    /// Shows the subtitle at `position` in the subtitle menu; 0 turns them off.
    pub fn select_subtitle_position(
        &mut self,
        engine: &mut dyn PlayerEngine,
        position: usize,
    ) -> Option<TrackId> {
        let target = match position {
            0 => None,
            n => Some(*self.subtitle_ids().get(n - 1)?),
        };
        self.show_text(engine, target);
        target
    }

    pub fn audio_menu(&self) -> Vec<TrackMenuEntry> {
        self.audio_ids()
            .into_iter()
            .filter_map(|id| self.menu_entry(id, self.selection.audio == Some(id)))
            .collect()
    }

    /// Subtitle rows, starting with `Off`.
    pub fn subtitle_menu(&self) -> Vec<TrackMenuEntry> {
        let mut entries = vec![TrackMenuEntry {
            label: "Off".to_string(),
            active: self.selection.text.is_none(),
        }];
        entries.extend(
            self.subtitle_ids()
                .into_iter()
                .filter_map(|id| self.menu_entry(id, self.selection.text == Some(id))),
        );
        entries
    }

    fn menu_entry(&self, id: TrackId, active: bool) -> Option<TrackMenuEntry> {
        let descriptor = self.descriptor(id)?;
        let mut label = descriptor.name.clone().unwrap_or_default();
        if let Some(language) = descriptor.language.as_deref().filter(|lang| !lang.is_empty()) {
            label = format!("{label} ({language})");
        }
        Some(TrackMenuEntry { label, active })
    }
}

fn allocate_id(reserved: &mut HashSet<TrackId>, assigned: &HashSet<TrackId>) -> TrackId {
    let mut next = reserved
        .iter()
        .chain(assigned.iter())
        .copied()
        .max()
        .map_or(1, |max| max.saturating_add(1));
    while reserved.contains(&next) || assigned.contains(&next) {
        next = next.saturating_add(1);
    }
    reserved.insert(next);
    next
}
