//! Remote-control key mapping and the settings menu state machine.
//!
//! Key handling is pure: `RemoteMenu::handle_key` updates menu state and
//! returns the player-side action for the caller to execute.

use log::{debug, info};
use serde::Serialize;

pub const MAIN_MENU_ROWS: [&str; 2] = ["Audio Track", "Subtitles"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteKey {
    Up,
    Down,
    Left,
    Right,
    Select,
    Back,
    PlayPause,
    Play,
    Pause,
    SeekBackward,
    SeekForward,
    ToggleMenu,
    AudioMenu,
    SubtitleMenu,
    ToggleDiagnostics,
    ClearLogs,
}

/// Maps a DOM-style key name to a remote key.
pub fn map_key(key: &str) -> Option<RemoteKey> {
    let mapped = match key {
        "ArrowUp" => RemoteKey::Up,
        "ArrowDown" => RemoteKey::Down,
        "ArrowLeft" => RemoteKey::Left,
        "ArrowRight" => RemoteKey::Right,
        "Enter" => RemoteKey::Select,
        "Escape" | "Backspace" => RemoteKey::Back,
        "MediaPlayPause" => RemoteKey::PlayPause,
        "MediaPlay" => RemoteKey::Play,
        "MediaPause" => RemoteKey::Pause,
        "MediaRewind" | "MediaTrackPrevious" => RemoteKey::SeekBackward,
        "MediaFastForward" | "MediaTrackNext" => RemoteKey::SeekForward,
        "m" | "M" | "ContextMenu" => RemoteKey::ToggleMenu,
        "a" | "A" => RemoteKey::AudioMenu,
        "s" | "S" => RemoteKey::SubtitleMenu,
        "d" | "D" | "`" | "ColorF0Red" => RemoteKey::ToggleDiagnostics,
        "c" | "C" => RemoteKey::ClearLogs,
        _ => return None,
    };
    Some(mapped)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MenuPage {
    Main,
    Audio,
    Subtitles,
}

/// Player-side effect of a key press.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RemoteAction {
    None,
    TogglePlayPause,
    Play,
    Pause,
    /// Seek by `direction * seek step`.
    SeekStep(f64),
    SelectAudio(usize),
    SelectSubtitle(usize),
    ScrollDiagnostics(isize),
    ToggleDiagnostics,
    HideDiagnostics,
    ClearLogs,
}

/// What the menu needs to know about the current item.
#[derive(Debug, Clone, Copy, Default)]
pub struct MenuContext {
    pub audio_rows: usize,
    /// Subtitle rows including the leading `Off` row.
    pub subtitle_rows: usize,
    pub active_audio_row: usize,
    pub active_subtitle_row: usize,
    pub diagnostics_visible: bool,
}

impl MenuContext {
    fn rows(&self, page: MenuPage) -> usize {
        match page {
            MenuPage::Main => MAIN_MENU_ROWS.len(),
            MenuPage::Audio => self.audio_rows,
            MenuPage::Subtitles => self.subtitle_rows,
        }
    }

    fn has_entries(&self, page: MenuPage) -> bool {
        match page {
            MenuPage::Main => true,
            MenuPage::Audio => self.audio_rows > 0,
            MenuPage::Subtitles => self.subtitle_rows > 1,
        }
    }

    fn active_row(&self, page: MenuPage) -> usize {
        match page {
            MenuPage::Main => 0,
            MenuPage::Audio => self.active_audio_row,
            MenuPage::Subtitles => self.active_subtitle_row,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteMenu {
    visible: bool,
    page: MenuPage,
    selected_index: usize,
}

impl Default for RemoteMenu {
    fn default() -> Self {
        Self {
            visible: false,
            page: MenuPage::Main,
            selected_index: 0,
        }
    }
}

impl RemoteMenu {
    pub fn visible(&self) -> bool {
        self.visible
    }

    pub fn page(&self) -> MenuPage {
        self.page
    }

    pub fn selected_index(&self) -> usize {
        self.selected_index
    }

    pub fn close(&mut self) {
        self.visible = false;
        self.page = MenuPage::Main;
        self.selected_index = 0;
    }

    fn open(&mut self, page: MenuPage, context: &MenuContext) -> bool {
        if !context.has_entries(page) {
            info!("RemoteMenu: no entries available for {:?} page", page);
            return false;
        }
        self.visible = true;
        self.page = page;
        self.selected_index = context
            .active_row(page)
            .min(context.rows(page).saturating_sub(1));
        true
    }

    fn toggle_page(&mut self, page: MenuPage, context: &MenuContext) {
        if self.visible && self.page == page {
            self.close();
        } else {
            self.open(page, context);
        }
    }

    fn enter_highlighted(&mut self, context: &MenuContext) {
        let target = if self.selected_index == 0 {
            MenuPage::Audio
        } else {
            MenuPage::Subtitles
        };
        self.open(target, context);
    }

    fn move_cursor(&mut self, delta: isize, context: &MenuContext) {
        let max = context.rows(self.page).saturating_sub(1);
        self.selected_index = self.selected_index.saturating_add_signed(delta).min(max);
    }

    pub fn handle_key(&mut self, key: RemoteKey, context: &MenuContext) -> RemoteAction {
        debug!("RemoteMenu: key {:?}", key);
        match key {
            RemoteKey::Up | RemoteKey::Down => {
                let delta = if key == RemoteKey::Up { -1 } else { 1 };
                if context.diagnostics_visible {
                    return RemoteAction::ScrollDiagnostics(delta);
                }
                if self.visible {
                    self.move_cursor(delta, context);
                }
                RemoteAction::None
            }
            RemoteKey::Left => {
                if !self.visible {
                    return RemoteAction::SeekStep(-1.0);
                }
                if self.page == MenuPage::Main {
                    self.close();
                } else {
                    self.open(MenuPage::Main, context);
                }
                RemoteAction::None
            }
            RemoteKey::Right => {
                if !self.visible {
                    return RemoteAction::SeekStep(1.0);
                }
                if self.page == MenuPage::Main {
                    self.enter_highlighted(context);
                }
                RemoteAction::None
            }
            RemoteKey::Select => {
                if !self.visible {
                    return RemoteAction::TogglePlayPause;
                }
                let row = self.selected_index;
                match self.page {
                    MenuPage::Main => {
                        self.enter_highlighted(context);
                        RemoteAction::None
                    }
                    MenuPage::Audio => {
                        self.close();
                        RemoteAction::SelectAudio(row)
                    }
                    MenuPage::Subtitles => {
                        self.close();
                        RemoteAction::SelectSubtitle(row)
                    }
                }
            }
            RemoteKey::Back => {
                if context.diagnostics_visible {
                    return RemoteAction::HideDiagnostics;
                }
                self.close();
                RemoteAction::None
            }
            RemoteKey::PlayPause => RemoteAction::TogglePlayPause,
            RemoteKey::Play => RemoteAction::Play,
            RemoteKey::Pause => RemoteAction::Pause,
            RemoteKey::SeekBackward => RemoteAction::SeekStep(-1.0),
            RemoteKey::SeekForward => RemoteAction::SeekStep(1.0),
            RemoteKey::ToggleMenu => {
                if self.visible {
                    self.close();
                } else {
                    self.open(MenuPage::Main, context);
                }
                RemoteAction::None
            }
            RemoteKey::AudioMenu => {
                self.toggle_page(MenuPage::Audio, context);
                RemoteAction::None
            }
            RemoteKey::SubtitleMenu => {
                self.toggle_page(MenuPage::Subtitles, context);
                RemoteAction::None
            }
            RemoteKey::ToggleDiagnostics => RemoteAction::ToggleDiagnostics,
            RemoteKey::ClearLogs if context.diagnostics_visible => RemoteAction::ClearLogs,
            RemoteKey::ClearLogs => RemoteAction::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{map_key, MenuContext, MenuPage, RemoteAction, RemoteKey, RemoteMenu};

    fn context() -> MenuContext {
        MenuContext {
            audio_rows: 2,
            subtitle_rows: 3,
            active_audio_row: 1,
            active_subtitle_row: 0,
            diagnostics_visible: false,
        }
    }

    #[test]
    fn test_key_names_map_to_remote_keys() {
        assert_eq!(map_key("ArrowUp"), Some(RemoteKey::Up));
        assert_eq!(map_key("Backspace"), Some(RemoteKey::Back));
        assert_eq!(map_key("MediaTrackNext"), Some(RemoteKey::SeekForward));
        assert_eq!(map_key("ColorF0Red"), Some(RemoteKey::ToggleDiagnostics));
        assert_eq!(map_key("`"), Some(RemoteKey::ToggleDiagnostics));
        assert_eq!(map_key("F13"), None);
    }

    #[test]
    fn test_without_menu_keys_drive_playback() {
        let mut menu = RemoteMenu::default();
        assert_eq!(menu.handle_key(RemoteKey::Select, &context()), RemoteAction::TogglePlayPause);
        assert_eq!(menu.handle_key(RemoteKey::Left, &context()), RemoteAction::SeekStep(-1.0));
        assert_eq!(menu.handle_key(RemoteKey::Right, &context()), RemoteAction::SeekStep(1.0));
        assert!(!menu.visible());
    }

    #[test]
    fn test_audio_page_preselects_active_track_and_applies_choice() {
        let mut menu = RemoteMenu::default();
        menu.handle_key(RemoteKey::AudioMenu, &context());
        assert!(menu.visible());
        assert_eq!(menu.page(), MenuPage::Audio);
        assert_eq!(menu.selected_index(), 1);

        menu.handle_key(RemoteKey::Up, &context());
        assert_eq!(menu.handle_key(RemoteKey::Select, &context()), RemoteAction::SelectAudio(0));
        assert!(!menu.visible());
    }

    #[test]
    fn test_main_menu_navigation_into_subtitles_and_back() {
        let mut menu = RemoteMenu::default();
        menu.handle_key(RemoteKey::ToggleMenu, &context());
        assert_eq!(menu.page(), MenuPage::Main);
        menu.handle_key(RemoteKey::Down, &context());
        menu.handle_key(RemoteKey::Down, &context());
        assert_eq!(menu.selected_index(), 1);
        menu.handle_key(RemoteKey::Right, &context());
        assert_eq!(menu.page(), MenuPage::Subtitles);

        menu.handle_key(RemoteKey::Left, &context());
        assert_eq!(menu.page(), MenuPage::Main);
        menu.handle_key(RemoteKey::Left, &context());
        assert!(!menu.visible());
    }

    #[test]
    fn test_subtitle_page_needs_tracks() {
        let mut menu = RemoteMenu::default();
        let no_subtitles = MenuContext {
            subtitle_rows: 1,
            ..context()
        };
        menu.handle_key(RemoteKey::SubtitleMenu, &no_subtitles);
        assert!(!menu.visible());
    }

    #[test]
    fn test_diagnostics_capture_scroll_and_back() {
        let mut menu = RemoteMenu::default();
        let with_overlay = MenuContext {
            diagnostics_visible: true,
            ..context()
        };
        assert_eq!(
            menu.handle_key(RemoteKey::Down, &with_overlay),
            RemoteAction::ScrollDiagnostics(1)
        );
        assert_eq!(menu.handle_key(RemoteKey::Back, &with_overlay), RemoteAction::HideDiagnostics);
        assert_eq!(menu.handle_key(RemoteKey::ClearLogs, &with_overlay), RemoteAction::ClearLogs);
        assert_eq!(menu.handle_key(RemoteKey::ClearLogs, &context()), RemoteAction::None);
    }
}
