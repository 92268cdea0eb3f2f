//! Display sinks and the content they draw.
//!
//! The core never composes pixels. It hands a [`ContentDescriptor`] to a
//! [`DisplaySink`], which is free to lay it out however its panel needs.

use log::{info, trace};

use crate::error::SinkError;
use crate::mode::{MENU_ITEMS, Mode, SettingKey, SettingValues};
use crate::player::PlaybackState;
use crate::state::{NowPlaying, SharedState};

/// Characters of the track title shown on the status screen.
const TRACK_WIDTH: usize = 30;

/// Everything a display needs to draw the current screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentDescriptor {
    /// Current mode.
    pub mode: Mode,
    /// Volume in percent.
    pub volume: u8,
    /// Selected menu item.
    pub menu_index: usize,
    /// Labels of the menu items, in order.
    pub menu_labels: Vec<&'static str>,
    /// Selected setting.
    pub setting_index: usize,
    /// Label of the selected setting.
    pub setting_label: &'static str,
    /// Value of the selected setting.
    pub setting_value: u32,
    /// Playback state last reported by the player.
    pub playback: PlaybackState,
    /// Track or stream title last reported by the player.
    pub track: Option<String>,
}

impl ContentDescriptor {
    /// Describe a shared state snapshot and the player's last status.
    pub fn from_state(state: &SharedState, now_playing: &NowPlaying) -> Self {
        let interaction = &state.interaction;
        Self::new(
            interaction.mode,
            interaction.volume,
            interaction.menu_index,
            interaction.setting_index,
            &state.settings,
        )
        .with_now_playing(now_playing.playback, now_playing.track.clone())
    }

    /// Describe an explicit selection.
    pub fn new(
        mode: Mode,
        volume: u8,
        menu_index: usize,
        setting_index: usize,
        settings: &SettingValues,
    ) -> Self {
        let key = SettingKey::from_index(setting_index);
        Self {
            mode,
            volume,
            menu_index,
            menu_labels: MENU_ITEMS.iter().map(|item| item.label).collect(),
            setting_index,
            setting_label: key.label(),
            setting_value: settings.get(key),
            playback: PlaybackState::Stopped,
            track: None,
        }
    }

    /// Attach what the player is doing.
    pub fn with_now_playing(mut self, playback: PlaybackState, track: Option<String>) -> Self {
        self.playback = playback;
        self.track = track;
        self
    }

    /// Lay the content out as text lines.
    pub fn lines(&self) -> Vec<String> {
        match self.mode {
            Mode::Volume => {
                let mut lines = vec![format!("STREAMER | Vol: {}%", self.volume)];
                if self.track.is_some() || self.playback != PlaybackState::Stopped {
                    let track: String = match &self.track {
                        Some(track) => track.chars().take(TRACK_WIDTH).collect(),
                        None => "-".to_string(),
                    };
                    lines.push(format!("{} Now: {}", self.playback.icon(), track));
                }
                lines
            }
            Mode::Menu => {
                let mut lines = vec!["MENU".to_string()];
                lines.extend(self.menu_labels.iter().enumerate().map(|(i, label)| {
                    let marker = if i == self.menu_index { '>' } else { ' ' };
                    format!("{} {}", marker, label)
                }));
                lines
            }
            Mode::Settings => vec![
                "SETTINGS".to_string(),
                format!("> {}: {}", self.setting_label, self.setting_value),
            ],
        }
    }

    /// The content on one line.
    pub fn summary(&self) -> String {
        self.lines().join(" | ")
    }
}

/// A display the daemon can drive.
pub trait DisplaySink: Send {
    /// Set the panel contrast (0-255).
    fn set_contrast(&mut self, contrast: u8) -> Result<(), SinkError>;

    /// Draw the given content.
    fn render(&mut self, content: &ContentDescriptor) -> Result<(), SinkError>;

    /// Blank the panel.
    fn clear(&mut self) -> Result<(), SinkError>;
}

/// Display that writes its content to the log.
#[derive(Debug, Default)]
pub struct ConsoleDisplay {
    contrast: Option<u8>,
    blank: bool,
}

impl ConsoleDisplay {
    /// Create a console display.
    pub fn new() -> Self {
        Self::default()
    }

    /// Last contrast written, if any.
    pub fn contrast(&self) -> Option<u8> {
        self.contrast
    }

    /// Whether the display was cleared since the last render.
    pub fn is_blank(&self) -> bool {
        self.blank
    }
}

impl DisplaySink for ConsoleDisplay {
    fn set_contrast(&mut self, contrast: u8) -> Result<(), SinkError> {
        trace!("console display contrast {}", contrast);
        self.contrast = Some(contrast);
        Ok(())
    }

    fn render(&mut self, content: &ContentDescriptor) -> Result<(), SinkError> {
        self.blank = false;
        info!("[display] {}", content.summary());
        Ok(())
    }

    fn clear(&mut self) -> Result<(), SinkError> {
        if !self.blank {
            info!("[display] (off)");
        }
        self.blank = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> SettingValues {
        SettingValues {
            brightness_active: 50,
            brightness_dim: 10,
            off_timeout_s: 30,
        }
    }

    #[test]
    fn test_volume_screen() {
        let content = ContentDescriptor::new(Mode::Volume, 32, 0, 0, &settings());
        assert_eq!(content.lines(), vec!["STREAMER | Vol: 32%"]);
    }

    #[test]
    fn test_volume_screen_shows_now_playing() {
        let content = ContentDescriptor::new(Mode::Volume, 45, 0, 0, &settings())
            .with_now_playing(PlaybackState::Playing, Some("Radio Paradise - Main Mix".into()));
        assert_eq!(
            content.summary(),
            "STREAMER | Vol: 45% | \u{25b6} Now: Radio Paradise - Main Mix"
        );

        let paused = content.with_now_playing(PlaybackState::Paused, None);
        assert_eq!(paused.lines()[1], "\u{275a}\u{275a} Now: -");
    }

    #[test]
    fn test_long_track_titles_are_cut() {
        let title = "A".repeat(50);
        let content = ContentDescriptor::new(Mode::Volume, 45, 0, 0, &settings())
            .with_now_playing(PlaybackState::Stopped, Some(title));
        assert_eq!(content.lines()[1], format!("\u{25a0} Now: {}", "A".repeat(30)));
    }

    #[test]
    fn test_menu_hides_now_playing() {
        let content = ContentDescriptor::new(Mode::Menu, 45, 0, 0, &settings())
            .with_now_playing(PlaybackState::Playing, Some("Track".into()));
        assert!(content.lines().iter().all(|line| !line.contains("Now:")));
    }

    #[test]
    fn test_menu_screen_marks_selection() {
        let content = ContentDescriptor::new(Mode::Menu, 32, 2, 0, &settings());
        assert_eq!(
            content.lines(),
            vec!["MENU", "  Play radio", "  Stop playback", "> Settings", "  Exit menu"]
        );
    }

    #[test]
    fn test_settings_screen_shows_selected_value() {
        let content = ContentDescriptor::new(Mode::Settings, 32, 2, 2, &settings());
        assert_eq!(content.setting_label, "Screen off (s)");
        assert_eq!(content.summary(), "SETTINGS | > Screen off (s): 30");
    }

    #[test]
    fn test_console_display_tracks_panel_state() {
        let mut display = ConsoleDisplay::new();
        let content = ContentDescriptor::new(Mode::Volume, 10, 0, 0, &settings());

        display.set_contrast(127).unwrap();
        display.render(&content).unwrap();
        assert_eq!(display.contrast(), Some(127));
        assert!(!display.is_blank());

        display.clear().unwrap();
        assert!(display.is_blank());
    }
}
