//! Interaction modes, the menu and the editable settings.

use serde::{Deserialize, Serialize};

use crate::quadrature::Step;

/// Which interpretation the encoder currently has.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Rotation adjusts the volume.
    #[default]
    Volume,
    /// Rotation moves through the menu.
    Menu,
    /// Rotation edits the selected setting.
    Settings,
}

impl Mode {
    /// The lowercase name used in persisted state and logs.
    pub const fn name(self) -> &'static str {
        match self {
            Mode::Volume => "volume",
            Mode::Menu => "menu",
            Mode::Settings => "settings",
        }
    }

    /// Parse a lowercase mode name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "volume" => Some(Mode::Volume),
            "menu" => Some(Mode::Menu),
            "settings" => Some(Mode::Settings),
            _ => None,
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// Menu
// =============================================================================

/// What selecting a menu item does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    /// Load the radio playlist and start playback.
    PlayRadio,
    /// Stop playback.
    StopPlayback,
    /// Open the settings editor.
    EnterSettings,
    /// Leave the menu.
    Exit,
}

/// One entry in the menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MenuItem {
    /// Text shown on the display.
    pub label: &'static str,
    /// Action run on a short press.
    pub action: MenuAction,
}

/// The menu, in display order.
pub const MENU_ITEMS: [MenuItem; 4] = [
    MenuItem {
        label: "Play radio",
        action: MenuAction::PlayRadio,
    },
    MenuItem {
        label: "Stop playback",
        action: MenuAction::StopPlayback,
    },
    MenuItem {
        label: "Settings",
        action: MenuAction::EnterSettings,
    },
    MenuItem {
        label: "Exit menu",
        action: MenuAction::Exit,
    },
];

/// Move a cyclic index one position in the direction of `step`.
pub fn wrap_index(index: usize, len: usize, step: Step) -> usize {
    if len == 0 {
        return 0;
    }
    let index = index % len;
    match step {
        Step::Clockwise => (index + 1) % len,
        Step::CounterClockwise => (index + len - 1) % len,
    }
}

// =============================================================================
// Settings
// =============================================================================

/// An editable setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingKey {
    /// Display brightness while active, in percent.
    BrightnessActive,
    /// Display brightness while dimmed, in percent.
    BrightnessDim,
    /// Seconds of inactivity before the display turns off.
    OffTimeout,
}

impl SettingKey {
    /// All settings, in editing order.
    pub const ALL: [SettingKey; 3] = [
        SettingKey::BrightnessActive,
        SettingKey::BrightnessDim,
        SettingKey::OffTimeout,
    ];

    /// Setting for a (possibly out of range) index.
    pub fn from_index(index: usize) -> Self {
        Self::ALL[index % Self::ALL.len()]
    }

    /// Text shown on the display.
    pub const fn label(self) -> &'static str {
        match self {
            SettingKey::BrightnessActive => "Brightness",
            SettingKey::BrightnessDim => "Dim brightness",
            SettingKey::OffTimeout => "Screen off (s)",
        }
    }
}

/// Step size and bounds of a setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingRange {
    /// Change per encoder step.
    pub step: u32,
    /// Smallest allowed value.
    pub min: u32,
    /// Largest allowed value.
    pub max: u32,
}

impl SettingRange {
    /// Create a range.
    pub const fn new(step: u32, min: u32, max: u32) -> Self {
        Self { step, min, max }
    }

    /// Apply one encoder step to `value`, clamping to the bounds.
    pub fn adjust(&self, value: u32, step: Step) -> u32 {
        let moved = match step {
            Step::Clockwise => value.saturating_add(self.step),
            Step::CounterClockwise => value.saturating_sub(self.step),
        };
        moved.max(self.min).min(self.max)
    }
}

/// Current values of all editable settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SettingValues {
    /// Active brightness, percent.
    pub brightness_active: u32,
    /// Dimmed brightness, percent.
    pub brightness_dim: u32,
    /// Display off timeout, seconds.
    pub off_timeout_s: u32,
}

impl SettingValues {
    /// Value of one setting.
    pub fn get(&self, key: SettingKey) -> u32 {
        match key {
            SettingKey::BrightnessActive => self.brightness_active,
            SettingKey::BrightnessDim => self.brightness_dim,
            SettingKey::OffTimeout => self.off_timeout_s,
        }
    }

    /// Replace the value of one setting.
    pub fn set(&mut self, key: SettingKey, value: u32) {
        match key {
            SettingKey::BrightnessActive => self.brightness_active = value,
            SettingKey::BrightnessDim => self.brightness_dim = value,
            SettingKey::OffTimeout => self.off_timeout_s = value,
        }
    }
}
