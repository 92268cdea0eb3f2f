//! The interaction state machine.
//!
//! Interprets decoded steps and classified presses according to the current
//! mode and produces the side effects to run. Every event counts as user
//! activity, even one that changes nothing.
//!
//! | Mode     | Step                  | Short                 | Long               |
//! |----------|-----------------------|-----------------------|--------------------|
//! | Volume   | volume +/- step       | toggle play/pause     | Menu, index 0      |
//! | Menu     | index +/- 1, wrapping | run selected item     | Volume             |
//! | Settings | value +/- step, clamp | next setting          | Volume             |

use std::time::Instant;

use log::debug;

use crate::activity::ActivityClock;
use crate::config::{Config, SettingsConfig};
use crate::mode::{MENU_ITEMS, MenuAction, Mode, SettingKey, SettingValues, wrap_index};
use crate::player::PlayerCommand;
use crate::press::PressEvent;
use crate::quadrature::Step;
use crate::state::InteractionState;

/// A user input, in the order it was sampled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    /// One encoder edge.
    Rotate(Step),
    /// One classified button press.
    Press(PressEvent),
}

/// Work the state machine hands off to the effect worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Send a command to the media player.
    Player(PlayerCommand),
    /// Persist the edited settings.
    SaveSettings(SettingValues),
}

/// Interaction state machine.
#[derive(Debug, Clone)]
pub struct Interaction {
    state: InteractionState,
    settings: SettingValues,
    ranges: SettingsConfig,
    activity: ActivityClock,
    volume_step: u8,
    radio_playlist: String,
}

impl Interaction {
    /// Create a state machine starting from `state`.
    pub fn new(
        state: InteractionState,
        settings: SettingValues,
        ranges: SettingsConfig,
        volume_step: u8,
        radio_playlist: impl Into<String>,
        now: Instant,
    ) -> Self {
        Self {
            state: InteractionState {
                menu_index: state.menu_index % MENU_ITEMS.len(),
                setting_index: state.setting_index % SettingKey::ALL.len(),
                volume: state.volume.min(100),
                ..state
            },
            settings,
            ranges,
            activity: ActivityClock::new(now),
            volume_step,
            radio_playlist: radio_playlist.into(),
        }
    }

    /// Create a state machine configured from `config`.
    pub fn from_config(config: &Config, state: InteractionState, now: Instant) -> Self {
        Self::new(
            state,
            config.setting_values(),
            config.settings,
            config.player.volume_step,
            config.player.radio_playlist.clone(),
            now,
        )
    }

    /// Current interaction state.
    pub fn state(&self) -> InteractionState {
        self.state
    }

    /// Current settings values.
    pub fn settings(&self) -> SettingValues {
        self.settings
    }

    /// Most recent user activity.
    pub fn last_activity(&self) -> Instant {
        self.activity.last()
    }

    /// Apply one input event received at `now`.
    pub fn handle(&mut self, event: InputEvent, now: Instant) -> Vec<Effect> {
        self.activity.touch(now);
        let before = self.state.mode;

        let effects = match (self.state.mode, event) {
            (Mode::Volume, InputEvent::Rotate(step)) => self.adjust_volume(step),
            (Mode::Volume, InputEvent::Press(PressEvent::Short)) => {
                vec![Effect::Player(PlayerCommand::TogglePlayPause)]
            }
            (Mode::Volume, InputEvent::Press(PressEvent::Long)) => {
                self.state.mode = Mode::Menu;
                self.state.menu_index = 0;
                Vec::new()
            }

            (Mode::Menu, InputEvent::Rotate(step)) => {
                self.state.menu_index = wrap_index(self.state.menu_index, MENU_ITEMS.len(), step);
                Vec::new()
            }
            (Mode::Menu, InputEvent::Press(PressEvent::Short)) => self.select_menu_item(),
            (Mode::Menu, InputEvent::Press(PressEvent::Long)) => {
                self.state.mode = Mode::Volume;
                Vec::new()
            }

            (Mode::Settings, InputEvent::Rotate(step)) => self.adjust_setting(step),
            (Mode::Settings, InputEvent::Press(PressEvent::Short)) => {
                self.state.setting_index = (self.state.setting_index + 1) % SettingKey::ALL.len();
                Vec::new()
            }
            (Mode::Settings, InputEvent::Press(PressEvent::Long)) => {
                self.state.mode = Mode::Volume;
                Vec::new()
            }
        };

        if before != self.state.mode {
            debug!("mode {} -> {}", before, self.state.mode);
        }
        effects
    }

    fn adjust_volume(&mut self, step: Step) -> Vec<Effect> {
        let delta = i32::from(self.volume_step) * step.sign();
        let next = (i32::from(self.state.volume) + delta).clamp(0, 100);
        let next = u8::try_from(next).unwrap_or(self.state.volume);
        if next == self.state.volume {
            return Vec::new();
        }
        debug!("volume {} -> {}", self.state.volume, next);
        self.state.volume = next;
        vec![Effect::Player(PlayerCommand::SetVolume(next))]
    }

    fn select_menu_item(&mut self) -> Vec<Effect> {
        let item = MENU_ITEMS[self.state.menu_index % MENU_ITEMS.len()];
        debug!("menu item '{}' selected", item.label);
        match item.action {
            MenuAction::PlayRadio => vec![
                Effect::Player(PlayerCommand::LoadPlaylist(self.radio_playlist.clone())),
                Effect::Player(PlayerCommand::Play),
            ],
            MenuAction::StopPlayback => vec![Effect::Player(PlayerCommand::Stop)],
            MenuAction::EnterSettings => {
                self.state.mode = Mode::Settings;
                self.state.setting_index = self.state.menu_index % SettingKey::ALL.len();
                Vec::new()
            }
            MenuAction::Exit => {
                self.state.mode = Mode::Volume;
                Vec::new()
            }
        }
    }

    fn adjust_setting(&mut self, step: Step) -> Vec<Effect> {
        let key = SettingKey::from_index(self.state.setting_index);
        let current = self.settings.get(key);
        let next = self.ranges.range(key).adjust(current, step);
        if next == current {
            return Vec::new();
        }
        debug!("setting {:?} {} -> {}", key, current, next);
        self.settings.set(key, next);
        vec![Effect::SaveSettings(self.settings)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn machine(mode: Mode, volume: u8) -> Interaction {
        let state = InteractionState {
            mode,
            volume,
            ..InteractionState::default()
        };
        Interaction::from_config(&Config::default(), state, Instant::now())
    }

    #[test]
    fn test_volume_step_sends_new_volume() {
        let mut m = machine(Mode::Volume, 30);
        let effects = m.handle(InputEvent::Rotate(Step::Clockwise), Instant::now());
        assert_eq!(effects, vec![Effect::Player(PlayerCommand::SetVolume(32))]);
        assert_eq!(m.state().volume, 32);
    }

    #[test]
    fn test_volume_clamps_without_command() {
        let mut m = machine(Mode::Volume, 99);
        assert_eq!(
            m.handle(InputEvent::Rotate(Step::Clockwise), Instant::now()),
            vec![Effect::Player(PlayerCommand::SetVolume(100))]
        );
        assert!(m.handle(InputEvent::Rotate(Step::Clockwise), Instant::now()).is_empty());
        assert_eq!(m.state().volume, 100);

        let mut m = machine(Mode::Volume, 1);
        m.handle(InputEvent::Rotate(Step::CounterClockwise), Instant::now());
        assert_eq!(m.state().volume, 0);
        assert!(
            m.handle(InputEvent::Rotate(Step::CounterClockwise), Instant::now())
                .is_empty()
        );
    }

    #[test]
    fn test_short_press_toggles_playback() {
        let mut m = machine(Mode::Volume, 30);
        assert_eq!(
            m.handle(InputEvent::Press(PressEvent::Short), Instant::now()),
            vec![Effect::Player(PlayerCommand::TogglePlayPause)]
        );
        assert_eq!(m.state().mode, Mode::Volume);
    }

    #[test]
    fn test_long_press_opens_menu_at_top() {
        let state = InteractionState {
            mode: Mode::Volume,
            menu_index: 3,
            ..InteractionState::new(30)
        };
        let mut m = Interaction::from_config(&Config::default(), state, Instant::now());
        assert!(m.handle(InputEvent::Press(PressEvent::Long), Instant::now()).is_empty());
        assert_eq!(m.state().mode, Mode::Menu);
        assert_eq!(m.state().menu_index, 0);
    }

    #[test]
    fn test_menu_rotation_wraps() {
        let mut m = machine(Mode::Menu, 30);
        m.handle(InputEvent::Rotate(Step::CounterClockwise), Instant::now());
        assert_eq!(m.state().menu_index, MENU_ITEMS.len() - 1);
        m.handle(InputEvent::Rotate(Step::Clockwise), Instant::now());
        assert_eq!(m.state().menu_index, 0);
        assert_eq!(m.state().volume, 30);
    }

    #[test]
    fn test_play_radio_loads_playlist_then_plays() {
        let mut m = machine(Mode::Menu, 30);
        assert_eq!(
            m.handle(InputEvent::Press(PressEvent::Short), Instant::now()),
            vec![
                Effect::Player(PlayerCommand::LoadPlaylist("radio".to_string())),
                Effect::Player(PlayerCommand::Play),
            ]
        );
        assert_eq!(m.state().mode, Mode::Menu);
    }

    #[test]
    fn test_stop_and_exit_items() {
        let mut m = machine(Mode::Menu, 30);
        m.handle(InputEvent::Rotate(Step::Clockwise), Instant::now());
        assert_eq!(
            m.handle(InputEvent::Press(PressEvent::Short), Instant::now()),
            vec![Effect::Player(PlayerCommand::Stop)]
        );

        m.handle(InputEvent::Rotate(Step::Clockwise), Instant::now());
        m.handle(InputEvent::Rotate(Step::Clockwise), Instant::now());
        assert!(m.handle(InputEvent::Press(PressEvent::Short), Instant::now()).is_empty());
        assert_eq!(m.state().mode, Mode::Volume);
    }

    #[test]
    fn test_long_press_leaves_menu() {
        let mut m = machine(Mode::Menu, 30);
        m.handle(InputEvent::Press(PressEvent::Long), Instant::now());
        assert_eq!(m.state().mode, Mode::Volume);
    }

    #[test]
    fn test_entering_settings_derives_index_from_menu() {
        let mut m = machine(Mode::Menu, 30);
        m.handle(InputEvent::Rotate(Step::Clockwise), Instant::now());
        m.handle(InputEvent::Rotate(Step::Clockwise), Instant::now());
        assert_eq!(m.state().menu_index, 2);

        m.handle(InputEvent::Press(PressEvent::Short), Instant::now());
        assert_eq!(m.state().mode, Mode::Settings);
        assert_eq!(m.state().setting_index, 2 % SettingKey::ALL.len());
        // "Settings" sits at index 2, so editing opens on the off timeout.
        assert_eq!(SettingKey::from_index(m.state().setting_index), SettingKey::OffTimeout);
    }

    #[test]
    fn test_settings_value_clamps_at_max() {
        let mut config = Config::default();
        config.display.off_timeout_s = 120;
        let state = InteractionState {
            mode: Mode::Settings,
            setting_index: 2,
            ..InteractionState::new(30)
        };
        let mut m = Interaction::from_config(&config, state, Instant::now());

        assert!(m.handle(InputEvent::Rotate(Step::Clockwise), Instant::now()).is_empty());
        assert_eq!(m.settings().off_timeout_s, 120);

        let effects = m.handle(InputEvent::Rotate(Step::CounterClockwise), Instant::now());
        assert_eq!(m.settings().off_timeout_s, 115);
        assert_eq!(effects, vec![Effect::SaveSettings(m.settings())]);
    }

    #[test]
    fn test_settings_short_press_cycles() {
        let mut m = machine(Mode::Settings, 30);
        let mut seen = Vec::new();
        for _ in 0..4 {
            m.handle(InputEvent::Press(PressEvent::Short), Instant::now());
            seen.push(m.state().setting_index);
        }
        assert_eq!(seen, vec![1, 2, 0, 1]);
        assert_eq!(m.state().mode, Mode::Settings);
    }

    #[test]
    fn test_settings_long_press_returns_to_volume() {
        let mut m = machine(Mode::Settings, 30);
        m.handle(InputEvent::Press(PressEvent::Long), Instant::now());
        assert_eq!(m.state().mode, Mode::Volume);
    }

    #[test]
    fn test_every_event_touches_activity() {
        let start = Instant::now();
        let mut m = Interaction::from_config(&Config::default(), InteractionState::new(100), start);

        // Clamped at 100: no effect, but still activity.
        let later = start + Duration::from_secs(20);
        assert!(m.handle(InputEvent::Rotate(Step::Clockwise), later).is_empty());
        assert_eq!(m.last_activity(), later);
    }
}
