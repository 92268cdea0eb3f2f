//! Rotary encoder input, menu state machine and backlight policy for a
//! headless media streamer.
//!
//! A single rotary encoder with a push button drives the whole device:
//! turning it changes the volume, a long press opens a menu, and the
//! display dims and turns off after a period of inactivity.
//!
//! # Pipeline
//!
//! - [`QuadratureDecoder`] turns A/B line samples into [`Step`]s.
//! - [`PressClassifier`] turns button samples into [`PressEvent`]s.
//! - [`Interaction`] applies those events to the current [`Mode`] and
//!   emits [`Effect`]s for the player and the settings store.
//! - [`DisplayPolicy`] maps inactivity to a [`BrightnessLevel`] and decides
//!   when the display needs writing.
//! - [`Runtime`] runs all of it on an input thread, an effect worker and a
//!   display thread.
//!
//! # Example
//!
//! ```
//! use std::time::Instant;
//! use dialctl_core::{
//!     Config, Effect, InputEvent, Interaction, InteractionState, PlayerCommand, Step,
//! };
//!
//! let config = Config::default();
//! let initial = InteractionState::new(30);
//! let mut interaction = Interaction::from_config(&config, initial, Instant::now());
//!
//! let effects = interaction.handle(InputEvent::Rotate(Step::Clockwise), Instant::now());
//! assert_eq!(effects, vec![Effect::Player(PlayerCommand::SetVolume(32))]);
//! ```
//!
//! # Testing
//!
//! Use [`MockPlayer`], [`MockDisplay`] and [`ScriptedPins`] to run the whole
//! runtime without hardware:
//!
//! ```
//! use dialctl_core::{MockDisplay, DisplaySink, ContentDescriptor, Mode, SettingValues};
//!
//! let mut display = MockDisplay::new();
//! let content = ContentDescriptor::new(Mode::Volume, 30, 0, 0, &SettingValues::default());
//! display.render(&content).unwrap();
//! assert_eq!(display.render_count(), 1);
//! ```

#![warn(missing_docs)]

mod activity;
mod config;
mod display;
mod effects;
mod error;
mod interaction;
mod mock;
mod mode;
mod pins;
mod player;
mod policy;
mod press;
mod quadrature;
mod runtime;
mod state;

// Re-export public API
pub use activity::ActivityClock;
pub use config::{
    ButtonConfig, Config, DEFAULT_CONFIG_PATH, DisplayConfig, EncoderConfig, PlayerConfig,
    PlayerKind, SettingsConfig,
};
pub use display::{ConsoleDisplay, ContentDescriptor, DisplaySink};
pub use effects::{
    EFFECT_QUEUE_CAPACITY, EffectSender, SettingsStore, StatusPoll, coalesce_volume,
    effect_channel, run_effect_worker,
};
pub use error::{ConfigError, PinError, RuntimeError, SinkError, StateError};
pub use interaction::{Effect, InputEvent, Interaction};
pub use mock::{DisplayCall, MockDisplay, MockPlayer};
pub use mode::{
    MENU_ITEMS, MenuAction, MenuItem, Mode, SettingKey, SettingRange, SettingValues, wrap_index,
};
#[cfg(feature = "gpio")]
pub use pins::CdevPins;
pub use pins::{PinScript, PinSource, RawPins, ScriptedPins};
pub use player::{
    MpcPlayer, NullPlayer, PlaybackState, PlayerCommand, PlayerSink, PlayerStatus, parse_status,
    player_from_config, read_back_volume,
};
pub use policy::{
    BrightnessLevel, DisplayAction, DisplayPolicy, Timeouts, level, percent_to_contrast,
};
pub use press::{DEFAULT_PRESS_DEBOUNCE, PressClassifier, PressEvent, PressState, classify};
pub use quadrature::{EncoderState, PinSample, QuadratureDecoder, Step, decode};
pub use runtime::{Capabilities, Poller, Refresher, Runtime, RuntimeParts, StopFlag};
pub use state::{
    InteractionState, NowPlaying, NowPlayingHandle, PersistedState, SharedState, StateHandle,
    lock_now_playing, lock_state,
};

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    #[test]
    fn test_menu_round_trip_from_volume() {
        let start = Instant::now();
        let mut interaction =
            Interaction::from_config(&Config::default(), InteractionState::new(30), start);

        interaction.handle(InputEvent::Press(PressEvent::Long), start);
        assert_eq!(interaction.state().mode, Mode::Menu);

        interaction.handle(InputEvent::Rotate(Step::Clockwise), start);
        interaction.handle(InputEvent::Rotate(Step::Clockwise), start);
        interaction.handle(InputEvent::Press(PressEvent::Short), start);
        assert_eq!(interaction.state().mode, Mode::Settings);

        interaction.handle(InputEvent::Press(PressEvent::Long), start);
        assert_eq!(interaction.state().mode, Mode::Volume);
        assert_eq!(interaction.state().volume, 30);
    }

    #[test]
    fn test_decoded_steps_drive_volume() {
        let start = Instant::now();
        let mut decoder =
            QuadratureDecoder::new(PinSample::default(), Duration::from_millis(2), false);
        let mut interaction =
            Interaction::from_config(&Config::default(), InteractionState::new(30), start);

        let mut effects = Vec::new();
        for (i, (a, b)) in [(false, true), (true, true)].into_iter().enumerate() {
            let now = start + Duration::from_millis(5 * (i as u64 + 1));
            if let Some(step) = decoder.update(PinSample::new(a, b), now) {
                effects.extend(interaction.handle(InputEvent::Rotate(step), now));
            }
        }

        assert_eq!(
            effects,
            vec![
                Effect::Player(PlayerCommand::SetVolume(32)),
                Effect::Player(PlayerCommand::SetVolume(34)),
            ]
        );
    }

    #[test]
    fn test_mock_player_records_through_trait() {
        let player = MockPlayer::new();
        player.execute(&PlayerCommand::TogglePlayPause).unwrap();
        player.execute(&PlayerCommand::SetVolume(12)).unwrap();
        assert_eq!(
            player.commands(),
            vec![PlayerCommand::TogglePlayPause, PlayerCommand::SetVolume(12)]
        );
        assert_eq!(read_back_volume(&player, 50), 12);
    }

    #[test]
    fn test_brightness_levels_from_config() {
        let timeouts = Config::default().display.timeouts();
        let at = |s| level(Duration::from_secs(s), timeouts.dim, timeouts.off);
        assert_eq!(at(5), BrightnessLevel::Active);
        assert_eq!(at(15), BrightnessLevel::Dim);
        assert_eq!(at(35), BrightnessLevel::Off);
    }
}
