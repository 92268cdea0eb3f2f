//! Property-based tests for the decoder, state machine and display policy.

use std::time::{Duration, Instant};

use dialctl_core::{
    BrightnessLevel, Config, DisplayPolicy, EncoderState, InputEvent, Interaction,
    InteractionState, MENU_ITEMS, Mode, PinSample, PressEvent, QuadratureDecoder, SettingKey, Step,
    decode, level,
};
use proptest::prelude::*;

const CYCLE: [(bool, bool); 4] = [(false, false), (false, true), (true, true), (true, false)];

fn step_strategy() -> impl Strategy<Value = Step> {
    prop_oneof![Just(Step::Clockwise), Just(Step::CounterClockwise)]
}

fn event_strategy() -> impl Strategy<Value = InputEvent> {
    prop_oneof![
        4 => step_strategy().prop_map(InputEvent::Rotate),
        2 => Just(InputEvent::Press(PressEvent::Short)),
        1 => Just(InputEvent::Press(PressEvent::Long)),
    ]
}

fn mode_strategy() -> impl Strategy<Value = Mode> {
    prop_oneof![Just(Mode::Volume), Just(Mode::Menu), Just(Mode::Settings)]
}

/// Samples produced by walking the Gray-code cycle one edge at a time.
fn walk(steps: &[Step]) -> Vec<PinSample> {
    let mut position = 0usize;
    steps
        .iter()
        .map(|step| {
            position = match step {
                Step::Clockwise => (position + 1) % 4,
                Step::CounterClockwise => (position + 3) % 4,
            };
            let (a, b) = CYCLE[position];
            PinSample::new(a, b)
        })
        .collect()
}

proptest::proptest! {
    /// Every single-edge move is decoded as exactly the step that produced it.
    #[test]
    fn decoder_recovers_every_edge(steps in prop::collection::vec(step_strategy(), 0..200)) {
        let start = Instant::now();
        let mut decoder = QuadratureDecoder::new(PinSample::default(), Duration::ZERO, false);

        let decoded: Vec<Step> = walk(&steps)
            .into_iter()
            .enumerate()
            .filter_map(|(i, sample)| {
                decoder.update(sample, start + Duration::from_millis(i as u64))
            })
            .collect();
        prop_assert_eq!(decoded, steps);
    }

    /// Inversion mirrors every decoded step.
    #[test]
    fn inverted_decoder_mirrors(steps in prop::collection::vec(step_strategy(), 1..100)) {
        let start = Instant::now();
        let mut decoder = QuadratureDecoder::new(PinSample::default(), Duration::ZERO, true);

        for (i, (sample, step)) in walk(&steps).into_iter().zip(&steps).enumerate() {
            let decoded = decoder.update(sample, start + Duration::from_millis(i as u64));
            prop_assert_eq!(decoded, Some(step.reversed()));
        }
    }

    /// The pure decoder never emits a step for a double transition.
    #[test]
    fn double_transitions_never_step(from in 0usize..4) {
        let (a0, b0) = CYCLE[from];
        let (a1, b1) = CYCLE[(from + 2) % 4];
        let target = PinSample::new(a1, b1);

        let (next, step) = decode(EncoderState::from(PinSample::new(a0, b0)), target);
        prop_assert_eq!(step, None);
        prop_assert_eq!(next, EncoderState::from(target));
    }

    /// No event sequence takes the state outside its bounds.
    #[test]
    fn interaction_stays_in_bounds(
        mode in mode_strategy(),
        volume in 0u8..=100,
        menu_index in 0usize..16,
        setting_index in 0usize..16,
        events in prop::collection::vec(event_strategy(), 0..300),
    ) {
        let config = Config::default();
        let start = InteractionState { mode, menu_index, setting_index, volume };
        let mut interaction = Interaction::from_config(&config, start, Instant::now());

        for event in events {
            interaction.handle(event, Instant::now());
            let state = interaction.state();
            prop_assert!(state.volume <= 100);
            prop_assert!(state.menu_index < MENU_ITEMS.len());
            prop_assert!(state.setting_index < SettingKey::ALL.len());

            let settings = interaction.settings();
            for key in SettingKey::ALL {
                let range = config.settings.range(key);
                prop_assert!((range.min..=range.max).contains(&settings.get(key)));
            }
        }
    }

    /// A long press always lands in Volume or in Menu at the top.
    #[test]
    fn long_press_toggles_between_volume_and_menu(
        events in prop::collection::vec(event_strategy(), 0..50),
    ) {
        let mut interaction =
            Interaction::from_config(&Config::default(), InteractionState::new(30), Instant::now());
        for event in events {
            interaction.handle(event, Instant::now());
        }

        let before = interaction.state().mode;
        interaction.handle(InputEvent::Press(PressEvent::Long), Instant::now());
        let after = interaction.state();
        match before {
            Mode::Volume => {
                prop_assert_eq!(after.mode, Mode::Menu);
                prop_assert_eq!(after.menu_index, 0);
            }
            Mode::Menu | Mode::Settings => {
                prop_assert_eq!(after.mode, Mode::Volume);
            }
        }
    }

    /// Levels are monotone in idle time.
    #[test]
    fn level_is_monotone(
        a in 0u64..100_000,
        b in 0u64..100_000,
        dim in 0u64..50_000,
        extra in 0u64..50_000,
    ) {
        let rank = |l: BrightnessLevel| match l {
            BrightnessLevel::Active => 0,
            BrightnessLevel::Dim => 1,
            BrightnessLevel::Off => 2,
        };
        let dim = Duration::from_millis(dim);
        let off = dim + Duration::from_millis(extra);
        let (lo, hi) = (a.min(b), a.max(b));
        prop_assert!(
            rank(level(Duration::from_millis(lo), dim, off))
                <= rank(level(Duration::from_millis(hi), dim, off))
        );
    }

    /// Without content changes, idling through any tick schedule writes to
    /// the display at most once per level.
    #[test]
    fn policy_writes_once_per_level(ticks in prop::collection::vec(0u64..60_000, 1..200)) {
        let mut ticks = ticks;
        ticks.sort_unstable();
        let timeouts = Config::default().display.timeouts();
        let mut policy = DisplayPolicy::new(timeouts);

        let writes = ticks
            .iter()
            .filter(|&&ms| !policy.evaluate(Duration::from_millis(ms), 7).is_empty())
            .count();
        prop_assert!((1..=3).contains(&writes));
    }
}
