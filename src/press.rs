//! Push-button press classification.
//!
//! The button line is active-low: a low level means pressed. A press is
//! classified when it is released, by how long it was held.

use std::time::{Duration, Instant};

use log::{debug, trace};

/// Whether the button is currently held.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PressState {
    /// Released.
    #[default]
    Idle,
    /// Held since the given instant.
    Down(Instant),
}

/// A classified button press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PressEvent {
    /// Released before the long-press threshold.
    Short,
    /// Held for at least the long-press threshold.
    Long,
}

/// Advance the press state with one sample of the button line.
///
/// `level` is the raw line level, so `false` means pressed. Returns the next
/// state and, on release, the classified event.
pub fn classify(
    state: PressState,
    level: bool,
    now: Instant,
    long_press: Duration,
) -> (PressState, Option<PressEvent>) {
    let pressed = !level;
    match (state, pressed) {
        (PressState::Idle, true) => (PressState::Down(now), None),
        (PressState::Down(since), false) => {
            let held = now.saturating_duration_since(since);
            let event = if held < long_press {
                PressEvent::Short
            } else {
                PressEvent::Long
            };
            (PressState::Idle, Some(event))
        }
        (state, _) => (state, None),
    }
}

/// Hold time below which a release edge is treated as contact bounce.
pub const DEFAULT_PRESS_DEBOUNCE: Duration = Duration::from_millis(30);

/// Press classifier with debouncing on both edges.
///
/// A release seen within `press_debounce` of the press edge is bounce and
/// keeps the button down. A Short arriving within `short_debounce` of the
/// previous classified press is dropped, which absorbs chatter on the
/// release edge.
#[derive(Debug, Clone)]
pub struct PressClassifier {
    state: PressState,
    long_press: Duration,
    short_debounce: Duration,
    press_debounce: Duration,
    last_event: Option<Instant>,
}

impl PressClassifier {
    /// Create an idle classifier using [`DEFAULT_PRESS_DEBOUNCE`].
    pub fn new(long_press: Duration, short_debounce: Duration) -> Self {
        Self {
            state: PressState::Idle,
            long_press,
            short_debounce,
            press_debounce: DEFAULT_PRESS_DEBOUNCE,
            last_event: None,
        }
    }

    /// Use a different press-edge debounce window.
    pub fn with_press_debounce(mut self, press_debounce: Duration) -> Self {
        self.press_debounce = press_debounce;
        self
    }

    /// Current press state.
    pub fn state(&self) -> PressState {
        self.state
    }

    /// Feed one sample of the button line taken at `now`.
    pub fn update(&mut self, level: bool, now: Instant) -> Option<PressEvent> {
        if let PressState::Down(since) = self.state {
            let held = now.saturating_duration_since(since);
            if level && held < self.press_debounce {
                trace!("release {:?} after press edge, treated as bounce", held);
                return None;
            }
        }

        let (next, event) = classify(self.state, level, now, self.long_press);
        self.state = next;
        let event = event?;

        let previous = self.last_event.replace(now);
        if event == PressEvent::Short {
            if let Some(last) = previous {
                if now.saturating_duration_since(last) < self.short_debounce {
                    debug!(
                        "short press within {:?} of the previous press, ignored",
                        self.short_debounce
                    );
                    return None;
                }
            }
        }
        Some(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LONG: Duration = Duration::from_millis(800);

    fn ms(start: Instant, millis: u64) -> Instant {
        start + Duration::from_millis(millis)
    }

    #[test]
    fn test_press_then_short_release() {
        let start = Instant::now();
        let (state, event) = classify(PressState::Idle, false, start, LONG);
        assert_eq!(state, PressState::Down(start));
        assert_eq!(event, None);

        let (state, event) = classify(state, true, ms(start, 500), LONG);
        assert_eq!(state, PressState::Idle);
        assert_eq!(event, Some(PressEvent::Short));
    }

    #[test]
    fn test_long_release() {
        let start = Instant::now();
        let (state, _) = classify(PressState::Idle, false, start, LONG);
        let (_, event) = classify(state, true, ms(start, 1000), LONG);
        assert_eq!(event, Some(PressEvent::Long));
    }

    #[test]
    fn test_threshold_is_long() {
        let start = Instant::now();
        let (_, event) = classify(PressState::Down(start), true, ms(start, 800), LONG);
        assert_eq!(event, Some(PressEvent::Long));
    }

    #[test]
    fn test_steady_levels_do_nothing() {
        let start = Instant::now();
        assert_eq!(
            classify(PressState::Idle, true, start, LONG),
            (PressState::Idle, None)
        );
        assert_eq!(
            classify(PressState::Down(start), false, ms(start, 5000), LONG),
            (PressState::Down(start), None)
        );
    }

    #[test]
    fn test_classifier_suppresses_rapid_short() {
        let start = Instant::now();
        let mut classifier = PressClassifier::new(LONG, Duration::from_millis(200));

        assert_eq!(classifier.update(false, start), None);
        assert_eq!(classifier.update(true, ms(start, 50)), Some(PressEvent::Short));
        assert_eq!(classifier.update(false, ms(start, 80)), None);
        assert_eq!(classifier.update(true, ms(start, 140)), None);
        assert_eq!(classifier.state(), PressState::Idle);

        assert_eq!(classifier.update(false, ms(start, 400)), None);
        assert_eq!(classifier.update(true, ms(start, 450)), Some(PressEvent::Short));
    }

    #[test]
    fn test_classifier_never_suppresses_long() {
        let start = Instant::now();
        let mut classifier = PressClassifier::new(LONG, Duration::from_millis(200));

        classifier.update(false, start);
        assert_eq!(classifier.update(true, ms(start, 40)), Some(PressEvent::Short));
        classifier.update(false, ms(start, 60));
        assert_eq!(classifier.update(true, ms(start, 900)), Some(PressEvent::Long));
    }

    fn feed(
        classifier: &mut PressClassifier,
        start: Instant,
        levels: &[(u64, bool)],
    ) -> Vec<(u64, PressEvent)> {
        levels
            .iter()
            .filter_map(|&(at, level)| classifier.update(level, ms(start, at)).map(|e| (at, e)))
            .collect()
    }

    #[test]
    fn test_press_edge_chatter_gives_one_short() {
        let start = Instant::now();
        let mut classifier = PressClassifier::new(LONG, Duration::from_millis(200));

        let levels = [(0, false), (2, true), (4, false), (304, true)];
        let events = feed(&mut classifier, start, &levels);
        assert_eq!(events, vec![(304, PressEvent::Short)]);
        assert_eq!(classifier.state(), PressState::Idle);
    }

    #[test]
    fn test_press_edge_chatter_gives_only_long() {
        let start = Instant::now();
        let mut classifier = PressClassifier::new(LONG, Duration::from_millis(200));

        let levels = [(0, false), (2, true), (4, false), (1200, true)];
        let events = feed(&mut classifier, start, &levels);
        assert_eq!(events, vec![(1200, PressEvent::Long)]);
    }

    #[test]
    fn test_release_chatter_after_long_is_dropped() {
        let start = Instant::now();
        let mut classifier = PressClassifier::new(LONG, Duration::from_millis(200));

        let events = feed(
            &mut classifier,
            start,
            &[(0, false), (1000, true), (1002, false), (1004, true), (1040, true)],
        );
        assert_eq!(events, vec![(1000, PressEvent::Long)]);
        assert_eq!(classifier.state(), PressState::Idle);
    }

    #[test]
    fn test_press_debounce_window_is_configurable() {
        let start = Instant::now();
        let mut classifier = PressClassifier::new(LONG, Duration::from_millis(200))
            .with_press_debounce(Duration::ZERO);

        let events = feed(&mut classifier, start, &[(0, false), (2, true)]);
        assert_eq!(events, vec![(2, PressEvent::Short)]);
    }
}
