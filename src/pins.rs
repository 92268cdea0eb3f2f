//! Encoder line sources.

use std::collections::VecDeque;

use crate::error::PinError;
use crate::quadrature::PinSample;

/// Raw levels of the three encoder lines. The button line is active-low.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawPins {
    /// Level of encoder output A.
    pub a: bool,
    /// Level of encoder output B.
    pub b: bool,
    /// Level of the push button line; `false` while pressed.
    pub button: bool,
}

impl RawPins {
    /// Encoder at rest on `00` with the button released.
    pub const RELEASED: RawPins = RawPins {
        a: false,
        b: false,
        button: true,
    };

    /// Create a sample.
    pub const fn new(a: bool, b: bool, button: bool) -> Self {
        Self { a, b, button }
    }

    /// The A/B part of the sample.
    pub fn encoder(&self) -> PinSample {
        PinSample::new(self.a, self.b)
    }
}

/// Something the sampling thread can read the encoder lines from.
pub trait PinSource: Send {
    /// Read all three lines at once.
    fn read(&mut self) -> Result<RawPins, PinError>;
}

/// Pin source replaying a recorded sequence.
///
/// Each read returns the next entry; `None` entries are read failures. Once
/// the script runs out the last sample repeats forever.
#[derive(Debug, Clone)]
pub struct ScriptedPins {
    script: VecDeque<Option<RawPins>>,
    last: RawPins,
}

impl ScriptedPins {
    /// Replay the given samples.
    pub fn new(samples: impl IntoIterator<Item = RawPins>) -> Self {
        Self::with_failures(samples.into_iter().map(Some))
    }

    /// Replay samples where `None` stands for a failed read.
    pub fn with_failures(script: impl IntoIterator<Item = Option<RawPins>>) -> Self {
        Self {
            script: script.into_iter().collect(),
            last: RawPins::RELEASED,
        }
    }

    /// A source that always reports the encoder at rest.
    pub fn idle() -> Self {
        Self::new([])
    }

    /// Number of entries not yet replayed.
    pub fn remaining(&self) -> usize {
        self.script.len()
    }
}

impl PinSource for ScriptedPins {
    fn read(&mut self) -> Result<RawPins, PinError> {
        match self.script.pop_front() {
            Some(Some(sample)) => {
                self.last = sample;
                Ok(sample)
            }
            Some(None) => Err(PinError::Read("scripted failure".to_string())),
            None => Ok(self.last),
        }
    }
}

/// Builds pin scripts from gestures, one entry per sampling tick.
#[derive(Debug, Clone)]
pub struct PinScript {
    samples: Vec<RawPins>,
    current: RawPins,
}

// One quadrature cycle in clockwise order.
const CYCLE: [(bool, bool); 4] = [(false, false), (false, true), (true, true), (true, false)];

impl PinScript {
    /// Start with the encoder at rest and the button released.
    pub fn new() -> Self {
        Self {
            samples: Vec::new(),
            current: RawPins::RELEASED,
        }
    }

    fn push(&mut self, sample: RawPins, ticks: usize) {
        self.current = sample;
        self.samples.extend(std::iter::repeat_n(sample, ticks));
    }

    /// Hold the current levels for `ticks` samples.
    pub fn idle(mut self, ticks: usize) -> Self {
        let current = self.current;
        self.push(current, ticks);
        self
    }

    fn advance(mut self, edges: usize, offset: usize, ticks_per_edge: usize) -> Self {
        for _ in 0..edges {
            let RawPins { a, b, button } = self.current;
            let position = CYCLE.iter().position(|&s| s == (a, b)).unwrap_or(0);
            let (a, b) = CYCLE[(position + offset) % CYCLE.len()];
            self.push(RawPins::new(a, b, button), ticks_per_edge);
        }
        self
    }

    /// Move `edges` single Gray-code edges clockwise, holding each state for
    /// `ticks_per_edge` samples.
    pub fn clockwise_edges(self, edges: usize, ticks_per_edge: usize) -> Self {
        self.advance(edges, 1, ticks_per_edge)
    }

    /// Move `edges` single Gray-code edges counter-clockwise.
    pub fn counter_clockwise_edges(self, edges: usize, ticks_per_edge: usize) -> Self {
        self.advance(edges, CYCLE.len() - 1, ticks_per_edge)
    }

    /// Turn one full detent (four edges) clockwise.
    pub fn clockwise(self, ticks_per_edge: usize) -> Self {
        self.clockwise_edges(CYCLE.len(), ticks_per_edge)
    }

    /// Turn one full detent counter-clockwise.
    pub fn counter_clockwise(self, ticks_per_edge: usize) -> Self {
        self.counter_clockwise_edges(CYCLE.len(), ticks_per_edge)
    }

    /// Hold the button for `held` samples, then release it for one sample.
    pub fn press(mut self, held: usize) -> Self {
        let RawPins { a, b, .. } = self.current;
        self.push(RawPins::new(a, b, false), held);
        self.push(RawPins::new(a, b, true), 1);
        self
    }

    /// The recorded samples.
    pub fn samples(&self) -> &[RawPins] {
        &self.samples
    }

    /// Turn the script into a pin source.
    pub fn into_pins(self) -> ScriptedPins {
        ScriptedPins::new(self.samples)
    }
}

impl Default for PinScript {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// GPIO character device
// =============================================================================

#[cfg(feature = "gpio")]
pub use self::cdev::CdevPins;

#[cfg(feature = "gpio")]
mod cdev {
    use gpio_cdev::{Chip, LineRequestFlags, MultiLineHandle};
    use log::info;

    use super::{PinSource, RawPins};
    use crate::config::EncoderConfig;
    use crate::error::PinError;

    const CONSUMER: &str = "dialctl";

    /// Encoder lines read through the Linux GPIO character device.
    ///
    /// The lines stay requested for the lifetime of this value and are
    /// released when it is dropped.
    pub struct CdevPins {
        handle: MultiLineHandle,
    }

    impl CdevPins {
        /// Request the A, B and button lines described by `config`.
        pub fn open(config: &EncoderConfig) -> Result<Self, PinError> {
            let pins = [config.pin_a, config.pin_b, config.pin_sw];
            let request_error = |e: gpio_cdev::Error| PinError::Request {
                chip: config.chip.clone(),
                pins,
                reason: e.to_string(),
            };

            let mut chip = Chip::new(format!("/dev/{}", config.chip)).map_err(request_error)?;
            let lines = chip.get_lines(&pins).map_err(request_error)?;
            let handle = lines
                .request(LineRequestFlags::INPUT, &[0, 0, 0], CONSUMER)
                .map_err(request_error)?;
            info!("requested lines {:?} on {}", pins, config.chip);
            Ok(Self { handle })
        }
    }

    impl PinSource for CdevPins {
        fn read(&mut self) -> Result<RawPins, PinError> {
            let values = self
                .handle
                .get_values()
                .map_err(|e| PinError::Read(e.to_string()))?;
            match values.as_slice() {
                [a, b, button] => Ok(RawPins::new(*a != 0, *b != 0, *button != 0)),
                other => Err(PinError::ShortRead {
                    expected: 3,
                    got: other.len(),
                }),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_pins_repeat_last_sample() {
        let mut pins = ScriptedPins::new([RawPins::new(false, true, true)]);
        assert_eq!(pins.read().unwrap(), RawPins::new(false, true, true));
        assert_eq!(pins.remaining(), 0);
        assert_eq!(pins.read().unwrap(), RawPins::new(false, true, true));
    }

    #[test]
    fn test_scripted_failures() {
        let mut pins = ScriptedPins::with_failures([None, Some(RawPins::RELEASED)]);
        assert!(matches!(pins.read(), Err(PinError::Read(_))));
        assert_eq!(pins.read().unwrap(), RawPins::RELEASED);
    }

    #[test]
    fn test_script_gestures() {
        let script = PinScript::new().clockwise(1).press(3);
        let samples = script.samples();
        assert_eq!(samples.len(), 8);
        assert_eq!(samples[0], RawPins::new(false, true, true));
        assert_eq!(samples[3], RawPins::new(false, false, true));
        assert!(samples[4..7].iter().all(|s| !s.button));
        assert!(samples[7].button);
    }

    #[test]
    fn test_single_edges_continue_from_current_position() {
        let script = PinScript::new().clockwise_edges(1, 1).counter_clockwise_edges(2, 1);
        let encoder: Vec<_> = script.samples().iter().map(|s| (s.a, s.b)).collect();
        assert_eq!(encoder, vec![(false, true), (false, false), (true, false)]);
    }

    #[test]
    fn test_counter_clockwise_gesture_order() {
        let script = PinScript::new().counter_clockwise(1);
        let encoder: Vec<_> = script.samples().iter().map(|s| (s.a, s.b)).collect();
        assert_eq!(
            encoder,
            vec![(true, false), (true, true), (false, true), (false, false)]
        );
    }
}
