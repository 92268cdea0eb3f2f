//! Quadrature decoding of the encoder A/B lines.
//!
//! The two lines are folded into a 2-bit state `(A << 1) | B`. Clockwise
//! rotation walks the Gray-code cycle `00 -> 01 -> 11 -> 10 -> 00`, each edge
//! producing one [`Step`]. A sample that jumps two positions along the cycle
//! (both lines changed at once) is ambiguous and yields nothing.

use std::time::{Duration, Instant};

use log::trace;

/// Levels of the A and B lines sampled at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PinSample {
    /// Level of line A.
    pub a: bool,
    /// Level of line B.
    pub b: bool,
}

impl PinSample {
    /// Create a sample from the two line levels.
    pub const fn new(a: bool, b: bool) -> Self {
        Self { a, b }
    }
}

/// The last validly observed 2-bit line combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EncoderState(u8);

impl EncoderState {
    /// Build a state from its bit pattern; bits above the low two are ignored.
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & 0b11)
    }

    /// The `(A << 1) | B` bit pattern.
    pub const fn bits(self) -> u8 {
        self.0
    }

    fn cycle_position(self) -> u8 {
        CYCLE_POSITION[usize::from(self.0)]
    }
}

impl From<PinSample> for EncoderState {
    fn from(sample: PinSample) -> Self {
        Self((u8::from(sample.a) << 1) | u8::from(sample.b))
    }
}

/// Direction of one decoded edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// One detent edge clockwise (+1).
    Clockwise,
    /// One detent edge counter-clockwise (-1).
    CounterClockwise,
}

impl Step {
    /// `+1` for clockwise, `-1` for counter-clockwise.
    pub const fn sign(self) -> i32 {
        match self {
            Step::Clockwise => 1,
            Step::CounterClockwise => -1,
        }
    }

    /// The opposite direction.
    pub const fn reversed(self) -> Self {
        match self {
            Step::Clockwise => Step::CounterClockwise,
            Step::CounterClockwise => Step::Clockwise,
        }
    }
}

// Position of each bit pattern on the clockwise cycle 00, 01, 11, 10.
const CYCLE_POSITION: [u8; 4] = [0, 1, 3, 2];

/// Decode one raw sample against the previous state.
///
/// Returns the new baseline and the step, if any. Unchanged samples and
/// two-position jumps both yield `None`; in the jump case the new sample
/// still becomes the baseline.
///
/// ```
/// use dialctl_core::{decode, EncoderState, PinSample, Step};
///
/// let (state, step) = decode(EncoderState::from_bits(0b00), PinSample::new(false, true));
/// assert_eq!(state.bits(), 0b01);
/// assert_eq!(step, Some(Step::Clockwise));
/// ```
pub fn decode(prev: EncoderState, sample: PinSample) -> (EncoderState, Option<Step>) {
    let curr = EncoderState::from(sample);
    let distance = (curr.cycle_position() + 4 - prev.cycle_position()) % 4;
    let step = match distance {
        1 => Some(Step::Clockwise),
        3 => Some(Step::CounterClockwise),
        _ => None,
    };
    (curr, step)
}

/// Stateful decoder with per-line edge debounce and optional direction
/// inversion.
///
/// An edge on a line arriving sooner than `debounce` after the previous
/// accepted edge on the same line is treated as bounce: no step is emitted
/// and the baseline is left untouched, so a bounce that settles back to the
/// old level produces nothing at all.
#[derive(Debug, Clone)]
pub struct QuadratureDecoder {
    state: EncoderState,
    last_edge: [Option<Instant>; 2],
    debounce: Duration,
    invert: bool,
}

impl QuadratureDecoder {
    /// Create a decoder whose baseline is the given initial sample.
    pub fn new(initial: PinSample, debounce: Duration, invert: bool) -> Self {
        Self {
            state: EncoderState::from(initial),
            last_edge: [None; 2],
            debounce,
            invert,
        }
    }

    /// The current baseline.
    pub fn state(&self) -> EncoderState {
        self.state
    }

    /// Feed one sample taken at `now`.
    pub fn update(&mut self, sample: PinSample, now: Instant) -> Option<Step> {
        let curr = EncoderState::from(sample);
        if curr == self.state {
            return None;
        }

        let (next, step) = decode(self.state, sample);
        let Some(step) = step else {
            trace!(
                "quadrature glitch {:02b} -> {:02b}, resyncing",
                self.state.bits(),
                curr.bits()
            );
            self.state = next;
            return None;
        };

        // A single-position move changes exactly one line.
        let line = if (self.state.bits() ^ curr.bits()) & 0b10 != 0 { 0 } else { 1 };
        if let Some(last) = self.last_edge[line] {
            if now.saturating_duration_since(last) < self.debounce {
                trace!("bounce on line {} ignored", if line == 0 { 'A' } else { 'B' });
                return None;
            }
        }

        self.last_edge[line] = Some(now);
        self.state = next;
        Some(if self.invert { step.reversed() } else { step })
    }
}
