//! Display inactivity policy.
//!
//! Maps time since the last user activity to a brightness level, and decides
//! which display writes a refresh tick needs: contrast only when the level
//! changes, a redraw only when the level became visible or the content
//! changed.

use std::time::Duration;

use log::info;

/// Brightness level derived from inactivity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BrightnessLevel {
    /// Full brightness.
    Active,
    /// Reduced brightness.
    Dim,
    /// Display blanked.
    Off,
}

impl BrightnessLevel {
    /// Whether content is visible at this level.
    pub const fn is_visible(self) -> bool {
        !matches!(self, BrightnessLevel::Off)
    }
}

/// Level for an idle duration.
///
/// `idle < dim` is active, `dim <= idle < off` is dimmed, `idle >= off` is
/// off. When `dim == off` the display goes straight from active to off.
pub fn level(idle: Duration, dim: Duration, off: Duration) -> BrightnessLevel {
    if idle >= off {
        BrightnessLevel::Off
    } else if idle >= dim {
        BrightnessLevel::Dim
    } else {
        BrightnessLevel::Active
    }
}

/// Convert a brightness percentage (0-100) to a panel contrast value (0-255).
pub fn percent_to_contrast(percent: u32) -> u8 {
    let scaled = percent.min(100) * 255 / 100;
    u8::try_from(scaled).unwrap_or(u8::MAX)
}

/// Timeouts and contrast values the policy works with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Inactivity before dimming.
    pub dim: Duration,
    /// Inactivity before turning off.
    pub off: Duration,
    /// Contrast at the active level.
    pub active_contrast: u8,
    /// Contrast at the dimmed level.
    pub dim_contrast: u8,
}

/// A write the display thread should perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayAction {
    /// Set the panel contrast.
    Contrast(u8),
    /// Draw the current content.
    Render,
    /// Blank the panel.
    Clear,
}

/// Tracks the level and content version last written to the display.
#[derive(Debug, Clone)]
pub struct DisplayPolicy {
    timeouts: Timeouts,
    current: Option<BrightnessLevel>,
    rendered_version: Option<u64>,
}

impl DisplayPolicy {
    /// Create a policy that has not written anything yet.
    pub fn new(timeouts: Timeouts) -> Self {
        Self {
            timeouts,
            current: None,
            rendered_version: None,
        }
    }

    /// The level written on the last evaluation, if any.
    pub fn current(&self) -> Option<BrightnessLevel> {
        self.current
    }

    /// Decide the display writes for one refresh tick.
    ///
    /// `version` is the content's change counter; a version the display has
    /// not drawn yet forces a redraw while the level is visible.
    pub fn evaluate(&mut self, idle: Duration, version: u64) -> Vec<DisplayAction> {
        let next = level(idle, self.timeouts.dim, self.timeouts.off);
        let mut actions = Vec::new();

        if self.current != Some(next) {
            info!("display level {:?} -> {:?} after {:?} idle", self.current, next, idle);
            self.current = Some(next);
            match next {
                BrightnessLevel::Active => {
                    actions.push(DisplayAction::Contrast(self.timeouts.active_contrast));
                    actions.push(DisplayAction::Render);
                }
                BrightnessLevel::Dim => {
                    actions.push(DisplayAction::Contrast(self.timeouts.dim_contrast));
                    actions.push(DisplayAction::Render);
                }
                BrightnessLevel::Off => {
                    actions.push(DisplayAction::Clear);
                    self.rendered_version = None;
                    return actions;
                }
            }
        } else if !next.is_visible() || self.rendered_version == Some(version) {
            return actions;
        } else {
            actions.push(DisplayAction::Render);
        }

        self.rendered_version = Some(version);
        actions
    }
}
