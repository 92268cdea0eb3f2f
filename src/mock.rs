//! Mock sinks for testing.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::display::{ContentDescriptor, DisplaySink};
use crate::error::SinkError;
use crate::player::{PlayerCommand, PlayerSink, PlayerStatus};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, Default)]
struct PlayerLog {
    commands: Vec<PlayerCommand>,
    status: PlayerStatus,
    failing: bool,
}

/// A mock player that records every command it receives.
///
/// Clones share the same record, so a test can keep one clone while the
/// runtime owns another.
///
/// # Example
///
/// ```
/// use dialctl_core::{MockPlayer, PlayerCommand, PlayerSink};
///
/// let player = MockPlayer::new();
/// player.set_volume(40).unwrap();
/// assert_eq!(player.commands(), vec![PlayerCommand::SetVolume(40)]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockPlayer {
    log: Arc<Mutex<PlayerLog>>,
}

impl MockPlayer {
    /// Create a mock player reporting the default status.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock player reporting `status`.
    pub fn with_status(status: PlayerStatus) -> Self {
        let player = Self::default();
        lock(&player.log).status = status;
        player
    }

    /// Make every subsequent call fail (`true`) or succeed (`false`).
    pub fn set_failing(&self, failing: bool) {
        lock(&self.log).failing = failing;
    }

    /// Commands received so far, in order. Failed calls are recorded too.
    pub fn commands(&self) -> Vec<PlayerCommand> {
        lock(&self.log).commands.clone()
    }

    fn record(&self, command: PlayerCommand) -> Result<(), SinkError> {
        let mut log = lock(&self.log);
        if let PlayerCommand::SetVolume(volume) = command {
            log.status.volume = Some(volume);
        }
        log.commands.push(command);
        if log.failing {
            return Err(SinkError::Unavailable("mock player failing".to_string()));
        }
        Ok(())
    }
}

impl PlayerSink for MockPlayer {
    fn set_volume(&self, volume: u8) -> Result<(), SinkError> {
        self.record(PlayerCommand::SetVolume(volume))
    }

    fn toggle_play_pause(&self) -> Result<(), SinkError> {
        self.record(PlayerCommand::TogglePlayPause)
    }

    fn play(&self) -> Result<(), SinkError> {
        self.record(PlayerCommand::Play)
    }

    fn stop(&self) -> Result<(), SinkError> {
        self.record(PlayerCommand::Stop)
    }

    fn load_playlist(&self, name: &str) -> Result<(), SinkError> {
        self.record(PlayerCommand::LoadPlaylist(name.to_string()))
    }

    fn status(&self) -> Result<PlayerStatus, SinkError> {
        let log = lock(&self.log);
        if log.failing {
            return Err(SinkError::Unavailable("mock player failing".to_string()));
        }
        Ok(log.status.clone())
    }
}

/// A call received by a [`MockDisplay`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayCall {
    /// `set_contrast` with the given value.
    Contrast(u8),
    /// `render` with the given content.
    Render(ContentDescriptor),
    /// `clear`.
    Clear,
}

/// A mock display that records every call it receives.
#[derive(Debug, Clone, Default)]
pub struct MockDisplay {
    calls: Arc<Mutex<Vec<DisplayCall>>>,
}

impl MockDisplay {
    /// Create an empty mock display.
    pub fn new() -> Self {
        Self::default()
    }

    /// Calls received so far, in order.
    pub fn calls(&self) -> Vec<DisplayCall> {
        lock(&self.calls).clone()
    }

    /// Number of `render` calls so far.
    pub fn render_count(&self) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|call| matches!(call, DisplayCall::Render(_)))
            .count()
    }

    /// The most recently rendered content.
    pub fn last_rendered(&self) -> Option<ContentDescriptor> {
        lock(&self.calls).iter().rev().find_map(|call| match call {
            DisplayCall::Render(content) => Some(content.clone()),
            _ => None,
        })
    }
}

impl DisplaySink for MockDisplay {
    fn set_contrast(&mut self, contrast: u8) -> Result<(), SinkError> {
        lock(&self.calls).push(DisplayCall::Contrast(contrast));
        Ok(())
    }

    fn render(&mut self, content: &ContentDescriptor) -> Result<(), SinkError> {
        lock(&self.calls).push(DisplayCall::Render(content.clone()));
        Ok(())
    }

    fn clear(&mut self) -> Result<(), SinkError> {
        lock(&self.calls).push(DisplayCall::Clear);
        Ok(())
    }
}
