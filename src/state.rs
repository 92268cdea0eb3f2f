//! Interaction state snapshots and persistence.

use std::fs;
use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use log::{debug, warn};
use serde::{Deserialize, Deserializer, Serialize};

use crate::config::write_atomic;
use crate::error::StateError;
use crate::mode::{MENU_ITEMS, Mode, SettingKey, SettingValues};
use crate::player::{PlaybackState, PlayerStatus};

/// A snapshot of the interaction state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InteractionState {
    /// Current mode.
    pub mode: Mode,
    /// Selected menu item, always below the menu length.
    pub menu_index: usize,
    /// Selected setting, always below the settings count.
    pub setting_index: usize,
    /// Volume in percent (0-100).
    pub volume: u8,
}

impl InteractionState {
    /// Start in volume mode with the given volume.
    pub fn new(volume: u8) -> Self {
        Self {
            volume: volume.min(100),
            ..Self::default()
        }
    }

    /// Restore a persisted mode and selection, taking the volume from the player.
    pub fn restore(persisted: PersistedState, volume: u8) -> Self {
        let persisted = persisted.normalized();
        Self {
            mode: persisted.mode,
            menu_index: persisted.menu_index,
            setting_index: persisted.setting_index,
            volume: volume.min(100),
        }
    }
}

/// State shared between the sampling thread (the only writer) and the
/// display thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SharedState {
    /// Interaction state.
    pub interaction: InteractionState,
    /// Current settings values, mirrored for the settings screen.
    pub settings: SettingValues,
    /// Most recent user activity.
    pub last_activity: Instant,
    /// Incremented on every published change.
    pub version: u64,
}

impl SharedState {
    /// Initial shared state.
    pub fn new(interaction: InteractionState, settings: SettingValues, now: Instant) -> Self {
        Self {
            interaction,
            settings,
            last_activity: now,
            version: 0,
        }
    }
}

/// Handle to the shared state.
pub type StateHandle = Arc<Mutex<SharedState>>;

/// Lock the shared state, recovering from a poisoned mutex.
///
/// Writers replace the whole struct under the lock, so the data is consistent
/// even if a holder panicked.
pub fn lock_state(handle: &StateHandle) -> MutexGuard<'_, SharedState> {
    handle.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// =============================================================================
// Now playing
// =============================================================================

/// What the player last reported. Written only by the effect worker.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NowPlaying {
    /// Playback state.
    pub playback: PlaybackState,
    /// Title of the current track or stream.
    pub track: Option<String>,
    /// Incremented whenever the playback state or track changes.
    pub version: u64,
}

impl NowPlaying {
    /// Take in a status report. Returns whether anything shown changed.
    pub fn update(&mut self, status: &PlayerStatus) -> bool {
        if self.playback == status.playback && self.track == status.current {
            return false;
        }
        self.playback = status.playback;
        self.track.clone_from(&status.current);
        self.version = self.version.wrapping_add(1);
        true
    }
}

/// Handle to the now-playing record.
pub type NowPlayingHandle = Arc<Mutex<NowPlaying>>;

/// Lock the now-playing record, recovering from a poisoned mutex.
pub fn lock_now_playing(handle: &NowPlayingHandle) -> MutexGuard<'_, NowPlaying> {
    handle.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// =============================================================================
// Persistence
// =============================================================================

/// The persisted part of the interaction state.
///
/// Unknown keys are ignored and missing or unreadable values fall back to
/// their defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistedState {
    /// Mode at the time of saving.
    #[serde(deserialize_with = "lenient_mode")]
    pub mode: Mode,
    /// Selected menu item.
    #[serde(deserialize_with = "lenient_index")]
    pub menu_index: usize,
    /// Selected setting.
    #[serde(deserialize_with = "lenient_index")]
    pub setting_index: usize,
}

fn lenient_mode<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Mode, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value.as_str().and_then(Mode::from_name).unwrap_or_default())
}

fn lenient_index<'de, D: Deserializer<'de>>(deserializer: D) -> Result<usize, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value
        .as_u64()
        .and_then(|index| usize::try_from(index).ok())
        .unwrap_or_default())
}

impl PersistedState {
    /// Reduce out-of-range indices modulo the item counts.
    pub fn normalized(self) -> Self {
        Self {
            mode: self.mode,
            menu_index: self.menu_index % MENU_ITEMS.len(),
            setting_index: self.setting_index % SettingKey::ALL.len(),
        }
    }

    /// Parse a persisted state document.
    pub fn from_json(text: &str) -> Result<Self, StateError> {
        let state: PersistedState = serde_json::from_str(text)?;
        Ok(state.normalized())
    }

    /// Read the persisted state at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, StateError> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Read the persisted state, using defaults if it is missing or unreadable.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(state) => {
                debug!("restored {:?} from {}", state, path.display());
                state
            }
            Err(StateError::Io(e)) if e.kind() == io::ErrorKind::NotFound => {
                debug!("no saved state at {}", path.display());
                Self::default()
            }
            Err(e) => {
                warn!("ignoring saved state at {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Write the state to `path`, replacing it atomically.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), StateError> {
        let text = serde_json::to_string(self)?;
        write_atomic(path.as_ref(), text.as_bytes())?;
        Ok(())
    }
}

impl From<&InteractionState> for PersistedState {
    fn from(state: &InteractionState) -> Self {
        Self {
            mode: state.mode,
            menu_index: state.menu_index,
            setting_index: state.setting_index,
        }
    }
}
