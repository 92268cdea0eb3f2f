//! The effect worker: runs player commands, settings saves and the
//! now-playing status query off the sampling thread.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError};
use log::{debug, info, trace, warn};

use crate::config::Config;
use crate::error::ConfigError;
use crate::interaction::Effect;
use crate::mode::SettingValues;
use crate::player::{PlayerCommand, PlayerSink};
use crate::state::{NowPlayingHandle, lock_now_playing};

/// Capacity of the effect queue.
pub const EFFECT_QUEUE_CAPACITY: usize = 32;

/// Create the effect queue.
pub fn effect_channel() -> (EffectSender, Receiver<Effect>) {
    let (tx, rx) = crossbeam_channel::bounded(EFFECT_QUEUE_CAPACITY);
    (EffectSender { tx }, rx)
}

/// Non-blocking handle for queueing effects.
#[derive(Debug, Clone)]
pub struct EffectSender {
    tx: Sender<Effect>,
}

impl EffectSender {
    /// Queue an effect without blocking. Returns `false` if it was dropped.
    pub fn send(&self, effect: Effect) -> bool {
        match self.tx.try_send(effect) {
            Ok(()) => true,
            Err(TrySendError::Full(effect)) => {
                warn!("effect queue full, dropping {:?}", effect);
                false
            }
            Err(TrySendError::Disconnected(effect)) => {
                warn!("effect worker gone, dropping {:?}", effect);
                false
            }
        }
    }
}

/// Writes edited settings back into the configuration file.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: Option<PathBuf>,
    config: Config,
}

impl SettingsStore {
    /// Persist to `path`, starting from the loaded `config`. With no path,
    /// edits are kept in memory only.
    pub fn new(path: Option<PathBuf>, config: Config) -> Self {
        Self { path, config }
    }

    /// The configuration including all edits so far.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Apply and persist edited values.
    pub fn save(&mut self, values: &SettingValues) -> Result<(), ConfigError> {
        self.config.apply_settings(values);
        match &self.path {
            Some(path) => {
                self.config.save(path)?;
                debug!("saved settings to {}", path.display());
            }
            None => debug!("no config path, settings kept in memory"),
        }
        Ok(())
    }
}

/// Periodic player status query, publishing into a [`NowPlayingHandle`].
#[derive(Debug, Clone)]
pub struct StatusPoll {
    now_playing: NowPlayingHandle,
    interval: Duration,
    failing: bool,
}

impl StatusPoll {
    /// Query every `interval` and publish into `now_playing`.
    pub fn new(now_playing: NowPlayingHandle, interval: Duration) -> Self {
        Self {
            now_playing,
            interval,
            failing: false,
        }
    }

    /// Time between queries.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Query the player once and publish the result if it changed.
    pub fn refresh(&mut self, player: &dyn PlayerSink) {
        match player.status() {
            Ok(status) => {
                if self.failing {
                    info!("player status available again");
                    self.failing = false;
                }
                let mut now_playing = lock_now_playing(&self.now_playing);
                if now_playing.update(&status) {
                    debug!("now playing {:?} {:?}", now_playing.playback, now_playing.track);
                }
            }
            Err(e) if self.failing => trace!("player status still unavailable: {}", e),
            Err(e) => {
                warn!("player status unavailable: {}", e);
                self.failing = true;
            }
        }
    }
}

/// Keep only the last `SetVolume` of a batch; everything else stays in order.
///
/// Volume commands are absolute, so earlier ones in the same batch are
/// superseded before they reach the player.
pub fn coalesce_volume(batch: Vec<Effect>) -> Vec<Effect> {
    let last_volume = batch
        .iter()
        .rposition(|effect| matches!(effect, Effect::Player(PlayerCommand::SetVolume(_))));
    batch
        .into_iter()
        .enumerate()
        .filter(|(i, effect)| {
            !matches!(effect, Effect::Player(PlayerCommand::SetVolume(_)))
                || Some(*i) == last_volume
        })
        .map(|(_, effect)| effect)
        .collect()
}

/// Run effects until every sender is dropped, querying the player status
/// between batches when `status` is set.
pub fn run_effect_worker(
    rx: Receiver<Effect>,
    player: Box<dyn PlayerSink>,
    mut store: SettingsStore,
    mut status: Option<StatusPoll>,
) {
    info!("effect worker started");
    let mut next_status = Instant::now();
    loop {
        let received = match status.as_mut() {
            Some(poll) => {
                if Instant::now() >= next_status {
                    poll.refresh(player.as_ref());
                    next_status = Instant::now() + poll.interval();
                }
                rx.recv_timeout(next_status.saturating_duration_since(Instant::now()))
            }
            None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };
        let first = match received {
            Ok(effect) => effect,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        let mut batch = vec![first];
        batch.extend(rx.try_iter());

        for effect in coalesce_volume(batch) {
            match effect {
                Effect::Player(command) => {
                    if let Err(e) = player.execute(&command) {
                        warn!("player command {:?} failed: {}", command, e);
                    }
                }
                Effect::SaveSettings(values) => {
                    if let Err(e) = store.save(&values) {
                        warn!("failed to save settings: {}", e);
                    }
                }
            }
        }
    }
    info!("effect worker stopped");
}
