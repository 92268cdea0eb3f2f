//! Threaded runtime.
//!
//! Three threads share one [`StateHandle`]:
//!
//! - the input thread samples the pins every poll interval, decodes steps and
//!   presses, runs the interaction state machine and is the only writer of
//!   the shared state;
//! - the effect worker runs player commands and settings saves, and between
//!   them queries the player status into a separate now-playing record;
//! - the display thread snapshots both every refresh interval, applies the
//!   display policy and persists the interaction state.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, info, trace, warn};

use crate::config::Config;
use crate::display::{ContentDescriptor, DisplaySink};
use crate::effects::{EffectSender, SettingsStore, StatusPoll, effect_channel, run_effect_worker};
use crate::error::RuntimeError;
use crate::interaction::{InputEvent, Interaction};
use crate::pins::PinSource;
use crate::player::PlayerSink;
use crate::policy::{DisplayAction, DisplayPolicy};
use crate::press::PressClassifier;
use crate::quadrature::QuadratureDecoder;
use crate::state::{
    InteractionState, NowPlaying, NowPlayingHandle, PersistedState, SharedState, StateHandle,
    lock_now_playing, lock_state,
};

/// Hardware resolved once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// An encoder is attached and its lines could be requested.
    pub encoder: bool,
    /// A display is attached.
    pub display: bool,
}

impl Capabilities {
    /// Everything present.
    pub const FULL: Capabilities = Capabilities {
        encoder: true,
        display: true,
    };
}

/// Shared stop flag checked by every loop once per tick.
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    /// Create a cleared flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask every loop to exit.
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether a stop was requested.
    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Sets the stop flag when dropped, unless disarmed first.
struct StopGuard<'a> {
    stop: &'a StopFlag,
    armed: bool,
}

impl<'a> StopGuard<'a> {
    fn new(stop: &'a StopFlag) -> Self {
        Self { stop, armed: true }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for StopGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.stop.stop();
        }
    }
}

fn run_every(stop: &StopFlag, interval: Duration, mut tick: impl FnMut(Instant)) {
    while !stop.is_stopped() {
        let started = Instant::now();
        tick(started);
        let elapsed = started.elapsed();
        if elapsed < interval {
            thread::sleep(interval - elapsed);
        }
    }
}

// =============================================================================
// Input
// =============================================================================

/// The sampling loop body: pins in, shared state and effects out.
pub struct Poller {
    pins: Box<dyn PinSource>,
    decoder: Option<QuadratureDecoder>,
    press: PressClassifier,
    interaction: Interaction,
    shared: StateHandle,
    effects: EffectSender,
    debounce: Duration,
    invert: bool,
    failed_reads: u64,
}

impl Poller {
    /// Create a poller for the given pins and state machine.
    pub fn new(
        config: &Config,
        pins: Box<dyn PinSource>,
        interaction: Interaction,
        shared: StateHandle,
        effects: EffectSender,
    ) -> Self {
        Self {
            pins,
            decoder: None,
            press: PressClassifier::new(config.button.long_press(), config.button.short_debounce())
                .with_press_debounce(config.button.press_debounce()),
            interaction,
            shared,
            effects,
            debounce: config.encoder.debounce(),
            invert: config.encoder.invert,
            failed_reads: 0,
        }
    }

    /// The state machine's current state.
    pub fn state(&self) -> InteractionState {
        self.interaction.state()
    }

    /// Sample once at `now`. Returns the number of events applied.
    pub fn tick(&mut self, now: Instant) -> usize {
        let raw = match self.pins.read() {
            Ok(raw) => raw,
            Err(e) => {
                if self.failed_reads == 0 {
                    warn!("pin read failed: {}", e);
                } else {
                    trace!("pin read failed again: {}", e);
                }
                self.failed_reads += 1;
                return 0;
            }
        };
        if self.failed_reads > 0 {
            info!("pin reads recovered after {} failures", self.failed_reads);
            self.failed_reads = 0;
        }

        let mut events = Vec::new();
        match &mut self.decoder {
            Some(decoder) => {
                if let Some(step) = decoder.update(raw.encoder(), now) {
                    events.push(InputEvent::Rotate(step));
                }
            }
            None => {
                self.decoder = Some(QuadratureDecoder::new(
                    raw.encoder(),
                    self.debounce,
                    self.invert,
                ));
            }
        }
        if let Some(press) = self.press.update(raw.button, now) {
            events.push(InputEvent::Press(press));
        }
        if events.is_empty() {
            return 0;
        }

        for event in &events {
            debug!("input {:?}", event);
            for effect in self.interaction.handle(*event, now) {
                self.effects.send(effect);
            }
        }
        self.publish();
        events.len()
    }

    fn publish(&self) {
        let mut shared = lock_state(&self.shared);
        shared.interaction = self.interaction.state();
        shared.settings = self.interaction.settings();
        shared.last_activity = self.interaction.last_activity();
        shared.version = shared.version.wrapping_add(1);
    }
}

// =============================================================================
// Display
// =============================================================================

/// The display loop body: shared state in, display writes and persisted
/// state out.
pub struct Refresher {
    display: Box<dyn DisplaySink>,
    display_available: bool,
    policy: DisplayPolicy,
    shared: StateHandle,
    now_playing: NowPlayingHandle,
    state_path: Option<PathBuf>,
    persisted: Option<PersistedState>,
    headless_version: Option<u64>,
}

impl Refresher {
    /// Create a refresher writing to `display`.
    pub fn new(
        config: &Config,
        display: Box<dyn DisplaySink>,
        display_available: bool,
        shared: StateHandle,
        now_playing: NowPlayingHandle,
        state_path: Option<PathBuf>,
    ) -> Self {
        Self {
            display,
            display_available,
            policy: DisplayPolicy::new(config.display.timeouts()),
            shared,
            now_playing,
            state_path,
            persisted: None,
            headless_version: None,
        }
    }

    /// Refresh once at `now`.
    pub fn tick(&mut self, now: Instant) {
        let snapshot = *lock_state(&self.shared);
        let now_playing = lock_now_playing(&self.now_playing).clone();
        let idle = now.saturating_duration_since(snapshot.last_activity);
        // Both counters only ever advance, so the sum changes whenever either does.
        let version = snapshot.version.wrapping_add(now_playing.version);

        if self.display_available {
            for action in self.policy.evaluate(idle, version) {
                let result = match action {
                    DisplayAction::Contrast(contrast) => self.display.set_contrast(contrast),
                    DisplayAction::Render => self
                        .display
                        .render(&ContentDescriptor::from_state(&snapshot, &now_playing)),
                    DisplayAction::Clear => self.display.clear(),
                };
                if let Err(e) = result {
                    warn!("display {:?} failed: {}", action, e);
                }
            }
        } else if self.headless_version != Some(version) {
            self.headless_version = Some(version);
            let content = ContentDescriptor::from_state(&snapshot, &now_playing);
            if let Err(e) = self.display.render(&content) {
                warn!("display render failed: {}", e);
            }
        }

        self.persist(&snapshot);
    }

    fn persist(&mut self, snapshot: &SharedState) {
        let Some(path) = &self.state_path else {
            return;
        };
        let record = PersistedState::from(&snapshot.interaction);
        if self.persisted == Some(record) {
            return;
        }
        match record.save(path) {
            Ok(()) => {
                trace!("saved {:?}", record);
                self.persisted = Some(record);
            }
            Err(e) => warn!("failed to save state to {}: {}", path.display(), e),
        }
    }

    /// Blank the display before exit.
    pub fn finish(&mut self) {
        if self.display_available {
            if let Err(e) = self.display.clear() {
                warn!("failed to clear display: {}", e);
            }
        }
    }
}

// =============================================================================
// Runtime
// =============================================================================

/// Everything the runtime needs to start.
pub struct RuntimeParts {
    /// Loaded configuration.
    pub config: Config,
    /// Where to write edited settings back, if anywhere.
    pub config_path: Option<PathBuf>,
    /// Where to persist the interaction state, if anywhere.
    pub state_path: Option<PathBuf>,
    /// Resolved hardware.
    pub capabilities: Capabilities,
    /// Encoder lines. Unused when the encoder is unavailable.
    pub pins: Box<dyn PinSource>,
    /// Media player.
    pub player: Box<dyn PlayerSink>,
    /// Display sink. Without a display only content renders reach it.
    pub display: Box<dyn DisplaySink>,
    /// Starting interaction state.
    pub initial: InteractionState,
}

/// Running threads and the state they share.
pub struct Runtime {
    stop: StopFlag,
    shared: StateHandle,
    now_playing: NowPlayingHandle,
    // Keeps the effect worker alive when no input thread owns a sender.
    idle_effects: Option<EffectSender>,
    input: Option<JoinHandle<()>>,
    refresher: JoinHandle<()>,
    effects: JoinHandle<()>,
}

fn spawn<F>(name: &'static str, f: F) -> Result<JoinHandle<()>, RuntimeError>
where
    F: FnOnce() + Send + 'static,
{
    thread::Builder::new()
        .name(format!("dialctl-{}", name))
        .spawn(f)
        .map_err(|source| RuntimeError::Spawn { name, source })
}

impl Runtime {
    /// Start all threads.
    pub fn start(parts: RuntimeParts) -> Result<Self, RuntimeError> {
        let RuntimeParts {
            config,
            config_path,
            state_path,
            capabilities,
            pins,
            player,
            display,
            initial,
        } = parts;
        info!(
            "starting runtime (encoder: {}, display: {})",
            capabilities.encoder, capabilities.display
        );

        let now = Instant::now();
        let interaction = Interaction::from_config(&config, initial, now);
        let shared: StateHandle = Arc::new(Mutex::new(SharedState::new(
            interaction.state(),
            interaction.settings(),
            now,
        )));
        let now_playing: NowPlayingHandle = Arc::new(Mutex::new(NowPlaying::default()));
        let stop = StopFlag::new();
        let guard = StopGuard::new(&stop);

        let (effect_tx, effect_rx) = effect_channel();
        let store = SettingsStore::new(config_path, config.clone());
        let status = StatusPoll::new(Arc::clone(&now_playing), config.player.status_interval());
        let effects = spawn("effects", move || {
            run_effect_worker(effect_rx, player, store, Some(status))
        })?;

        let (input, idle_effects) = if capabilities.encoder {
            let shared = Arc::clone(&shared);
            let mut poller = Poller::new(&config, pins, interaction, shared, effect_tx);
            let interval = config.encoder.poll_interval();
            let stop = stop.clone();
            let input = spawn("input", move || {
                info!("input thread started");
                run_every(&stop, interval, |now| {
                    poller.tick(now);
                });
                info!("input thread stopped");
            })?;
            (Some(input), None)
        } else {
            info!("encoder unavailable, input disabled");
            (None, Some(effect_tx))
        };

        let mut refresher = Refresher::new(
            &config,
            display,
            capabilities.display,
            Arc::clone(&shared),
            Arc::clone(&now_playing),
            state_path,
        );
        let interval = config.display.refresh_interval();
        let refresher_stop = stop.clone();
        let refresher = spawn("display", move || {
            info!("display thread started");
            run_every(&refresher_stop, interval, |now| refresher.tick(now));
            refresher.finish();
            info!("display thread stopped");
        })?;

        guard.disarm();
        Ok(Self {
            stop,
            shared,
            now_playing,
            idle_effects,
            input,
            refresher,
            effects,
        })
    }

    /// A handle that stops the runtime when set.
    pub fn stop_flag(&self) -> StopFlag {
        self.stop.clone()
    }

    /// A copy of the current shared state.
    pub fn snapshot(&self) -> SharedState {
        *lock_state(&self.shared)
    }

    /// What the player last reported.
    pub fn now_playing(&self) -> NowPlaying {
        lock_now_playing(&self.now_playing).clone()
    }

    /// Stop every thread and wait for them to finish.
    pub fn shutdown(self) {
        let Runtime {
            stop,
            idle_effects,
            input,
            refresher,
            effects,
            ..
        } = self;
        stop.stop();
        drop(idle_effects);
        for (name, handle) in [
            ("input", input),
            ("display", Some(refresher)),
            ("effects", Some(effects)),
        ] {
            if let Some(handle) = handle {
                if handle.join().is_err() {
                    warn!("{} thread panicked", name);
                }
            }
        }
        info!("runtime stopped");
    }
}
