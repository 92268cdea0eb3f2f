//! Media player sinks.
//!
//! The interaction state machine emits [`PlayerCommand`]s; a [`PlayerSink`]
//! carries them out. Sink calls may be slow, so they only ever run on the
//! effect worker thread.

use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, trace, warn};

use crate::config::{PlayerConfig, PlayerKind};
use crate::error::SinkError;

/// A command for the media player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerCommand {
    /// Set the absolute volume (0-100).
    SetVolume(u8),
    /// Toggle between playing and paused.
    TogglePlayPause,
    /// Start playback.
    Play,
    /// Stop playback.
    Stop,
    /// Add a stored playlist to the queue.
    LoadPlaylist(String),
}

/// Playback state reported by the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    /// Playing.
    Playing,
    /// Paused.
    Paused,
    /// Stopped or unknown.
    #[default]
    Stopped,
}

impl PlaybackState {
    /// Icon shown next to the current track.
    pub const fn icon(self) -> &'static str {
        match self {
            PlaybackState::Playing => "\u{25b6}",
            PlaybackState::Paused => "\u{275a}\u{275a}",
            PlaybackState::Stopped => "\u{25a0}",
        }
    }
}

/// Player status snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PlayerStatus {
    /// Volume in percent, if the player reports one.
    pub volume: Option<u8>,
    /// Playback state.
    pub playback: PlaybackState,
    /// Title of the current track or stream.
    pub current: Option<String>,
}

/// Something that can carry out player commands.
pub trait PlayerSink: Send + Sync {
    /// Set the absolute volume (0-100).
    fn set_volume(&self, volume: u8) -> Result<(), SinkError>;

    /// Toggle between playing and paused.
    fn toggle_play_pause(&self) -> Result<(), SinkError>;

    /// Start playback.
    fn play(&self) -> Result<(), SinkError>;

    /// Stop playback.
    fn stop(&self) -> Result<(), SinkError>;

    /// Add the named playlist to the queue.
    fn load_playlist(&self, name: &str) -> Result<(), SinkError>;

    /// Query the player status.
    fn status(&self) -> Result<PlayerStatus, SinkError>;

    /// Dispatch one command.
    fn execute(&self, command: &PlayerCommand) -> Result<(), SinkError> {
        match command {
            PlayerCommand::SetVolume(volume) => self.set_volume(*volume),
            PlayerCommand::TogglePlayPause => self.toggle_play_pause(),
            PlayerCommand::Play => self.play(),
            PlayerCommand::Stop => self.stop(),
            PlayerCommand::LoadPlaylist(name) => self.load_playlist(name),
        }
    }
}

/// Build the sink selected by the configuration.
pub fn player_from_config(config: &PlayerConfig) -> Box<dyn PlayerSink> {
    match config.kind {
        PlayerKind::Mpc => Box::new(MpcPlayer::new(&config.host, config.port, config.timeout())),
        PlayerKind::Disabled => Box::new(NullPlayer),
    }
}

/// Read the player volume, falling back to `fallback` when it is unavailable.
pub fn read_back_volume(player: &dyn PlayerSink, fallback: u8) -> u8 {
    match player.status() {
        Ok(PlayerStatus {
            volume: Some(volume),
            ..
        }) => volume.min(100),
        Ok(_) => {
            debug!("player reported no volume, assuming {}", fallback);
            fallback
        }
        Err(e) => {
            warn!("failed to read player volume ({}), assuming {}", e, fallback);
            fallback
        }
    }
}

// =============================================================================
// mpc
// =============================================================================

/// Player driven through the `mpc` command-line client.
#[derive(Debug, Clone)]
pub struct MpcPlayer {
    program: String,
    host: String,
    port: u16,
    timeout: Duration,
}

impl MpcPlayer {
    /// Talk to the MPD server at `host:port`, giving each command `timeout`.
    pub fn new(host: &str, port: u16, timeout: Duration) -> Self {
        Self::with_program("mpc", host, port, timeout)
    }

    /// Like [`MpcPlayer::new`] but running a different client binary.
    pub fn with_program(program: &str, host: &str, port: u16, timeout: Duration) -> Self {
        Self {
            program: program.to_string(),
            host: host.to_string(),
            port,
            timeout,
        }
    }

    fn run(&self, args: &[&str]) -> Result<String, SinkError> {
        trace!("{} {}", self.program, args.join(" "));
        let mut child = Command::new(&self.program)
            .arg("--host")
            .arg(&self.host)
            .arg("--port")
            .arg(self.port.to_string())
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;

        let status = wait_with_deadline(&mut child, self.timeout)?;
        let mut output = String::new();
        if let Some(mut stdout) = child.stdout.take() {
            stdout.read_to_string(&mut output)?;
        }
        if !status.success() {
            return Err(SinkError::CommandFailed {
                command: args.join(" "),
                status: status.code().unwrap_or(-1),
            });
        }
        Ok(output)
    }
}

fn wait_with_deadline(
    child: &mut Child,
    timeout: Duration,
) -> Result<std::process::ExitStatus, SinkError> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(status);
        }
        if Instant::now() >= deadline {
            // Already-exited races are harmless here.
            let _ = child.kill();
            let _ = child.wait();
            return Err(SinkError::Timeout(timeout));
        }
        thread::sleep(Duration::from_millis(5));
    }
}

impl PlayerSink for MpcPlayer {
    fn set_volume(&self, volume: u8) -> Result<(), SinkError> {
        let volume = volume.min(100).to_string();
        self.run(&["volume", &volume]).map(drop)
    }

    fn toggle_play_pause(&self) -> Result<(), SinkError> {
        self.run(&["toggle"]).map(drop)
    }

    fn play(&self) -> Result<(), SinkError> {
        self.run(&["play"]).map(drop)
    }

    fn stop(&self) -> Result<(), SinkError> {
        self.run(&["stop"]).map(drop)
    }

    fn load_playlist(&self, name: &str) -> Result<(), SinkError> {
        self.run(&["load", name]).map(drop)
    }

    fn status(&self) -> Result<PlayerStatus, SinkError> {
        self.run(&["status"]).map(|output| parse_status(&output))
    }
}

/// Parse the output of `mpc status`.
///
/// When something is queued the output is the current title, a
/// `[playing]`/`[paused]` line and the options line carrying `volume:`.
/// When stopped only the options line is printed.
pub fn parse_status(output: &str) -> PlayerStatus {
    let lines: Vec<&str> = output.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    let mut status = PlayerStatus::default();

    for (i, line) in lines.iter().enumerate() {
        let playback = if line.starts_with("[playing]") {
            Some(PlaybackState::Playing)
        } else if line.starts_with("[paused]") {
            Some(PlaybackState::Paused)
        } else {
            None
        };
        if let Some(playback) = playback {
            status.playback = playback;
            if i > 0 {
                status.current = Some(lines[i - 1].to_string());
            }
        }

        if let Some(rest) = line.strip_prefix("volume:") {
            status.volume = rest
                .trim_start()
                .split(|c: char| !c.is_ascii_digit())
                .next()
                .and_then(|digits| digits.parse::<u8>().ok())
                .map(|volume| volume.min(100));
        }
    }

    status
}

// =============================================================================
// Null player
// =============================================================================

/// Player that accepts every command and does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullPlayer;

impl PlayerSink for NullPlayer {
    fn set_volume(&self, volume: u8) -> Result<(), SinkError> {
        trace!("null player: volume {}", volume);
        Ok(())
    }

    fn toggle_play_pause(&self) -> Result<(), SinkError> {
        Ok(())
    }

    fn play(&self) -> Result<(), SinkError> {
        Ok(())
    }

    fn stop(&self) -> Result<(), SinkError> {
        Ok(())
    }

    fn load_playlist(&self, _name: &str) -> Result<(), SinkError> {
        Ok(())
    }

    fn status(&self) -> Result<PlayerStatus, SinkError> {
        Ok(PlayerStatus::default())
    }
}
