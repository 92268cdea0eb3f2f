use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use dialctl_core::{
    Capabilities, Config, ConsoleDisplay, DEFAULT_CONFIG_PATH, EncoderConfig, InteractionState,
    PersistedState, PinSource, Runtime, RuntimeParts, ScriptedPins, player_from_config,
    read_back_volume,
};
use log::{info, warn};

/// Rotary encoder and backlight daemon.
#[derive(Debug, Parser)]
#[command(name = "dialctl", version, about)]
struct Cli {
    /// Configuration file.
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Interaction state file (overrides `state_path` from the config).
    #[arg(long)]
    state: Option<PathBuf>,

    /// Run without a display.
    #[arg(long)]
    headless: bool,

    /// Run without the encoder.
    #[arg(long)]
    no_encoder: bool,
}

static STOP_REQUESTED: AtomicBool = AtomicBool::new(false);

/// Only touches an atomic, which is async-signal-safe.
extern "C" fn handle_stop_signal(_: libc::c_int) {
    STOP_REQUESTED.store(true, Ordering::SeqCst);
}

fn install_stop_handlers() -> Result<()> {
    for signal in [libc::SIGINT, libc::SIGTERM] {
        unsafe {
            let handler = handle_stop_signal as *const () as libc::sighandler_t;
            if libc::signal(signal, handler) == libc::SIG_ERR {
                return Err(anyhow!("failed to install handler for signal {}", signal));
            }
        }
    }
    Ok(())
}

#[cfg(feature = "gpio")]
fn open_pins(config: &EncoderConfig) -> Option<Box<dyn PinSource>> {
    match dialctl_core::CdevPins::open(config) {
        Ok(pins) => Some(Box::new(pins)),
        Err(e) => {
            warn!("encoder unavailable: {}", e);
            None
        }
    }
}

#[cfg(not(feature = "gpio"))]
fn open_pins(config: &EncoderConfig) -> Option<Box<dyn PinSource>> {
    warn!(
        "built without gpio support, encoder on {} unavailable",
        config.chip
    );
    None
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let config = Config::load(&cli.config)
        .with_context(|| format!("failed to load config from {}", cli.config.display()))?;
    install_stop_handlers()?;

    let player = player_from_config(&config.player);
    let volume = read_back_volume(player.as_ref(), config.player.initial_volume);

    let state_path = cli.state.clone().or_else(|| config.state_path.clone());
    let persisted = state_path
        .as_ref()
        .map(PersistedState::load_or_default)
        .unwrap_or_default();

    let pins = if config.encoder.enabled && !cli.no_encoder {
        open_pins(&config.encoder)
    } else {
        None
    };
    let capabilities = Capabilities {
        encoder: pins.is_some(),
        display: config.display.enabled && !cli.headless,
    };
    info!(
        "dialctl starting: volume {}, encoder {}, display {}",
        volume, capabilities.encoder, capabilities.display
    );

    let runtime = Runtime::start(RuntimeParts {
        config_path: Some(cli.config.clone()),
        state_path,
        capabilities,
        pins: pins.unwrap_or_else(|| Box::new(ScriptedPins::idle())),
        player,
        display: Box::new(ConsoleDisplay::new()),
        initial: InteractionState::restore(persisted, volume),
        config,
    })
    .context("failed to start runtime")?;

    while !STOP_REQUESTED.load(Ordering::SeqCst) {
        thread::sleep(Duration::from_millis(50));
    }

    info!("stop requested, shutting down");
    runtime.shutdown();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["dialctl"]).unwrap();
        assert_eq!(cli.config, PathBuf::from(DEFAULT_CONFIG_PATH));
        assert_eq!(cli.state, None);
        assert!(!cli.headless);
        assert!(!cli.no_encoder);
    }

    #[test]
    fn test_cli_flags() {
        let cli = Cli::try_parse_from([
            "dialctl",
            "--config",
            "/tmp/c.json",
            "--state",
            "/tmp/s.json",
            "--headless",
            "--no-encoder",
        ])
        .unwrap();
        assert_eq!(cli.config, PathBuf::from("/tmp/c.json"));
        assert_eq!(cli.state, Some(PathBuf::from("/tmp/s.json")));
        assert!(cli.headless);
        assert!(cli.no_encoder);
    }

    #[test]
    fn test_signal_handler_sets_flag() {
        handle_stop_signal(libc::SIGTERM);
        assert!(STOP_REQUESTED.load(Ordering::SeqCst));
        STOP_REQUESTED.store(false, Ordering::SeqCst);
    }
}
