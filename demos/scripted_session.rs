use std::thread;
use std::time::Duration;

use dialctl_core::{
    Capabilities, Config, ConsoleDisplay, InteractionState, MockPlayer, PinScript, Runtime,
    RuntimeError, RuntimeParts,
};

fn main() -> Result<(), RuntimeError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();

    let mut config = Config::default();
    config.display.dim_timeout_s = 1;
    config.display.off_timeout_s = 2;
    config.settings.off_timeout_s.min = 1;

    // Two detents up, open the menu, move one item down to "Stop playback"
    // and select it, then leave the menu again.
    let script = PinScript::new()
        .idle(50)
        .clockwise(5)
        .clockwise(5)
        .idle(100)
        .press(500)
        .idle(100)
        .clockwise_edges(1, 5)
        .idle(50)
        .press(20)
        .idle(150)
        .press(500);

    let player = MockPlayer::new();
    let runtime = Runtime::start(RuntimeParts {
        config,
        config_path: None,
        state_path: None,
        capabilities: Capabilities::FULL,
        pins: Box::new(script.into_pins()),
        player: Box::new(player.clone()),
        display: Box::new(ConsoleDisplay::new()),
        initial: InteractionState::new(30),
    })?;

    // Let the script play out and the display dim and switch off.
    thread::sleep(Duration::from_secs(5));
    let snapshot = runtime.snapshot();
    runtime.shutdown();

    println!("final mode: {}", snapshot.interaction.mode);
    println!("final volume: {}%", snapshot.interaction.volume);
    for command in player.commands() {
        println!("player: {:?}", command);
    }
    Ok(())
}
