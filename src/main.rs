// src/main.rs
// Entry point for tagbot: loads the configuration, sets up logging and runs the
// control loop against the simulated arena until the cycle limit or Ctrl-C.

use log::info;
use std::error::Error;
use tagbot::hardware::sim::SimArena;
use tagbot::{BotConfig, StopHandle, TagBot, logging};

/// Usage: `tagbot [config.yaml]`. Defaults apply when no file is given.
fn main() -> Result<(), Box<dyn Error>> {
    let config_path = std::env::args().nth(1);
    let config = match &config_path {
        Some(path) => BotConfig::from_yaml_file(path)?,
        None => BotConfig::default(),
    };

    logging::init(&config.logging)?;
    match &config_path {
        Some(path) => info!("Loaded config from {}", path),
        None => info!("No config file given, using defaults"),
    }
    info!("Starting tagbot, hunting signature {}", config.combat.hostile_signature_id);

    let arena = SimArena::shared(
        &config.hardware.simulation,
        config.navigation.frame,
        config.combat.hostile_signature_id,
    );
    let mut bot = TagBot::new(
        &config,
        Box::new(arena.clone()),
        Box::new(arena.clone()),
        Box::new(arena.clone()),
    )?;

    // Ctrl-C ends the loop between cycles so shutdown still halts the motors
    let stop = StopHandle::new();
    stop.stop_on_interrupt()?;
    let status = bot.run(&stop)?;

    info!(
        "Simulated opponent tagged {} times with {} shots",
        arena.arena().tags(),
        arena.arena().shots()
    );
    println!("{}", serde_yaml::to_string(&status)?);
    Ok(())
}
