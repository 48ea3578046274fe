//! Standalone host for the regions engine
//!
//! This binary:
//! 1. Loads every stored world and region from `REGIONS_DATA_DIR`
//! 2. Links the worlds named in `REGIONS_WORLDS`
//! 3. Runs the enforcement tick loop, driven by console commands
//!
//! Players are simulated: `join`, `move` and `leave` stand in for a game
//! server's connection and movement events. Type `help` for commands.

mod commands;
mod config;
mod console;
mod players;
mod server;

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossterm::terminal;
use parking_lot::RwLock;
use regions_core::RegionManager;
use regions_persist::FileStore;
use tracing::{error, info, warn};

use crate::config::ServerConfig;
use crate::console::{Input, clear_line, print_prompt};
use crate::server::{Flow, Server};

fn main() -> eyre::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("regions_server=info".parse()?)
                .add_directive("regions_core=info".parse()?)
                .add_directive("regions_persist=info".parse()?),
        )
        .init();

    let config = ServerConfig::from_env()?;
    info!("Starting regions server");
    info!("Data directory: {}", config.data_dir.display());

    let mut manager = RegionManager::activate(config.manager_config())?;
    let store = FileStore::open(&config.data_dir)?;

    let worlds: Vec<&str> = config.worlds.iter().map(String::as_str).collect();
    let report = manager.load(&store, &worlds);
    info!(
        "Loaded {} world(s) and {} region(s)",
        report.worlds_loaded, report.regions_loaded
    );
    if !report.failures.is_empty() {
        warn!("{} document(s) failed to load", report.failures.len());
    }

    let mut server = Server::new(manager, store);
    let candidates = Arc::new(RwLock::new(server.candidates()));

    // Set up command input channel
    let (input_tx, input_rx) = crossbeam_channel::unbounded::<Input>();
    {
        let candidates = Arc::clone(&candidates);
        thread::spawn(move || console::input_thread(input_tx, candidates));
    }

    terminal::enable_raw_mode().ok();
    print_prompt();

    let target_delta = Duration::from_secs_f64(1.0 / f64::from(config.target_tps));
    let mut tick: u64 = 0;
    let mut running = true;

    while running {
        let start = Instant::now();

        while let Ok(input) = input_rx.try_recv() {
            clear_line();
            let line = match input {
                Input::Line(line) if line.trim().is_empty() => {
                    print_prompt();
                    continue;
                }
                Input::Line(line) => line,
                Input::Interrupt => {
                    info!("Interrupted, shutting down...");
                    running = false;
                    break;
                }
            };

            match commands::parse(&line) {
                Ok(command) => match server.execute(command) {
                    Ok((flow, lines)) => {
                        for line in lines {
                            info!("{line}");
                        }
                        if flow == Flow::Quit {
                            running = false;
                        }
                    }
                    Err(e) => error!("{e}"),
                },
                Err(e) => info!("{e}"),
            }

            *candidates.write() = server.candidates();
            print_prompt();
        }

        let report = server.tick();
        if report.denied > 0 {
            print_prompt();
        }
        tick += 1;

        if config.autosave_ticks > 0 && tick.is_multiple_of(config.autosave_ticks) {
            match server.save_dirty() {
                Ok(0) => {}
                Ok(written) => info!("Autosaved {written} document(s)"),
                Err(e) => error!("Autosave failed: {e}"),
            }
        }

        // Sleep to maintain target rate
        let elapsed = start.elapsed();
        if elapsed < target_delta {
            thread::sleep(target_delta - elapsed);
        }
    }

    // Cleanup
    terminal::disable_raw_mode().ok();
    server.shutdown();

    Ok(())
}
