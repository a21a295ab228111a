mod backend;
mod codec;
mod config;
mod error;
mod extrapolate;
mod link;
mod normalize;
mod sync;
mod types;

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::Config;
use crate::link::SerialLink;
use crate::sync::{SyncContext, SyncLoop};

fn main() {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::parse();

    if let Err(e) = run(config) {
        log::error!("{:#}", e);
        std::process::exit(1);
    }
}

fn run(config: Config) -> Result<()> {
    if config.list_ports {
        return link::list_ports().context("Failed to enumerate serial ports");
    }

    let port = config
        .port
        .clone()
        .context("No serial port given (pass it as an argument or set TUNEBRIDGE_PORT)")?;

    log::info!("Starting tunebridge on {}", port);

    // Both handles live until the process exits
    let link = SerialLink::open(config.serial_settings(port)).context("Cannot reach the device")?;
    let backend = backend::open(config.backend, config.query_timeout())
        .context("Failed to set up the media backend")?;

    // Setup signal handler for Ctrl+C (SIGINT) and SIGTERM
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_for_signal = shutdown.clone();
    ctrlc::set_handler(move || {
        log::info!("Received interrupt signal, stopping after the current cycle...");
        shutdown_for_signal.store(true, Ordering::SeqCst);
    })
    .context("Failed to set Ctrl+C handler")?;

    let mut sync = SyncLoop::new(
        SyncContext { link, backend },
        config.interval(),
        config.reconnect_attempts,
        shutdown,
    );
    sync.run().context("Lost the serial device")?;

    log::info!("Shut down cleanly");
    Ok(())
}
