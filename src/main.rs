//! volume-fix: Background utility for fine-grained volume key steps
//!
//! Intercepts the dedicated volume up/down keys and, instead of letting
//! the OS apply its coarse step, moves the default output device's master
//! volume by one fine step per press:
//! - Low-level keyboard hook delivering volume key transitions
//! - Per-key state machine (snapshot on press, commit on release)
//! - Core Audio session on the default render endpoint

mod audio;
mod config;
mod hotkey;
mod lifecycle;
mod state;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::hotkey::KeyboardHook;
use crate::lifecycle::ShutdownSignal;
use crate::state::VolumeMachine;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "volume-fix starting"
    );

    let config = Config::load().context("failed to load configuration")?;
    info!(?config, "configuration loaded");

    let shutdown = ShutdownSignal::new();

    // Keyboard hook -> state machine
    let (key_tx, mut key_rx) = mpsc::channel(config.queue_capacity);

    let mut endpoint = audio::open_default_endpoint()
        .context("failed to open the default audio endpoint")?;

    let mut hook = KeyboardHook::new(key_tx, config.passthrough, shutdown.quit_handle());
    if let Err(e) = hook.start() {
        error!(?e, "failed to start keyboard hook");
        endpoint.close();
        return Err(e).context("volume keys cannot be intercepted");
    }

    let mut machine = VolumeMachine::new(config.step);

    let outcome = lifecycle::run(
        &mut machine,
        &mut key_rx,
        &mut endpoint,
        &mut hook,
        shutdown.wait(),
    )
    .await;

    match &outcome {
        Ok(()) => info!("volume-fix stopped"),
        Err(e) => error!(?e, "volume-fix stopped on error"),
    }

    outcome
}
