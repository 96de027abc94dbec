//! Main event loop and its single finalization point

use std::future::Future;
use std::io;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::shutdown::ShutdownReason;
use crate::audio::VolumeEndpoint;
use crate::hotkey::{KeyEvent, KeySource};
use crate::state::VolumeMachine;

/// Drive the state machine until shutdown, then tear down
///
/// Whatever ends the loop, the endpoint is closed and the key source
/// uninstalled, in that order. A failed uninstall is only logged.
pub async fn run<E, K, S>(
    machine: &mut VolumeMachine,
    key_rx: &mut mpsc::Receiver<KeyEvent>,
    endpoint: &mut E,
    keys: &mut K,
    shutdown: S,
) -> Result<()>
where
    E: VolumeEndpoint,
    K: KeySource,
    S: Future<Output = io::Result<ShutdownReason>>,
{
    info!("capturing volume keys");

    let outcome = tokio::select! {
        // Handle key events until the device fails or the hook goes away
        result = machine.run(key_rx, endpoint) => {
            result.context("volume change failed")
        }

        // Wait for shutdown signal
        result = shutdown => {
            result
                .map(|reason| info!(%reason, "shutdown signal received"))
                .context("failed to listen for shutdown signals")
        }
    };

    info!("shutting down...");

    endpoint.close();
    if let Err(e) = keys.uninstall() {
        warn!(?e, "failed to uninstall keyboard hook");
    }

    outcome
}
