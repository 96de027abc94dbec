//! Core state machine implementation
//!
//! Tracks Idle/Pressed per volume key. A key-down snapshots the device
//! level as that key's baseline; the matching key-up commits the baseline
//! moved by one step.

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::level::target_level;
use crate::audio::{AudioError, VolumeEndpoint};
use crate::hotkey::{KeyEvent, KeyTransition, VolumeKey};

/// State of one logical volume key
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum KeyState {
    /// Waiting for a key-down
    #[default]
    Idle,
    /// Held; `baseline` is the device level read on key-down
    Pressed { baseline: f32 },
}

/// The state machine that turns key transitions into volume changes
pub struct VolumeMachine {
    /// Change applied per press
    step: f64,
    increase: KeyState,
    decrease: KeyState,
}

impl VolumeMachine {
    /// Create a new state machine with both keys Idle
    pub fn new(step: f64) -> Self {
        Self {
            step,
            increase: KeyState::Idle,
            decrease: KeyState::Idle,
        }
    }

    /// Get the current state of a key
    #[cfg(test)]
    pub fn state(&self, key: VolumeKey) -> KeyState {
        match key {
            VolumeKey::Increase => self.increase,
            VolumeKey::Decrease => self.decrease,
        }
    }

    fn state_mut(&mut self, key: VolumeKey) -> &mut KeyState {
        match key {
            VolumeKey::Increase => &mut self.increase,
            VolumeKey::Decrease => &mut self.decrease,
        }
    }

    /// Run the state machine until the key channel closes or the device fails
    pub async fn run<E: VolumeEndpoint>(
        &mut self,
        key_rx: &mut mpsc::Receiver<KeyEvent>,
        endpoint: &mut E,
    ) -> Result<(), AudioError> {
        info!(step = self.step, "state machine started");

        while let Some(event) = key_rx.recv().await {
            self.handle_event(event, endpoint)?;
        }

        info!("key event channel closed, state machine stopped");
        Ok(())
    }

    /// Apply one key transition, returning the level committed if any
    pub fn handle_event<E: VolumeEndpoint>(
        &mut self,
        event: KeyEvent,
        endpoint: &mut E,
    ) -> Result<Option<f32>, AudioError> {
        let step = self.step;
        let state = self.state_mut(event.key);

        if event.resync && *state != KeyState::Idle {
            warn!(key = %event.key, "events were dropped, discarding stale baseline");
            *state = KeyState::Idle;
        }

        match (*state, event.transition) {
            (KeyState::Idle, KeyTransition::Pressed) => {
                let baseline = endpoint.read_level()?;
                debug!(key = %event.key, baseline, "volume key pressed");
                *state = KeyState::Pressed { baseline };
                Ok(None)
            }
            (KeyState::Pressed { baseline }, KeyTransition::Released) => {
                *state = KeyState::Idle;
                let level = target_level(baseline, event.key.delta(step));
                info!(key = %event.key, from = baseline, to = level, "setting volume");
                endpoint.write_level(level)?;
                Ok(Some(level))
            }
            (current, transition) => {
                debug!(key = %event.key, ?current, ?transition, "ignoring key transition");
                Ok(None)
            }
        }
    }
}
