//! Hotkey module for global volume key interception
//!
//! Uses a Windows low-level keyboard hook to capture volume up/down
//! press/release events before the OS applies its own volume step.

mod keys;
mod listener;

pub use keys::{KeyEvent, KeyTransition, VolumeKey};
pub use listener::{HotkeyError, KeySource, KeyboardHook};
