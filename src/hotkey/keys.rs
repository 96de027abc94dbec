//! Volume key definitions and key transition events
//!
//! Provides the virtual-key codes for the dedicated volume keys and the
//! event type the keyboard hook delivers to the state machine.

use std::fmt;

/// Virtual-key codes and keyboard messages from the Win32 headers
pub mod codes {
    /// `VK_VOLUME_DOWN`
    pub const VK_VOLUME_DOWN: u32 = 0xAE;
    /// `VK_VOLUME_UP`
    pub const VK_VOLUME_UP: u32 = 0xAF;

    pub const WM_KEYDOWN: u32 = 0x0100;
    pub const WM_KEYUP: u32 = 0x0101;
    pub const WM_SYSKEYDOWN: u32 = 0x0104;
    pub const WM_SYSKEYUP: u32 = 0x0105;
}

/// Logical volume key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VolumeKey {
    Increase,
    Decrease,
}

impl VolumeKey {
    /// Map a virtual-key code, ignoring every key but volume up/down
    pub fn from_vk_code(vk_code: u32) -> Option<Self> {
        match vk_code {
            codes::VK_VOLUME_UP => Some(Self::Increase),
            codes::VK_VOLUME_DOWN => Some(Self::Decrease),
            _ => None,
        }
    }

    /// Signed change for a key press of the given step size
    pub fn delta(self, step: f64) -> f64 {
        match self {
            Self::Increase => step,
            Self::Decrease => -step,
        }
    }
}

impl fmt::Display for VolumeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VolumeKey::Increase => write!(f, "volume up"),
            VolumeKey::Decrease => write!(f, "volume down"),
        }
    }
}

/// Physical key transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTransition {
    Pressed,
    Released,
}

impl KeyTransition {
    /// Map a keyboard window message
    pub fn from_message(message: u32) -> Option<Self> {
        match message {
            codes::WM_KEYDOWN | codes::WM_SYSKEYDOWN => Some(Self::Pressed),
            codes::WM_KEYUP | codes::WM_SYSKEYUP => Some(Self::Released),
            _ => None,
        }
    }
}

/// A volume key changed state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: VolumeKey,
    pub transition: KeyTransition,
    /// Earlier events for this key were dropped; its state is stale
    pub resync: bool,
}

impl KeyEvent {
    pub fn new(key: VolumeKey, transition: KeyTransition) -> Self {
        Self {
            key,
            transition,
            resync: false,
        }
    }

    /// Decode a raw hook notification, `None` for anything but volume keys
    #[cfg_attr(not(windows), allow(dead_code))]
    pub fn from_raw(vk_code: u32, message: u32) -> Option<Self> {
        Some(Self::new(
            VolumeKey::from_vk_code(vk_code)?,
            KeyTransition::from_message(message)?,
        ))
    }

    /// Same event, flagged as following dropped events for its key
    pub fn resynced(self) -> Self {
        Self {
            resync: true,
            ..self
        }
    }
}
