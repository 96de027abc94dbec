//! State machine module for volume key handling
//!
//! Each logical key is either Idle or Pressed:
//! - Idle -> Pressed on key-down: the current device level is snapshotted
//! - Pressed -> Idle on key-up: the snapshot plus one step is committed
//!
//! Everything else (auto-repeat key-downs, stray key-ups) is ignored.

mod level;
mod machine;

pub use machine::VolumeMachine;
