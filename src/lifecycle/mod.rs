//! Process lifecycle: the main loop and shutdown signalling

mod run;
mod shutdown;

pub use run::run;
pub use shutdown::{QuitHandle, ShutdownSignal};
