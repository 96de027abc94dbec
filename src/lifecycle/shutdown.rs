//! Signal handling for graceful shutdown
//!
//! Shutdown is requested either by the OS (Ctrl-C, SIGTERM, console close)
//! or by a status indicator through a [`QuitHandle`].

use std::fmt;
use std::io;
use std::sync::Arc;

use tokio::sync::Notify;
use tracing::debug;

/// What ended the main loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    Interrupt,
    Terminate,
    Quit,
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownReason::Interrupt => write!(f, "interrupt"),
            ShutdownReason::Terminate => write!(f, "terminate"),
            ShutdownReason::Quit => write!(f, "quit requested"),
        }
    }
}

/// Handles shutdown signals and quit requests
pub struct ShutdownSignal {
    quit: Arc<Notify>,
}

/// Cloneable trigger for the "quit" action of a status indicator
#[derive(Clone)]
pub struct QuitHandle {
    quit: Arc<Notify>,
}

impl QuitHandle {
    /// Ask the main loop to shut down
    ///
    /// A request made before anyone waits is kept until the next wait.
    #[cfg_attr(not(windows), allow(dead_code))]
    pub fn request(&self) {
        debug!("quit requested");
        self.quit.notify_one();
    }
}

impl ShutdownSignal {
    /// Create a new shutdown signal handler
    pub fn new() -> Self {
        Self {
            quit: Arc::new(Notify::new()),
        }
    }

    /// Handle for raising a quit request from elsewhere
    pub fn quit_handle(&self) -> QuitHandle {
        QuitHandle {
            quit: Arc::clone(&self.quit),
        }
    }

    /// Wait for a shutdown signal or quit request
    pub async fn wait(&self) -> io::Result<ShutdownReason> {
        tokio::select! {
            result = os_signal() => result,
            _ = self.quit.notified() => Ok(ShutdownReason::Quit),
        }
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(unix)]
async fn os_signal() -> io::Result<ShutdownReason> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = sigterm.recv() => {
            debug!("received SIGTERM");
            Ok(ShutdownReason::Terminate)
        }
        _ = sigint.recv() => {
            debug!("received SIGINT");
            Ok(ShutdownReason::Interrupt)
        }
    }
}

#[cfg(windows)]
async fn os_signal() -> io::Result<ShutdownReason> {
    use tokio::signal::windows::{ctrl_c, ctrl_close, ctrl_shutdown};

    let mut interrupt = ctrl_c()?;
    let mut close = ctrl_close()?;
    let mut shutdown = ctrl_shutdown()?;

    tokio::select! {
        _ = interrupt.recv() => {
            debug!("received Ctrl-C");
            Ok(ShutdownReason::Interrupt)
        }
        _ = close.recv() => {
            debug!("console closed");
            Ok(ShutdownReason::Terminate)
        }
        _ = shutdown.recv() => {
            debug!("system shutting down");
            Ok(ShutdownReason::Terminate)
        }
    }
}
