//! Audio module for the default render endpoint
//!
//! Owns the connection to the system's default output device and exposes
//! its master volume as a scalar in `[0.0, 1.0]`.

mod session;
#[cfg(not(windows))]
mod unsupported;
#[cfg(windows)]
mod wasapi;

use session::EndpointSession;
pub use session::{AudioError, VolumeEndpoint};

/// Backend for the platform this binary was built for
#[cfg(windows)]
type PlatformBackend = wasapi::WasapiBackend;

/// Backend for the platform this binary was built for
#[cfg(not(windows))]
type PlatformBackend = unsupported::UnsupportedBackend;

/// Open a session on the current default render device
pub fn open_default_endpoint() -> Result<EndpointSession<PlatformBackend>, AudioError> {
    EndpointSession::open(PlatformBackend::default())
}
