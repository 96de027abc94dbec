//! Stand-in backend for platforms without Windows Core Audio

use std::io;

use super::session::AudioBackend;

/// Backend whose runtime never initializes
#[derive(Debug, Default)]
pub struct UnsupportedBackend;

fn unsupported() -> io::Error {
    io::Error::new(
        io::ErrorKind::Unsupported,
        "endpoint volume control requires Windows Core Audio",
    )
}

impl AudioBackend for UnsupportedBackend {
    type Enumerator = ();
    type Device = ();
    type Volume = ();
    type Error = io::Error;

    fn initialize(&mut self) -> io::Result<()> {
        Err(unsupported())
    }

    fn create_enumerator(&mut self) -> io::Result<()> {
        Err(unsupported())
    }

    fn default_render_device(&mut self, _: &()) -> io::Result<()> {
        Err(unsupported())
    }

    fn activate_volume(&mut self, _: &()) -> io::Result<()> {
        Err(unsupported())
    }

    fn master_level(&self, _: &()) -> io::Result<f32> {
        Err(unsupported())
    }

    fn set_master_level(&self, _: &(), _: f32) -> io::Result<()> {
        Err(unsupported())
    }

    fn uninitialize(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::session::{AcquisitionStage, AudioError, EndpointSession};

    #[test]
    fn test_open_fails_at_runtime_stage() {
        let err = EndpointSession::open(UnsupportedBackend).err().unwrap();
        assert!(matches!(
            err,
            AudioError::Acquisition {
                stage: AcquisitionStage::Runtime,
                ..
            }
        ));
    }
}
