//! Audio endpoint session lifecycle
//!
//! A session acquires, in order, the audio runtime, a device enumerator,
//! the default render device and its volume control. Handles are released
//! in reverse order by [`EndpointSession::close`], which is idempotent and
//! also runs on drop.

use std::fmt;

use tracing::{debug, info};

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Capability the volume key state machine drives
pub trait VolumeEndpoint {
    /// Query the device for its current scalar level
    fn read_level(&mut self) -> Result<f32, AudioError>;

    /// Commit a scalar level to the device. The caller clamps to `[0.0, 1.0]`.
    fn write_level(&mut self, level: f32) -> Result<(), AudioError>;

    /// Release the device; later reads and writes fail. Idempotent.
    fn close(&mut self);
}

/// Platform binding used by [`EndpointSession`]
///
/// Each acquired handle is an owned value whose drop releases the
/// underlying OS object.
pub trait AudioBackend {
    type Enumerator;
    type Device;
    type Volume;
    type Error: std::error::Error + Send + Sync + 'static;

    /// Prepare the audio runtime for this thread
    fn initialize(&mut self) -> Result<(), Self::Error>;

    fn create_enumerator(&mut self) -> Result<Self::Enumerator, Self::Error>;

    /// Default render endpoint for the console role
    fn default_render_device(
        &mut self,
        enumerator: &Self::Enumerator,
    ) -> Result<Self::Device, Self::Error>;

    fn activate_volume(&mut self, device: &Self::Device) -> Result<Self::Volume, Self::Error>;

    fn master_level(&self, volume: &Self::Volume) -> Result<f32, Self::Error>;

    fn set_master_level(&self, volume: &Self::Volume, level: f32) -> Result<(), Self::Error>;

    /// Balance a successful [`AudioBackend::initialize`]
    fn uninitialize(&mut self);
}

/// Step of session setup that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquisitionStage {
    Runtime,
    DeviceEnumerator,
    DefaultDevice,
    VolumeControl,
}

impl fmt::Display for AcquisitionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AcquisitionStage::Runtime => write!(f, "audio runtime"),
            AcquisitionStage::DeviceEnumerator => write!(f, "device enumerator"),
            AcquisitionStage::DefaultDevice => write!(f, "default render device"),
            AcquisitionStage::VolumeControl => write!(f, "volume control"),
        }
    }
}

/// Errors raised by the audio endpoint session
#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("failed to acquire {stage}")]
    Acquisition {
        stage: AcquisitionStage,
        #[source]
        source: BoxError,
    },

    #[error("audio device failed to {op} the volume level")]
    Device {
        op: &'static str,
        #[source]
        source: BoxError,
    },

    #[error("audio endpoint session is closed")]
    Closed,
}

impl AudioError {
    fn acquisition<E>(stage: AcquisitionStage) -> impl FnOnce(E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        move |e| AudioError::Acquisition {
            stage,
            source: Box::new(e),
        }
    }

    fn device<E>(op: &'static str) -> impl FnOnce(E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        move |e| AudioError::Device {
            op,
            source: Box::new(e),
        }
    }
}

/// Exclusive connection to the default render device's volume control
pub struct EndpointSession<B: AudioBackend> {
    backend: B,
    initialized: bool,
    enumerator: Option<B::Enumerator>,
    device: Option<B::Device>,
    volume: Option<B::Volume>,
}

impl<B: AudioBackend> EndpointSession<B> {
    /// Acquire every handle, or release the ones already taken and fail
    pub fn open(backend: B) -> Result<Self, AudioError> {
        let mut session = Self {
            backend,
            initialized: false,
            enumerator: None,
            device: None,
            volume: None,
        };

        match session.acquire() {
            Ok(()) => {
                info!("audio endpoint session opened");
                Ok(session)
            }
            Err(e) => {
                session.close();
                Err(e)
            }
        }
    }

    fn acquire(&mut self) -> Result<(), AudioError> {
        self.backend
            .initialize()
            .map_err(AudioError::acquisition(AcquisitionStage::Runtime))?;
        self.initialized = true;

        let enumerator = self
            .backend
            .create_enumerator()
            .map_err(AudioError::acquisition(AcquisitionStage::DeviceEnumerator))?;
        let enumerator = self.enumerator.insert(enumerator);

        let device = self
            .backend
            .default_render_device(enumerator)
            .map_err(AudioError::acquisition(AcquisitionStage::DefaultDevice))?;
        let device = self.device.insert(device);

        let volume = self
            .backend
            .activate_volume(device)
            .map_err(AudioError::acquisition(AcquisitionStage::VolumeControl))?;
        self.volume = Some(volume);

        Ok(())
    }

    /// True while the volume control handle is held
    pub fn is_open(&self) -> bool {
        self.volume.is_some()
    }

    /// Release the volume control, device and enumerator, then the runtime
    pub fn close(&mut self) {
        let was_open = self.is_open();

        drop(self.volume.take());
        drop(self.device.take());
        drop(self.enumerator.take());

        if std::mem::take(&mut self.initialized) {
            self.backend.uninitialize();
        }

        if was_open {
            info!("audio endpoint session closed");
        }
    }

    fn volume(&self) -> Result<&B::Volume, AudioError> {
        self.volume.as_ref().ok_or(AudioError::Closed)
    }
}

impl<B: AudioBackend> VolumeEndpoint for EndpointSession<B> {
    fn read_level(&mut self) -> Result<f32, AudioError> {
        let volume = self.volume()?;
        let level = self
            .backend
            .master_level(volume)
            .map_err(AudioError::device("read"))?;
        debug!(level, "current volume");
        Ok(level)
    }

    fn write_level(&mut self, level: f32) -> Result<(), AudioError> {
        let volume = self.volume()?;
        self.backend
            .set_master_level(volume, level)
            .map_err(AudioError::device("write"))
    }

    fn close(&mut self) {
        EndpointSession::close(self);
    }
}

impl<B: AudioBackend> Drop for EndpointSession<B> {
    fn drop(&mut self) {
        self.close();
    }
}
