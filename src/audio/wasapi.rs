//! Windows Core Audio binding
//!
//! COM interfaces release themselves on drop, so the session's ordered
//! `Option::take` calls are what sequence the `Release` calls.

use windows::core::{Error, Result};
use windows::Win32::Media::Audio::Endpoints::IAudioEndpointVolume;
use windows::Win32::Media::Audio::{
    eConsole, eRender, IMMDevice, IMMDeviceEnumerator, MMDeviceEnumerator,
};
use windows::Win32::System::Com::{
    CoCreateInstance, CoInitializeEx, CoUninitialize, CLSCTX_ALL, COINIT_APARTMENTTHREADED,
};

use super::session::AudioBackend;

/// Core Audio (WASAPI) endpoint volume backend
///
/// The session must be used from the thread that opened it, since COM is
/// initialized single-threaded apartment.
#[derive(Debug, Default)]
pub struct WasapiBackend;

impl AudioBackend for WasapiBackend {
    type Enumerator = IMMDeviceEnumerator;
    type Device = IMMDevice;
    type Volume = IAudioEndpointVolume;
    type Error = Error;

    fn initialize(&mut self) -> Result<()> {
        unsafe { CoInitializeEx(None, COINIT_APARTMENTTHREADED).ok() }
    }

    fn create_enumerator(&mut self) -> Result<IMMDeviceEnumerator> {
        unsafe { CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL) }
    }

    fn default_render_device(&mut self, enumerator: &IMMDeviceEnumerator) -> Result<IMMDevice> {
        unsafe { enumerator.GetDefaultAudioEndpoint(eRender, eConsole) }
    }

    fn activate_volume(&mut self, device: &IMMDevice) -> Result<IAudioEndpointVolume> {
        unsafe { device.Activate(CLSCTX_ALL, None) }
    }

    fn master_level(&self, volume: &IAudioEndpointVolume) -> Result<f32> {
        unsafe { volume.GetMasterVolumeLevelScalar() }
    }

    fn set_master_level(&self, volume: &IAudioEndpointVolume, level: f32) -> Result<()> {
        unsafe { volume.SetMasterVolumeLevelScalar(level, std::ptr::null()) }
    }

    fn uninitialize(&mut self) {
        unsafe { CoUninitialize() }
    }
}
