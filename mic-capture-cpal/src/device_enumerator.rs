//! Input device enumeration via the default cpal host.

use cpal::traits::{DeviceTrait, HostTrait};

use mic_capture_core::models::audio_models::AudioSource;
use mic_capture_core::models::error::DeviceError;

/// Lists microphones known to the default host.
pub struct DeviceEnumerator {
    host: cpal::Host,
}

impl DeviceEnumerator {
    pub fn new() -> Self {
        Self {
            host: cpal::default_host(),
        }
    }

    /// Name of the host backend, e.g. "ALSA" or "CoreAudio".
    pub fn host_name(&self) -> &'static str {
        self.host.id().name()
    }

    /// List input devices. Devices whose name cannot be read are skipped.
    pub fn list_input_devices(&self) -> Result<Vec<AudioSource>, DeviceError> {
        let default_name = self.default_input_name();
        let devices = self
            .host
            .input_devices()
            .map_err(|e| DeviceError::DeviceLost(format!("failed to list input devices: {}", e)))?;

        let sources = devices
            .filter_map(|device| match device.name() {
                Ok(name) => Some(name),
                Err(e) => {
                    log::debug!("Skipping input device without a name: {}", e);
                    None
                }
            })
            .map(|name| AudioSource {
                id: name.clone(),
                is_default: default_name.as_deref() == Some(name.as_str()),
                name,
            })
            .collect();
        Ok(sources)
    }

    pub fn default_input_name(&self) -> Option<String> {
        self.host.default_input_device().and_then(|d| d.name().ok())
    }

    /// Find an input device by exact name.
    pub fn find(&self, name: &str) -> Result<Option<AudioSource>, DeviceError> {
        Ok(self
            .list_input_devices()?
            .into_iter()
            .find(|source| source.name == name))
    }
}

impl Default for DeviceEnumerator {
    fn default() -> Self {
        Self::new()
    }
}
