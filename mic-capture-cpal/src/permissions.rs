//! Microphone access probe.
//!
//! cpal exposes no consent API. Access is inferred by querying the default
//! input device's configuration, which fails when the OS blocks the
//! microphone (macOS TCC, Windows privacy settings) or no device exists.

use cpal::traits::{DeviceTrait, HostTrait};

use mic_capture_core::traits::permission::MicrophonePermission;

/// Check if microphone access is available.
pub fn check_microphone_permission() -> bool {
    let Some(device) = cpal::default_host().default_input_device() else {
        return false;
    };

    match device.default_input_config() {
        Ok(_) => true,
        Err(cpal::DefaultStreamConfigError::DeviceNotAvailable) => false,
        Err(e) => {
            // Other errors say nothing about consent; let open() report them.
            log::warn!("Unexpected error checking mic permission: {}", e);
            true
        }
    }
}

/// `MicrophonePermission` that probes the default input device on each check.
#[derive(Debug, Clone, Copy, Default)]
pub struct CpalPermission;

impl MicrophonePermission for CpalPermission {
    fn is_granted(&self) -> bool {
        check_microphone_permission()
    }
}
