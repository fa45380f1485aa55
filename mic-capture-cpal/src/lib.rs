//! # mic-capture-cpal
//!
//! Cross-platform microphone backend for mic-capture-core, built on cpal.
//!
//! Provides:
//! - `CpalMicDevice`: microphone capture via the default cpal host
//! - `DeviceEnumerator`: input device listing
//! - `permissions`: microphone access probe
//!
//! ## Usage
//! ```ignore
//! use std::sync::Arc;
//! use mic_capture_core::{CaptureConfig, CaptureSession, FileSink, SinkTarget};
//! use mic_capture_cpal::{CpalMicDevice, CpalPermission};
//!
//! let mut session = CaptureSession::with_permission(CpalMicDevice::default_device(), Arc::new(CpalPermission));
//! session.start(CaptureConfig::voice_recognition(), SinkTarget::File("session.pcm".into()))?;
//! ```

pub mod convert;
pub mod cpal_mic;
pub mod device_enumerator;
pub mod permissions;

pub use cpal_mic::{CpalMicDevice, CpalMicHandle};
pub use device_enumerator::DeviceEnumerator;
pub use permissions::{check_microphone_permission, CpalPermission};
