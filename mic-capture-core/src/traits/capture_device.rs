use crate::models::audio_models::AudioSource;
use crate::models::config::CaptureConfig;
use crate::models::error::DeviceError;

/// A microphone that can be opened for a capture session.
///
/// Implemented by:
/// - `CpalMicDevice` (mic-capture-cpal)
/// - the scripted device used by this crate's tests
pub trait CaptureDevice: Send + Sync {
    type Handle: DeviceHandle + 'static;

    /// Whether an input device is currently present.
    fn is_available(&self) -> bool;

    /// Information about the device backing this provider.
    fn device_info(&self) -> AudioSource;

    /// Smallest buffer, in bytes, the platform accepts for `config`.
    fn min_buffer_size(&self, config: &CaptureConfig) -> Result<usize, DeviceError>;

    /// Acquire the device for `config`, sized at least `min_buffer_size`.
    ///
    /// Fails with `Unsupported` when the platform cannot satisfy the
    /// configuration. The returned handle is not yet capturing.
    fn open(&self, config: &CaptureConfig) -> Result<Self::Handle, DeviceError>;
}

/// An open microphone. Shared between the control thread (start/stop/close)
/// and the capture worker (read), so every method takes `&self`.
pub trait DeviceHandle: Send + Sync {
    /// Bytes filled by one full read.
    fn buffer_size(&self) -> usize;

    /// Begin hardware capture. `AlreadyStarted` if called twice without a stop.
    fn start(&self) -> Result<(), DeviceError>;

    /// Block until the next frame is available and copy it into `buffer`.
    ///
    /// Returns the number of bytes filled. `Ok(0)` means "no data yet" and is
    /// not end-of-stream. Must return promptly once `stop` or `close` has
    /// been issued from another thread.
    fn read(&self, buffer: &mut [u8]) -> Result<usize, DeviceError>;

    /// Halt hardware capture. Idempotent.
    fn stop(&self) -> Result<(), DeviceError>;

    /// Release the device so other clients can open it. Idempotent, and
    /// must release even if a preceding `stop` failed.
    fn close(&self);
}
