/// Microphone authorization, consulted before a device is opened.
///
/// The capture pipeline never requests permission itself; the host does,
/// and this trait reports the outcome.
pub trait MicrophonePermission: Send + Sync {
    fn is_granted(&self) -> bool;
}

/// For hosts without a permission model.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysGranted;

impl MicrophonePermission for AlwaysGranted {
    fn is_granted(&self) -> bool {
        true
    }
}

impl<F> MicrophonePermission for F
where
    F: Fn() -> bool + Send + Sync,
{
    fn is_granted(&self) -> bool {
        self()
    }
}
