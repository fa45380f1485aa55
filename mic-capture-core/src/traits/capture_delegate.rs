use crate::models::error::CaptureError;
use crate::models::session_summary::SessionSummary;
use crate::models::state::SessionState;

/// Event delegate for capture session notifications.
///
/// Methods are called from the thread that caused the event: the control
/// thread for start/stop, the capture worker for fatal errors. Keep
/// implementations short; the worker does not read the device while a
/// callback runs.
pub trait CaptureDelegate: Send + Sync {
    /// Called when the session state changes.
    fn on_state_changed(&self, state: SessionState);

    /// Called when the session hits an error that ends it.
    fn on_error(&self, error: &CaptureError);

    /// Called once the session has released its resources.
    fn on_session_finished(&self, summary: &SessionSummary);
}
