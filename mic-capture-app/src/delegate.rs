use crossbeam_channel::{Receiver, Sender};

use mic_capture_core::{CaptureDelegate, CaptureError, SessionState, SessionSummary};

/// CaptureDelegate that logs session events and reports a session that
/// ended on its own to the main loop.
pub struct ConsoleDelegate {
    failures: Sender<CaptureError>,
}

impl ConsoleDelegate {
    pub fn new() -> (Self, Receiver<CaptureError>) {
        let (failures, rx) = crossbeam_channel::bounded(1);
        (Self { failures }, rx)
    }
}

impl CaptureDelegate for ConsoleDelegate {
    fn on_state_changed(&self, state: SessionState) {
        log::info!("Capture state: {}", state);
    }

    fn on_error(&self, error: &CaptureError) {
        log::error!("Capture failed: {}", error);
        // Only the first failure matters; the session is already winding down.
        let _ = self.failures.try_send(error.clone());
    }

    fn on_session_finished(&self, summary: &SessionSummary) {
        log::info!(
            "Session {} finished after {:.1}s: {:.1}s of audio delivered",
            summary.id,
            summary.duration_secs,
            summary.delivered_audio_secs()
        );
        if let Some(file) = &summary.file {
            log::info!(
                "Wrote {} bytes to {} (sha256 {})",
                file.bytes_written,
                file.path.display(),
                file.checksum
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mic_capture_core::DeviceError;

    #[test]
    fn first_failure_reaches_main_loop() {
        let (delegate, failures) = ConsoleDelegate::new();
        let lost = CaptureError::Device(DeviceError::DeviceLost("unplugged".into()));

        delegate.on_error(&lost);
        delegate.on_error(&CaptureError::AlreadyRecording);

        assert_eq!(failures.try_recv(), Ok(lost));
        assert!(failures.try_recv().is_err());
    }
}
