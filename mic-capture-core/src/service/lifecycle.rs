use std::sync::Arc;

use crate::models::config::CaptureConfig;
use crate::models::error::CaptureError;
use crate::models::session_summary::SessionSummary;
use crate::session::CaptureSession;
use crate::sink::SinkTarget;
use crate::traits::capture_device::CaptureDevice;
use crate::traits::permission::MicrophonePermission;

/// The host's keep-alive obligation while recording: keep the process
/// running and show that the microphone is in use.
pub trait ForegroundPresence: Send + Sync {
    fn enter_foreground(&self);
    fn exit_foreground(&self);
}

/// For hosts that stay alive on their own (CLI tools, tests).
#[derive(Debug, Clone, Copy, Default)]
pub struct NoForeground;

impl ForegroundPresence for NoForeground {
    fn enter_foreground(&self) {}
    fn exit_foreground(&self) {}
}

/// Activation entry point for a host service: starts the session with the
/// configured defaults on activation and tears it down on deactivation.
pub struct CaptureService<D: CaptureDevice> {
    session: CaptureSession<D>,
    config: CaptureConfig,
    target: SinkTarget,
    presence: Arc<dyn ForegroundPresence>,
    in_foreground: bool,
}

impl<D: CaptureDevice> CaptureService<D> {
    pub fn new(session: CaptureSession<D>, config: CaptureConfig, target: SinkTarget) -> Self {
        Self::with_presence(session, config, target, Arc::new(NoForeground))
    }

    pub fn with_presence(
        session: CaptureSession<D>,
        config: CaptureConfig,
        target: SinkTarget,
        presence: Arc<dyn ForegroundPresence>,
    ) -> Self {
        Self {
            session,
            config,
            target,
            presence,
            in_foreground: false,
        }
    }

    /// Convenience constructor wiring a device and permission check directly.
    pub fn for_device(
        device: D,
        permission: Arc<dyn MicrophonePermission>,
        config: CaptureConfig,
        target: SinkTarget,
    ) -> Self {
        Self::new(CaptureSession::with_permission(device, permission), config, target)
    }

    /// Start recording with the service defaults.
    pub fn on_activate(&mut self) -> Result<(), CaptureError> {
        let config = self.config.clone();
        let target = self.target.clone();
        self.on_activate_with(config, target)
    }

    /// Start recording with an explicit config and sink. A no-op while
    /// already recording. A session that ended on its own is collected first.
    pub fn on_activate_with(&mut self, config: CaptureConfig, target: SinkTarget) -> Result<(), CaptureError> {
        if self.session.is_recording() {
            log::debug!("Capture service already recording; activation ignored");
            return Ok(());
        }
        if let Some(summary) = self.session.stop() {
            log::info!("Collected ended session {} before reactivation", summary.id);
        }

        self.enter_foreground();
        if let Err(err) = self.session.start(config, target) {
            log::error!("Capture service failed to start: {}", err);
            self.exit_foreground();
            return Err(err);
        }
        Ok(())
    }

    /// Stop recording and leave the foreground. Safe to call repeatedly.
    pub fn on_deactivate(&mut self) -> Option<SessionSummary> {
        let summary = self.session.stop();
        self.exit_foreground();
        summary
    }

    pub fn session(&self) -> &CaptureSession<D> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut CaptureSession<D> {
        &mut self.session
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    pub fn sink_target(&self) -> &SinkTarget {
        &self.target
    }

    pub fn is_in_foreground(&self) -> bool {
        self.in_foreground
    }

    fn enter_foreground(&mut self) {
        if !self.in_foreground {
            self.presence.enter_foreground();
            self.in_foreground = true;
        }
    }

    fn exit_foreground(&mut self) {
        if self.in_foreground {
            self.presence.exit_foreground();
            self.in_foreground = false;
        }
    }
}

impl<D: CaptureDevice> Drop for CaptureService<D> {
    fn drop(&mut self) {
        self.on_deactivate();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::models::state::SessionState;
    use crate::sink::{LocalBroadcaster, AUDIO_DATA_EVENT};
    use crate::test_support::{wait_until, ReadStep, ScriptedDevice};

    #[derive(Default)]
    struct CountingPresence {
        entered: AtomicUsize,
        exited: AtomicUsize,
    }

    impl ForegroundPresence for CountingPresence {
        fn enter_foreground(&self) {
            self.entered.fetch_add(1, Ordering::SeqCst);
        }

        fn exit_foreground(&self) {
            self.exited.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn service_with(
        device: ScriptedDevice,
        granted: bool,
        bus: &LocalBroadcaster,
    ) -> (CaptureService<ScriptedDevice>, Arc<CountingPresence>) {
        let presence = Arc::new(CountingPresence::default());
        let session = CaptureSession::with_permission(device, Arc::new(move || granted));
        let service = CaptureService::with_presence(
            session,
            CaptureConfig::voice_recognition().with_sample_rate(16_000),
            SinkTarget::Broadcast(bus.clone()),
            presence.clone(),
        );
        (service, presence)
    }

    #[test]
    fn activate_then_deactivate_round_trip() {
        let device = ScriptedDevice::frames(&[&[1, 1], &[2, 2], &[3, 3]]);
        let probe = device.probe();
        let bus = LocalBroadcaster::new("com.example.recorder");
        let events = bus.subscribe(AUDIO_DATA_EVENT);
        let (mut service, presence) = service_with(device, true, &bus);

        service.on_activate().unwrap();
        assert!(service.is_in_foreground());
        assert!(service.session().is_recording());

        let first = events.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(first.decode_data().unwrap(), vec![3, 3]);

        let summary = service.on_deactivate().unwrap();
        assert_eq!(summary.diagnostics.frames_discarded, 2);
        assert!(!service.is_in_foreground());
        assert_eq!(probe.live_handles(), 0);
        assert_eq!(presence.entered.load(Ordering::SeqCst), 1);
        assert_eq!(presence.exited.load(Ordering::SeqCst), 1);

        assert!(service.on_deactivate().is_none());
        assert_eq!(presence.exited.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failed_start_leaves_foreground() {
        let bus = LocalBroadcaster::new("app");
        let (mut service, presence) = service_with(ScriptedDevice::new(vec![]), false, &bus);

        assert_eq!(service.on_activate(), Err(CaptureError::PermissionDenied));
        assert!(!service.is_in_foreground());
        assert_eq!(presence.entered.load(Ordering::SeqCst), 1);
        assert_eq!(presence.exited.load(Ordering::SeqCst), 1);
        assert_eq!(service.session().state(), SessionState::Stopped);
    }

    #[test]
    fn repeated_activation_is_ignored_while_recording() {
        let device = ScriptedDevice::new(vec![]);
        let probe = device.probe();
        let bus = LocalBroadcaster::new("app");
        let (mut service, presence) = service_with(device, true, &bus);

        service.on_activate().unwrap();
        service.on_activate().unwrap();

        assert_eq!(probe.opened(), 1);
        assert_eq!(presence.entered.load(Ordering::SeqCst), 1);
        service.on_deactivate();
    }

    #[test]
    fn reactivation_collects_a_session_that_ended_itself() {
        let device = ScriptedDevice::new(vec![ReadStep::Lost("unplugged".into())]);
        let probe = device.probe();
        let bus = LocalBroadcaster::new("app");
        let (mut service, _presence) = service_with(device, true, &bus);

        service.on_activate().unwrap();
        assert!(wait_until(Duration::from_secs(2), || {
            service.session().state() == SessionState::Stopping
        }));

        service.on_activate().unwrap();
        assert!(service.session().is_recording());
        assert_eq!(probe.opened(), 2);
        assert_eq!(probe.live_handles(), 1);

        drop(service);
        assert_eq!(probe.live_handles(), 0);
    }
}
