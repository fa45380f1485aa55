use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};
use parking_lot::Mutex;

use crate::models::audio_models::CaptureDiagnostics;
use crate::models::config::CaptureConfig;
use crate::models::error::{CaptureError, DeviceError};
use crate::models::session_summary::{EndReason, SessionSummary};
use crate::models::state::SessionState;
use crate::processing::warmup::WarmupDiscard;
use crate::sink::{FrameSink, SinkTarget};
use crate::traits::capture_delegate::CaptureDelegate;
use crate::traits::capture_device::{CaptureDevice, DeviceHandle};
use crate::traits::permission::{AlwaysGranted, MicrophonePermission};

use super::worker::{CaptureWorker, WorkerExit};

/// State shared between the control thread and the capture worker.
pub(crate) struct SharedState {
    pub state: SessionState,
    pub diagnostics: CaptureDiagnostics,
}

impl SharedState {
    fn stopped() -> Arc<Mutex<SharedState>> {
        Arc::new(Mutex::new(SharedState {
            state: SessionState::Stopped,
            diagnostics: CaptureDiagnostics::default(),
        }))
    }
}

/// Apply `new_state` and notify the delegate if it actually changed.
fn transition(
    shared: &Mutex<SharedState>,
    delegate: Option<&Arc<dyn CaptureDelegate>>,
    new_state: SessionState,
) {
    let changed = {
        let mut s = shared.lock();
        let changed = s.state != new_state;
        s.state = new_state;
        changed
    };
    if changed {
        log::debug!("Capture session -> {}", new_state);
        if let Some(delegate) = delegate {
            delegate.on_state_changed(new_state);
        }
    }
}

/// Resources that exist only while the session is not Stopped.
struct ActiveCapture<H> {
    id: String,
    config: CaptureConfig,
    handle: Arc<H>,
    running: Arc<AtomicBool>,
    delivery_gate: Arc<Mutex<()>>,
    worker: Option<thread::JoinHandle<()>>,
    exit_rx: Receiver<WorkerExit>,
    started_at: DateTime<Utc>,
    started_instant: Instant,
}

/// Microphone capture lifecycle: one device handle, one worker, one sink.
///
/// ```text
/// [DeviceHandle::read] → [WarmupDiscard] → [FrameSink::deliver]
///        ↑ worker thread "mic-capture-worker"
/// start()/stop() on the owning thread
/// ```
///
/// `stop()` halts the device before waiting for the worker, and closes the
/// device only after the worker has exited (or the stop timeout expired).
/// Each start gets its own run flag, delivery gate and shared state, so a
/// detached worker can never touch a later session.
pub struct CaptureSession<D: CaptureDevice> {
    device: D,
    permission: Arc<dyn MicrophonePermission>,
    delegate: Option<Arc<dyn CaptureDelegate>>,
    shared: Arc<Mutex<SharedState>>,
    active: Option<ActiveCapture<D::Handle>>,
}

impl<D: CaptureDevice> CaptureSession<D> {
    pub fn new(device: D) -> Self {
        Self::with_permission(device, Arc::new(AlwaysGranted))
    }

    pub fn with_permission(device: D, permission: Arc<dyn MicrophonePermission>) -> Self {
        Self {
            device,
            permission,
            delegate: None,
            shared: SharedState::stopped(),
            active: None,
        }
    }

    pub fn set_delegate(&mut self, delegate: Arc<dyn CaptureDelegate>) {
        self.delegate = Some(delegate);
    }

    pub fn state(&self) -> SessionState {
        self.shared.lock().state
    }

    pub fn is_recording(&self) -> bool {
        self.state().is_recording()
    }

    /// Counters for the current (or most recent) session.
    pub fn diagnostics(&self) -> CaptureDiagnostics {
        self.shared.lock().diagnostics.clone()
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    /// Config of the running session, if any.
    pub fn config(&self) -> Option<&CaptureConfig> {
        self.active.as_ref().map(|a| &a.config)
    }

    /// Open `target` and start capturing into it. Transitions: stopped → starting → recording.
    pub fn start(&mut self, config: CaptureConfig, target: SinkTarget) -> Result<(), CaptureError> {
        self.check_can_start(&config)?;
        self.shared = SharedState::stopped();
        self.set_state(SessionState::Starting);

        let sink = match target.open() {
            Ok(sink) => sink,
            Err(err) => {
                log::error!("Failed to open {:?}: {}", target, err);
                self.set_state(SessionState::Stopped);
                return Err(err.into());
            }
        };
        self.launch(config, sink)
    }

    /// Start capturing into an already-open sink.
    pub fn start_with_sink(&mut self, config: CaptureConfig, sink: FrameSink) -> Result<(), CaptureError> {
        self.check_can_start(&config)?;
        self.shared = SharedState::stopped();
        self.set_state(SessionState::Starting);
        self.launch(config, sink)
    }

    /// Stop capture and release every resource.
    /// Transitions: recording → stopping → stopped.
    ///
    /// Returns `None` when there was nothing to stop.
    pub fn stop(&mut self) -> Option<SessionSummary> {
        let mut active = self.active.take()?;

        active.running.store(false, Ordering::Release);
        self.set_state(SessionState::Stopping);

        // Halt the device first so a blocked read returns.
        if let Err(err) = active.handle.stop() {
            log::warn!("Device stop failed, closing anyway: {}", err);
        }

        // One deadline covers both the in-flight delivery and the worker exit.
        let timeout = active.config.stop_timeout();
        let deadline = Instant::now() + timeout;
        let drained = active.delivery_gate.try_lock_until(deadline).is_some();
        let received = if drained {
            active.exit_rx.recv_deadline(deadline)
        } else {
            Err(RecvTimeoutError::Timeout)
        };
        let exit = match received {
            Ok(exit) => {
                if let Some(worker) = active.worker.take() {
                    if worker.join().is_err() {
                        log::error!("Capture worker panicked after reporting exit");
                    }
                }
                Ok(exit)
            }
            Err(RecvTimeoutError::Timeout) => {
                log::error!(
                    "Capture worker did not exit within {:?}; detaching it",
                    timeout
                );
                drop(active.worker.take());
                Err(EndReason::WorkerDetached)
            }
            Err(RecvTimeoutError::Disconnected) => {
                if let Some(worker) = active.worker.take() {
                    let _ = worker.join();
                }
                log::error!("Capture worker panicked");
                Err(EndReason::WorkerPanicked)
            }
        };

        active.handle.close();

        let (end_reason, file) = match exit {
            Ok(WorkerExit { mut sink, reason }) => match sink.finish() {
                Ok(file) => (reason, file),
                Err(err) => {
                    log::error!("Failed to close {} sink: {}", sink.kind(), err);
                    let reason = if reason.is_failure() {
                        reason
                    } else {
                        EndReason::SinkFailed(err)
                    };
                    (reason, None)
                }
            },
            Err(reason) => (reason, None),
        };

        self.set_state(SessionState::Stopped);

        let summary = SessionSummary {
            id: active.id,
            started_at: active.started_at,
            ended_at: Utc::now(),
            duration_secs: active.started_instant.elapsed().as_secs_f64(),
            config: active.config,
            end_reason,
            diagnostics: self.diagnostics(),
            file,
        };

        log::info!(
            "Capture session {} stopped ({:?}): {} frames delivered, {} discarded",
            summary.id,
            summary.end_reason,
            summary.diagnostics.frames_delivered,
            summary.diagnostics.frames_discarded
        );

        if let Some(ref delegate) = self.delegate {
            delegate.on_session_finished(&summary);
        }

        Some(summary)
    }

    // --- Internal helpers ---

    fn set_state(&self, new_state: SessionState) {
        transition(&self.shared, self.delegate.as_ref(), new_state);
    }

    /// Preconditions checked while still Stopped: nothing is acquired on failure.
    fn check_can_start(&self, config: &CaptureConfig) -> Result<(), CaptureError> {
        if self.active.is_some() || !self.state().is_stopped() {
            return Err(CaptureError::AlreadyRecording);
        }
        config.validate().map_err(CaptureError::InvalidConfig)?;
        if !self.permission.is_granted() {
            log::warn!("Microphone permission not granted; capture not started");
            return Err(CaptureError::PermissionDenied);
        }
        Ok(())
    }

    /// Open and start the device, then spawn the worker. Any failure releases
    /// what was acquired and returns to Stopped.
    fn launch(&mut self, config: CaptureConfig, mut sink: FrameSink) -> Result<(), CaptureError> {
        let handle = match self.device.open(&config) {
            Ok(handle) => Arc::new(handle),
            Err(err) => return Err(self.abort_start(None, &mut sink, err.into())),
        };

        if let Err(err) = handle.start() {
            return Err(self.abort_start(Some(handle.as_ref()), &mut sink, err.into()));
        }

        let running = Arc::new(AtomicBool::new(true));
        let delivery_gate = Arc::new(Mutex::new(()));
        let (exit_tx, exit_rx) = bounded::<WorkerExit>(1);

        let worker = CaptureWorker {
            handle: Arc::clone(&handle),
            sink,
            warmup: WarmupDiscard::new(config.warmup_discard_frames),
            running: Arc::clone(&running),
            delivery_gate: Arc::clone(&delivery_gate),
            shared: Arc::clone(&self.shared),
            max_consecutive_failures: config.max_consecutive_sink_failures,
        };

        let worker_running = Arc::clone(&running);
        let shared = Arc::clone(&self.shared);
        let delegate = self.delegate.clone();
        let worker_handle = Arc::clone(&handle);

        self.set_state(SessionState::Recording);

        let spawned = thread::Builder::new()
            .name("mic-capture-worker".into())
            .spawn(move || {
                let exit = worker.run();
                // Fatal: wind down here; the owner completes release in stop().
                // Skipped once stop() has claimed the flag.
                if exit.reason.is_failure() && worker_running.swap(false, Ordering::AcqRel) {
                    if let Err(err) = worker_handle.stop() {
                        log::warn!("Device stop after failure failed: {}", err);
                    }
                    transition(&shared, delegate.as_ref(), SessionState::Stopping);
                    if let Some(ref delegate) = delegate {
                        if let Some(err) = failure_error(&exit.reason) {
                            delegate.on_error(&err);
                        }
                    }
                    log::error!("Capture session failed: {:?}", exit.reason);
                }
                let _ = exit_tx.send(exit);
            });

        let worker = match spawned {
            Ok(worker) => worker,
            Err(err) => {
                running.store(false, Ordering::Release);
                // The closure, and the sink inside it, were dropped by the failed spawn.
                if let Err(stop_err) = handle.stop() {
                    log::warn!("Device stop failed: {}", stop_err);
                }
                handle.close();
                self.set_state(SessionState::Stopped);
                return Err(CaptureError::WorkerSpawn(err.to_string()));
            }
        };

        let id = uuid::Uuid::new_v4().to_string();
        log::info!(
            "Capture session {} recording at {} Hz ({} byte frames, warm-up discard {})",
            id,
            config.sample_rate,
            handle.buffer_size(),
            config.warmup_discard_frames
        );

        self.active = Some(ActiveCapture {
            id,
            config,
            handle,
            running,
            delivery_gate,
            worker: Some(worker),
            exit_rx,
            started_at: Utc::now(),
            started_instant: Instant::now(),
        });
        Ok(())
    }

    fn abort_start(
        &self,
        handle: Option<&D::Handle>,
        sink: &mut FrameSink,
        err: CaptureError,
    ) -> CaptureError {
        log::error!("Failed to start capture: {}", err);
        if let Some(handle) = handle {
            if let Err(stop_err) = handle.stop() {
                log::warn!("Device stop failed: {}", stop_err);
            }
            handle.close();
        }
        if let Err(sink_err) = sink.finish() {
            log::warn!("Failed to close {} sink: {}", sink.kind(), sink_err);
        }
        self.set_state(SessionState::Stopped);
        err
    }
}

impl<D: CaptureDevice> Drop for CaptureSession<D> {
    fn drop(&mut self) {
        self.stop();
    }
}

fn failure_error(reason: &EndReason) -> Option<CaptureError> {
    match reason {
        EndReason::Requested => None,
        EndReason::DeviceLost(err) => Some(CaptureError::Device(err.clone())),
        EndReason::SinkFailed(err) => Some(CaptureError::Sink(err.clone())),
        EndReason::WorkerPanicked | EndReason::WorkerDetached => Some(CaptureError::Device(
            DeviceError::DeviceLost("capture worker ended abnormally".into()),
        )),
    }
}
