//! Fakes shared by the unit tests of this crate.

use std::collections::VecDeque;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::models::audio_models::AudioSource;
use crate::models::config::CaptureConfig;
use crate::models::error::{CaptureError, DeviceError};
use crate::models::session_summary::SessionSummary;
use crate::models::state::SessionState;
use crate::traits::capture_delegate::CaptureDelegate;
use crate::traits::capture_device::{CaptureDevice, DeviceHandle};

/// One scripted result of `DeviceHandle::read`.
#[derive(Debug, Clone)]
pub enum ReadStep {
    Frame(Vec<u8>),
    Empty,
    Lost(String),
    /// Block for the duration, ignoring stop.
    Hang(Duration),
}

/// Lifecycle counters observed across every handle a device opened.
#[derive(Debug, Default)]
pub struct DeviceProbe {
    pub opened: AtomicUsize,
    pub started: AtomicUsize,
    pub stopped: AtomicUsize,
    pub closed: AtomicUsize,
}

impl DeviceProbe {
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    /// Handles opened but not yet released.
    pub fn live_handles(&self) -> usize {
        self.opened() - self.closed()
    }
}

/// A device whose reads follow a script. Once the script runs out, reads
/// return `Ok(0)` after a short pause until the handle is stopped.
pub struct ScriptedDevice {
    script: Arc<Mutex<VecDeque<ReadStep>>>,
    probe: Arc<DeviceProbe>,
    buffer_size: usize,
    pub open_error: Option<DeviceError>,
    pub start_error: Option<DeviceError>,
    pub stop_error: Option<DeviceError>,
}

impl ScriptedDevice {
    pub fn new(steps: Vec<ReadStep>) -> Self {
        Self {
            script: Arc::new(Mutex::new(steps.into())),
            probe: Arc::new(DeviceProbe::default()),
            buffer_size: 8,
            open_error: None,
            start_error: None,
            stop_error: None,
        }
    }

    pub fn frames(frames: &[&[u8]]) -> Self {
        Self::new(frames.iter().map(|f| ReadStep::Frame(f.to_vec())).collect())
    }

    pub fn probe(&self) -> Arc<DeviceProbe> {
        Arc::clone(&self.probe)
    }

    /// Queue more reads, visible to any open handle.
    pub fn push_steps(&self, steps: Vec<ReadStep>) {
        self.script.lock().extend(steps);
    }
}

impl CaptureDevice for ScriptedDevice {
    type Handle = ScriptedHandle;

    fn is_available(&self) -> bool {
        true
    }

    fn device_info(&self) -> AudioSource {
        AudioSource {
            id: "scripted".into(),
            name: "Scripted Microphone".into(),
            is_default: true,
        }
    }

    fn min_buffer_size(&self, _config: &CaptureConfig) -> Result<usize, DeviceError> {
        Ok(self.buffer_size)
    }

    fn open(&self, config: &CaptureConfig) -> Result<ScriptedHandle, DeviceError> {
        if let Some(err) = &self.open_error {
            return Err(err.clone());
        }
        self.probe.opened.fetch_add(1, Ordering::SeqCst);
        Ok(ScriptedHandle {
            script: Arc::clone(&self.script),
            probe: Arc::clone(&self.probe),
            buffer_size: config.resolve_buffer_size(self.buffer_size),
            start_error: self.start_error.clone(),
            stop_error: self.stop_error.clone(),
            started: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        })
    }
}

pub struct ScriptedHandle {
    script: Arc<Mutex<VecDeque<ReadStep>>>,
    probe: Arc<DeviceProbe>,
    buffer_size: usize,
    start_error: Option<DeviceError>,
    stop_error: Option<DeviceError>,
    started: AtomicBool,
    closed: AtomicBool,
}

impl DeviceHandle for ScriptedHandle {
    fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    fn start(&self) -> Result<(), DeviceError> {
        if let Some(err) = &self.start_error {
            return Err(err.clone());
        }
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(DeviceError::AlreadyStarted);
        }
        self.probe.started.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn read(&self, buffer: &mut [u8]) -> Result<usize, DeviceError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(DeviceError::DeviceLost("handle closed".into()));
        }
        if !self.started.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(1));
            return Ok(0);
        }
        let step = self.script.lock().pop_front();
        match step {
            Some(ReadStep::Frame(data)) => {
                let n = data.len().min(buffer.len());
                buffer[..n].copy_from_slice(&data[..n]);
                Ok(n)
            }
            Some(ReadStep::Empty) => Ok(0),
            Some(ReadStep::Lost(msg)) => Err(DeviceError::DeviceLost(msg)),
            Some(ReadStep::Hang(duration)) => {
                thread::sleep(duration);
                Ok(0)
            }
            None => {
                thread::sleep(Duration::from_millis(2));
                Ok(0)
            }
        }
    }

    fn stop(&self) -> Result<(), DeviceError> {
        let was_started = self.started.swap(false, Ordering::SeqCst);
        if was_started {
            self.probe.stopped.fetch_add(1, Ordering::SeqCst);
        }
        match &self.stop_error {
            Some(err) if was_started => Err(err.clone()),
            _ => Ok(()),
        }
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.probe.closed.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// In-memory writer that fails the listed write calls (0-based).
pub struct FlakyWriter {
    contents: Arc<Mutex<Vec<u8>>>,
    fail_on: Vec<usize>,
    fail_all: bool,
    calls: usize,
}

impl FlakyWriter {
    pub fn failing_writes(fail_on: &[usize]) -> Self {
        Self {
            contents: Arc::new(Mutex::new(Vec::new())),
            fail_on: fail_on.to_vec(),
            fail_all: false,
            calls: 0,
        }
    }

    pub fn always_failing() -> Self {
        Self {
            fail_all: true,
            ..Self::failing_writes(&[])
        }
    }

    pub fn contents(&self) -> Arc<Mutex<Vec<u8>>> {
        Arc::clone(&self.contents)
    }
}

impl Write for FlakyWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let call = self.calls;
        self.calls += 1;
        if self.fail_all || self.fail_on.contains(&call) {
            return Err(io::Error::new(io::ErrorKind::Other, "injected write failure"));
        }
        self.contents.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// In-memory writer that takes `delay` for every write call.
pub struct SlowWriter {
    delay: Duration,
    contents: Arc<Mutex<Vec<u8>>>,
}

impl SlowWriter {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            contents: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl Write for SlowWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        thread::sleep(self.delay);
        self.contents.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Delegate that records every callback.
#[derive(Default)]
pub struct RecordingDelegate {
    pub states: Mutex<Vec<SessionState>>,
    pub errors: Mutex<Vec<CaptureError>>,
    pub summaries: Mutex<Vec<SessionSummary>>,
}

impl CaptureDelegate for RecordingDelegate {
    fn on_state_changed(&self, state: SessionState) {
        self.states.lock().push(state);
    }

    fn on_error(&self, error: &CaptureError) {
        self.errors.lock().push(error.clone());
    }

    fn on_session_finished(&self, summary: &SessionSummary) {
        self.summaries.lock().push(summary.clone());
    }
}

/// Poll `cond` until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    cond()
}
