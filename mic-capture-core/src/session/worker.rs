use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::models::error::DeviceError;
use crate::models::frame::AudioFrame;
use crate::models::session_summary::EndReason;
use crate::processing::warmup::{FrameDisposition, WarmupDiscard};
use crate::sink::FrameSink;
use crate::traits::capture_device::DeviceHandle;

use super::capture::SharedState;

/// What the worker hands back to the control thread when its loop ends.
pub(crate) struct WorkerExit {
    pub sink: FrameSink,
    pub reason: EndReason,
}

/// The read → discard → deliver loop. Runs on its own thread, one per session.
pub(crate) struct CaptureWorker<H: DeviceHandle> {
    pub handle: Arc<H>,
    pub sink: FrameSink,
    pub warmup: WarmupDiscard,
    pub running: Arc<AtomicBool>,
    pub delivery_gate: Arc<Mutex<()>>,
    pub shared: Arc<Mutex<SharedState>>,
    pub max_consecutive_failures: u32,
}

impl<H: DeviceHandle> CaptureWorker<H> {
    pub fn run(mut self) -> WorkerExit {
        let mut buffer = vec![0u8; self.handle.buffer_size()];
        let mut sequence: u64 = 0;
        let mut consecutive_failures: u32 = 0;

        log::debug!(
            "Capture worker started ({} byte frames, {} sink)",
            buffer.len(),
            self.sink.kind()
        );

        let reason = loop {
            if !self.running.load(Ordering::Acquire) {
                break EndReason::Requested;
            }

            let read = match self.handle.read(&mut buffer) {
                Ok(n) => n,
                // A read cut short by stop/close is the expected way out.
                Err(_) if !self.running.load(Ordering::Acquire) => break EndReason::Requested,
                Err(err) => break EndReason::DeviceLost(as_device_lost(err)),
            };

            self.shared.lock().diagnostics.record_read(read);

            match self.warmup.classify(read) {
                FrameDisposition::Skip => continue,
                FrameDisposition::Discard => {
                    log::trace!("Discarding warm-up frame {}", sequence);
                    sequence += 1;
                    self.shared.lock().diagnostics.frames_discarded += 1;
                    continue;
                }
                FrameDisposition::Deliver => {}
            }

            let frame = AudioFrame::new(sequence, buffer[..read].to_vec());
            sequence += 1;

            let delivered = {
                let _gate = self.delivery_gate.lock();
                if !self.running.load(Ordering::Acquire) {
                    break EndReason::Requested;
                }
                self.sink.deliver(frame)
            };

            match delivered {
                Ok(()) => {
                    consecutive_failures = 0;
                    self.shared.lock().diagnostics.record_delivery(read);
                }
                Err(err) => {
                    consecutive_failures += 1;
                    self.shared
                        .lock()
                        .diagnostics
                        .record_sink_failure(consecutive_failures);
                    log::warn!(
                        "Sink rejected frame {} ({} in a row): {}",
                        sequence - 1,
                        consecutive_failures,
                        err
                    );
                    if self.max_consecutive_failures > 0
                        && consecutive_failures >= self.max_consecutive_failures
                    {
                        break EndReason::SinkFailed(err);
                    }
                }
            }
        };

        log::debug!("Capture worker finished: {:?}", reason);
        WorkerExit {
            sink: self.sink,
            reason,
        }
    }
}

fn as_device_lost(err: DeviceError) -> DeviceError {
    match err {
        DeviceError::DeviceLost(_) => err,
        other => DeviceError::DeviceLost(other.to_string()),
    }
}
