use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use super::ring_buffer::RingBuffer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QueueMode {
    Running,
    Halted,
    Closed,
}

/// Outcome of a blocking frame read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameRead {
    /// A whole frame was copied into the destination.
    Filled(usize),
    /// Not enough samples arrived before the timeout, or the queue is halted.
    Empty,
    Closed,
}

struct Inner {
    ring: RingBuffer,
    mode: QueueMode,
}

/// Blocking single-consumer sample queue.
///
/// A platform callback pushes converted samples; the capture worker pulls
/// whole frames. `halt` wakes a blocked reader immediately so a stop never
/// waits on the read timeout.
pub struct SampleQueue {
    inner: Mutex<Inner>,
    ready: Condvar,
}

impl SampleQueue {
    pub fn new(capacity_samples: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                ring: RingBuffer::new(capacity_samples),
                mode: QueueMode::Halted,
            }),
            ready: Condvar::new(),
        }
    }

    /// Append samples. Ignored unless the queue is running.
    pub fn push(&self, samples: &[i16]) {
        let mut inner = self.inner.lock();
        if inner.mode != QueueMode::Running {
            return;
        }
        inner.ring.write(samples);
        drop(inner);
        self.ready.notify_one();
    }

    /// Wait up to `timeout` for `dst.len()` samples and move them into `dst`.
    pub fn read_frame(&self, dst: &mut [i16], timeout: Duration) -> FrameRead {
        if dst.is_empty() {
            return FrameRead::Empty;
        }
        let deadline = Instant::now() + timeout;
        let mut inner = self.inner.lock();
        loop {
            match inner.mode {
                QueueMode::Closed => return FrameRead::Closed,
                QueueMode::Halted => return FrameRead::Empty,
                QueueMode::Running => {}
            }
            if inner.ring.count() >= dst.len() {
                let n = inner.ring.read_into(dst);
                return FrameRead::Filled(n);
            }
            if self.ready.wait_until(&mut inner, deadline).timed_out() {
                return FrameRead::Empty;
            }
        }
    }

    /// Accept samples and serve reads. Drops anything left from a previous run.
    pub fn resume(&self) {
        let mut inner = self.inner.lock();
        if inner.mode == QueueMode::Closed {
            return;
        }
        inner.ring.reset();
        inner.mode = QueueMode::Running;
    }

    /// Stop accepting samples and wake any blocked reader.
    pub fn halt(&self) {
        let mut inner = self.inner.lock();
        if inner.mode == QueueMode::Running {
            inner.mode = QueueMode::Halted;
        }
        drop(inner);
        self.ready.notify_all();
    }

    /// Permanently close the queue; further reads report `Closed`.
    pub fn close(&self) {
        self.inner.lock().mode = QueueMode::Closed;
        self.ready.notify_all();
    }

    pub fn is_running(&self) -> bool {
        self.inner.lock().mode == QueueMode::Running
    }

    pub fn overrun(&self) -> u64 {
        self.inner.lock().ring.overrun()
    }
}
