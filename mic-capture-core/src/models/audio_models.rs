use serde::{Deserialize, Serialize};

/// A microphone available for capture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioSource {
    pub id: String,
    pub name: String,
    pub is_default: bool,
}

/// Counters kept by the capture worker, for debugging sessions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureDiagnostics {
    /// Reads that returned at least one byte.
    pub frames_read: u64,
    /// Reads that returned zero bytes ("no data yet").
    pub empty_reads: u64,
    pub frames_discarded: u64,
    pub frames_delivered: u64,
    pub bytes_delivered: u64,
    pub sink_failures: u64,
    /// Longest run of consecutive sink failures seen in the session.
    pub max_consecutive_sink_failures: u32,
}

impl CaptureDiagnostics {
    pub fn record_read(&mut self, bytes: usize) {
        if bytes == 0 {
            self.empty_reads += 1;
        } else {
            self.frames_read += 1;
        }
    }

    pub fn record_delivery(&mut self, bytes: usize) {
        self.frames_delivered += 1;
        self.bytes_delivered += bytes as u64;
    }

    pub fn record_sink_failure(&mut self, consecutive: u32) {
        self.sink_failures += 1;
        self.max_consecutive_sink_failures = self.max_consecutive_sink_failures.max(consecutive);
    }
}
