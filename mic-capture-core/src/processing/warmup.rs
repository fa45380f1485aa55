/// Drops the first N non-empty frames of a session.
///
/// Zero-length reads carry no audio and never consume the budget.
#[derive(Debug, Clone)]
pub struct WarmupDiscard {
    remaining: u32,
}

/// What the worker should do with a frame it just read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameDisposition {
    /// Nothing was read.
    Skip,
    /// Part of the warm-up window.
    Discard,
    Deliver,
}

impl WarmupDiscard {
    pub fn new(frames: u32) -> Self {
        Self { remaining: frames }
    }

    pub fn classify(&mut self, bytes_read: usize) -> FrameDisposition {
        if bytes_read == 0 {
            return FrameDisposition::Skip;
        }
        if self.remaining > 0 {
            self.remaining -= 1;
            return FrameDisposition::Discard;
        }
        FrameDisposition::Deliver
    }

    pub fn is_warm(&self) -> bool {
        self.remaining == 0
    }
}
