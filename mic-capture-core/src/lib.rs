//! # mic-capture-core
//!
//! Platform-agnostic microphone capture pipeline.
//!
//! Provides the capture session state machine, the warm-up discard policy,
//! sample buffering for callback-driven backends, and the two frame sinks
//! (in-process broadcast and raw PCM file). Platform backends implement the
//! `CaptureDevice` trait and plug into the generic `CaptureSession`.
//!
//! ## Architecture
//!
//! ```text
//! mic-capture-core (this crate)
//! ├── traits/       ← CaptureDevice, DeviceHandle, MicrophonePermission, CaptureDelegate
//! ├── models/       ← CaptureError, SessionState, CaptureConfig, AudioFrame, SessionSummary
//! ├── processing/   ← RingBuffer, SampleQueue, WarmupDiscard
//! ├── sink/         ← FrameSink (BroadcastSink | FileSink), LocalBroadcaster
//! ├── session/      ← CaptureSession and its worker
//! └── service/      ← CaptureService (activation lifecycle)
//! ```

pub mod models;
pub mod processing;
pub mod service;
pub mod session;
pub mod sink;
pub mod traits;

#[cfg(test)]
mod test_support;

// Re-export key types at crate root for convenience.
pub use models::audio_models::{AudioSource, CaptureDiagnostics};
pub use models::config::{AudioSourceHint, CaptureConfig, SampleEncoding};
pub use models::error::{CaptureError, DeviceError, SinkError};
pub use models::frame::AudioFrame;
pub use models::session_summary::{EndReason, FileSummary, SessionSummary};
pub use models::state::SessionState;
pub use processing::ring_buffer::RingBuffer;
pub use processing::sample_queue::{FrameRead, SampleQueue};
pub use processing::warmup::{FrameDisposition, WarmupDiscard};
pub use service::{CaptureService, ForegroundPresence, NoForeground};
pub use session::CaptureSession;
pub use sink::{BroadcastEvent, BroadcastSink, FileSink, FrameSink, LocalBroadcaster, SinkTarget, AUDIO_DATA_EVENT};
pub use traits::capture_delegate::CaptureDelegate;
pub use traits::capture_device::{CaptureDevice, DeviceHandle};
pub use traits::permission::{AlwaysGranted, MicrophonePermission};
