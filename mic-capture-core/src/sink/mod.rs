//! Frame delivery targets.
//!
//! A session binds exactly one sink at start and keeps it until it stops.

pub mod broadcast;
pub mod file;

use std::path::PathBuf;

use crate::models::error::SinkError;
use crate::models::frame::AudioFrame;
use crate::models::session_summary::FileSummary;

pub use broadcast::{BroadcastEvent, BroadcastSink, LocalBroadcaster, AUDIO_DATA_EVENT};
pub use file::FileSink;

/// Where a session should deliver frames. Resolved into a `FrameSink` at start.
#[derive(Debug, Clone)]
pub enum SinkTarget {
    Broadcast(LocalBroadcaster),
    File(PathBuf),
}

impl SinkTarget {
    /// Open the concrete sink. For files this truncates or creates the output.
    pub fn open(&self) -> Result<FrameSink, SinkError> {
        match self {
            SinkTarget::Broadcast(bus) => Ok(FrameSink::Broadcast(BroadcastSink::new(bus.clone()))),
            SinkTarget::File(path) => FileSink::create(path.clone()).map(FrameSink::File),
        }
    }
}

/// The sink a running session delivers to.
#[derive(Debug)]
pub enum FrameSink {
    Broadcast(BroadcastSink),
    File(FileSink),
}

impl FrameSink {
    pub fn deliver(&mut self, frame: AudioFrame) -> Result<(), SinkError> {
        match self {
            FrameSink::Broadcast(sink) => {
                sink.deliver(frame);
                Ok(())
            }
            FrameSink::File(sink) => sink.deliver(frame),
        }
    }

    /// Close the sink. File sinks report what they wrote.
    pub fn finish(&mut self) -> Result<Option<FileSummary>, SinkError> {
        match self {
            FrameSink::Broadcast(_) => Ok(None),
            FrameSink::File(sink) => sink.finish().map(Some),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            FrameSink::Broadcast(_) => "broadcast",
            FrameSink::File(_) => "file",
        }
    }
}
