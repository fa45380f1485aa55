use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::audio_models::CaptureDiagnostics;
use super::config::CaptureConfig;
use super::error::{DeviceError, SinkError};

/// Why a capture session ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "error", rename_all = "snake_case")]
pub enum EndReason {
    /// `stop()` was called while the worker was healthy.
    Requested,
    DeviceLost(DeviceError),
    /// Consecutive sink failures exceeded the configured threshold.
    SinkFailed(SinkError),
    WorkerPanicked,
    /// The worker did not exit within the stop timeout and was abandoned.
    WorkerDetached,
}

impl EndReason {
    pub fn is_failure(&self) -> bool {
        !matches!(self, Self::Requested)
    }
}

/// Output of a `FileSink` once the session closed it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSummary {
    pub path: PathBuf,
    pub bytes_written: u64,
    /// SHA-256 hex digest of the appended PCM bytes.
    pub checksum: String,
}

/// Returned by `stop()` once a session has fully released its resources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_secs: f64,
    pub config: CaptureConfig,
    pub end_reason: EndReason,
    pub diagnostics: CaptureDiagnostics,
    pub file: Option<FileSummary>,
}

impl SessionSummary {
    /// Seconds of audio that reached the sink, derived from delivered bytes.
    pub fn delivered_audio_secs(&self) -> f64 {
        let bytes_per_sec = self.config.sample_rate as f64 * self.config.bytes_per_frame() as f64;
        if bytes_per_sec == 0.0 {
            return 0.0;
        }
        self.diagnostics.bytes_delivered as f64 / bytes_per_sec
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn summary_serializes_end_reason_tagged() {
        let now = Utc::now();
        let summary = SessionSummary {
            id: "abc".into(),
            started_at: now,
            ended_at: now,
            duration_secs: 0.0,
            config: CaptureConfig::default().with_sample_rate(16_000),
            end_reason: EndReason::DeviceLost(DeviceError::DeviceLost("unplugged".into())),
            diagnostics: CaptureDiagnostics {
                bytes_delivered: 64_000,
                ..Default::default()
            },
            file: None,
        };

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["end_reason"]["kind"], "device_lost");
        assert!(summary.end_reason.is_failure());
        assert_relative_eq!(summary.delivered_audio_secs(), 2.0);

        let back: SessionSummary = serde_json::from_value(json).unwrap();
        assert_eq!(back, summary);
    }
}
