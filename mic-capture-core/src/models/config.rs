use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::CaptureError;

/// Sample encoding delivered by the device. Only 16-bit linear PCM is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleEncoding {
    Pcm16Le,
}

impl SampleEncoding {
    pub fn bytes_per_sample(&self) -> usize {
        match self {
            Self::Pcm16Le => 2,
        }
    }
}

/// Which input path the platform should route the microphone through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioSourceHint {
    /// Tuned for speech (AGC / noise suppression where the platform offers it).
    VoiceRecognition,
    /// Unprocessed microphone signal.
    RawMicrophone,
}

/// Configuration for a capture session. Fixed for the lifetime of the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Sample rate in Hz (default: 44100).
    pub sample_rate: u32,

    /// Channel count. Only mono (1) is supported.
    pub channels: u16,

    pub encoding: SampleEncoding,

    pub source: AudioSourceHint,

    /// Number of initial non-empty frames dropped before delivery begins.
    pub warmup_discard_frames: u32,

    /// Requested device buffer in bytes. Raised to the platform minimum.
    pub buffer_size_bytes: Option<usize>,

    /// Consecutive sink failures tolerated before the session is stopped.
    /// Zero never escalates.
    pub max_consecutive_sink_failures: u32,

    /// Upper bound on how long `stop()` waits for the worker to exit.
    pub stop_timeout_ms: u64,
}

impl CaptureConfig {
    pub const MIN_SAMPLE_RATE: u32 = 8_000;
    pub const MAX_SAMPLE_RATE: u32 = 192_000;

    /// Speech preset: voice-recognition source, two warm-up frames dropped
    /// to swallow the click some devices emit when capture starts.
    pub fn voice_recognition() -> Self {
        Self {
            source: AudioSourceHint::VoiceRecognition,
            warmup_discard_frames: 2,
            ..Self::default()
        }
    }

    pub fn with_warmup_discard(mut self, frames: u32) -> Self {
        self.warmup_discard_frames = frames;
        self
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }

    /// Bytes per mono frame of audio (one sample per channel).
    pub fn bytes_per_frame(&self) -> usize {
        self.encoding.bytes_per_sample() * self.channels as usize
    }

    /// Device buffer to request, given the platform minimum in bytes.
    ///
    /// Never below `platform_min`, always a whole number of samples.
    pub fn resolve_buffer_size(&self, platform_min: usize) -> usize {
        let requested = self.buffer_size_bytes.unwrap_or(0).max(platform_min);
        let align = self.bytes_per_frame().max(1);
        let aligned = requested.div_ceil(align) * align;
        aligned.max(align)
    }

    pub fn validate(&self) -> Result<(), String> {
        if !(Self::MIN_SAMPLE_RATE..=Self::MAX_SAMPLE_RATE).contains(&self.sample_rate) {
            return Err(format!("unsupported sample rate: {} Hz", self.sample_rate));
        }
        if self.channels != 1 {
            return Err(format!("unsupported channel count: {}", self.channels));
        }
        if self.stop_timeout_ms == 0 {
            return Err("stop timeout must be positive".into());
        }
        if let Some(size) = self.buffer_size_bytes {
            if size == 0 || size % self.bytes_per_frame() != 0 {
                return Err(format!(
                    "buffer size must be a positive multiple of {} bytes, got {}",
                    self.bytes_per_frame(),
                    size
                ));
            }
        }
        Ok(())
    }

    /// Read a JSON configuration file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self, CaptureError> {
        let json = fs::read_to_string(path).map_err(|e| {
            CaptureError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        let config: CaptureConfig = serde_json::from_str(&json).map_err(|e| {
            CaptureError::Config(format!("failed to parse {}: {}", path.display(), e))
        })?;
        config.validate().map_err(CaptureError::InvalidConfig)?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), CaptureError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|e| CaptureError::Config(format!("failed to create directory: {}", e)))?;
            }
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| CaptureError::Config(format!("failed to serialize config: {}", e)))?;
        fs::write(path, json)
            .map_err(|e| CaptureError::Config(format!("failed to write {}: {}", path.display(), e)))?;
        Ok(())
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            channels: 1,
            encoding: SampleEncoding::Pcm16Le,
            source: AudioSourceHint::VoiceRecognition,
            warmup_discard_frames: 0,
            buffer_size_bytes: None,
            max_consecutive_sink_failures: 8,
            stop_timeout_ms: 2_000,
        }
    }
}
