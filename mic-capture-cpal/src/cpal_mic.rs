//! cpal microphone capture device.
//!
//! The `cpal::Stream` lives on a dedicated `cpal-mic-stream` thread, since
//! streams are not `Send` on every host. The input callback downmixes to
//! mono i16 and pushes into a `SampleQueue`; `read` pulls whole frames.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{
    FromSample, SampleFormat, SampleRate, SizedSample, StreamConfig, SupportedBufferSize,
    SupportedStreamConfig, SupportedStreamConfigRange,
};
use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;

use mic_capture_core::models::audio_models::AudioSource;
use mic_capture_core::models::config::{AudioSourceHint, CaptureConfig};
use mic_capture_core::models::error::DeviceError;
use mic_capture_core::processing::sample_queue::{FrameRead, SampleQueue};
use mic_capture_core::traits::capture_device::{CaptureDevice, DeviceHandle};

use crate::convert::{downmix_to_i16, samples_to_le_bytes};

/// Upper bound on one blocking `read`, so a stalled stream still lets the
/// worker re-check its stop flag.
const READ_TIMEOUT: Duration = Duration::from_millis(100);

/// How long a control request waits on the stream thread.
const CONTROL_TIMEOUT: Duration = Duration::from_secs(2);

/// Frames of audio the sample queue holds before overwriting.
const QUEUE_FRAMES: usize = 8;

/// Smallest frame the device hands out, as a fraction of a second (20 ms).
const MIN_FRAME_DIVISOR: u32 = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
enum DeviceSelector {
    Default,
    Named(String),
}

/// Microphone backed by the default cpal host.
///
/// cpal exposes no input routing or voice processing, so
/// `CaptureConfig::source` does not change the stream that is opened. The
/// hint is reported in the open log so captures can be told apart.
#[derive(Debug, Clone)]
pub struct CpalMicDevice {
    selector: DeviceSelector,
}

impl CpalMicDevice {
    /// The system default input device, resolved at each `open`.
    pub fn default_device() -> Self {
        Self {
            selector: DeviceSelector::Default,
        }
    }

    /// A specific input device by its cpal name.
    pub fn with_name(name: impl Into<String>) -> Self {
        Self {
            selector: DeviceSelector::Named(name.into()),
        }
    }

    fn resolve(&self) -> Result<cpal::Device, DeviceError> {
        let host = cpal::default_host();
        match &self.selector {
            DeviceSelector::Default => host
                .default_input_device()
                .ok_or_else(|| DeviceError::DeviceLost("no default input device".into())),
            DeviceSelector::Named(name) => host
                .input_devices()
                .map_err(|e| DeviceError::DeviceLost(format!("failed to list input devices: {}", e)))?
                .find(|d| d.name().map(|n| &n == name).unwrap_or(false))
                .ok_or_else(|| DeviceError::DeviceLost(format!("input device '{}' not found", name))),
        }
    }

    fn supported_config(&self, config: &CaptureConfig) -> Result<(cpal::Device, SupportedStreamConfigRange), DeviceError> {
        let device = self.resolve()?;
        let ranges: Vec<SupportedStreamConfigRange> = device
            .supported_input_configs()
            .map_err(|e| DeviceError::Unsupported(format!("failed to query input configs: {}", e)))?
            .collect();
        let range = select_config(&ranges, config.sample_rate).ok_or_else(|| {
            DeviceError::Unsupported(format!(
                "no input config supports {} Hz as f32, i16 or u16",
                config.sample_rate
            ))
        })?;
        Ok((device, range))
    }
}

impl CaptureDevice for CpalMicDevice {
    type Handle = CpalMicHandle;

    fn is_available(&self) -> bool {
        self.resolve().is_ok()
    }

    fn device_info(&self) -> AudioSource {
        let default_name = cpal::default_host()
            .default_input_device()
            .and_then(|d| d.name().ok());
        let name = match &self.selector {
            DeviceSelector::Default => default_name.clone().unwrap_or_else(|| "Default Microphone".into()),
            DeviceSelector::Named(name) => name.clone(),
        };
        AudioSource {
            id: name.clone(),
            is_default: default_name.as_deref() == Some(name.as_str()),
            name,
        }
    }

    fn min_buffer_size(&self, config: &CaptureConfig) -> Result<usize, DeviceError> {
        let (_, range) = self.supported_config(config)?;
        Ok(platform_min_bytes(&range, config))
    }

    fn open(&self, config: &CaptureConfig) -> Result<CpalMicHandle, DeviceError> {
        let (device, range) = self.supported_config(config)?;
        let buffer_size = config.resolve_buffer_size(platform_min_bytes(&range, config));
        let supported = range.with_sample_rate(SampleRate(config.sample_rate));

        let device_name = device.name().unwrap_or_else(|_| "unknown input device".into());
        log::info!(
            "Opening '{}' for {} at {} Hz ({:?}, {} ch), {} byte frames",
            device_name,
            source_label(config.source),
            config.sample_rate,
            supported.sample_format(),
            supported.channels(),
            buffer_size
        );

        let frame_samples = buffer_size / 2;
        let queue = Arc::new(SampleQueue::new(frame_samples * QUEUE_FRAMES));
        let lost = Arc::new(Mutex::new(None));
        let (ready_tx, ready_rx) = bounded(1);
        let (cmd_tx, cmd_rx) = bounded(4);

        let stream_queue = Arc::clone(&queue);
        let stream_lost = Arc::clone(&lost);
        let stream_thread = thread::Builder::new()
            .name("cpal-mic-stream".into())
            .spawn(move || run_stream(device, supported, stream_queue, stream_lost, ready_tx, cmd_rx))
            .map_err(|e| DeviceError::DeviceLost(format!("failed to spawn stream thread: {}", e)))?;

        match ready_rx.recv_timeout(CONTROL_TIMEOUT) {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                let _ = stream_thread.join();
                return Err(err);
            }
            Err(_) => {
                drop(cmd_tx);
                return Err(DeviceError::DeviceLost("input stream did not open in time".into()));
            }
        }

        Ok(CpalMicHandle {
            buffer_size,
            queue,
            lost,
            commands: Mutex::new(Some(cmd_tx)),
            stream_thread: Mutex::new(Some(stream_thread)),
            scratch: Mutex::new(vec![0; frame_samples]),
            started: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        })
    }
}

/// How a source hint is served by this backend.
fn source_label(source: AudioSourceHint) -> &'static str {
    match source {
        AudioSourceHint::VoiceRecognition => "voice recognition (unprocessed, no platform voice path)",
        AudioSourceHint::RawMicrophone => "raw microphone",
    }
}

enum StreamCommand {
    Play(Sender<Result<(), DeviceError>>),
    Pause(Sender<Result<(), DeviceError>>),
}

/// An open cpal input stream.
pub struct CpalMicHandle {
    buffer_size: usize,
    queue: Arc<SampleQueue>,
    /// Set by the stream error callback.
    lost: Arc<Mutex<Option<String>>>,
    commands: Mutex<Option<Sender<StreamCommand>>>,
    stream_thread: Mutex<Option<thread::JoinHandle<()>>>,
    scratch: Mutex<Vec<i16>>,
    started: AtomicBool,
    closed: AtomicBool,
}

impl CpalMicHandle {
    fn request(&self, make: fn(Sender<Result<(), DeviceError>>) -> StreamCommand) -> Result<(), DeviceError> {
        let commands = self.commands.lock();
        let tx = commands.as_ref().ok_or(DeviceError::NotOpen)?;
        let (reply_tx, reply_rx) = bounded(1);
        tx.send(make(reply_tx))
            .map_err(|_| DeviceError::DeviceLost("input stream thread exited".into()))?;
        drop(commands);
        reply_rx
            .recv_timeout(CONTROL_TIMEOUT)
            .map_err(|_| DeviceError::DeviceLost("input stream did not respond".into()))?
    }

    fn lost_error(&self) -> Option<DeviceError> {
        self.lost.lock().clone().map(DeviceError::DeviceLost)
    }

    /// Samples overwritten because the worker fell behind the callback.
    pub fn overrun(&self) -> u64 {
        self.queue.overrun()
    }
}

impl DeviceHandle for CpalMicHandle {
    fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    fn start(&self) -> Result<(), DeviceError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(DeviceError::NotOpen);
        }
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(DeviceError::AlreadyStarted);
        }
        self.queue.resume();
        if let Err(err) = self.request(StreamCommand::Play) {
            self.queue.halt();
            self.started.store(false, Ordering::Release);
            return Err(err);
        }
        Ok(())
    }

    fn read(&self, buffer: &mut [u8]) -> Result<usize, DeviceError> {
        if let Some(err) = self.lost_error() {
            return Err(err);
        }
        let mut scratch = self.scratch.lock();
        let samples = (buffer.len() / 2).min(scratch.len());
        match self.queue.read_frame(&mut scratch[..samples], READ_TIMEOUT) {
            FrameRead::Filled(n) => Ok(samples_to_le_bytes(&scratch[..n], buffer)),
            FrameRead::Empty => match self.lost_error() {
                Some(err) => Err(err),
                None => Ok(0),
            },
            FrameRead::Closed => Err(DeviceError::DeviceLost("input stream closed".into())),
        }
    }

    fn stop(&self) -> Result<(), DeviceError> {
        if !self.started.swap(false, Ordering::AcqRel) {
            return Ok(());
        }
        // Wake the reader before pausing the stream.
        self.queue.halt();
        self.request(StreamCommand::Pause)
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.queue.close();
        // Dropping the sender ends the stream thread, which drops the stream.
        drop(self.commands.lock().take());
        if let Some(thread) = self.stream_thread.lock().take() {
            if thread.join().is_err() {
                log::error!("cpal stream thread panicked");
            }
        }
        log::debug!("cpal input stream closed");
    }
}

impl Drop for CpalMicHandle {
    fn drop(&mut self) {
        self.close();
    }
}

fn run_stream(
    device: cpal::Device,
    supported: SupportedStreamConfig,
    queue: Arc<SampleQueue>,
    lost: Arc<Mutex<Option<String>>>,
    ready: Sender<Result<(), DeviceError>>,
    commands: Receiver<StreamCommand>,
) {
    let stream = match build_stream(&device, &supported, queue, lost) {
        Ok(stream) => stream,
        Err(err) => {
            let _ = ready.send(Err(err));
            return;
        }
    };
    // Some hosts start streams on creation; the queue is halted until
    // start() anyway, but keep the hardware idle too.
    if let Err(err) = stream.pause() {
        log::debug!("Initial pause not supported: {}", err);
    }
    if ready.send(Ok(())).is_err() {
        return;
    }

    for command in commands.iter() {
        match command {
            StreamCommand::Play(reply) => {
                let _ = reply.send(stream.play().map_err(|e| DeviceError::DeviceLost(e.to_string())));
            }
            StreamCommand::Pause(reply) => {
                let _ = reply.send(stream.pause().map_err(|e| DeviceError::DeviceLost(e.to_string())));
            }
        }
    }
    drop(stream);
}

fn build_stream(
    device: &cpal::Device,
    supported: &SupportedStreamConfig,
    queue: Arc<SampleQueue>,
    lost: Arc<Mutex<Option<String>>>,
) -> Result<cpal::Stream, DeviceError> {
    let config: StreamConfig = supported.config();
    let result = match supported.sample_format() {
        SampleFormat::F32 => build_typed::<f32>(device, &config, queue, lost),
        SampleFormat::I16 => build_typed::<i16>(device, &config, queue, lost),
        SampleFormat::U16 => build_typed::<u16>(device, &config, queue, lost),
        other => return Err(DeviceError::Unsupported(format!("sample format {:?}", other))),
    };
    result.map_err(|e| match e {
        cpal::BuildStreamError::DeviceNotAvailable => DeviceError::DeviceLost(e.to_string()),
        other => DeviceError::Unsupported(other.to_string()),
    })
}

fn build_typed<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    queue: Arc<SampleQueue>,
    lost: Arc<Mutex<Option<String>>>,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    T: SizedSample + Send + 'static,
    i16: FromSample<T>,
{
    let channels = usize::from(config.channels.max(1));
    let mut converted: Vec<i16> = Vec::new();
    let callback_queue = Arc::clone(&queue);

    device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            converted.clear();
            downmix_to_i16(&mut converted, data, channels);
            callback_queue.push(&converted);
        },
        move |err| {
            log::error!("cpal input stream error: {}", err);
            *lost.lock() = Some(err.to_string());
            queue.halt();
        },
        None,
    )
}

/// Prefer native i16, then f32, then u16; among those, the fewest channels.
fn select_config(ranges: &[SupportedStreamConfigRange], sample_rate: u32) -> Option<SupportedStreamConfigRange> {
    fn format_rank(format: SampleFormat) -> Option<u8> {
        match format {
            SampleFormat::I16 => Some(0),
            SampleFormat::F32 => Some(1),
            SampleFormat::U16 => Some(2),
            _ => None,
        }
    }

    ranges
        .iter()
        .filter(|r| r.min_sample_rate().0 <= sample_rate && sample_rate <= r.max_sample_rate().0)
        .filter_map(|r| format_rank(r.sample_format()).map(|rank| (rank, r.channels(), r)))
        .min_by_key(|(rank, channels, _)| (*rank, *channels))
        .map(|(_, _, r)| r.clone())
}

/// The platform's minimum frame in bytes of mono i16: the larger of its
/// reported minimum buffer and 20 ms of audio.
fn platform_min_bytes(range: &SupportedStreamConfigRange, config: &CaptureConfig) -> usize {
    let floor = (config.sample_rate / MIN_FRAME_DIVISOR).max(1);
    let reported = match range.buffer_size() {
        SupportedBufferSize::Range { min, .. } => *min,
        SupportedBufferSize::Unknown => 0,
    };
    reported.max(floor) as usize * config.bytes_per_frame()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(channels: u16, min: u32, max: u32, format: SampleFormat) -> SupportedStreamConfigRange {
        SupportedStreamConfigRange::new(
            channels,
            SampleRate(min),
            SampleRate(max),
            SupportedBufferSize::Range { min: 64, max: 8192 },
            format,
        )
    }

    #[test]
    fn prefers_i16_then_fewest_channels() {
        let ranges = vec![
            range(2, 8_000, 48_000, SampleFormat::F32),
            range(2, 8_000, 48_000, SampleFormat::I16),
            range(1, 8_000, 48_000, SampleFormat::I16),
        ];

        let chosen = select_config(&ranges, 44_100).unwrap();
        assert_eq!(chosen.sample_format(), SampleFormat::I16);
        assert_eq!(chosen.channels(), 1);
    }

    #[test]
    fn source_hint_is_named_in_open_log() {
        let voice = source_label(AudioSourceHint::VoiceRecognition);
        let raw = source_label(AudioSourceHint::RawMicrophone);

        assert!(voice.starts_with("voice recognition"));
        assert!(voice.contains("unprocessed"));
        assert_eq!(raw, "raw microphone");
    }

    #[test]
    fn rate_outside_every_range_is_unsupported() {
        let ranges = vec![
            range(1, 44_100, 48_000, SampleFormat::F32),
            range(1, 8_000, 16_000, SampleFormat::I32),
        ];

        assert!(select_config(&ranges, 16_000).is_none());
        assert!(select_config(&ranges, 48_000).is_some());
    }

    #[test]
    fn platform_minimum_is_at_least_twenty_ms() {
        let config = CaptureConfig::default().with_sample_rate(16_000);
        let small = range(1, 8_000, 48_000, SampleFormat::I16);
        assert_eq!(platform_min_bytes(&small, &config), 320 * 2);

        let large = SupportedStreamConfigRange::new(
            1,
            SampleRate(8_000),
            SampleRate(48_000),
            SupportedBufferSize::Range { min: 1024, max: 8192 },
            SampleFormat::I16,
        );
        assert_eq!(platform_min_bytes(&large, &config), 1024 * 2);
    }
}
