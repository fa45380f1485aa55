//! Command-line interface for mic-capture
//!
//! Handles argument parsing and logging configuration.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use log::LevelFilter;

use mic_capture_core::{AudioSourceHint, CaptureConfig};

/// mic-capture - background microphone capture to a file or an in-process bus
#[derive(Parser, Debug)]
#[command(name = "mic-capture")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Increase logging verbosity
    /// -v = info, -vv = debug, -vvv = trace
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List input devices as JSON
    Devices,
    /// Capture until Enter is pressed or --seconds elapse
    Record(RecordArgs),
    /// Write a capture config file with the speech preset
    InitConfig {
        /// Destination JSON file
        #[arg(default_value = "mic-capture.json")]
        path: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SinkKind {
    /// Append raw PCM to --out
    File,
    /// Publish base64 frames on the in-process bus
    Broadcast,
}

#[derive(ClapArgs, Debug)]
pub struct RecordArgs {
    /// Input device name (default: system default input)
    #[arg(short, long)]
    pub device: Option<String>,

    #[arg(long, value_enum, default_value_t = SinkKind::File)]
    pub sink: SinkKind,

    /// Output file for the file sink
    #[arg(short, long, default_value = "capture.pcm")]
    pub out: PathBuf,

    /// Package name scoping broadcast events
    #[arg(long, default_value = "mic-capture")]
    pub package: String,

    /// Stop after this many seconds
    #[arg(short, long)]
    pub seconds: Option<u64>,

    /// Load settings from a JSON config file (flags below override it)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Sample rate in Hz
    #[arg(short, long)]
    pub rate: Option<u32>,

    /// Warm-up frames to discard
    #[arg(long)]
    pub discard: Option<u32>,

    /// Use the unprocessed microphone source instead of the speech-tuned one
    #[arg(long)]
    pub raw: bool,
}

impl RecordArgs {
    /// Resolve the capture config: file (or speech preset), then flags.
    pub fn capture_config(&self) -> Result<CaptureConfig> {
        let mut config = match &self.config {
            Some(path) => CaptureConfig::load(path)
                .with_context(|| format!("loading capture config {}", path.display()))?,
            None => CaptureConfig::voice_recognition(),
        };
        if let Some(rate) = self.rate {
            config.sample_rate = rate;
        }
        if let Some(discard) = self.discard {
            config.warmup_discard_frames = discard;
        }
        if self.raw {
            config.source = AudioSourceHint::RawMicrophone;
        }
        config
            .validate()
            .map_err(|reason| anyhow::anyhow!("invalid capture config: {}", reason))?;
        Ok(config)
    }
}

impl Args {
    /// Get the log level filter based on verbosity flags
    pub fn log_level(&self) -> LevelFilter {
        if self.quiet {
            LevelFilter::Error
        } else {
            match self.verbose {
                0 => LevelFilter::Warn,
                1 => LevelFilter::Info,
                2 => LevelFilter::Debug,
                _ => LevelFilter::Trace,
            }
        }
    }
}

/// Initialize the logging system based on CLI arguments. `RUST_LOG`, when
/// set, is applied on top.
pub fn init_logging(args: &Args) {
    let mut builder = env_logger::Builder::new();

    // Keep dependencies quiet; cpal host backends can be chatty.
    builder.filter_level(LevelFilter::Warn);
    for module in ["mic_capture", "mic_capture_core", "mic_capture_cpal"] {
        builder.filter_module(module, args.log_level());
    }
    if let Ok(spec) = std::env::var("RUST_LOG") {
        builder.parse_filters(&spec);
    }

    builder.format_timestamp_millis().init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_flags_override_preset() {
        let args = Args::parse_from(["mic-capture", "record", "--rate", "16000", "--discard", "0", "--raw"]);
        let Command::Record(record) = args.command else {
            panic!("expected record subcommand");
        };

        let config = record.capture_config().unwrap();
        assert_eq!(config.sample_rate, 16_000);
        assert_eq!(config.warmup_discard_frames, 0);
        assert_eq!(config.source, AudioSourceHint::RawMicrophone);
        assert_eq!(record.sink, SinkKind::File);
    }

    #[test]
    fn invalid_rate_is_rejected() {
        let args = Args::parse_from(["mic-capture", "record", "--rate", "1000"]);
        let Command::Record(record) = args.command else {
            panic!("expected record subcommand");
        };
        assert!(record.capture_config().is_err());
    }

    #[test]
    fn verbosity_maps_to_level() {
        let args = Args::parse_from(["mic-capture", "-vv", "devices"]);
        assert_eq!(args.log_level(), LevelFilter::Debug);
        let args = Args::parse_from(["mic-capture", "--quiet", "devices"]);
        assert_eq!(args.log_level(), LevelFilter::Error);
    }
}
