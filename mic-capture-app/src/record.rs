//! Subcommand handlers.

use std::io::BufRead;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use crossbeam_channel::{after, never, select, Receiver};

use mic_capture_core::{
    BroadcastEvent, CaptureDevice, CaptureError, CaptureService, CaptureSession, LocalBroadcaster, SessionSummary, SinkTarget,
    AUDIO_DATA_EVENT,
};
use mic_capture_cpal::{CpalMicDevice, CpalPermission, DeviceEnumerator};

use crate::cli::{RecordArgs, SinkKind};
use crate::delegate::ConsoleDelegate;

pub fn list_devices() -> Result<()> {
    let enumerator = DeviceEnumerator::new();
    log::info!("Listing input devices on {}", enumerator.host_name());
    let devices = enumerator
        .list_input_devices()
        .context("listing input devices")?;
    println!("{}", serde_json::to_string_pretty(&devices)?);
    Ok(())
}

pub fn init_config(path: &Path) -> Result<()> {
    mic_capture_core::CaptureConfig::voice_recognition()
        .save(path)
        .with_context(|| format!("writing {}", path.display()))?;
    println!("Wrote {}", path.display());
    Ok(())
}

pub fn record(args: &RecordArgs) -> Result<()> {
    let config = args.capture_config()?;
    let device = match &args.device {
        Some(name) => CpalMicDevice::with_name(name.clone()),
        None => CpalMicDevice::default_device(),
    };

    let mut monitor = None;
    let target = match args.sink {
        SinkKind::File => SinkTarget::File(args.out.clone()),
        SinkKind::Broadcast => {
            let bus = LocalBroadcaster::new(args.package.clone());
            monitor = Some(spawn_monitor(bus.subscribe(AUDIO_DATA_EVENT))?);
            SinkTarget::Broadcast(bus)
        }
    };

    let (delegate, failures) = ConsoleDelegate::new();
    let mut session = CaptureSession::with_permission(device, Arc::new(CpalPermission));
    session.set_delegate(Arc::new(delegate));
    let mut service = CaptureService::new(session, config, target);

    service.on_activate().context("starting capture")?;
    eprintln!("Recording from {}. Press Enter to stop.", service.session().device().device_info().name);

    let deadline = args.seconds.map(Duration::from_secs);
    let failure = wait_for_stop(deadline, &failures);

    let summary = service
        .on_deactivate()
        .context("capture session was not running")?;
    drop(service);

    if let Some(monitor) = monitor {
        match monitor.join() {
            Ok(stats) => log::info!("Broadcast monitor saw {} events, {} bytes", stats.events, stats.bytes),
            Err(_) => log::error!("Broadcast monitor panicked"),
        }
    }

    print_summary(&summary)?;
    if let Some(err) = failure {
        bail!("capture ended early: {}", err);
    }
    Ok(())
}

/// Block until Enter, the deadline, or a session failure. Returns the failure.
fn wait_for_stop(
    deadline: Option<Duration>,
    failures: &Receiver<CaptureError>,
) -> Option<CaptureError> {
    let (enter_tx, enter_rx) = crossbeam_channel::bounded(1);
    thread::spawn(move || {
        let mut line = String::new();
        let _ = std::io::stdin().lock().read_line(&mut line);
        let _ = enter_tx.send(());
    });

    let timeout = deadline.map(after).unwrap_or_else(never);
    select! {
        recv(enter_rx) -> _ => None,
        recv(timeout) -> _ => None,
        recv(failures) -> err => err.ok(),
    }
}

fn print_summary(summary: &SessionSummary) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(summary)?);
    Ok(())
}

#[derive(Debug, Default)]
struct MonitorStats {
    events: u64,
    bytes: u64,
}

/// Consume broadcast frames the way a receiving component would, logging
/// the level of each frame at trace.
fn spawn_monitor(events: Receiver<BroadcastEvent>) -> Result<thread::JoinHandle<MonitorStats>> {
    thread::Builder::new()
        .name("broadcast-monitor".into())
        .spawn(move || {
            let mut stats = MonitorStats::default();
            for event in events.iter() {
                match event.decode_data() {
                    Ok(pcm) => {
                        stats.events += 1;
                        stats.bytes += pcm.len() as u64;
                        log::trace!("Frame from {}: {} bytes, peak {}", event.package, pcm.len(), peak(&pcm));
                    }
                    Err(e) => log::warn!("Undecodable broadcast payload: {}", e),
                }
            }
            stats
        })
        .context("spawning broadcast monitor")
}

/// Peak absolute amplitude of little-endian 16-bit PCM.
fn peak(pcm: &[u8]) -> u16 {
    pcm.chunks_exact(2)
        .map(|b| i16::from_le_bytes([b[0], b[1]]).unsigned_abs())
        .max()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peak_reads_little_endian_samples() {
        assert_eq!(peak(&[0x00, 0x80, 0x10, 0x00]), 32_768);
        assert_eq!(peak(&[0x10, 0x00, 0xFF]), 16);
        assert_eq!(peak(&[]), 0);
    }

    #[test]
    fn monitor_counts_until_bus_is_dropped() {
        let bus = LocalBroadcaster::new("test");
        let monitor = spawn_monitor(bus.subscribe(AUDIO_DATA_EVENT)).unwrap();
        let mut sink = mic_capture_core::BroadcastSink::new(bus.clone());
        sink.deliver(mic_capture_core::AudioFrame::new(0, vec![1, 0, 2, 0]));
        sink.deliver(mic_capture_core::AudioFrame::new(1, vec![3, 0]));
        drop(sink);
        drop(bus);

        let stats = monitor.join().unwrap();
        assert_eq!(stats.events, 2);
        assert_eq!(stats.bytes, 6);
    }
}
