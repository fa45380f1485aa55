use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::models::error::SinkError;
use crate::models::frame::AudioFrame;
use crate::models::session_summary::FileSummary;

/// Appends raw frame bytes to a single headerless PCM file.
///
/// ## File Format
///
/// ```text
/// [16-bit little-endian mono PCM samples...]
/// ```
///
/// No header: consumers must know the sample rate out-of-band. The file is
/// truncated (or created) on open and closed once by `finish`.
pub struct FileSink {
    path: PathBuf,
    writer: Option<Box<dyn Write + Send>>,
    hasher: Sha256,
    bytes_written: u64,
}

impl FileSink {
    /// Create or truncate `path`, creating missing parent directories.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self, SinkError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|e| SinkError::Io(format!("failed to create directory: {}", e)))?;
            }
        }

        let file = File::create(&path)
            .map_err(|e| SinkError::Io(format!("failed to create {}: {}", path.display(), e)))?;
        log::debug!("Opened capture file {}", path.display());

        Ok(Self::with_writer(path, SyncOnFlush(file)))
    }

    /// Use an arbitrary writer. `path` only labels the summary.
    pub fn with_writer(path: impl Into<PathBuf>, writer: impl Write + Send + 'static) -> Self {
        Self {
            path: path.into(),
            writer: Some(Box::new(writer)),
            hasher: Sha256::new(),
            bytes_written: 0,
        }
    }

    /// Synchronously append the frame. A failed write leaves the frame out
    /// of the file and the checksum.
    pub fn deliver(&mut self, frame: AudioFrame) -> Result<(), SinkError> {
        let writer = self.writer.as_mut().ok_or(SinkError::Closed)?;
        writer
            .write_all(&frame.data)
            .map_err(|e| SinkError::Io(format!("write failed: {}", e)))?;
        self.hasher.update(&frame.data);
        self.bytes_written += frame.data.len() as u64;
        Ok(())
    }

    /// Flush and close the file. The handle is released even if the flush fails.
    pub fn finish(&mut self) -> Result<FileSummary, SinkError> {
        let mut writer = self.writer.take().ok_or(SinkError::Closed)?;
        let flushed = writer
            .flush()
            .map_err(|e| SinkError::Io(format!("flush failed: {}", e)));
        drop(writer);
        flushed?;

        let checksum = hex_encode(&std::mem::take(&mut self.hasher).finalize());
        Ok(FileSummary {
            path: self.path.clone(),
            bytes_written: self.bytes_written,
            checksum,
        })
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        self.writer.is_some()
    }
}

impl std::fmt::Debug for FileSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSink")
            .field("path", &self.path)
            .field("bytes_written", &self.bytes_written)
            .field("open", &self.is_open())
            .finish()
    }
}

/// `File` whose flush also syncs data to disk, so `finish` means durable.
struct SyncOnFlush(File);

impl Write for SyncOnFlush {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.0.flush()?;
        self.0.sync_data()
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FlakyWriter;

    fn temp_file_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("mic_capture_test_{}_{}", uuid::Uuid::new_v4(), name))
    }

    #[test]
    fn writes_raw_pcm_without_header() {
        let path = temp_file_path("raw.pcm");
        let mut sink = FileSink::create(&path).unwrap();

        sink.deliver(AudioFrame::new(0, vec![0x01, 0x00, 0xFF, 0x7F])).unwrap();
        sink.deliver(AudioFrame::new(1, vec![0x00, 0x80])).unwrap();
        let summary = sink.finish().unwrap();

        let data = fs::read(&path).unwrap();
        assert_eq!(data, vec![0x01, 0x00, 0xFF, 0x7F, 0x00, 0x80]);
        assert_eq!(summary.bytes_written, 6);
        assert_eq!(summary.checksum, hex_encode(&Sha256::digest(&data)));
        assert!(!sink.is_open());

        fs::remove_file(&path).ok();
    }

    #[test]
    fn create_truncates_existing_file_and_makes_dirs() {
        let dir = temp_file_path("nested");
        let path = dir.join("session.pcm");
        fs::create_dir_all(&dir).unwrap();
        fs::write(&path, vec![9u8; 64]).unwrap();

        let mut sink = FileSink::create(&path).unwrap();
        sink.deliver(AudioFrame::new(0, vec![1, 2])).unwrap();
        sink.finish().unwrap();

        assert_eq!(fs::read(&path).unwrap(), vec![1, 2]);
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn failed_write_is_reported_and_excluded() {
        let writer = FlakyWriter::failing_writes(&[1]);
        let written = writer.contents();
        let mut sink = FileSink::with_writer("memory.pcm", writer);

        assert!(sink.deliver(AudioFrame::new(0, vec![1, 1])).is_ok());
        assert!(matches!(sink.deliver(AudioFrame::new(1, vec![2, 2])), Err(SinkError::Io(_))));
        assert!(sink.deliver(AudioFrame::new(2, vec![3, 3])).is_ok());

        let summary = sink.finish().unwrap();
        assert_eq!(*written.lock(), vec![1, 1, 3, 3]);
        assert_eq!(summary.bytes_written, 4);
    }

    #[test]
    fn deliver_after_finish_is_closed() {
        let mut sink = FileSink::with_writer("memory.pcm", Vec::new());
        sink.finish().unwrap();
        assert_eq!(sink.deliver(AudioFrame::new(0, vec![0, 0])), Err(SinkError::Closed));
        assert_eq!(sink.finish(), Err(SinkError::Closed));
    }
}
