//! Per-session binary file of power-band samples.
//!
//! Each record is 52 bytes, little-endian, no header:
//!
//! | Bytes | Field |
//! |---|---|
//! | 0–7 | timestamp, f64 seconds since the Unix epoch |
//! | 8–39 | delta … midgamma, 8 × u32 |
//! | 40–43 | last poor-signal value, u32 |
//! | 44–47 | last meditation value, u32 |
//! | 48–51 | last attention value, u32 |
//!
//! Records are written with bincode's fixed-width little-endian encoding, so
//! the layout above is exactly what lands on disk.
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use fs2::FileExt;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use super::BandSample;
use crate::protocol::errors::SampleFileError;

/// Size of one encoded [`SampleRecord`].
pub const RECORD_LEN: usize = 52;

/// File extension used for session files.
pub const SAMPLE_EXT: &str = "freq";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampleRecord {
    pub timestamp: f64,
    pub bands: [u32; 8],
    pub poor_signal: u32,
    pub meditation: u32,
    pub attention: u32,
}

impl From<&BandSample> for SampleRecord {
    fn from(sample: &BandSample) -> Self {
        SampleRecord {
            timestamp: sample.timestamp,
            bands: sample.bands.as_array(),
            poor_signal: sample.snapshot.poor_signal as u32,
            meditation: sample.snapshot.meditation as u32,
            attention: sample.snapshot.attention as u32,
        }
    }
}

/// Path of the session file for a session started at `started`.
pub fn session_file_path(dir: &Path, started: DateTime<Utc>) -> PathBuf {
    dir.join(format!("{}.{}", started.timestamp(), SAMPLE_EXT))
}

/// Appends records to a session file. The file stays exclusively locked until
/// the writer is dropped, which also flushes it.
pub struct SampleWriter {
    path: PathBuf,
    out: BufWriter<File>,
    written: u64,
}

impl SampleWriter {
    /// Create (or append to) `<dir>/<unix-seconds>.freq`.
    pub fn create_in(dir: &Path, started: DateTime<Utc>) -> Result<Self, SampleFileError> {
        fs::create_dir_all(dir)?;
        Self::open(&session_file_path(dir, started))
    }

    pub fn open(path: &Path) -> Result<Self, SampleFileError> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        if file.try_lock_exclusive().is_err() {
            return Err(SampleFileError::Locked(path.display().to_string()));
        }
        debug!("Opened sample file {}", path.display());
        Ok(Self {
            path: path.to_path_buf(),
            out: BufWriter::new(file),
            written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn append(&mut self, record: &SampleRecord) -> Result<(), SampleFileError> {
        bincode::serialize_into(&mut self.out, record)?;
        self.written += 1;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), SampleFileError> {
        self.out.flush()?;
        Ok(())
    }
}

impl Drop for SampleWriter {
    fn drop(&mut self) {
        if let Err(e) = self.out.flush() {
            warn!("Failed to flush sample file {}: {}", self.path.display(), e);
        }
        let _ = self.out.get_ref().unlock();
        debug!(
            "Closed sample file {} ({} records)",
            self.path.display(),
            self.written
        );
    }
}

/// Reads records back from a session file.
pub struct SampleReader<R> {
    inner: R,
}

impl SampleReader<BufReader<File>> {
    pub fn open(path: &Path) -> Result<Self, SampleFileError> {
        Ok(Self::new(BufReader::new(File::open(path)?)))
    }
}

impl<R: Read> SampleReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    /// Next record, `Ok(None)` at a clean end of file.
    pub fn next_record(&mut self) -> Result<Option<SampleRecord>, SampleFileError> {
        let mut buf = [0u8; RECORD_LEN];
        let mut filled = 0;
        while filled < RECORD_LEN {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        match filled {
            0 => Ok(None),
            RECORD_LEN => Ok(Some(bincode::deserialize(&buf)?)),
            n => Err(SampleFileError::Truncated(n)),
        }
    }
}

impl<R: Read> Iterator for SampleReader<R> {
    type Item = Result<SampleRecord, SampleFileError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}
