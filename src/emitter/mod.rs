//! # Event Emitter
//!
//! Decoded records leave the pipeline through an [`EventSink`]. The session
//! calls one method per record, in payload order, and blocks while the sink
//! works.
//!
//! - [`LogSink`] writes one log line per event.
//! - [`SampleFileSink`] additionally appends every power-band sample to the
//!   session's `.freq` file (see [`sample_file`]).
//!
//! Raw EEG samples are never handed to sinks.
use log::{debug, info};

use crate::logutil::hex_snippet;
use crate::protocol::bands::PowerBands;
use crate::protocol::errors::EmitError;
use crate::protocol::payload::{MetricKind, StatusKind};
use crate::protocol::state::Snapshot;

pub mod sample_file;

use sample_file::{SampleRecord, SampleWriter};

/// A power-band vector together with the scalar state at the time it arrived.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandSample {
    /// Seconds since the Unix epoch.
    pub timestamp: f64,
    pub bands: PowerBands,
    pub snapshot: Snapshot,
}

pub trait EventSink {
    fn power_bands(&mut self, sample: &BandSample) -> Result<(), EmitError>;

    /// `applied` is false when the value did not change device state
    /// (a zero poor-signal reading).
    fn metric(&mut self, kind: MetricKind, value: u8, applied: bool) -> Result<(), EmitError>;

    fn status(&mut self, kind: StatusKind, detail: Option<&[u8]>) -> Result<(), EmitError>;

    fn unknown(&mut self, _code: u8, _bytes: &[u8]) -> Result<(), EmitError> {
        Ok(())
    }
}

impl<E: EventSink + ?Sized> EventSink for Box<E> {
    fn power_bands(&mut self, sample: &BandSample) -> Result<(), EmitError> {
        (**self).power_bands(sample)
    }
    fn metric(&mut self, kind: MetricKind, value: u8, applied: bool) -> Result<(), EmitError> {
        (**self).metric(kind, value, applied)
    }
    fn status(&mut self, kind: StatusKind, detail: Option<&[u8]>) -> Result<(), EmitError> {
        (**self).status(kind, detail)
    }
    fn unknown(&mut self, code: u8, bytes: &[u8]) -> Result<(), EmitError> {
        (**self).unknown(code, bytes)
    }
}

/// Human-readable log lines through the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl EventSink for LogSink {
    fn power_bands(&mut self, sample: &BandSample) -> Result<(), EmitError> {
        let b = &sample.bands;
        info!(
            "POWER_BANDS delta={} theta={} lowalpha={} highalpha={} lowbeta={} highbeta={} lowgamma={} midgamma={}",
            b.delta, b.theta, b.lowalpha, b.highalpha, b.lowbeta, b.highbeta, b.lowgamma, b.midgamma
        );
        Ok(())
    }

    fn metric(&mut self, kind: MetricKind, value: u8, applied: bool) -> Result<(), EmitError> {
        if applied {
            info!("{} {}", kind.label(), value);
        } else {
            debug!("{} {} (state unchanged)", kind.label(), value);
        }
        Ok(())
    }

    fn status(&mut self, kind: StatusKind, detail: Option<&[u8]>) -> Result<(), EmitError> {
        match detail {
            Some(d) if !d.is_empty() => info!("{} {}", kind.label(), hex_snippet(d, 16)),
            _ => info!("{}", kind.label()),
        }
        Ok(())
    }

    fn unknown(&mut self, code: u8, bytes: &[u8]) -> Result<(), EmitError> {
        debug!("Unknown code {:02x}: {}", code, hex_snippet(bytes, 32));
        Ok(())
    }
}

/// Logs like [`LogSink`] and persists power-band samples.
pub struct SampleFileSink {
    log: LogSink,
    writer: SampleWriter,
}

impl SampleFileSink {
    pub fn new(writer: SampleWriter) -> Self {
        Self {
            log: LogSink,
            writer,
        }
    }

    pub fn writer(&self) -> &SampleWriter {
        &self.writer
    }

    pub fn into_writer(self) -> SampleWriter {
        self.writer
    }
}

impl EventSink for SampleFileSink {
    fn power_bands(&mut self, sample: &BandSample) -> Result<(), EmitError> {
        self.log.power_bands(sample)?;
        self.writer.append(&SampleRecord::from(sample))?;
        Ok(())
    }

    fn metric(&mut self, kind: MetricKind, value: u8, applied: bool) -> Result<(), EmitError> {
        self.log.metric(kind, value, applied)
    }

    fn status(&mut self, kind: StatusKind, detail: Option<&[u8]>) -> Result<(), EmitError> {
        self.log.status(kind, detail)
    }

    fn unknown(&mut self, code: u8, bytes: &[u8]) -> Result<(), EmitError> {
        self.log.unknown(code, bytes)
    }
}
