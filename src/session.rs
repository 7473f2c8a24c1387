//! Decode loop tying a byte source to an event sink.
//!
//! ```text
//! ByteSource -> PacketReader -> decode_payload -> DeviceState + EventSink
//! ```
//!
//! Everything runs on the calling thread. Records go to the sink in payload
//! order and packets in stream order; if the sink blocks, decoding blocks.
use log::{info, trace};

use crate::config::DecoderConfig;
use crate::emitter::{BandSample, EventSink};
use crate::metrics;
use crate::protocol::errors::{EmitError, SessionError, TransportError};
use crate::protocol::framer::PacketReader;
use crate::protocol::payload::{decode_payload_counted, DataRecord};
use crate::protocol::source::ByteSource;
use crate::protocol::state::{DeviceState, Snapshot};
use crate::protocol::Packet;

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    EndOfStream,
    Closed,
    TransportFailed,
    SinkFailed,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionSummary {
    pub reason: EndReason,
    /// Counts from this session only, independent of the process-wide statics.
    pub counters: metrics::Snapshot,
    pub state: Snapshot,
}

/// Seconds since the Unix epoch, from the wall clock.
pub fn epoch_seconds() -> f64 {
    let now = chrono::Utc::now();
    now.timestamp() as f64 + f64::from(now.timestamp_subsec_nanos()) / 1e9
}

pub struct Session<S, E> {
    reader: PacketReader<S>,
    sink: E,
    state: DeviceState,
    clock: fn() -> f64,
    counts: metrics::Snapshot,
}

impl<S: ByteSource, E: EventSink> Session<S, E> {
    pub fn new(source: S, sink: E, decoder: &DecoderConfig) -> Self {
        Self {
            reader: PacketReader::new(source, decoder.checksum),
            sink,
            state: DeviceState::with_good_signal_recording(decoder.record_good_signal),
            clock: epoch_seconds,
            counts: metrics::Snapshot::default(),
        }
    }

    /// Replace the timestamp source for band samples.
    pub fn with_clock(mut self, clock: fn() -> f64) -> Self {
        self.clock = clock;
        self
    }

    pub fn state(&self) -> Snapshot {
        self.state.snapshot()
    }

    /// Framing and decoding counts accumulated by this session so far.
    pub fn counters(&self) -> metrics::Snapshot {
        let mut counts = self.reader.counters();
        counts += self.counts;
        counts
    }

    pub fn sink(&self) -> &E {
        &self.sink
    }

    pub fn into_parts(self) -> (S, E) {
        (self.reader.into_source(), self.sink)
    }

    /// Decode one packet, update state and emit its records.
    pub fn process_packet(&mut self, packet: &Packet) -> Result<Vec<DataRecord>, EmitError> {
        let records = decode_payload_counted(&packet.payload, &mut self.counts);
        for record in &records {
            self.emit(record)?;
        }
        Ok(records)
    }

    fn emit(&mut self, record: &DataRecord) -> Result<(), EmitError> {
        match record {
            DataRecord::ScalarMetric { kind, value } => {
                let applied = self.state.observe(*kind, *value);
                self.sink.metric(*kind, *value, applied)
            }
            DataRecord::PowerBands(bands) => {
                metrics::inc_band_samples();
                self.counts.band_samples += 1;
                let sample = BandSample {
                    timestamp: (self.clock)(),
                    bands: *bands,
                    snapshot: self.state.snapshot(),
                };
                self.sink.power_bands(&sample)
            }
            DataRecord::DeviceStatus { kind, detail } => self.sink.status(*kind, detail.as_deref()),
            DataRecord::Unknown { code, bytes } => self.sink.unknown(*code, bytes),
            DataRecord::RawSample(raw) => {
                trace!("Raw sample {:?} not forwarded", raw.value());
                Ok(())
            }
        }
    }

    fn finish(&self, reason: EndReason) -> SessionSummary {
        let summary = SessionSummary {
            reason,
            counters: self.counters(),
            state: self.state.snapshot(),
        };
        info!(
            "Session ended ({:?}): {} packets, {} malformed, {} truncated, {} band samples",
            reason,
            summary.counters.packets,
            summary.counters.malformed(),
            summary.counters.truncated_payloads,
            summary.counters.band_samples
        );
        summary
    }

    /// Run until the source ends. End of stream and shutdown are reported as
    /// `Ok`; IO failures and sink errors as `Err`, with the summary attached.
    pub fn run(&mut self) -> Result<SessionSummary, SessionError> {
        loop {
            let packet = match self.reader.next_packet() {
                Ok(p) => p,
                Err(TransportError::EndOfStream) => return Ok(self.finish(EndReason::EndOfStream)),
                Err(TransportError::Closed) => return Ok(self.finish(EndReason::Closed)),
                Err(source) => {
                    return Err(SessionError::Transport {
                        source,
                        summary: self.finish(EndReason::TransportFailed),
                    })
                }
            };
            if let Err(source) = self.process_packet(&packet) {
                return Err(SessionError::Emit {
                    source,
                    summary: self.finish(EndReason::SinkFailed),
                });
            }
        }
    }
}
