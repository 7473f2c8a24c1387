//! Test utilities & fixtures.
//! Wire-frame builders and a sink that remembers what it was given.
#![allow(dead_code)]

use thinkgear::emitter::{BandSample, EventSink};
use thinkgear::protocol::errors::EmitError;
use thinkgear::protocol::payload::{MetricKind, StatusKind};
use thinkgear::protocol::Packet;

/// Full wire frame for `payload` with a correct checksum.
pub fn frame(payload: &[u8]) -> Vec<u8> {
    Packet::from_payload(payload.to_vec())
        .encode()
        .expect("payload fits in one packet")
}

/// Power-band row (code 0x83) carrying `values`.
pub fn bands_row(values: [u32; 8]) -> Vec<u8> {
    let mut row = vec![0x83, 24];
    for v in values {
        row.extend_from_slice(&v.to_be_bytes()[1..]);
    }
    row
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Bands(BandSample),
    Metric(MetricKind, u8, bool),
    Status(StatusKind, Option<Vec<u8>>),
    Unknown(u8, Vec<u8>),
}

#[derive(Debug, Default)]
pub struct RecordingSink {
    pub events: Vec<Event>,
}

impl EventSink for RecordingSink {
    fn power_bands(&mut self, sample: &BandSample) -> Result<(), EmitError> {
        self.events.push(Event::Bands(*sample));
        Ok(())
    }

    fn metric(&mut self, kind: MetricKind, value: u8, applied: bool) -> Result<(), EmitError> {
        self.events.push(Event::Metric(kind, value, applied));
        Ok(())
    }

    fn status(&mut self, kind: StatusKind, detail: Option<&[u8]>) -> Result<(), EmitError> {
        self.events.push(Event::Status(kind, detail.map(|d| d.to_vec())));
        Ok(())
    }

    fn unknown(&mut self, code: u8, bytes: &[u8]) -> Result<(), EmitError> {
        self.events.push(Event::Unknown(code, bytes.to_vec()));
        Ok(())
    }
}
