//! Payload rows and typed records.
//!
//! A payload is a run of rows. Each row is any number of `0x55` escape bytes,
//! a code byte, then either one value byte (code < 0x80) or a length byte
//! followed by that many value bytes (code >= 0x80). [`PayloadRows`] splits a
//! payload into [`DataRow`]s; [`DataRecord::from_row`] interprets them.
//!
//! When the bytes left are too few for the row being read, decoding of the
//! packet stops there and the rest is discarded. That is not an error.
use log::{debug, trace};

use super::bands::PowerBands;
use super::codes;
use crate::logutil::hex_snippet;
use crate::metrics;

/// One undecoded row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataRow<'a> {
    /// Number of escape bytes seen before the code. Carried for newer code
    /// tables; no current code depends on it.
    pub excode: usize,
    pub code: u8,
    pub value: &'a [u8],
}

/// Iterator over the rows of one payload.
#[derive(Debug, Clone)]
pub struct PayloadRows<'a> {
    rest: &'a [u8],
    truncated: bool,
}

impl<'a> PayloadRows<'a> {
    pub fn new(payload: &'a [u8]) -> Self {
        Self {
            rest: payload,
            truncated: false,
        }
    }

    /// True once iteration stopped on a row that did not fit.
    pub fn truncated(&self) -> bool {
        self.truncated
    }

    fn stop(&mut self) -> Option<DataRow<'a>> {
        self.truncated = true;
        self.rest = &[];
        None
    }
}

impl<'a> Iterator for PayloadRows<'a> {
    type Item = DataRow<'a>;

    fn next(&mut self) -> Option<DataRow<'a>> {
        if self.rest.is_empty() {
            return None;
        }
        let buf = self.rest;
        let mut i = 0;
        let mut excode = 0;
        let code = loop {
            let Some(&b) = buf.get(i) else {
                return self.stop();
            };
            i += 1;
            if b != codes::EXCODE {
                break b;
            }
            excode += 1;
        };

        let value = if code < codes::MULTI_BYTE_START {
            let Some(v) = buf.get(i..i + 1) else {
                return self.stop();
            };
            i += 1;
            v
        } else {
            let Some(&vlen) = buf.get(i) else {
                return self.stop();
            };
            i += 1;
            let end = i + vlen as usize;
            let Some(v) = buf.get(i..end) else {
                return self.stop();
            };
            i = end;
            v
        };

        self.rest = &buf[i..];
        Some(DataRow {
            excode,
            code,
            value,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKind {
    PoorSignal,
    Attention,
    Meditation,
    Blink,
}

impl MetricKind {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            codes::POOR_SIGNAL => Some(MetricKind::PoorSignal),
            codes::ATTENTION => Some(MetricKind::Attention),
            codes::MEDITATION => Some(MetricKind::Meditation),
            codes::BLINK => Some(MetricKind::Blink),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MetricKind::PoorSignal => "POOR_SIGNAL",
            MetricKind::Attention => "ATTENTION",
            MetricKind::Meditation => "MEDITATION",
            MetricKind::Blink => "BLINK",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusKind {
    Connected,
    NotFound,
    Disconnected,
    RequestDenied,
    Scanning,
    Standby,
}

impl StatusKind {
    pub fn label(&self) -> &'static str {
        match self {
            StatusKind::Connected => "HEADSET_CONNECTED",
            StatusKind::NotFound => "HEADSET_NOT_FOUND",
            StatusKind::Disconnected => "HEADSET_DISCONNECTED",
            StatusKind::RequestDenied => "REQUEST_DENIED",
            StatusKind::Scanning => "STATUS_SCANNING",
            StatusKind::Standby => "STATUS_STANDBY",
        }
    }
}

/// Raw EEG sample (code `0x80`). Decoded but not forwarded to sinks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSample {
    pub length: u8,
    pub bytes: Vec<u8>,
}

impl RawSample {
    /// The usual 2-byte sample as a signed big-endian value.
    pub fn value(&self) -> Option<i16> {
        match self.bytes.as_slice() {
            [hi, lo] => Some(i16::from_be_bytes([*hi, *lo])),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataRecord {
    ScalarMetric {
        kind: MetricKind,
        value: u8,
    },
    RawSample(RawSample),
    PowerBands(PowerBands),
    DeviceStatus {
        kind: StatusKind,
        detail: Option<Vec<u8>>,
    },
    Unknown {
        code: u8,
        bytes: Vec<u8>,
    },
}

impl DataRecord {
    /// Interpret one row. `None` means the row is dropped: an unrecognised
    /// single-byte code, a single-byte code without exactly one value byte,
    /// or a power-band block of the wrong width.
    pub fn from_row(row: &DataRow<'_>) -> Option<DataRecord> {
        if row.code < codes::MULTI_BYTE_START {
            let kind = MetricKind::from_code(row.code)?;
            let [value] = row.value else {
                return None;
            };
            return Some(DataRecord::ScalarMetric { kind, value: *value });
        }
        let status = |kind| DataRecord::DeviceStatus {
            kind,
            detail: Some(row.value.to_vec()),
        };
        let record = match row.code {
            codes::POWER_BANDS => DataRecord::PowerBands(PowerBands::decode(row.value).ok()?),
            codes::RAW_VALUE => DataRecord::RawSample(RawSample {
                length: row.value.len() as u8,
                bytes: row.value.to_vec(),
            }),
            codes::HEADSET_CONNECTED => status(StatusKind::Connected),
            codes::HEADSET_NOT_FOUND => status(StatusKind::NotFound),
            codes::HEADSET_DISCONNECTED => status(StatusKind::Disconnected),
            codes::REQUEST_DENIED => status(StatusKind::RequestDenied),
            codes::STANDBY_SCAN => {
                let kind = match row.value.first() {
                    Some(b) if *b != 0 => StatusKind::Scanning,
                    _ => StatusKind::Standby,
                };
                DataRecord::DeviceStatus { kind, detail: None }
            }
            code => DataRecord::Unknown {
                code,
                bytes: row.value.to_vec(),
            },
        };
        Some(record)
    }
}

/// Decode every record of a payload, in order.
pub fn decode_payload(payload: &[u8]) -> Vec<DataRecord> {
    decode_payload_counted(payload, &mut metrics::Snapshot::default())
}

/// [`decode_payload`], also adding unknown, dropped and truncation counts to `counts`.
pub fn decode_payload_counted(payload: &[u8], counts: &mut metrics::Snapshot) -> Vec<DataRecord> {
    let mut rows = PayloadRows::new(payload);
    let mut records = Vec::new();
    for row in rows.by_ref() {
        if row.excode > 0 {
            trace!("Row {:02x} carries {} escape byte(s)", row.code, row.excode);
        }
        match DataRecord::from_row(&row) {
            Some(record) => {
                if matches!(record, DataRecord::Unknown { .. }) {
                    metrics::inc_unknown_records();
                    counts.unknown_records += 1;
                }
                records.push(record);
            }
            None => {
                metrics::inc_dropped_records();
                counts.dropped_records += 1;
                trace!(
                    "Dropped row code {:02x} value {}",
                    row.code,
                    hex_snippet(row.value, 24)
                );
            }
        }
    }
    if rows.truncated() {
        metrics::inc_truncated_payloads();
        counts.truncated_payloads += 1;
        debug!(
            "Payload truncated after {} record(s): {}",
            records.len(),
            hex_snippet(payload, 32)
        );
    }
    records
}
