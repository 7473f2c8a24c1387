//! # ThinkGear Protocol Module
//!
//! Decoding for the ThinkGear serial protocol spoken by NeuroSky EEG headsets
//! (MindWave, MindSet). The link carries a continuous byte stream:
//!
//! ```text
//! [0xAA 0xAA] [plength] [payload: plength bytes] [checksum]
//! ```
//!
//! The payload is itself a run of data rows:
//!
//! ```text
//! [0x55]* [code] [value]                 code <  0x80
//! [0x55]* [code] [vlen] [value: vlen]    code >= 0x80
//! ```
//!
//! ## Pipeline
//!
//! - [`source`] - byte sources ([`source::ByteSource`]) over readers and ports
//! - [`framer`] - sync search, length resolution, checksum ([`framer::PacketReader`])
//! - [`payload`] - data rows and typed [`payload::DataRecord`]s
//! - [`bands`] - the 24-byte power-band block
//! - [`state`] - last-seen scalar metrics ([`state::DeviceState`])
//! - `serial` - headset dongle transport (`serial` feature)
//!
//! ## Example
//!
//! ```rust
//! use thinkgear::protocol::{framer::PacketReader, payload::decode_payload, ChecksumPolicy, Packet};
//! use thinkgear::protocol::source::ReaderSource;
//!
//! let wire = Packet::from_payload(vec![0x04u8, 0x32]).encode().unwrap();
//! let mut reader = PacketReader::new(ReaderSource::new(&wire[..]), ChecksumPolicy::Strict);
//! let packet = reader.next_packet().unwrap();
//! assert_eq!(decode_payload(&packet.payload).len(), 1);
//! ```

use bytes::Bytes;
use serde::{Deserialize, Serialize};

pub mod bands;
pub mod errors;
pub mod framer;
pub mod payload;
#[cfg(feature = "serial")]
pub mod serial;
pub mod source;
pub mod state;

/// Byte codes of the ThinkGear protocol.
pub mod codes {
    /// Sync marker, sent doubled at the start of every packet.
    pub const SYNC: u8 = 0xAA;
    /// Extended-code prefix.
    pub const EXCODE: u8 = 0x55;

    pub const POOR_SIGNAL: u8 = 0x02;
    pub const ATTENTION: u8 = 0x04;
    pub const MEDITATION: u8 = 0x05;
    pub const BLINK: u8 = 0x16;

    pub const RAW_VALUE: u8 = 0x80;
    pub const POWER_BANDS: u8 = 0x83;
    pub const HEADSET_CONNECTED: u8 = 0xD0;
    pub const HEADSET_NOT_FOUND: u8 = 0xD1;
    pub const HEADSET_DISCONNECTED: u8 = 0xD2;
    pub const REQUEST_DENIED: u8 = 0xD3;
    pub const STANDBY_SCAN: u8 = 0xD4;

    /// First code of the multi-byte range.
    pub const MULTI_BYTE_START: u8 = 0x80;

    /// Host to dongle commands.
    pub const CMD_CONNECT: u8 = 0xC0;
    pub const CMD_DISCONNECT: u8 = 0xC1;
    pub const CMD_AUTOCONNECT: u8 = 0xC2;
}

/// Largest legal payload length. 170 itself is the sync placeholder, so a
/// length byte equal to it is skipped and anything above it is malformed.
pub const MAX_PLENGTH: u8 = 170;

/// How the frame extractor treats a checksum that does not match the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumPolicy {
    /// Discard the packet and resynchronise.
    #[default]
    Strict,
    /// Hand the packet on anyway (the checksum is only counted and logged).
    Permissive,
}

/// One framed packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub payload: Bytes,
    pub checksum: u8,
}

impl Packet {
    pub fn new(payload: impl Into<Bytes>, checksum: u8) -> Self {
        Self {
            payload: payload.into(),
            checksum,
        }
    }

    /// Build a packet carrying the correct checksum for `payload`.
    pub fn from_payload(payload: impl Into<Bytes>) -> Self {
        let payload = payload.into();
        let checksum = Self::expected_checksum(&payload);
        Self { payload, checksum }
    }

    /// Ones' complement of the low byte of the payload sum.
    pub fn expected_checksum(payload: &[u8]) -> u8 {
        !payload.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
    }

    pub fn is_valid(&self) -> bool {
        self.checksum == Self::expected_checksum(&self.payload)
    }

    /// Render the full wire frame. Returns `None` when the payload is too long
    /// to be expressed by a single length byte.
    pub fn encode(&self) -> Option<Vec<u8>> {
        if self.payload.len() >= MAX_PLENGTH as usize {
            return None;
        }
        let mut out = Vec::with_capacity(self.payload.len() + 4);
        out.push(codes::SYNC);
        out.push(codes::SYNC);
        out.push(self.payload.len() as u8);
        out.extend_from_slice(&self.payload);
        out.push(self.checksum);
        Some(out)
    }
}
