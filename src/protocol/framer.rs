//! Packet framing for the ThinkGear byte stream.
//!
//! Packets on the wire look like:
//!
//!   `0xAA 0xAA <plength> <payload: plength bytes> <checksum>`
//!
//! [`FrameExtractor`] is a byte-at-a-time state machine; [`PacketReader`] pulls
//! bytes from a [`ByteSource`] and runs them through it. Malformed candidates
//! (oversize length, bad checksum under [`ChecksumPolicy::Strict`]) are dropped
//! and the search for the next sync marker starts at the following byte.
//! Payload bytes are never rescanned, so `0xAA 0xAA` inside a payload cannot
//! start a new frame.
use bytes::BytesMut;
use log::{debug, trace};

use super::codes::SYNC;
use super::errors::TransportError;
use super::source::ByteSource;
use super::{ChecksumPolicy, Packet, MAX_PLENGTH};
use crate::logutil::hex_snippet;
use crate::metrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    SeekSync1,
    SeekSync2,
    ReadLength,
    ReadPayload,
    ReadChecksum,
}

/// Why a framed candidate was thrown away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameReject {
    /// Length byte above 170.
    LengthOutOfRange(u8),
    ChecksumMismatch { expected: u8, found: u8 },
}

/// Incremental ThinkGear framer.
#[derive(Debug)]
pub struct FrameExtractor {
    state: FrameState,
    policy: ChecksumPolicy,
    expected_len: usize,
    payload: BytesMut,
}

impl FrameExtractor {
    pub fn new(policy: ChecksumPolicy) -> Self {
        Self {
            state: FrameState::SeekSync1,
            policy,
            expected_len: 0,
            payload: BytesMut::with_capacity(MAX_PLENGTH as usize),
        }
    }

    pub fn state(&self) -> FrameState {
        self.state
    }

    pub fn policy(&self) -> ChecksumPolicy {
        self.policy
    }

    /// Feed one byte. Returns `Some` when the byte completes (or kills) a packet.
    pub fn push(&mut self, byte: u8) -> Option<Result<Packet, FrameReject>> {
        match self.state {
            FrameState::SeekSync1 => {
                if byte == SYNC {
                    self.state = FrameState::SeekSync2;
                }
                None
            }
            FrameState::SeekSync2 => {
                self.state = if byte == SYNC {
                    FrameState::ReadLength
                } else {
                    FrameState::SeekSync1
                };
                None
            }
            FrameState::ReadLength => {
                if byte == SYNC {
                    // Placeholder, the real length follows.
                    return None;
                }
                if byte > MAX_PLENGTH {
                    self.state = FrameState::SeekSync1;
                    return Some(Err(FrameReject::LengthOutOfRange(byte)));
                }
                self.expected_len = byte as usize;
                self.payload.clear();
                self.state = if self.expected_len == 0 {
                    FrameState::ReadChecksum
                } else {
                    FrameState::ReadPayload
                };
                None
            }
            FrameState::ReadPayload => {
                self.payload.extend_from_slice(&[byte]);
                if self.payload.len() == self.expected_len {
                    self.state = FrameState::ReadChecksum;
                }
                None
            }
            FrameState::ReadChecksum => {
                self.state = FrameState::SeekSync1;
                let payload = self.payload.split().freeze();
                let packet = Packet::new(payload, byte);
                if packet.is_valid() {
                    return Some(Ok(packet));
                }
                let expected = Packet::expected_checksum(&packet.payload);
                match self.policy {
                    ChecksumPolicy::Strict => Some(Err(FrameReject::ChecksumMismatch {
                        expected,
                        found: byte,
                    })),
                    ChecksumPolicy::Permissive => {
                        metrics::inc_checksum_mismatches_passed();
                        debug!(
                            "Checksum mismatch passed through (expected {:02x}, found {:02x})",
                            expected, byte
                        );
                        Some(Ok(packet))
                    }
                }
            }
        }
    }
}

/// Pulls packets out of a [`ByteSource`].
pub struct PacketReader<S> {
    source: S,
    extractor: FrameExtractor,
    counts: metrics::Snapshot,
}

impl<S: ByteSource> PacketReader<S> {
    pub fn new(source: S, policy: ChecksumPolicy) -> Self {
        Self {
            source,
            extractor: FrameExtractor::new(policy),
            counts: metrics::Snapshot::default(),
        }
    }

    /// Framing counts for this reader alone (packets, rejects, passed mismatches).
    pub fn counters(&self) -> metrics::Snapshot {
        self.counts
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn into_source(self) -> S {
        self.source
    }

    /// Block until the next acceptable packet is framed.
    ///
    /// Timeouts from the source leave the extractor where it was, so a packet
    /// split across several reads still frames. Any transport error ends the stream.
    pub fn next_packet(&mut self) -> Result<Packet, TransportError> {
        loop {
            let Some(byte) = self.source.read_byte()? else {
                continue;
            };
            match self.extractor.push(byte) {
                None => {}
                Some(Ok(packet)) => {
                    metrics::inc_packets();
                    self.counts.packets += 1;
                    if !packet.is_valid() {
                        self.counts.checksum_mismatches_passed += 1;
                    }
                    trace!(
                        "Framed packet {} bytes: {}",
                        packet.payload.len(),
                        hex_snippet(&packet.payload, 32)
                    );
                    return Ok(packet);
                }
                Some(Err(FrameReject::LengthOutOfRange(len))) => {
                    metrics::inc_length_rejects();
                    self.counts.length_rejects += 1;
                    debug!("Discarding frame with invalid length {}", len);
                }
                Some(Err(FrameReject::ChecksumMismatch { expected, found })) => {
                    metrics::inc_checksum_rejects();
                    self.counts.checksum_rejects += 1;
                    debug!(
                        "Discarding frame with bad checksum (expected {:02x}, found {:02x})",
                        expected, found
                    );
                }
            }
        }
    }
}

impl<S: ByteSource> Iterator for PacketReader<S> {
    type Item = Packet;

    /// Yields packets until the source fails or ends. Use [`PacketReader::next_packet`]
    /// to see why the stream stopped.
    fn next(&mut self) -> Option<Packet> {
        self.next_packet().ok()
    }
}
