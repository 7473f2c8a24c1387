//! Process-wide decoder counters.
//! Cheap relaxed atomics bumped from the decode path; read via [`snapshot`].
//! The same [`Snapshot`] struct doubles as the per-session tally kept by
//! [`PacketReader`](crate::protocol::framer::PacketReader) and
//! [`Session`](crate::session::Session).
use std::ops::AddAssign;
use std::sync::atomic::{AtomicU64, Ordering};

static PACKETS: AtomicU64 = AtomicU64::new(0);
static LENGTH_REJECTS: AtomicU64 = AtomicU64::new(0);
static CHECKSUM_REJECTS: AtomicU64 = AtomicU64::new(0);
static CHECKSUM_MISMATCHES_PASSED: AtomicU64 = AtomicU64::new(0);
static TRUNCATED_PAYLOADS: AtomicU64 = AtomicU64::new(0);
static UNKNOWN_RECORDS: AtomicU64 = AtomicU64::new(0);
static DROPPED_RECORDS: AtomicU64 = AtomicU64::new(0);
static BAND_SAMPLES: AtomicU64 = AtomicU64::new(0);

pub fn inc_packets() {
    PACKETS.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_length_rejects() {
    LENGTH_REJECTS.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_checksum_rejects() {
    CHECKSUM_REJECTS.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_checksum_mismatches_passed() {
    CHECKSUM_MISMATCHES_PASSED.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_truncated_payloads() {
    TRUNCATED_PAYLOADS.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_unknown_records() {
    UNKNOWN_RECORDS.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_dropped_records() {
    DROPPED_RECORDS.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_band_samples() {
    BAND_SAMPLES.fetch_add(1, Ordering::Relaxed);
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    pub packets: u64,
    pub length_rejects: u64,
    pub checksum_rejects: u64,
    pub checksum_mismatches_passed: u64,
    pub truncated_payloads: u64,
    pub unknown_records: u64,
    pub dropped_records: u64,
    pub band_samples: u64,
}

impl Snapshot {
    /// Counter deltas accumulated since `earlier` was taken.
    pub fn since(&self, earlier: &Snapshot) -> Snapshot {
        Snapshot {
            packets: self.packets.saturating_sub(earlier.packets),
            length_rejects: self.length_rejects.saturating_sub(earlier.length_rejects),
            checksum_rejects: self.checksum_rejects.saturating_sub(earlier.checksum_rejects),
            checksum_mismatches_passed: self
                .checksum_mismatches_passed
                .saturating_sub(earlier.checksum_mismatches_passed),
            truncated_payloads: self
                .truncated_payloads
                .saturating_sub(earlier.truncated_payloads),
            unknown_records: self.unknown_records.saturating_sub(earlier.unknown_records),
            dropped_records: self.dropped_records.saturating_sub(earlier.dropped_records),
            band_samples: self.band_samples.saturating_sub(earlier.band_samples),
        }
    }

    pub fn malformed(&self) -> u64 {
        self.length_rejects + self.checksum_rejects
    }
}

impl AddAssign for Snapshot {
    fn add_assign(&mut self, other: Snapshot) {
        self.packets += other.packets;
        self.length_rejects += other.length_rejects;
        self.checksum_rejects += other.checksum_rejects;
        self.checksum_mismatches_passed += other.checksum_mismatches_passed;
        self.truncated_payloads += other.truncated_payloads;
        self.unknown_records += other.unknown_records;
        self.dropped_records += other.dropped_records;
        self.band_samples += other.band_samples;
    }
}

pub fn snapshot() -> Snapshot {
    Snapshot {
        packets: PACKETS.load(Ordering::Relaxed),
        length_rejects: LENGTH_REJECTS.load(Ordering::Relaxed),
        checksum_rejects: CHECKSUM_REJECTS.load(Ordering::Relaxed),
        checksum_mismatches_passed: CHECKSUM_MISMATCHES_PASSED.load(Ordering::Relaxed),
        truncated_payloads: TRUNCATED_PAYLOADS.load(Ordering::Relaxed),
        unknown_records: UNKNOWN_RECORDS.load(Ordering::Relaxed),
        dropped_records: DROPPED_RECORDS.load(Ordering::Relaxed),
        band_samples: BAND_SAMPLES.load(Ordering::Relaxed),
    }
}
