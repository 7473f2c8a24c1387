//! Last-seen scalar metrics for one headset connection.
use serde::{Deserialize, Serialize};

use super::payload::MetricKind;

/// Scalar values most recently reported by the headset.
///
/// Band samples are annotated with whatever was seen last, not with values
/// from the same packet; the protocol does not send them together.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub poor_signal: u8,
    pub attention: u8,
    pub meditation: u8,
    pub blink: u8,
}

#[derive(Debug, Clone, Default)]
pub struct DeviceState {
    current: Snapshot,
    record_good_signal: bool,
}

impl DeviceState {
    /// State that keeps the previous poor-signal value when the headset reports 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// When `record_good_signal` is set a poor-signal value of 0 is stored like
    /// any other value instead of being ignored.
    pub fn with_good_signal_recording(record_good_signal: bool) -> Self {
        Self {
            current: Snapshot::default(),
            record_good_signal,
        }
    }

    /// Apply a scalar metric. Returns `false` when the update was skipped.
    pub fn observe(&mut self, kind: MetricKind, value: u8) -> bool {
        match kind {
            MetricKind::PoorSignal => {
                if value == 0 && !self.record_good_signal {
                    return false;
                }
                self.current.poor_signal = value;
            }
            MetricKind::Attention => self.current.attention = value,
            MetricKind::Meditation => self.current.meditation = value,
            MetricKind::Blink => self.current.blink = value,
        }
        true
    }

    pub fn snapshot(&self) -> Snapshot {
        self.current
    }
}
