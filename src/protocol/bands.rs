//! EEG power-band block (code `0x83`).
//!
//! The value is 24 bytes: eight unsigned 24-bit big-endian integers in the
//! order delta, theta, low alpha, high alpha, low beta, high beta, low gamma,
//! mid gamma.
use serde::{Deserialize, Serialize};

use super::errors::BandsError;

/// Width of the encoded block.
pub const BANDS_LEN: usize = 24;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowerBands {
    pub delta: u32,
    pub theta: u32,
    pub lowalpha: u32,
    pub highalpha: u32,
    pub lowbeta: u32,
    pub highbeta: u32,
    pub lowgamma: u32,
    pub midgamma: u32,
}

impl PowerBands {
    /// Decode the 24-byte block. Any other length is rejected.
    pub fn decode(value: &[u8]) -> Result<Self, BandsError> {
        if value.len() != BANDS_LEN {
            return Err(BandsError::Length(value.len()));
        }
        let mut v = [0u32; 8];
        for (slot, c) in v.iter_mut().zip(value.chunks_exact(3)) {
            *slot = u32::from_be_bytes([0, c[0], c[1], c[2]]);
        }
        Ok(Self::from_array(v))
    }

    /// Inverse of [`PowerBands::decode`]. Values are cut to their low 24 bits.
    pub fn encode(&self) -> [u8; BANDS_LEN] {
        let mut out = [0u8; BANDS_LEN];
        for (c, v) in out.chunks_exact_mut(3).zip(self.as_array()) {
            c.copy_from_slice(&v.to_be_bytes()[1..]);
        }
        out
    }

    pub fn from_array(v: [u32; 8]) -> Self {
        Self {
            delta: v[0],
            theta: v[1],
            lowalpha: v[2],
            highalpha: v[3],
            lowbeta: v[4],
            highbeta: v[5],
            lowgamma: v[6],
            midgamma: v[7],
        }
    }

    /// Values in wire order.
    pub fn as_array(&self) -> [u32; 8] {
        [
            self.delta,
            self.theta,
            self.lowalpha,
            self.highalpha,
            self.lowbeta,
            self.highbeta,
            self.lowgamma,
            self.midgamma,
        ]
    }
}
