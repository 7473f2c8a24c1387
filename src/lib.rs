//! # thinkgear - ThinkGear stream decoder
//!
//! Decoder for the ThinkGear serial protocol used by NeuroSky EEG headsets
//! (MindWave, MindWave Mobile, MindSet). The headset streams packets of data
//! rows: signal quality, eSense attention and meditation, blink strength, raw
//! EEG samples, the eight-band power spectrum and dongle status events.
//!
//! ## Features
//!
//! - **Framing**: sync search, placeholder length bytes, checksum validation
//!   (strict or permissive) and resynchronisation after malformed packets.
//! - **Decoding**: escape-prefixed codes, single/multi-byte rows, 24-bit
//!   power bands, device status.
//! - **Device state**: last-seen scalar values attached to every band sample.
//! - **Persistence**: fixed-width binary `.freq` session files.
//! - **Serial transport**: dongle setup and port probing (`serial` feature).
//!
//! ## Quick Start
//!
//! ```rust
//! use thinkgear::config::DecoderConfig;
//! use thinkgear::emitter::LogSink;
//! use thinkgear::protocol::{source::ReaderSource, Packet};
//! use thinkgear::session::{EndReason, Session};
//!
//! let wire = Packet::from_payload(vec![0x04u8, 0x32]).encode().unwrap();
//! let mut session = Session::new(ReaderSource::new(&wire[..]), LogSink, &DecoderConfig::default());
//! let summary = session.run().unwrap();
//! assert_eq!(summary.reason, EndReason::EndOfStream);
//! assert_eq!(summary.state.attention, 50);
//! ```
//!
//! ## Module Organization
//!
//! - [`protocol`] - byte sources, framing, payload decoding, device state
//! - [`emitter`] - event sinks and the sample file format
//! - [`session`] - the decode loop
//! - [`config`] - configuration management and validation
//! - [`metrics`] - decoder counters
//! - [`logutil`] - log formatting helpers
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │   Byte Source   │ ← serial port, capture file, any io::Read
//! └─────────────────┘
//!          │
//! ┌─────────────────┐
//! │ Frame Extractor │ → Packet
//! └─────────────────┘
//!          │
//! ┌─────────────────┐
//! │ Payload Decoder │ → DataRecord*
//! └─────────────────┘
//!          │
//! ┌─────────────────┐
//! │  Device State + │
//! │   Event Sink    │ ← logs, .freq files
//! └─────────────────┘
//! ```

pub mod config;
pub mod emitter;
pub mod logutil;
pub mod metrics;
pub mod protocol;
pub mod session;
