use std::io::{self, Read, Write};

use thinkgear::config::DecoderConfig;
use thinkgear::emitter::sample_file::{SampleReader, SampleWriter};
use thinkgear::emitter::{BandSample, EventSink, SampleFileSink};
use thinkgear::protocol::errors::{EmitError, SessionError, TransportError};
use thinkgear::protocol::payload::{MetricKind, StatusKind};
use thinkgear::protocol::source::ReaderSource;
use thinkgear::protocol::{ChecksumPolicy, Packet};
use thinkgear::session::{EndReason, Session};

mod common;
use common::{bands_row, frame, Event, RecordingSink};

fn fixed_clock() -> f64 {
    1_700_000_000.5
}

#[test]
fn bands_carry_the_most_recent_scalars() {
    let mut wire = frame(&[0x02, 0xC8, 0x04, 0x30, 0x05, 0x20]);
    wire.extend(frame(&[0x02, 0x00])); // good signal: state keeps 200
    wire.extend(frame(&bands_row([1, 2, 3, 4, 5, 6, 7, 8])));

    let mut session = Session::new(
        ReaderSource::new(&wire[..]),
        RecordingSink::default(),
        &DecoderConfig::default(),
    )
    .with_clock(fixed_clock);
    let summary = session.run().expect("orderly end");
    assert_eq!(summary.reason, EndReason::EndOfStream);
    assert_eq!(summary.state.poor_signal, 200);

    let events = &session.sink().events;
    assert_eq!(events.len(), 5);
    assert_eq!(events[3], Event::Metric(MetricKind::PoorSignal, 0, false));
    let Event::Bands(sample) = &events[4] else {
        panic!("expected band sample, got {:?}", events[4]);
    };
    assert_eq!(sample.timestamp, 1_700_000_000.5);
    assert_eq!(sample.bands.as_array(), [1, 2, 3, 4, 5, 6, 7, 8]);
    assert_eq!(sample.snapshot.poor_signal, 200);
    assert_eq!(sample.snapshot.attention, 0x30);
    assert_eq!(sample.snapshot.meditation, 0x20);
}

#[test]
fn good_signal_recording_resets_poor_signal() {
    let mut wire = frame(&[0x02, 0xC8]);
    wire.extend(frame(&[0x02, 0x00]));
    let decoder = DecoderConfig {
        checksum: ChecksumPolicy::Strict,
        record_good_signal: true,
    };
    let mut session = Session::new(ReaderSource::new(&wire[..]), RecordingSink::default(), &decoder);
    let summary = session.run().unwrap();
    assert_eq!(summary.state.poor_signal, 0);
    assert_eq!(
        session.sink().events[1],
        Event::Metric(MetricKind::PoorSignal, 0, true)
    );
}

#[test]
fn raw_samples_are_not_emitted_but_status_and_unknown_are() {
    let wire = frame(&[0x80, 0x02, 0x01, 0x00, 0xD1, 0x01, 0x42, 0xA0, 0x01, 0x07]);
    let mut session = Session::new(
        ReaderSource::new(&wire[..]),
        RecordingSink::default(),
        &DecoderConfig::default(),
    );
    session.run().unwrap();
    assert_eq!(
        session.sink().events,
        vec![
            Event::Status(StatusKind::NotFound, Some(vec![0x42])),
            Event::Unknown(0xA0, vec![0x07]),
        ]
    );
}

#[test]
fn process_packet_is_usable_without_a_source() {
    let mut session = Session::new(
        ReaderSource::new(io::empty()),
        RecordingSink::default(),
        &DecoderConfig::default(),
    );
    let packet = Packet::from_payload(vec![0x04u8, 0x32]);
    let first = session.process_packet(&packet).unwrap();
    let second = session.process_packet(&packet).unwrap();
    assert_eq!(first, second);
    assert_eq!(session.state().attention, 50);
    assert_eq!(session.sink().events.len(), 2);
}

#[test]
fn io_failure_is_a_session_error() {
    struct Fails(bool);
    impl Read for Fails {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if !self.0 {
                self.0 = true;
                let wire = frame(&[0x04, 0x01]);
                buf[..wire.len()].copy_from_slice(&wire);
                return Ok(wire.len());
            }
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "unplugged"))
        }
    }
    let mut session = Session::new(
        ReaderSource::new(Fails(false)),
        RecordingSink::default(),
        &DecoderConfig::default(),
    );
    let err = session.run().unwrap_err();
    let SessionError::Transport { source, summary } = &err else {
        panic!("expected transport error, got {:?}", err);
    };
    assert!(matches!(source, TransportError::Io(_)));
    assert_eq!(summary.reason, EndReason::TransportFailed);
    assert_eq!(summary.counters.packets, 1);
    assert_eq!(summary.state.attention, 1);
    assert_eq!(err.summary(), summary);
    assert_eq!(session.sink().events.len(), 1);
}

#[test]
fn sink_failure_ends_session_with_summary() {
    struct Refusing;
    impl EventSink for Refusing {
        fn power_bands(&mut self, _: &BandSample) -> Result<(), EmitError> {
            Err(EmitError::Io(io::Error::new(io::ErrorKind::Other, "disk full")))
        }
        fn metric(&mut self, _: MetricKind, _: u8, _: bool) -> Result<(), EmitError> {
            Ok(())
        }
        fn status(&mut self, _: StatusKind, _: Option<&[u8]>) -> Result<(), EmitError> {
            Ok(())
        }
    }

    let mut wire = frame(&[0x04, 0x2A]);
    wire.extend(frame(&bands_row([1, 2, 3, 4, 5, 6, 7, 8])));
    wire.extend(frame(&[0x05, 0x10]));
    let mut session = Session::new(ReaderSource::new(&wire[..]), Refusing, &DecoderConfig::default());
    let err = session.run().unwrap_err();
    assert!(matches!(err, SessionError::Emit { .. }));
    let summary = err.summary();
    assert_eq!(summary.reason, EndReason::SinkFailed);
    assert_eq!(summary.counters.packets, 2);
    assert_eq!(summary.counters.band_samples, 1);
    assert_eq!(summary.state.meditation, 0);
}

/// Runs a whole second session from inside the first one's sink.
#[derive(Default)]
struct NestedSessionSink {
    inner_packets: u64,
}

impl EventSink for NestedSessionSink {
    fn power_bands(&mut self, _: &BandSample) -> Result<(), EmitError> {
        Ok(())
    }
    fn metric(&mut self, _: MetricKind, _: u8, _: bool) -> Result<(), EmitError> {
        let mut wire = frame(&[0x04, 0x01]);
        wire.extend(frame(&[0x04, 0x02]));
        wire.extend(frame(&bands_row([9; 8])));
        let mut inner = Session::new(
            ReaderSource::new(&wire[..]),
            RecordingSink::default(),
            &DecoderConfig::default(),
        );
        let summary = inner.run().expect("inner session ends cleanly");
        self.inner_packets += summary.counters.packets;
        Ok(())
    }
    fn status(&mut self, _: StatusKind, _: Option<&[u8]>) -> Result<(), EmitError> {
        Ok(())
    }
}

#[test]
fn concurrent_sessions_keep_separate_counters() {
    let wire = frame(&[0x04, 0x30]);
    let mut session = Session::new(
        ReaderSource::new(&wire[..]),
        NestedSessionSink::default(),
        &DecoderConfig::default(),
    );
    let summary = session.run().unwrap();
    assert_eq!(session.sink().inner_packets, 3);
    assert_eq!(summary.counters.packets, 1);
    assert_eq!(summary.counters.band_samples, 0);
    assert_eq!(session.counters(), summary.counters);
}

#[test]
fn replayed_capture_persists_band_samples() {
    let dir = tempfile::tempdir().unwrap();
    let capture_path = dir.path().join("capture.bin");
    {
        let mut capture = std::fs::File::create(&capture_path).unwrap();
        capture.write_all(&frame(&[0x02, 0x1A, 0x04, 0x3C, 0x05, 0x28])).unwrap();
        capture.write_all(&[0x00, 0xAA, 0x13]).unwrap();
        capture.write_all(&frame(&bands_row([10, 20, 30, 40, 50, 60, 70, 80]))).unwrap();
        capture.write_all(&frame(&bands_row([11, 21, 31, 41, 51, 61, 71, 81]))).unwrap();
    }

    let writer = SampleWriter::open(&dir.path().join("session.freq")).unwrap();
    let sample_path = writer.path().to_path_buf();
    let file = std::fs::File::open(&capture_path).unwrap();
    let mut session = Session::new(
        ReaderSource::new(io::BufReader::new(file)),
        SampleFileSink::new(writer),
        &DecoderConfig::default(),
    )
    .with_clock(fixed_clock);
    let summary = session.run().unwrap();
    assert_eq!(summary.counters.band_samples, 2);
    assert_eq!(summary.counters.packets, 3);
    assert_eq!(summary.counters.malformed(), 0);
    drop(session);

    let records: Vec<_> = SampleReader::open(&sample_path)
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].bands, [10, 20, 30, 40, 50, 60, 70, 80]);
    assert_eq!(records[1].bands[7], 81);
    for r in &records {
        assert_eq!(r.timestamp, 1_700_000_000.5);
        assert_eq!(r.poor_signal, 0x1A);
        assert_eq!(r.attention, 0x3C);
        assert_eq!(r.meditation, 0x28);
    }
}
