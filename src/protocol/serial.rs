//! Serial transport for the headset dongle / Bluetooth serial port.
//!
//! Opening follows what the dongles need in practice: 57600 8N1, a finite
//! read timeout so shutdown requests are noticed, a DISCONNECT command to
//! restart the packet stream and a flow-control toggle to re-apply settings.
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use serialport::{ClearBuffer, FlowControl, SerialPort};
use thiserror::Error;

use super::codes;
use super::errors::TransportError;
use super::source::{ByteSource, ReaderSource};
use crate::config::DeviceConfig;

#[derive(Debug, Error)]
pub enum OpenError {
    #[error("no serial device at {port}")]
    NotFound { port: String },

    #[error("permission denied on {port}; grant access with e.g. `sudo chmod a+rw {port}`")]
    PermissionDenied { port: String },

    #[error("failed to open serial port {port}: {source}")]
    Serial {
        port: String,
        #[source]
        source: serialport::Error,
    },

    #[error("failed to prepare serial port {port}: {source}")]
    Io {
        port: String,
        #[source]
        source: std::io::Error,
    },
}

/// Same port name with its trailing digit incremented, `None` past 9 or when
/// the name does not end in a digit.
pub fn next_port_candidate(port: &str) -> Option<String> {
    let last = port.chars().last()?;
    let digit = last.to_digit(10)?;
    if digit >= 9 {
        return None;
    }
    let mut next = port[..port.len() - 1].to_string();
    next.push(char::from_digit(digit + 1, 10)?);
    Some(next)
}

fn is_not_found(e: &serialport::Error) -> bool {
    matches!(
        e.kind(),
        serialport::ErrorKind::NoDevice | serialport::ErrorKind::Io(std::io::ErrorKind::NotFound)
    )
}

fn is_permission_denied(e: &serialport::Error) -> bool {
    matches!(
        e.kind(),
        serialport::ErrorKind::Io(std::io::ErrorKind::PermissionDenied)
    )
}

/// [`ByteSource`] over an open serial port. Setting the shutdown flag makes
/// the next read fail with [`TransportError::Closed`].
pub struct SerialSource {
    name: String,
    inner: ReaderSource<Box<dyn SerialPort>>,
    shutdown: Arc<AtomicBool>,
}

impl SerialSource {
    /// Open the configured port, probing neighbouring names if allowed.
    pub fn open(cfg: &DeviceConfig, shutdown: Arc<AtomicBool>) -> Result<Self, OpenError> {
        let mut name = cfg.port.clone();
        loop {
            info!(
                "Opening ThinkGear device on {} at {} baud",
                name, cfg.baud_rate
            );
            let mut builder = serialport::new(&name, cfg.baud_rate)
                .timeout(Duration::from_millis(cfg.read_timeout_ms));
            #[cfg(unix)]
            {
                builder = builder
                    .data_bits(serialport::DataBits::Eight)
                    .stop_bits(serialport::StopBits::One)
                    .parity(serialport::Parity::None);
            }
            match builder.open() {
                Ok(port) => return Self::prepare(port, name, cfg, shutdown),
                Err(e) if is_permission_denied(&e) => {
                    return Err(OpenError::PermissionDenied { port: name })
                }
                Err(e) if is_not_found(&e) => {
                    let next = if cfg.probe_ports {
                        next_port_candidate(&name)
                    } else {
                        None
                    };
                    match next {
                        Some(next) => {
                            warn!("No device at {}, trying {}", name, next);
                            name = next;
                        }
                        None => return Err(OpenError::NotFound { port: name }),
                    }
                }
                Err(source) => return Err(OpenError::Serial { port: name, source }),
            }
        }
    }

    fn prepare(
        mut port: Box<dyn SerialPort>,
        name: String,
        cfg: &DeviceConfig,
        shutdown: Arc<AtomicBool>,
    ) -> Result<Self, OpenError> {
        if cfg.reapply_flow_control {
            match port.flow_control() {
                Ok(current) => {
                    let flipped = match current {
                        FlowControl::Hardware => FlowControl::None,
                        _ => FlowControl::Hardware,
                    };
                    for fc in [flipped, current] {
                        if let Err(e) = port.set_flow_control(fc) {
                            warn!("Failed to set flow control on {}: {}", name, e);
                        }
                    }
                }
                Err(e) => warn!("Failed to read flow control on {}: {}", name, e),
            }
        }
        // Drop whatever the dongle buffered before the fresh stream starts.
        if let Err(e) = port.clear(ClearBuffer::Input) {
            warn!("Failed to clear input buffer on {}: {}", name, e);
        }
        let mut source = Self {
            name,
            inner: ReaderSource::new(port),
            shutdown,
        };
        if cfg.send_disconnect {
            source
                .send_command(codes::CMD_DISCONNECT)
                .map_err(|e| OpenError::Io {
                    port: source.name.clone(),
                    source: e,
                })?;
        }
        debug!("Serial port {} ready", source.name);
        Ok(source)
    }

    /// Port actually opened (may differ from the configured one after probing).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Send one of the host command bytes (`CMD_CONNECT`, `CMD_DISCONNECT`, `CMD_AUTOCONNECT`).
    pub fn send_command(&mut self, command: u8) -> std::io::Result<()> {
        let port = self.inner.get_mut();
        port.write_all(&[command])?;
        port.flush()
    }
}

impl ByteSource for SerialSource {
    fn read_byte(&mut self) -> Result<Option<u8>, TransportError> {
        if self.shutdown.load(Ordering::Relaxed) {
            return Err(TransportError::Closed);
        }
        self.inner.read_byte()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serialport::{DataBits, Parity, StopBits};
    use std::io::{self, Read};
    use std::sync::Mutex;

    /// In-memory port recording what setup does to it.
    #[derive(Clone, Default)]
    struct FakePort {
        written: Arc<Mutex<Vec<u8>>>,
        flow_changes: Arc<Mutex<Vec<FlowControl>>>,
        clear_fails: bool,
    }

    fn unsupported<T>() -> serialport::Result<T> {
        Err(serialport::Error::new(
            serialport::ErrorKind::Unknown,
            "not supported by fake port",
        ))
    }

    impl Read for FakePort {
        fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::TimedOut, "idle"))
        }
    }

    impl Write for FakePort {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.written.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl SerialPort for FakePort {
        fn name(&self) -> Option<String> {
            Some("fake0".into())
        }
        fn baud_rate(&self) -> serialport::Result<u32> {
            Ok(57_600)
        }
        fn data_bits(&self) -> serialport::Result<DataBits> {
            Ok(DataBits::Eight)
        }
        fn flow_control(&self) -> serialport::Result<FlowControl> {
            Ok(FlowControl::None)
        }
        fn parity(&self) -> serialport::Result<Parity> {
            Ok(Parity::None)
        }
        fn stop_bits(&self) -> serialport::Result<StopBits> {
            Ok(StopBits::One)
        }
        fn timeout(&self) -> Duration {
            Duration::from_millis(10)
        }
        fn set_baud_rate(&mut self, _: u32) -> serialport::Result<()> {
            Ok(())
        }
        fn set_data_bits(&mut self, _: DataBits) -> serialport::Result<()> {
            Ok(())
        }
        fn set_flow_control(&mut self, fc: FlowControl) -> serialport::Result<()> {
            self.flow_changes.lock().unwrap().push(fc);
            Ok(())
        }
        fn set_parity(&mut self, _: Parity) -> serialport::Result<()> {
            Ok(())
        }
        fn set_stop_bits(&mut self, _: StopBits) -> serialport::Result<()> {
            Ok(())
        }
        fn set_timeout(&mut self, _: Duration) -> serialport::Result<()> {
            Ok(())
        }
        fn write_request_to_send(&mut self, _: bool) -> serialport::Result<()> {
            Ok(())
        }
        fn write_data_terminal_ready(&mut self, _: bool) -> serialport::Result<()> {
            Ok(())
        }
        fn read_clear_to_send(&mut self) -> serialport::Result<bool> {
            Ok(true)
        }
        fn read_data_set_ready(&mut self) -> serialport::Result<bool> {
            Ok(true)
        }
        fn read_ring_indicator(&mut self) -> serialport::Result<bool> {
            Ok(false)
        }
        fn read_carrier_detect(&mut self) -> serialport::Result<bool> {
            Ok(true)
        }
        fn bytes_to_read(&self) -> serialport::Result<u32> {
            Ok(0)
        }
        fn bytes_to_write(&self) -> serialport::Result<u32> {
            Ok(0)
        }
        fn clear(&self, _: ClearBuffer) -> serialport::Result<()> {
            if self.clear_fails {
                unsupported()
            } else {
                Ok(())
            }
        }
        fn try_clone(&self) -> serialport::Result<Box<dyn SerialPort>> {
            Ok(Box::new(self.clone()))
        }
        fn set_break(&self) -> serialport::Result<()> {
            Ok(())
        }
        fn clear_break(&self) -> serialport::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn prepare_toggles_flow_control_and_sends_disconnect() {
        let port = FakePort::default();
        let source = SerialSource::prepare(
            Box::new(port.clone()),
            "fake0".into(),
            &DeviceConfig::default(),
            Arc::new(AtomicBool::new(false)),
        )
        .unwrap();
        assert_eq!(source.name(), "fake0");
        assert_eq!(
            *port.flow_changes.lock().unwrap(),
            vec![FlowControl::Hardware, FlowControl::None]
        );
        assert_eq!(*port.written.lock().unwrap(), vec![codes::CMD_DISCONNECT]);
    }

    #[test]
    fn failed_input_clear_does_not_abort_setup() {
        let port = FakePort {
            clear_fails: true,
            ..FakePort::default()
        };
        let result = SerialSource::prepare(
            Box::new(port.clone()),
            "fake0".into(),
            &DeviceConfig::default(),
            Arc::new(AtomicBool::new(false)),
        );
        assert!(result.is_ok());
        assert_eq!(*port.written.lock().unwrap(), vec![codes::CMD_DISCONNECT]);
    }

    #[test]
    fn shutdown_flag_closes_the_source() {
        let shutdown = Arc::new(AtomicBool::new(false));
        let mut source = SerialSource::prepare(
            Box::new(FakePort::default()),
            "fake0".into(),
            &DeviceConfig::default(),
            shutdown.clone(),
        )
        .unwrap();
        assert_eq!(source.read_byte().unwrap(), None);
        shutdown.store(true, Ordering::Relaxed);
        assert!(matches!(source.read_byte(), Err(TransportError::Closed)));
    }

    #[test]
    fn increments_trailing_digit() {
        assert_eq!(next_port_candidate("/dev/rfcomm0").as_deref(), Some("/dev/rfcomm1"));
        assert_eq!(next_port_candidate("COM3").as_deref(), Some("COM4"));
    }

    #[test]
    fn stops_at_nine_and_non_digits() {
        assert_eq!(next_port_candidate("/dev/rfcomm9"), None);
        assert_eq!(next_port_candidate("/dev/ttyACM"), None);
        assert_eq!(next_port_candidate(""), None);
    }
}
