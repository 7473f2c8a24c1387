//! Byte sources feeding the frame extractor.
//!
//! A source hands out one byte at a time. `Ok(None)` means the read timed out
//! with nothing available, which is not an error: the extractor simply asks
//! again. End of stream and IO failures come back as [`TransportError`].
use std::io::{ErrorKind, Read};

use super::errors::TransportError;

/// Pull interface over the headset link.
pub trait ByteSource {
    /// Read the next byte. `Ok(None)` signals a timeout with no data.
    fn read_byte(&mut self) -> Result<Option<u8>, TransportError>;
}

impl<S: ByteSource + ?Sized> ByteSource for &mut S {
    fn read_byte(&mut self) -> Result<Option<u8>, TransportError> {
        (**self).read_byte()
    }
}

impl<S: ByteSource + ?Sized> ByteSource for Box<S> {
    fn read_byte(&mut self) -> Result<Option<u8>, TransportError> {
        (**self).read_byte()
    }
}

const READ_CHUNK: usize = 1024;

/// Adapts any [`std::io::Read`] into a [`ByteSource`], reading in chunks.
///
/// The reader must block or time out. `Ok(0)` is end of stream, `TimedOut`
/// maps to `Ok(None)` and `Interrupted` is retried. `WouldBlock` from a
/// non-blocking reader is an IO error, since nothing would pace the retries.
pub struct ReaderSource<R> {
    inner: R,
    buf: Box<[u8; READ_CHUNK]>,
    pos: usize,
    len: usize,
}

impl<R: Read> ReaderSource<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: Box::new([0u8; READ_CHUNK]),
            pos: 0,
            len: 0,
        }
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    fn fill(&mut self) -> Result<bool, TransportError> {
        loop {
            match self.inner.read(&mut self.buf[..]) {
                Ok(0) => return Err(TransportError::EndOfStream),
                Ok(n) => {
                    self.pos = 0;
                    self.len = n;
                    return Ok(true);
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == ErrorKind::TimedOut => return Ok(false),
                Err(e) => return Err(TransportError::Io(e)),
            }
        }
    }
}

impl<R: Read> ByteSource for ReaderSource<R> {
    fn read_byte(&mut self) -> Result<Option<u8>, TransportError> {
        if self.pos >= self.len && !self.fill()? {
            return Ok(None);
        }
        let b = self.buf[self.pos];
        self.pos += 1;
        Ok(Some(b))
    }
}
