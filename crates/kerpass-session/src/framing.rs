//! A length-prefixed byte-stream [`Transport`]: 2-byte big-endian length
//! prefix followed by exactly that many payload bytes, capped at 65,535
//! bytes — the framing any raw socket-based Noise transport uses (spec.md
//! §6 "Message framing"). HTTP's own envelope (out of scope here) carries
//! messages a different way and does not go through this type.

use std::io::{Read, Write};

use kerpass_error::{Error, Result};

use crate::fsm::Transport;

const MAX_FRAME_LEN: usize = 65_535;

/// Wraps any blocking byte stream as a framed [`Transport`].
pub struct FramedTransport<T> {
    inner: T,
}

impl<T: Read + Write> FramedTransport<T> {
    pub fn new(inner: T) -> Self {
        FramedTransport { inner }
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: Read + Write> Transport for FramedTransport<T> {
    fn read(&mut self) -> Result<Vec<u8>> {
        let mut len_bytes = [0u8; 2];
        self.inner.read_exact(&mut len_bytes)?;
        let len = u16::from_be_bytes(len_bytes) as usize;
        let mut payload = vec![0u8; len];
        self.inner.read_exact(&mut payload)?;
        Ok(payload)
    }

    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        if bytes.len() > MAX_FRAME_LEN {
            return Err(Error::size_limit(format!(
                "framed message of {} bytes exceeds the {MAX_FRAME_LEN}-byte limit",
                bytes.len()
            )));
        }
        let len = bytes.len() as u16;
        self.inner.write_all(&len.to_be_bytes())?;
        self.inner.write_all(bytes)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[derive(Default)]
    struct LoopbackBuffer {
        data: Vec<u8>,
        pos: usize,
    }

    impl Read for LoopbackBuffer {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let mut cursor = Cursor::new(&self.data[self.pos..]);
            let n = std::io::Read::read(&mut cursor, buf)?;
            self.pos += n;
            Ok(n)
        }
    }

    impl Write for LoopbackBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn roundtrips_a_message() {
        let mut transport = FramedTransport::new(LoopbackBuffer::default());
        transport.write(b"hello").unwrap();
        assert_eq!(transport.read().unwrap(), b"hello");
    }

    #[test]
    fn rejects_oversized_write() {
        let mut transport = FramedTransport::new(LoopbackBuffer::default());
        let too_big = vec![0u8; MAX_FRAME_LEN + 1];
        assert!(transport.write(&too_big).is_err());
    }

    #[test]
    fn empty_message_roundtrips() {
        let mut transport = FramedTransport::new(LoopbackBuffer::default());
        transport.write(b"").unwrap();
        assert_eq!(transport.read().unwrap(), Vec::<u8>::new());
    }
}
