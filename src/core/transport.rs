//! Byte transport for out-of-process diagnostic consumers
//!
//! A transport is a fire-and-forget channel: no acknowledgement, no
//! back-pressure, and delivery failures stay inside the transport.

use parking_lot::Mutex;
use std::io::{self, Stderr, Write};

/// One-way byte channel
pub trait Transport: Send {
    fn send(&self, bytes: &[u8]);
}

/// Writes every payload as one line to a local stream
pub struct LocalTransport<W> {
    writer: Mutex<W>,
}

impl<W: Write + Send> LocalTransport<W> {
    pub fn new(writer: W) -> Self {
        LocalTransport {
            writer: Mutex::new(writer),
        }
    }

    /// Run `f` with the underlying writer
    pub fn with_writer<R>(&self, f: impl FnOnce(&mut W) -> R) -> R {
        f(&mut self.writer.lock())
    }
}

impl LocalTransport<Stderr> {
    pub fn stderr() -> Self {
        Self::new(io::stderr())
    }
}

impl Default for LocalTransport<Stderr> {
    fn default() -> Self {
        Self::stderr()
    }
}

impl<W: Write + Send> Transport for LocalTransport<W> {
    fn send(&self, bytes: &[u8]) {
        let mut writer = self.writer.lock();
        if let Err(e) = writer
            .write_all(bytes)
            .and_then(|_| writer.write_all(b"\n"))
            .and_then(|_| writer.flush())
        {
            eprintln!("Transport write error: {e:?}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payloads_are_line_framed() {
        let transport = LocalTransport::new(Vec::new());
        transport.send(b"first");
        transport.send(b"second");

        let written = transport.with_writer(|w| String::from_utf8(w.clone()).unwrap());
        assert_eq!(written, "first\nsecond\n");
    }

    #[test]
    fn test_stderr_transport_accepts_payloads() {
        LocalTransport::stderr().send(b"{\"kind\":\"RecursiveLock\"}");
        LocalTransport::default().send(b"");
    }
}
