use std::sync::{Arc, Mutex, PoisonError};

use crate::error::{Result, TransportError};
use crate::traits::Transport;

/// An in-memory loopback transport.
///
/// Backs `--dry-run` flood runs and harness tests: outbound bytes accumulate
/// in a buffer instead of leaving the host, and inbound bytes can be staged
/// with [`push_inbound`](MemoryTransport::push_inbound). Clones share the
/// same buffers, so a clone kept by the caller doubles as an inspection
/// handle after the transport has been handed to a session.
#[derive(Clone)]
pub struct MemoryTransport {
    name: String,
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    written: Vec<u8>,
    inbound: Vec<u8>,
    write_broken: bool,
    read_broken: bool,
}

impl MemoryTransport {
    /// Create a loopback transport identified by `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inner: Arc::new(Mutex::new(Inner::default())),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of every byte written so far, in write order.
    pub fn written(&self) -> Vec<u8> {
        self.lock().written.clone()
    }

    /// Stage bytes for the reader side to drain.
    pub fn push_inbound(&self, bytes: &[u8]) {
        self.lock().inbound.extend_from_slice(bytes);
    }

    /// Make every subsequent write fail, as if the link dropped.
    pub fn break_writes(&self) {
        self.lock().write_broken = true;
    }

    /// Make every subsequent read fail, as if the link dropped.
    pub fn break_reads(&self) {
        self.lock().read_broken = true;
    }
}

impl Transport for MemoryTransport {
    fn port_name(&self) -> &str {
        &self.name
    }

    fn try_clone(&self) -> Result<Box<dyn Transport>> {
        Ok(Box::new(self.clone()))
    }

    fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        let mut inner = self.lock();
        if inner.write_broken {
            return Err(TransportError::Closed);
        }
        inner.written.extend_from_slice(buf);
        Ok(())
    }

    fn bytes_to_read(&mut self) -> Result<usize> {
        let inner = self.lock();
        if inner.read_broken {
            return Err(TransportError::Closed);
        }
        Ok(inner.inbound.len())
    }

    fn read_available(&mut self) -> Result<Vec<u8>> {
        let mut inner = self.lock();
        if inner.read_broken {
            return Err(TransportError::Closed);
        }
        Ok(std::mem::take(&mut inner.inbound))
    }
}

impl std::fmt::Debug for MemoryTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryTransport")
            .field("port", &self.name)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_accumulate_in_order() {
        let mut transport = MemoryTransport::new("mem0");
        transport.write_all(b"one").unwrap();
        transport.write_all(b"two").unwrap();
        assert_eq!(transport.written(), b"onetwo");
    }

    #[test]
    fn clones_share_buffers() {
        let mut transport = MemoryTransport::new("mem0");
        let handle = transport.clone();
        transport.write_all(b"seen-by-handle").unwrap();
        assert_eq!(handle.written(), b"seen-by-handle");

        handle.push_inbound(b"reply");
        assert_eq!(transport.bytes_to_read().unwrap(), 5);
        assert_eq!(transport.read_available().unwrap(), b"reply");
        assert_eq!(transport.bytes_to_read().unwrap(), 0);
    }

    #[test]
    fn broken_writes_fail_every_write() {
        let mut transport = MemoryTransport::new("mem0");
        transport.break_writes();
        assert!(matches!(
            transport.write_all(b"x"),
            Err(TransportError::Closed)
        ));
        assert!(matches!(
            transport.write_all(b"y"),
            Err(TransportError::Closed)
        ));
    }

    #[test]
    fn broken_reads_fail_poll_and_drain() {
        let mut transport = MemoryTransport::new("mem0");
        transport.push_inbound(b"stale");
        transport.break_reads();
        assert!(matches!(
            transport.bytes_to_read(),
            Err(TransportError::Closed)
        ));
        assert!(matches!(
            transport.read_available(),
            Err(TransportError::Closed)
        ));
    }

    #[test]
    fn try_clone_returns_shared_handle() {
        let transport = MemoryTransport::new("mem0");
        let mut cloned = transport.try_clone().unwrap();
        cloned.write_all(b"via-trait").unwrap();
        assert_eq!(transport.written(), b"via-trait");
    }
}
