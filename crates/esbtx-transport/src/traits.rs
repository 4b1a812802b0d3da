use crate::error::Result;

/// A byte-stream link to one device.
///
/// Implementations are owned by a single session. The writer side holds the
/// original handle; the reader side holds a [`try_clone`](Transport::try_clone)
/// of it, so the two loops never contend on one handle.
///
/// Closing is `Drop`: releasing the last handle releases the underlying port.
pub trait Transport: Send {
    /// The port identifier this transport is bound to, for diagnostics.
    fn port_name(&self) -> &str;

    /// Create a second handle to the same underlying link.
    fn try_clone(&self) -> Result<Box<dyn Transport>>;

    /// Write all of `buf` as one logical send.
    fn write_all(&mut self, buf: &[u8]) -> Result<()>;

    /// Number of inbound bytes buffered and ready to read.
    fn bytes_to_read(&mut self) -> Result<usize>;

    /// Drain and return all currently buffered inbound bytes.
    ///
    /// Returns an empty vec when nothing is buffered; never blocks waiting
    /// for more.
    fn read_available(&mut self) -> Result<Vec<u8>>;
}
