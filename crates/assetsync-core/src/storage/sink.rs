//! Destinations for downloaded bytes.

use std::io;

/// Receives response body chunks in order.
pub trait ByteSink: Send {
    fn write_chunk(&mut self, data: &[u8]) -> io::Result<()>;

    /// Drop anything written so far (e.g. an error body that slipped through).
    fn reset(&mut self) -> io::Result<()>;
}

impl ByteSink for Vec<u8> {
    fn write_chunk(&mut self, data: &[u8]) -> io::Result<()> {
        self.extend_from_slice(data);
        Ok(())
    }

    fn reset(&mut self) -> io::Result<()> {
        self.clear();
        Ok(())
    }
}
