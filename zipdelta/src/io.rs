//! I/O abstractions for archive byte sources and the patch sink

use crate::{Error, Result};
use std::io::{Read, Seek, SeekFrom, Write};

/// Random-access byte source over an old or new archive
///
/// Both the generator and the applier address archives by absolute offset,
/// so anything `Read + Seek` (files, in-memory cursors) qualifies via the
/// blanket implementation.
pub trait ArchiveSource {
    /// Total size of the archive in bytes
    fn size(&mut self) -> Result<u64>;

    /// Read exactly `buf.len()` bytes at the given offset
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()>;

    /// Read `length` bytes at `offset`, rejecting out-of-bounds ranges
    fn read_range(&mut self, offset: u64, length: u64) -> Result<Vec<u8>> {
        let size = self.size()?;
        if offset.checked_add(length).is_none_or(|end| end > size) {
            return Err(Error::bounds(offset, length, size));
        }
        let mut buf = vec![0u8; length as usize];
        self.read_at(offset, &mut buf)?;
        Ok(buf)
    }
}

impl<T: Read + Seek> ArchiveSource for T {
    fn size(&mut self) -> Result<u64> {
        let pos = self.stream_position()?;
        let end = self.seek(SeekFrom::End(0))?;
        self.seek(SeekFrom::Start(pos))?;
        Ok(end)
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        self.seek(SeekFrom::Start(offset))?;
        self.read_exact(buf)?;
        Ok(())
    }
}

/// Write adapter that counts bytes passing through to the inner sink
#[derive(Debug)]
pub struct CountingWriter<W> {
    inner: W,
    written: u64,
}

impl<W: Write> CountingWriter<W> {
    /// Create a new counting writer
    pub fn new(inner: W) -> Self {
        Self { inner, written: 0 }
    }

    /// Total bytes written so far
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Consume the adapter, returning the inner sink
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}
