use crate::{error::RemodError, Result};

/// A readable view of another process's address space.
///
/// The loader walker and export resolver only ever consume this trait, so
/// they can be exercised against synthetic address spaces as easily as
/// against a live process handle. Reads are all-or-nothing: a short read is
/// reported as a failure, never as a partial buffer.
pub trait ProcessMemory {
    /// Reads exactly `buf.len()` bytes at `address` in the target.
    fn read_memory(&self, address: u64, buf: &mut [u8]) -> Result<()>;
}

/// Typed read helpers layered over [`ProcessMemory`].
pub trait ProcessMemoryExt: ProcessMemory {
    /// Copies `len` bytes at `address` into an owned buffer.
    fn read_exact(&self, address: u64, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.read_memory(address, &mut buf)?;
        Ok(buf)
    }

    fn read_u32(&self, address: u64) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.read_memory(address, &mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    fn read_u64(&self, address: u64) -> Result<u64> {
        let mut buf = [0u8; 8];
        self.read_memory(address, &mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }
}

impl<M: ProcessMemory + ?Sized> ProcessMemoryExt for M {}

/// Bounds-checked field access over a buffer copied out of the target.
///
/// Remote structures are never reinterpreted by casting; every field is
/// pulled out of the owned copy by explicit offset and length, and an
/// offset outside the copy is a typed error rather than undefined
/// behavior on malformed remote data.
pub struct ByteView<'a> {
    buf: &'a [u8],
}

impl<'a> ByteView<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    /// Borrows `len` bytes starting at `offset`.
    pub fn bytes(&self, offset: usize, len: usize) -> Result<&'a [u8]> {
        let end = offset
            .checked_add(len)
            .ok_or(RemodError::FieldOutOfRange(offset, len, self.buf.len()))?;
        if end > self.buf.len() {
            return Err(RemodError::FieldOutOfRange(offset, len, self.buf.len()));
        }
        Ok(&self.buf[offset..end])
    }

    pub fn u16_at(&self, offset: usize) -> Result<u16> {
        let bytes = self.bytes(offset, 2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    pub fn u32_at(&self, offset: usize) -> Result<u32> {
        let bytes = self.bytes(offset, 4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn u64_at(&self, offset: usize) -> Result<u64> {
        let bytes = self.bytes(offset, 8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(bytes);
        Ok(u64::from_le_bytes(raw))
    }
}
