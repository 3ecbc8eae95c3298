//! Validated access to caller-supplied buffers.
//!
//! A character device never touches a caller's buffer directly. The file
//! layer wraps it in a [`UserSliceReader`] (for `write`) or a
//! [`UserSliceWriter`] (for `read`); every copy is bounds-checked against
//! the bytes that are actually accessible and fails with
//! [`DriverError::BadAddress`] instead of faulting. This mirrors
//! `copy_from_user`/`copy_to_user` returning `-EFAULT`.

use crate::driver_api::DriverError;

/// Source of a `write`: bytes copied *from* the caller.
#[derive(Debug)]
pub struct UserSliceReader<'a> {
    mem: &'a [u8],
    pos: usize,
    len: usize,
}

impl<'a> UserSliceReader<'a> {
    /// Wraps the accessible bytes `mem` of a request that asked for `len`
    /// bytes. `len` may exceed `mem.len()`; copies past the accessible part
    /// fail.
    #[must_use]
    pub fn new(mem: &'a [u8], len: usize) -> Self {
        Self { mem, pos: 0, len }
    }

    /// A request of `len` bytes whose buffer is entirely inaccessible
    /// (a null pointer).
    #[must_use]
    pub fn null(len: usize) -> Self {
        Self { mem: &[], pos: 0, len }
    }

    /// Length the caller asked for.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the caller asked for zero bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Fills `out` from the caller's buffer, advancing the cursor.
    ///
    /// # Errors
    ///
    /// [`DriverError::BadAddress`] if fewer than `out.len()` accessible bytes
    /// remain. Nothing is consumed on failure.
    pub fn read_slice(&mut self, out: &mut [u8]) -> Result<(), DriverError> {
        let end = self
            .pos
            .checked_add(out.len())
            .ok_or(DriverError::BadAddress)?;
        let src = self.mem.get(self.pos..end).ok_or(DriverError::BadAddress)?;
        out.copy_from_slice(src);
        self.pos = end;
        Ok(())
    }

    /// Reads a native-endian `u32`.
    ///
    /// # Errors
    ///
    /// [`DriverError::BadAddress`] if fewer than four bytes are accessible.
    pub fn read_u32(&mut self) -> Result<u32, DriverError> {
        let mut buf = [0u8; 4];
        self.read_slice(&mut buf)?;
        Ok(u32::from_ne_bytes(buf))
    }
}

/// Destination of a `read`: bytes copied *to* the caller.
#[derive(Debug)]
pub struct UserSliceWriter<'a> {
    mem: &'a mut [u8],
    pos: usize,
    len: usize,
}

impl<'a> UserSliceWriter<'a> {
    /// Wraps the accessible bytes `mem` of a request that asked for `len`
    /// bytes.
    #[must_use]
    pub fn new(mem: &'a mut [u8], len: usize) -> Self {
        Self { mem, pos: 0, len }
    }

    /// A request of `len` bytes whose buffer is entirely inaccessible.
    #[must_use]
    pub fn null(len: usize) -> Self {
        Self {
            mem: &mut [],
            pos: 0,
            len,
        }
    }

    /// Length the caller asked for.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the caller asked for zero bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of bytes written so far.
    #[must_use]
    pub fn written(&self) -> usize {
        self.pos
    }

    /// Copies `data` into the caller's buffer, advancing the cursor.
    ///
    /// # Errors
    ///
    /// [`DriverError::BadAddress`] if fewer than `data.len()` accessible
    /// bytes remain. The buffer is left untouched on failure.
    pub fn write_slice(&mut self, data: &[u8]) -> Result<(), DriverError> {
        let end = self
            .pos
            .checked_add(data.len())
            .ok_or(DriverError::BadAddress)?;
        let dst = self
            .mem
            .get_mut(self.pos..end)
            .ok_or(DriverError::BadAddress)?;
        dst.copy_from_slice(data);
        self.pos = end;
        Ok(())
    }

    /// Writes a native-endian `u32`.
    ///
    /// # Errors
    ///
    /// [`DriverError::BadAddress`] if fewer than four bytes are accessible.
    pub fn write_u32(&mut self, value: u32) -> Result<(), DriverError> {
        self.write_slice(&value.to_ne_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reader_copies_native_endian_u32() {
        let bytes = 0xFFu32.to_ne_bytes();
        let mut reader = UserSliceReader::new(&bytes, 4);
        assert_eq!(reader.len(), 4);
        assert_eq!(reader.read_u32(), Ok(0xFF));
        assert_eq!(reader.read_u32(), Err(DriverError::BadAddress));
    }

    #[test]
    fn reader_rejects_short_buffer() {
        let bytes = [1u8, 2];
        let mut reader = UserSliceReader::new(&bytes, 4);
        assert_eq!(reader.read_u32(), Err(DriverError::BadAddress));
        // Nothing consumed: a two-byte read still succeeds.
        let mut out = [0u8; 2];
        assert_eq!(reader.read_slice(&mut out), Ok(()));
        assert_eq!(out, [1, 2]);
    }

    #[test]
    fn null_buffers_fault() {
        assert_eq!(UserSliceReader::null(4).read_u32(), Err(DriverError::BadAddress));
        let mut writer = UserSliceWriter::null(4);
        assert_eq!(writer.write_u32(7), Err(DriverError::BadAddress));
        assert_eq!(writer.written(), 0);
    }

    #[test]
    fn writer_fills_buffer() {
        let mut buf = [0u8; 8];
        let mut writer = UserSliceWriter::new(&mut buf, 8);
        writer.write_u32(0xDEAD_BEEF).unwrap();
        assert_eq!(writer.written(), 4);
        writer.write_u32(1).unwrap();
        assert_eq!(writer.write_slice(&[0]), Err(DriverError::BadAddress));
        assert_eq!(&buf[..4], &0xDEAD_BEEFu32.to_ne_bytes());
    }

    #[test]
    fn writer_short_buffer_left_untouched() {
        let mut buf = [0xAAu8; 3];
        let mut writer = UserSliceWriter::new(&mut buf, 4);
        assert_eq!(writer.write_u32(0), Err(DriverError::BadAddress));
        assert_eq!(buf, [0xAA; 3]);
    }

    #[test]
    fn zero_length_requests() {
        assert!(UserSliceReader::new(&[], 0).is_empty());
        let mut buf: [u8; 0] = [];
        assert!(UserSliceWriter::new(&mut buf, 0).is_empty());
    }
}
