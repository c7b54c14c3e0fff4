//! Bounds-checked byte cursors
//!
//! Every RUTP field is read from or written into a caller-supplied slice
//! through these cursors. Each primitive checks the remaining length before
//! touching the slice and reports a [`CursorError`] instead of overrunning,
//! so a truncated datagram can never cause a panic or an out-of-bounds read.

use bytes::{Buf, BufMut};
use thiserror::Error;

/// Cursor failure: the slice ended before the field did
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Out of bounds: needed {needed} bytes at offset {offset}, {remaining} remaining")]
pub struct CursorError {
    /// Offset at which the access was attempted
    pub offset: usize,
    /// Bytes the access required
    pub needed: usize,
    /// Bytes left in the slice
    pub remaining: usize,
}

/// Read cursor over an immutable byte slice
#[derive(Debug, Clone)]
pub struct ReadCursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ReadCursor<'a> {
    /// Create a cursor positioned at the start of `buf`
    pub fn new(buf: &'a [u8]) -> Self {
        ReadCursor { buf, pos: 0 }
    }

    /// Current offset from the start of the slice
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left to read
    #[inline]
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], CursorError> {
        if self.remaining() < n {
            return Err(CursorError {
                offset: self.pos,
                needed: n,
                remaining: self.remaining(),
            });
        }
        let chunk = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(chunk)
    }

    /// Advance past `n` bytes without interpreting them
    pub fn skip(&mut self, n: usize) -> Result<(), CursorError> {
        self.take(n).map(|_| ())
    }

    pub fn read_u8(&mut self) -> Result<u8, CursorError> {
        Ok(self.take(1)?.get_u8())
    }

    pub fn read_u16(&mut self) -> Result<u16, CursorError> {
        Ok(self.take(2)?.get_u16())
    }

    pub fn read_u32(&mut self) -> Result<u32, CursorError> {
        Ok(self.take(4)?.get_u32())
    }

    pub fn read_u64(&mut self) -> Result<u64, CursorError> {
        Ok(self.take(8)?.get_u64())
    }

    /// Read a fixed-size byte array
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], CursorError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }
}

/// Write cursor over a mutable byte slice
///
/// Bytes past the cursor position are left untouched, so a caller can
/// overwrite just the header region of a pre-filled buffer.
#[derive(Debug)]
pub struct WriteCursor<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> WriteCursor<'a> {
    /// Create a cursor positioned at the start of `buf`
    pub fn new(buf: &'a mut [u8]) -> Self {
        WriteCursor { buf, pos: 0 }
    }

    /// Current offset from the start of the slice
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left to write
    #[inline]
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn window(&mut self, n: usize) -> Result<&mut [u8], CursorError> {
        if self.remaining() < n {
            return Err(CursorError {
                offset: self.pos,
                needed: n,
                remaining: self.remaining(),
            });
        }
        let start = self.pos;
        self.pos += n;
        Ok(&mut self.buf[start..start + n])
    }

    pub fn write_u8(&mut self, value: u8) -> Result<(), CursorError> {
        self.window(1)?.put_u8(value);
        Ok(())
    }

    pub fn write_u16(&mut self, value: u16) -> Result<(), CursorError> {
        self.window(2)?.put_u16(value);
        Ok(())
    }

    pub fn write_u32(&mut self, value: u32) -> Result<(), CursorError> {
        self.window(4)?.put_u32(value);
        Ok(())
    }

    pub fn write_u64(&mut self, value: u64) -> Result<(), CursorError> {
        self.window(8)?.put_u64(value);
        Ok(())
    }

    pub fn write_slice(&mut self, bytes: &[u8]) -> Result<(), CursorError> {
        self.window(bytes.len())?.put_slice(bytes);
        Ok(())
    }
}
