//! A growable byte accumulator for inbound wire data (§4.1).
//!
//! Grounded on the `bytes::BytesMut` usage pattern the teacher's `codec::framed_read`
//! builds on: append incoming bytes, peek/parse without copying, then shift off whatever
//! was consumed. Unlike `BytesMut` alone, this type enforces the ceiling from §4.1's
//! NO_MEMORY note, since the standard allocator has no fallible growth path of its own.

use bytes::{Buf, BytesMut};

use crate::error::{Error, Result};

/// Minimum single allocation, in bytes, when the buffer must grow (§6 compile-time knobs).
pub const BUFFER_ALLOC_MIN: usize = 256;

/// Geometric growth factor applied when the buffer must grow past its current capacity.
const GROWTH_FACTOR: f64 = 1.5;

/// A byte accumulator with a hard capacity ceiling.
#[derive(Debug)]
pub struct ByteBuffer {
    inner: BytesMut,
    ceiling: usize,
}

impl ByteBuffer {
    pub fn new(ceiling: usize) -> ByteBuffer {
        ByteBuffer { inner: BytesMut::new(), ceiling }
    }

    /// Appends `bytes` to the buffer, growing geometrically if needed. Fails with
    /// `Error::NoMemory` if the resulting buffer would exceed the ceiling.
    pub fn append(&mut self, bytes: &[u8]) -> Result<()> {
        let needed = self.inner.len() + bytes.len();
        if needed > self.ceiling {
            return Err(Error::NoMemory);
        }

        if self.inner.capacity() < needed {
            let grown = ((self.inner.capacity() as f64) * GROWTH_FACTOR) as usize;
            let target = grown.max(needed).max(BUFFER_ALLOC_MIN).min(self.ceiling);
            self.inner.reserve(target - self.inner.capacity());
        }

        self.inner.extend_from_slice(bytes);
        Ok(())
    }

    /// Discards the first `n` bytes, compacting storage as a side effect of `BytesMut`'s
    /// own internal bookkeeping.
    pub fn shift(&mut self, n: usize) {
        self.inner.advance(n.min(self.inner.len()));
    }

    /// Borrows the currently buffered contents.
    pub fn as_view(&self) -> &[u8] {
        &self.inner[..]
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_and_shift() {
        let mut buf = ByteBuffer::new(1024);
        buf.append(b"hello").unwrap();
        buf.append(b" world").unwrap();
        assert_eq!(buf.as_view(), b"hello world");
        buf.shift(6);
        assert_eq!(buf.as_view(), b"world");
    }

    #[test]
    fn append_past_ceiling_fails() {
        let mut buf = ByteBuffer::new(4);
        assert!(buf.append(b"hello").is_err());
    }

    #[test]
    fn shift_past_len_clears() {
        let mut buf = ByteBuffer::new(64);
        buf.append(b"ab").unwrap();
        buf.shift(100);
        assert!(buf.is_empty());
    }
}
