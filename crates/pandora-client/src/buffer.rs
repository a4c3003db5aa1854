// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Byte buffer with independent read and write cursors.
//!
//! A [`Buffer`] either owns its storage (`Buffer<Vec<u8>>`, optionally
//! growable) or is a fixed view over caller-provided storage
//! (`Buffer<&mut [u8]>`). Writes are all-or-nothing: either every byte is
//! stored or the buffer is left untouched.
//!
//! ```text
//! 0          read        written        capacity
//! |----------|-----------|--------------|
//!   consumed    unread       free
//! ```

use std::io;
use thiserror::Error;

/// Factor applied to the capacity on each growth step.
const GROWTH_FACTOR: usize = 2;

/// Buffer operation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BufferError {
    /// The write does not fit and the buffer cannot grow.
    #[error("buffer full: need {needed} bytes, {remaining} remaining")]
    Full { needed: usize, remaining: usize },

    /// The allocator refused to grow the buffer.
    #[error("allocation of {requested} bytes failed")]
    OutOfMemory { requested: usize },
}

/// Backing storage of a [`Buffer`].
pub trait Storage: AsRef<[u8]> + AsMut<[u8]> {
    /// Reallocate to exactly `capacity` bytes, keeping existing contents.
    fn grow_to(&mut self, capacity: usize) -> Result<(), BufferError>;
}

impl Storage for Vec<u8> {
    fn grow_to(&mut self, capacity: usize) -> Result<(), BufferError> {
        let additional = capacity.saturating_sub(self.len());
        self.try_reserve_exact(additional)
            .map_err(|_| BufferError::OutOfMemory {
                requested: capacity,
            })?;
        self.resize(capacity, 0);
        Ok(())
    }
}

impl Storage for &mut [u8] {
    fn grow_to(&mut self, capacity: usize) -> Result<(), BufferError> {
        // Borrowed storage is never constructed as growable.
        Err(BufferError::Full {
            needed: capacity,
            remaining: self.len(),
        })
    }
}

/// Append-only byte buffer.
///
/// Invariant: `read <= written <= capacity`.
#[derive(Debug)]
pub struct Buffer<S: Storage = Vec<u8>> {
    data: S,
    written: usize,
    read: usize,
    growable: bool,
}

impl Buffer<Vec<u8>> {
    /// Owned buffer with a fixed capacity.
    pub fn new(capacity: usize) -> Self {
        Self::owned(capacity, false)
    }

    /// Owned buffer that grows on demand.
    ///
    /// Growth doubles the capacity until the pending write fits. A zero
    /// initial capacity grows from one byte.
    pub fn growable(capacity: usize) -> Self {
        Self::owned(capacity, true)
    }

    fn owned(capacity: usize, growable: bool) -> Self {
        Self {
            data: vec![0; capacity],
            written: 0,
            read: 0,
            growable,
        }
    }
}

impl<'a> Buffer<&'a mut [u8]> {
    /// Fixed buffer over caller-provided storage. Existing contents of
    /// `storage` are treated as free space.
    pub fn borrowed(storage: &'a mut [u8]) -> Self {
        Self {
            data: storage,
            written: 0,
            read: 0,
            growable: false,
        }
    }
}

impl<S: Storage> Buffer<S> {
    /// Append a single byte.
    pub fn append(&mut self, byte: u8) -> Result<(), BufferError> {
        self.write(&[byte])
    }

    /// Write all of `bytes` or nothing.
    pub fn write(&mut self, bytes: &[u8]) -> Result<(), BufferError> {
        if self.remaining() < bytes.len() {
            if !self.growable {
                return Err(BufferError::Full {
                    needed: bytes.len(),
                    remaining: self.remaining(),
                });
            }
            let min_capacity =
                self.written
                    .checked_add(bytes.len())
                    .ok_or(BufferError::OutOfMemory {
                        requested: usize::MAX,
                    })?;
            self.grow(min_capacity)?;
        }

        let end = self.written + bytes.len();
        self.data.as_mut()[self.written..end].copy_from_slice(bytes);
        self.written = end;
        Ok(())
    }

    fn grow(&mut self, min_capacity: usize) -> Result<(), BufferError> {
        let mut capacity = self.capacity().max(1);
        while capacity < min_capacity {
            capacity = capacity
                .checked_mul(GROWTH_FACTOR)
                .ok_or(BufferError::OutOfMemory {
                    requested: min_capacity,
                })?;
        }
        self.data.grow_to(capacity)
    }

    /// Copy up to `dest.len()` unread bytes into `dest`, advancing the read
    /// cursor. Returns the number of bytes copied.
    pub fn read(&mut self, dest: &mut [u8]) -> usize {
        let count = dest.len().min(self.written - self.read);
        dest[..count].copy_from_slice(&self.data.as_ref()[self.read..self.read + count]);
        self.read += count;
        count
    }

    /// Read a single byte.
    pub fn get(&mut self) -> Option<u8> {
        if self.eof() {
            return None;
        }
        let byte = self.data.as_ref()[self.read];
        self.read += 1;
        Some(byte)
    }

    /// Logically empty the buffer. Memory is retained.
    pub fn reset(&mut self) {
        self.written = 0;
        self.read = 0;
    }

    /// Move the read cursor back to the start.
    pub fn rewind(&mut self) {
        self.read = 0;
    }

    /// Move the read cursor, clamped to the written region.
    pub fn seek(&mut self, offset: usize) {
        self.read = offset.min(self.written);
    }

    /// Position of the read cursor.
    pub fn tell(&self) -> usize {
        self.read
    }

    pub fn capacity(&self) -> usize {
        self.data.as_ref().len()
    }

    /// Number of bytes written.
    pub fn size(&self) -> usize {
        self.written
    }

    /// Bytes that can be written without growing.
    pub fn remaining(&self) -> usize {
        self.capacity() - self.written
    }

    pub fn is_empty(&self) -> bool {
        self.written == 0
    }

    pub fn is_full(&self) -> bool {
        self.written == self.capacity()
    }

    /// True once every written byte has been read.
    pub fn eof(&self) -> bool {
        self.read == self.written
    }

    pub fn is_growable(&self) -> bool {
        self.growable
    }

    /// The written region, independent of the read cursor.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data.as_ref()[..self.written]
    }
}

/// `write!` support. Each call stores all of `buf` or nothing.
impl<S: Storage> io::Write for Buffer<S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Buffer::write(self, buf).map_err(|e| {
            let kind = match e {
                BufferError::Full { .. } => io::ErrorKind::WriteZero,
                BufferError::OutOfMemory { .. } => io::ErrorKind::OutOfMemory,
            };
            io::Error::new(kind, e)
        })?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn read_all<S: Storage>(buf: &mut Buffer<S>) -> Vec<u8> {
        let mut out = vec![0u8; buf.size()];
        let n = buf.read(&mut out);
        out.truncate(n);
        out
    }

    #[test]
    fn test_fixed_buffer_within_capacity() {
        let mut buf = Buffer::new(16);
        buf.write(b"hello").expect("write");
        buf.append(b' ').expect("append");
        buf.write(b"world").expect("write");

        assert_eq!(buf.size(), 11);
        assert_eq!(buf.remaining(), 5);
        assert_eq!(read_all(&mut buf), b"hello world");
        assert!(buf.eof());
    }

    #[test]
    fn test_fixed_buffer_rejects_overflow_without_partial_write() {
        let mut buf = Buffer::new(4);
        buf.write(b"abc").expect("write");

        let err = buf.write(b"de").unwrap_err();
        assert_eq!(
            err,
            BufferError::Full {
                needed: 2,
                remaining: 1
            }
        );
        assert_eq!(buf.as_bytes(), b"abc");

        buf.append(b'd').expect("last byte fits");
        assert!(buf.is_full());
        assert!(buf.append(b'e').is_err());
    }

    #[test]
    fn test_growable_buffer_grows_past_initial_capacity() {
        let mut buf = Buffer::growable(8);
        let payload: Vec<u8> = (0..100u8).collect();

        buf.write(&payload).expect("write");
        assert!(buf.capacity() >= 100);
        assert_eq!(buf.capacity(), 128);
        assert_eq!(read_all(&mut buf), payload);
    }

    #[test]
    fn test_growable_buffer_keeps_earlier_bytes() {
        let mut buf = Buffer::growable(2);
        buf.write(b"ab").expect("write");
        buf.write(b"cdefg").expect("write");
        buf.append(b'h').expect("append");

        assert_eq!(buf.as_bytes(), b"abcdefgh");
        assert_eq!(buf.capacity(), 8);
    }

    #[test]
    fn test_zero_capacity_growable_terminates() {
        let mut buf = Buffer::growable(0);
        buf.write(b"xyz").expect("write");
        assert_eq!(buf.as_bytes(), b"xyz");
        assert_eq!(buf.capacity(), 4);
    }

    #[test]
    fn test_reset_then_same_writes_reproduce_bytes() {
        let mut buf = Buffer::growable(4);
        buf.write(b"f1=abc\t").expect("write");
        buf.write(b"f2=123\n").expect("write");
        let first = read_all(&mut buf);

        buf.reset();
        assert_eq!(buf.size(), 0);
        assert!(buf.is_empty());
        let capacity = buf.capacity();

        buf.write(b"f1=abc\t").expect("write");
        buf.write(b"f2=123\n").expect("write");
        assert_eq!(read_all(&mut buf), first);
        assert_eq!(buf.capacity(), capacity);
    }

    #[test]
    fn test_rewind_and_seek() {
        let mut buf = Buffer::new(8);
        buf.write(b"abcd").expect("write");

        assert_eq!(buf.get(), Some(b'a'));
        assert_eq!(buf.get(), Some(b'b'));
        assert_eq!(buf.tell(), 2);

        buf.rewind();
        assert_eq!(buf.tell(), 0);
        assert_eq!(buf.get(), Some(b'a'));

        buf.seek(3);
        assert_eq!(buf.get(), Some(b'd'));
        assert_eq!(buf.get(), None);

        buf.seek(100);
        assert_eq!(buf.tell(), 4);
    }

    #[test]
    fn test_partial_read() {
        let mut buf = Buffer::new(8);
        buf.write(b"abcdef").expect("write");

        let mut dest = [0u8; 4];
        assert_eq!(buf.read(&mut dest), 4);
        assert_eq!(&dest, b"abcd");
        assert_eq!(buf.read(&mut dest), 2);
        assert_eq!(&dest[..2], b"ef");
        assert_eq!(buf.read(&mut dest), 0);
    }

    #[test]
    fn test_borrowed_buffer_never_grows() {
        let mut storage = [0u8; 4];
        {
            let mut buf = Buffer::borrowed(&mut storage);
            assert!(!buf.is_growable());
            buf.write(b"ab").expect("write");
            assert!(buf.write(b"cde").is_err());
            buf.write(b"cd").expect("write");
            assert!(buf.is_full());
        }
        assert_eq!(&storage, b"abcd");
    }

    #[test]
    fn test_formatted_write_into_fixed_buffer() {
        let mut buf = Buffer::new(12);
        write!(buf, "f1={}\t", 123).expect("fits");
        assert_eq!(buf.as_bytes(), b"f1=123\t");

        let err = write!(buf, "{}", "too long for it").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::WriteZero);
        assert_eq!(buf.as_bytes(), b"f1=123\t");
    }

    #[test]
    fn test_formatted_write_grows_growable_buffer() {
        let mut buf = Buffer::growable(2);
        write!(buf, "f2={:.6}\n", 1.5f64).expect("write");
        buf.flush().expect("flush");

        assert_eq!(buf.as_bytes(), b"f2=1.500000\n");
        assert_eq!(buf.capacity(), 16);
    }
}
