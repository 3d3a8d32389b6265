//! Growable receive buffer used while framing a request.

use std::io;

/// Starting capacity of a request buffer.
pub const INITIAL_CAPACITY: usize = 30;

/// Minimum headroom kept ahead of the filled region; dropping below it
/// doubles the capacity.
pub const GROW_THRESHOLD: usize = 20;

/// An owned byte accumulator with an explicit capacity/filled split.
///
/// The backing vector's length is the capacity; only the first `filled`
/// bytes hold received data. Growth is strictly doubling, so repeated
/// one-byte appends stay amortized O(n).
pub struct RecvBuffer {
    bytes: Vec<u8>,
    filled: usize,
}

impl RecvBuffer {
    pub fn new() -> io::Result<RecvBuffer> {
        let mut bytes = Vec::new();
        bytes
            .try_reserve_exact(INITIAL_CAPACITY)
            .map_err(|_| out_of_memory())?;
        bytes.resize(INITIAL_CAPACITY, 0);
        Ok(RecvBuffer { bytes, filled: 0 })
    }

    pub fn capacity(&self) -> usize {
        self.bytes.len()
    }

    pub fn filled(&self) -> usize {
        self.filled
    }

    /// Doubles the capacity once the remaining headroom drops below
    /// [`GROW_THRESHOLD`]. Allocation failure is reported to the caller
    /// instead of aborting the process.
    pub fn ensure_headroom(&mut self) -> io::Result<()> {
        if self.bytes.len() - self.filled >= GROW_THRESHOLD {
            return Ok(());
        }
        let grow_by = self.bytes.len();
        self.bytes
            .try_reserve_exact(grow_by)
            .map_err(|_| out_of_memory())?;
        let new_capacity = self.bytes.len() + grow_by;
        self.bytes.resize(new_capacity, 0);
        Ok(())
    }

    /// The writable tail between `filled` and the capacity.
    pub fn spare_mut(&mut self) -> &mut [u8] {
        &mut self.bytes[self.filled..]
    }

    /// Marks `n` more bytes as filled.
    pub fn advance(&mut self, n: usize) {
        debug_assert!(self.filled + n <= self.bytes.len());
        self.filled += n;
    }

    /// True when the filled region ends with `needle`. Always false while
    /// fewer than `needle.len()` bytes have arrived, so the check can be
    /// made after every single-byte read.
    pub fn ends_with(&self, needle: &[u8]) -> bool {
        if self.filled < needle.len() {
            return false;
        }
        &self.bytes[self.filled - needle.len()..self.filled] == needle
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.filled]
    }
}

fn out_of_memory() -> io::Error {
    io::Error::new(io::ErrorKind::OutOfMemory, "request buffer allocation failed")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn append_byte(buf: &mut RecvBuffer, byte: u8) {
        buf.ensure_headroom().unwrap();
        buf.spare_mut()[0] = byte;
        buf.advance(1);
    }

    #[test]
    fn capacity_doubles_from_the_initial_size() {
        let mut buf = RecvBuffer::new().unwrap();
        let mut capacities = vec![buf.capacity()];

        for _ in 0..200 {
            append_byte(&mut buf, b'x');
            assert!(buf.filled() <= buf.capacity());
            if buf.capacity() != *capacities.last().unwrap() {
                capacities.push(buf.capacity());
            }
        }

        assert_eq!(capacities, vec![30, 60, 120, 240]);
    }

    #[test]
    fn growth_triggers_below_the_headroom_threshold() {
        let mut buf = RecvBuffer::new().unwrap();
        for _ in 0..11 {
            append_byte(&mut buf, b'x');
        }
        // 19 bytes of headroom left, so the next append grows first
        assert_eq!(buf.capacity(), INITIAL_CAPACITY);
        append_byte(&mut buf, b'x');
        assert_eq!(buf.capacity(), INITIAL_CAPACITY * 2);
    }

    #[test]
    fn sentinel_check_is_guarded_while_short() {
        let mut buf = RecvBuffer::new().unwrap();
        assert!(!buf.ends_with(b"\r\n\r\n"));
        for &byte in b"\r\n\r" {
            append_byte(&mut buf, byte);
            assert!(!buf.ends_with(b"\r\n\r\n"));
        }
        append_byte(&mut buf, b'\n');
        assert!(buf.ends_with(b"\r\n\r\n"));
    }

    #[test]
    fn sentinel_must_terminate_the_filled_region() {
        let mut buf = RecvBuffer::new().unwrap();
        for &byte in b"ab\r\n\r\ncd" {
            append_byte(&mut buf, byte);
        }
        assert!(!buf.ends_with(b"\r\n\r\n"));
        assert_eq!(buf.as_slice(), b"ab\r\n\r\ncd");
    }
}
