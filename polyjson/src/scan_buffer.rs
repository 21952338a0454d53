//! Refillable byte buffer for reader-based decoding.
//!
//! A decode attempt that runs out of input is retried from the start of the
//! same object, so the bytes of an unfinished object have to stay put until
//! it decodes. Bytes before that object are dropped by [`ScanBuffer::consume`],
//! which shifts the unfinished tail to the front; when the tail already fills
//! the whole buffer, [`ScanBuffer::grow`] doubles it.

use crate::options::DEFAULT_BUFFER_CAPACITY;

/// A refillable buffer over a [`std::io::Read`] source.
#[derive(Debug)]
pub struct ScanBuffer {
    /// The underlying buffer
    data: Vec<u8>,
    /// How many bytes are valid (filled with data)
    filled: usize,
    /// Whether EOF has been reached on the underlying reader
    eof: bool,
}

impl ScanBuffer {
    /// Create a new buffer with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BUFFER_CAPACITY)
    }

    /// Create a new buffer with a specific capacity (at least one byte).
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: vec![0u8; capacity.max(1)],
            filled: 0,
            eof: false,
        }
    }

    /// Get the current buffer contents.
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data[..self.filled]
    }

    /// Whether the underlying reader has reached EOF.
    #[inline]
    pub fn is_eof(&self) -> bool {
        self.eof
    }

    /// How many bytes are filled.
    #[inline]
    pub fn filled(&self) -> usize {
        self.filled
    }

    /// Get the buffer's total capacity.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Whether every byte of the buffer holds data.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.filled == self.data.len()
    }

    /// Drop the first `n` filled bytes, moving the rest to the front.
    pub fn consume(&mut self, n: usize) {
        let n = n.min(self.filled);
        self.data.copy_within(n..self.filled, 0);
        self.filled -= n;
    }

    /// Double the buffer's capacity.
    pub fn grow(&mut self) {
        let new_capacity = self.data.len() * 2;
        self.data.resize(new_capacity, 0);
    }

    /// Read more data into the unfilled portion of the buffer.
    ///
    /// Returns the number of bytes read; `0` means EOF, or that the buffer is
    /// full and the caller should [`grow`](Self::grow) it first.
    pub fn refill<R: std::io::Read>(&mut self, reader: &mut R) -> std::io::Result<usize> {
        if self.eof {
            return Ok(0);
        }

        let read_buf = &mut self.data[self.filled..];
        if read_buf.is_empty() {
            return Ok(0);
        }

        let n = loop {
            match reader.read(read_buf) {
                Ok(n) => break n,
                Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            }
        };
        self.filled += n;

        if n == 0 {
            self.eof = true;
        }

        Ok(n)
    }
}

impl Default for ScanBuffer {
    fn default() -> Self {
        Self::new()
    }
}
