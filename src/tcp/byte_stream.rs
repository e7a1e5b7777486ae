use std::collections::VecDeque;
use std::io::{self, Error, ErrorKind, Read, Write};

/// An in-order byte stream with a fixed capacity.
///
/// The writer half pushes bytes in and eventually closes the stream; the
/// reader half peeks at and pops them back out in FIFO order. Overfull
/// pushes are truncated rather than rejected.
#[derive(Debug)]
pub struct ByteStream {
    buffer: VecDeque<u8>,
    capacity: usize,
    bytes_pushed: u64,
    bytes_popped: u64,
    closed: bool,
    error: bool,
}

impl ByteStream {
    /// New `ByteStream` with capacity `N`
    pub fn new(capacity: usize) -> Self {
        ByteStream {
            buffer: VecDeque::with_capacity(capacity),
            capacity,
            bytes_pushed: 0,
            bytes_popped: 0,
            closed: false, // It's always the producer's job to close the byte stream, never the consumer
            error: false,
        }
    }

    /// Append as much of `data` as fits and return the number of bytes
    /// accepted. Pushing to a closed stream is a no-op.
    pub fn push(&mut self, data: &[u8]) -> usize {
        if self.closed {
            return 0;
        }
        let to_push = data.len().min(self.available_capacity());
        self.buffer.extend(&data[..to_push]);
        self.bytes_pushed += to_push as u64;
        to_push
    }

    /// Close the writer half. Idempotent; later pushes are no-ops.
    pub fn close(&mut self) {
        self.closed = true;
    }

    /// Flag the stream as broken. Sticky.
    pub fn set_error(&mut self) {
        self.error = true;
    }

    /// Has the stream been flagged as broken?
    pub fn has_error(&self) -> bool {
        self.error
    }

    /// A contiguous view of buffered bytes. May be only a prefix of what is
    /// buffered; re-peek after popping.
    pub fn peek(&self) -> &[u8] {
        self.buffer.as_slices().0
    }

    /// Discard up to `len` bytes from the front and return the actual number
    /// of bytes popped
    pub fn pop(&mut self, len: usize) -> usize {
        let to_pop = len.min(self.buffer.len());
        self.buffer.drain(..to_pop);
        self.bytes_popped += to_pop as u64;
        to_pop
    }

    /// The remaining capacity in the byte stream
    pub fn available_capacity(&self) -> usize {
        self.capacity - self.buffer.len()
    }

    /// The number of bytes pushed but not popped yet
    pub fn bytes_buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Is the writer half closed?
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Is the stream closed and fully drained?
    pub fn is_finished(&self) -> bool {
        self.closed && self.buffer.is_empty()
    }

    /// The total number of bytes ever pushed
    pub fn bytes_pushed(&self) -> u64 {
        self.bytes_pushed
    }

    /// The total number of bytes ever popped
    pub fn bytes_popped(&self) -> u64 {
        self.bytes_popped
    }
}

impl Read for ByteStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let to_read = buf.len().min(self.buffer.len());

        if to_read > 0 {
            // Make ring buffer contiguous if not already
            let contiguous = self.buffer.make_contiguous();
            buf[..to_read].copy_from_slice(&contiguous[..to_read]);
            self.buffer.drain(..to_read);
            self.bytes_popped += to_read as u64;
            Ok(to_read)
        } else {
            Ok(0)
        }
    }
}

impl Write for ByteStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.closed {
            return Err(Error::new(ErrorKind::Other, "stream closed"));
        }
        Ok(self.push(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(()) // no-op because this is an in-memory data structure
    }
}

// -- Unit tests --
