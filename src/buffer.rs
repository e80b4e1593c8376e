//! Byte buffers shared between the engines and their producers or consumers.
//!
//! The engines only talk to buffers through [`ByteBuffer`], which adds two
//! ownership protocols to plain FIFO access:
//!
//! - **Reversible write**: bytes put after [`open_reversible_write`](ByteBuffer::open_reversible_write)
//!   stay invisible to readers until committed, and can be rolled back in one
//!   call. The frame handler uses this so a half-received frame never reaches
//!   the application.
//! - **Write lock**: a reader reserves the buffer so no producer can append
//!   while it drains. The frame writer uses this to snapshot a payload.
//!
//! [`RingBuffer`] is a fixed-capacity, allocation-free implementation backed by
//! [`heapless::Deque`].

use heapless::Deque;

use crate::error::BufferError;

/// Byte FIFO with reversible writes and a write lock.
pub trait ByteBuffer {
    /// Appends one byte.
    fn put(&mut self, byte: u8) -> Result<(), BufferError>;

    /// Removes the oldest readable byte, or `None` if nothing is readable.
    fn get(&mut self) -> Option<u8>;

    /// Whether no readable byte is available.
    fn is_empty(&self) -> bool;

    /// Number of readable bytes.
    fn fill_level(&self) -> usize;

    /// Marks the current end of the buffer as the rollback point.
    fn open_reversible_write(&mut self) -> Result<(), BufferError>;

    /// Makes every byte written since the rollback point readable.
    fn commit_reversible_write(&mut self) -> Result<(), BufferError>;

    /// Discards every byte written since the rollback point.
    fn reverse_write(&mut self) -> Result<(), BufferError>;

    /// Reserves the buffer for the caller; producers can no longer `put`.
    fn acquire_write_lock(&mut self) -> Result<(), BufferError>;

    /// Releases a lock taken with [`acquire_write_lock`](ByteBuffer::acquire_write_lock).
    fn release_write_lock(&mut self) -> Result<(), BufferError>;

    /// Whether a reversible write is currently open.
    fn reversible_write_open(&self) -> bool;
}

/// A fixed-capacity circular byte buffer.
///
/// While a reversible write is open, newly put bytes are *staged*: they occupy
/// capacity but are not returned by [`get`](ByteBuffer::get) or counted by
/// [`fill_level`](ByteBuffer::fill_level) until committed.
#[derive(Debug)]
pub struct RingBuffer<const N: usize> {
    bytes: Deque<u8, N>,
    /// Bytes put since the reversible write was opened, `None` if none is open.
    staged: Option<usize>,
    locked: bool,
}

impl<const N: usize> RingBuffer<N> {
    /// Creates an empty, unlocked buffer.
    pub const fn new() -> Self {
        Self {
            bytes: Deque::new(),
            staged: None,
            locked: false,
        }
    }

    /// Total capacity in bytes.
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Whether a reader currently holds the write lock.
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Drops all content, closes any reversible write and releases the lock.
    pub fn clear(&mut self) {
        self.bytes.clear();
        self.staged = None;
        self.locked = false;
    }

    /// Iterates over the readable bytes, oldest first, without consuming them.
    pub fn iter(&self) -> impl Iterator<Item = &u8> {
        self.bytes.iter().take(self.fill_level())
    }
}

impl<const N: usize> Default for RingBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> ByteBuffer for RingBuffer<N> {
    fn put(&mut self, byte: u8) -> Result<(), BufferError> {
        if self.locked {
            return Err(BufferError::Locked);
        }
        self.bytes.push_back(byte).map_err(|_| BufferError::Full)?;
        if let Some(staged) = self.staged.as_mut() {
            *staged += 1;
        }
        Ok(())
    }

    fn get(&mut self) -> Option<u8> {
        if self.fill_level() == 0 {
            return None;
        }
        self.bytes.pop_front()
    }

    fn is_empty(&self) -> bool {
        self.fill_level() == 0
    }

    fn fill_level(&self) -> usize {
        self.bytes.len() - self.staged.unwrap_or(0)
    }

    fn open_reversible_write(&mut self) -> Result<(), BufferError> {
        if self.staged.is_some() {
            return Err(BufferError::ReversibleWriteOpen);
        }
        self.staged = Some(0);
        Ok(())
    }

    fn commit_reversible_write(&mut self) -> Result<(), BufferError> {
        self.staged
            .take()
            .map(|_| ())
            .ok_or(BufferError::NoReversibleWrite)
    }

    fn reverse_write(&mut self) -> Result<(), BufferError> {
        let staged = self.staged.take().ok_or(BufferError::NoReversibleWrite)?;
        for _ in 0..staged {
            let _ = self.bytes.pop_back();
        }
        Ok(())
    }

    fn acquire_write_lock(&mut self) -> Result<(), BufferError> {
        if self.locked {
            return Err(BufferError::Locked);
        }
        self.locked = true;
        Ok(())
    }

    fn release_write_lock(&mut self) -> Result<(), BufferError> {
        if !self.locked {
            return Err(BufferError::NotLocked);
        }
        self.locked = false;
        Ok(())
    }

    fn reversible_write_open(&self) -> bool {
        self.staged.is_some()
    }
}
