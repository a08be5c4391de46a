//! Reusable output buffers for template execution.
//!
//! Templates render into a buffer first so that a failed render never sends
//! partial output. [`BufferPool`] keeps those buffers around between requests.
//! Checkout hands out a [`PooledBuffer`] guard that returns the buffer when it
//! is dropped, whichever way the render ends.

use std::fmt;
use std::ops::{Deref, DerefMut};

use crossbeam::queue::ArrayQueue;

/// Number of buffers a pool retains by default.
pub const DEFAULT_POOL_CAPACITY: usize = 64;

/// Bounded pool of byte buffers, safe to share between threads.
pub struct BufferPool {
    free: ArrayQueue<Vec<u8>>,
}

impl BufferPool {
    /// Creates a pool retaining at most `capacity` idle buffers.
    ///
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        Self {
            free: ArrayQueue::new(capacity.max(1)),
        }
    }

    /// Takes a cleared buffer from the pool, allocating when none is idle.
    pub fn acquire(&self) -> PooledBuffer<'_> {
        let mut buf = self.free.pop().unwrap_or_default();
        buf.clear();
        PooledBuffer { buf, pool: self }
    }

    /// Returns a buffer. Dropped when the pool is already full.
    pub fn release(&self, mut buf: Vec<u8>) {
        buf.clear();
        // Full pool: let the buffer go.
        let _ = self.free.push(buf);
    }

    /// Number of idle buffers.
    pub fn len(&self) -> usize {
        self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.free.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.free.capacity()
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new(DEFAULT_POOL_CAPACITY)
    }
}

impl fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferPool")
            .field("idle", &self.len())
            .field("capacity", &self.capacity())
            .finish()
    }
}

/// A buffer checked out of a [`BufferPool`]; returned on drop.
pub struct PooledBuffer<'a> {
    buf: Vec<u8>,
    pool: &'a BufferPool,
}

impl PooledBuffer<'_> {
    /// Detaches the buffer from the pool.
    pub fn into_inner(mut self) -> Vec<u8> {
        let buf = std::mem::take(&mut self.buf);
        std::mem::forget(self);
        buf
    }
}

impl Deref for PooledBuffer<'_> {
    type Target = Vec<u8>;

    fn deref(&self) -> &Vec<u8> {
        &self.buf
    }
}

impl DerefMut for PooledBuffer<'_> {
    fn deref_mut(&mut self) -> &mut Vec<u8> {
        &mut self.buf
    }
}

impl Drop for PooledBuffer<'_> {
    fn drop(&mut self) {
        self.pool.release(std::mem::take(&mut self.buf));
    }
}

impl fmt::Debug for PooledBuffer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledBuffer")
            .field("len", &self.buf.len())
            .finish()
    }
}
