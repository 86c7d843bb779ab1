//! Lock-free pool of relay scratch buffers
//!
//! Buffers come back dirty: a checkout may hold bytes from a previous
//! session. Pumps must write before they read and only ever touch
//! `&buf[..n]` after a read of `n` bytes. Nothing here zeroes on return.

use crossbeam::queue::SegQueue;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::constants::buffer::MAX_POOLED;
use crate::types::BufferSize;

/// A pooled buffer that returns itself to the pool when dropped
///
/// Deref gives the full configured buffer length; contents beyond what
/// the holder has written are stale and must not be interpreted.
pub struct PooledBuffer {
    buffer: Vec<u8>,
    pool: Arc<SegQueue<Vec<u8>>>,
    idle: Arc<AtomicUsize>,
}

impl Deref for PooledBuffer {
    type Target = [u8];

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.buffer[..]
    }
}

impl DerefMut for PooledBuffer {
    #[inline]
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.buffer[..]
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        // Return on every exit path, including a cancelled pump. Excess
        // buffers beyond the idle cap are freed instead of retained.
        if self.idle.load(Ordering::Relaxed) < MAX_POOLED {
            self.pool.push(std::mem::take(&mut self.buffer));
            self.idle.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Process-wide pool of relay buffers, sized once from config
#[derive(Debug, Clone)]
pub struct BufferPool {
    pool: Arc<SegQueue<Vec<u8>>>,
    buffer_size: BufferSize,
    idle: Arc<AtomicUsize>,
}

impl BufferPool {
    /// Create a pool producing buffers of `buffer_size` bytes
    #[must_use]
    pub fn new(buffer_size: BufferSize) -> Self {
        Self {
            pool: Arc::new(SegQueue::new()),
            buffer_size,
            idle: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Size of every buffer this pool hands out
    #[must_use]
    #[inline]
    pub fn buffer_size(&self) -> usize {
        self.buffer_size.get()
    }

    /// Check a buffer out of the pool, allocating if none are idle
    ///
    /// The returned buffer's contents are undefined; treat it as scratch.
    pub fn acquire(&self) -> PooledBuffer {
        let buffer = match self.pool.pop() {
            Some(buffer) => {
                self.idle.fetch_sub(1, Ordering::Relaxed);
                debug_assert_eq!(buffer.len(), self.buffer_size.get());
                buffer
            }
            // Zeroed on first allocation only; reuse leaves residue
            None => vec![0u8; self.buffer_size.get()],
        };

        PooledBuffer {
            buffer,
            pool: Arc::clone(&self.pool),
            idle: Arc::clone(&self.idle),
        }
    }
}
