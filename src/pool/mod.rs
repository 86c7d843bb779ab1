//! Buffer pooling for relay I/O
//!
//! The only shared mutable state on the hot path: a lock-free pool of
//! fixed-size scratch buffers, one checked out per relay direction.

mod buffer;

pub use buffer::{BufferPool, PooledBuffer};
