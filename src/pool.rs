//! Frame pool
//!
//! A fixed set of [`HostFrame`] buffers allocated once and recycled through a
//! bounded free-list queue. The number of buffers never changes between
//! [`FramePool::initialize`] and [`FramePool::deinitialize`]: every buffer is
//! either in the free list or owned by exactly one pipeline stage.

use log::{debug, error, warn};

use crate::constants::CAN_QUEUE_SIZE;
use crate::error::{GatewayError, Result};
use crate::frame::HostFrame;
use crate::queue::{FrameQueue, Wait};

/// Number of buffers a pool of `capacity` slots holds
///
/// FD-sized buffers are eight times larger, so the FD layout keeps one eighth
/// of the slots to bound total memory.
pub fn pool_size(capacity: usize, fd_enabled: bool) -> usize {
    capacity / (7 * fd_enabled as usize + 1)
}

/// Fixed-capacity pool of frame buffers
///
/// Each initialization starts a new generation. Buffers carry the generation
/// they were allocated for, and a buffer from an earlier generation is never
/// taken back into the free list.
pub struct FramePool<const N: usize = CAN_QUEUE_SIZE> {
    free: FrameQueue<N>,
    /// Buffers allocated but not yet handed to the free list
    spare: Vec<HostFrame>,
    size: usize,
    fd_layout: bool,
    generation: u32,
}

impl<const N: usize> Default for FramePool<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> FramePool<N> {
    /// Create an empty, uninitialized pool
    pub const fn new() -> Self {
        Self {
            free: FrameQueue::new(),
            spare: Vec::new(),
            size: 0,
            fd_layout: false,
            generation: 0,
        }
    }

    /// Allocate the pool buffers
    ///
    /// Allocates `pool_size(N, fd_enabled)` buffers with 8 or 64 byte payload
    /// regions. Does nothing if the pool is already initialized; call
    /// [`deinitialize`](Self::deinitialize) first to switch layouts.
    pub fn initialize(&mut self, fd_enabled: bool) {
        if self.size != 0 {
            debug!("frame pool already initialized with {} buffers", self.size);
            return;
        }

        // Generation 0 never owns a pool buffer
        self.generation = self.generation.wrapping_add(1).max(1);
        let generation = self.generation;
        let size = pool_size(N, fd_enabled);
        let buffers: Vec<HostFrame> = (0..size)
            .map(|slot| HostFrame::allocate(slot as u16, fd_enabled).in_generation(generation))
            .collect();

        self.spare = buffers;
        self.size = size;
        self.fd_layout = fd_enabled;
        debug!(
            "frame pool generation {} initialized: {} buffers, {} layout",
            generation,
            size,
            if fd_enabled { "FD" } else { "classic" }
        );
    }

    /// Move every allocated buffer not yet handed out into the free list
    ///
    /// Idempotent: a second call finds nothing left to move.
    pub fn populate(&mut self) {
        let count = self.spare.len();
        for frame in std::mem::take(&mut self.spare) {
            self.release(frame);
        }
        if count > 0 {
            debug!("frame pool populated with {} buffers", count);
        }
    }

    /// Take a free buffer, waiting at most `wait`
    pub async fn acquire(&self, wait: Wait) -> Result<HostFrame> {
        if self.size == 0 {
            return Err(GatewayError::PoolNotInitialized);
        }
        self.free.recv(wait).await.ok_or(GatewayError::PoolExhausted)
    }

    /// Take a free buffer without waiting
    pub fn try_acquire(&self) -> Result<HostFrame> {
        if self.size == 0 {
            return Err(GatewayError::PoolNotInitialized);
        }
        self.free.try_recv().ok_or(GatewayError::PoolExhausted)
    }

    /// Return a buffer to the free list
    ///
    /// Buffers that do not belong to the current generation (held across a
    /// [`deinitialize`](Self::deinitialize), or never allocated by this pool)
    /// are dropped. The free list never holds more than `size` buffers, so a
    /// full free list means a buffer was released twice.
    pub fn release(&self, frame: HostFrame) {
        if !self.owns(&frame) {
            warn!(
                "dropping foreign buffer slot {} (generation {}, pool generation {})",
                frame.slot(),
                frame.generation(),
                self.generation
            );
            return;
        }

        if self.free.len() >= self.size {
            error!("frame pool overflow releasing slot {}", frame.slot());
            debug_assert!(false, "frame slot {} released twice", frame.slot());
            return;
        }

        if let Err(frame) = self.free.try_send(frame) {
            error!("frame pool overflow releasing slot {}", frame.slot());
            debug_assert!(false, "frame slot {} released twice", frame.slot());
        }
    }

    fn owns(&self, frame: &HostFrame) -> bool {
        self.size != 0
            && frame.generation() == self.generation
            && (frame.slot() as usize) < self.size
    }

    /// Free every buffer and reset the pool size to zero
    ///
    /// Traffic must be quiesced first; buffers still held by a pipeline stage
    /// are reported, and dropped when their holder releases them.
    pub fn deinitialize(&mut self) {
        let mut freed = std::mem::take(&mut self.spare).len();
        while self.free.try_recv().is_some() {
            freed += 1;
        }

        if self.size == 0 {
            return;
        }
        if freed != self.size {
            warn!(
                "frame pool deinitialized with {} of {} buffers outstanding",
                self.size.saturating_sub(freed),
                self.size
            );
        }

        self.size = 0;
        self.fd_layout = false;
        debug!("frame pool generation {} deinitialized", self.generation);
    }

    /// Configured number of buffers (0 when uninitialized)
    pub fn size(&self) -> usize {
        self.size
    }

    /// Buffers currently sitting in the free list
    pub fn available(&self) -> usize {
        self.free.len()
    }

    /// Whether buffers use the 64-byte FD payload layout
    pub fn is_fd_layout(&self) -> bool {
        self.fd_layout
    }
}
