//! Bounded frame queue
//!
//! Every buffer hand-off in the gateway goes through a [`FrameQueue`]: the
//! free list of the pool and the dispatch queue toward the host both use it.
//! `try_*` calls never wait and are safe from interrupt context; the `async`
//! calls suspend the calling task for at most the requested [`Wait`].

use core::future::poll_fn;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, TrySendError};
use embassy_time::{with_deadline, Duration, Instant};

use crate::frame::HostFrame;

/// Wait bound of a queue operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wait {
    /// Fail immediately if the operation cannot complete
    None,
    /// Suspend for at most this long
    For(Duration),
    /// Suspend until the operation completes
    Forever,
}

impl Wait {
    /// Bounded wait in milliseconds
    pub fn millis(ms: u64) -> Self {
        Wait::For(Duration::from_millis(ms))
    }
}

/// Bounded FIFO of owned frame buffers
pub struct FrameQueue<const N: usize> {
    inner: Channel<CriticalSectionRawMutex, HostFrame, N>,
}

impl<const N: usize> Default for FrameQueue<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> FrameQueue<N> {
    pub const fn new() -> Self {
        Self {
            inner: Channel::new(),
        }
    }

    /// Enqueue without waiting; a full queue hands the frame back
    pub fn try_send(&self, frame: HostFrame) -> Result<(), HostFrame> {
        self.inner.try_send(frame).map_err(|TrySendError::Full(frame)| frame)
    }

    /// Dequeue without waiting
    pub fn try_recv(&self) -> Option<HostFrame> {
        self.inner.try_receive().ok()
    }

    /// Enqueue, suspending for at most `wait` while the queue is full
    ///
    /// On failure the frame is returned to the caller, never dropped.
    pub async fn send(&self, frame: HostFrame, wait: Wait) -> Result<(), HostFrame> {
        let deadline = match wait {
            Wait::For(timeout) => Instant::now() + timeout,
            _ => Instant::MAX,
        };

        let mut frame = frame;
        loop {
            frame = match self.try_send(frame) {
                Ok(()) => return Ok(()),
                Err(frame) => frame,
            };

            // Another sender may take the freed slot first, hence the retry loop.
            let space = poll_fn(|cx| self.inner.poll_ready_to_send(cx));
            match wait {
                Wait::None => return Err(frame),
                Wait::For(_) => {
                    if with_deadline(deadline, space).await.is_err() {
                        return Err(frame);
                    }
                }
                Wait::Forever => space.await,
            }
        }
    }

    /// Dequeue, suspending for at most `wait` while the queue is empty
    pub async fn recv(&self, wait: Wait) -> Option<HostFrame> {
        match wait {
            Wait::None => self.try_recv(),
            Wait::For(timeout) => {
                with_deadline(Instant::now() + timeout, self.inner.receive())
                    .await
                    .ok()
            }
            Wait::Forever => Some(self.inner.receive().await),
        }
    }

    /// Number of frames currently queued
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Fixed capacity of the queue
    pub const fn capacity(&self) -> usize {
        N
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(slot: u16) -> HostFrame {
        HostFrame::allocate(slot, false)
    }

    #[test]
    fn test_try_send_full_returns_frame() {
        let queue = FrameQueue::<2>::new();
        assert!(queue.try_send(frame(0)).is_ok());
        assert!(queue.try_send(frame(1)).is_ok());
        let rejected = queue.try_send(frame(2)).unwrap_err();
        assert_eq!(rejected.slot(), 2);
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_fifo_order() {
        let queue = FrameQueue::<4>::new();
        for slot in 0..3 {
            queue.try_send(frame(slot)).unwrap();
        }
        let order: Vec<u16> = std::iter::from_fn(|| queue.try_recv())
            .map(|f| f.slot())
            .collect();
        assert_eq!(order, vec![0, 1, 2]);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_send_timeout_hands_frame_back() {
        let queue = FrameQueue::<1>::new();
        queue.try_send(frame(0)).unwrap();

        let rejected = queue.send(frame(1), Wait::millis(10)).await.unwrap_err();
        assert_eq!(rejected.slot(), 1);
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test]
    async fn test_recv_timeout_on_empty() {
        let queue = FrameQueue::<1>::new();
        assert!(queue.recv(Wait::millis(10)).await.is_none());
        assert!(queue.recv(Wait::None).await.is_none());
    }

    #[tokio::test]
    async fn test_blocked_send_completes_when_drained() {
        let queue = FrameQueue::<1>::new();
        queue.try_send(frame(0)).unwrap();

        let (sent, drained) = tokio::join!(queue.send(frame(1), Wait::Forever), async {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            queue.try_recv()
        });
        assert!(sent.is_ok());
        assert_eq!(drained.map(|f| f.slot()), Some(0));
        assert_eq!(queue.try_recv().map(|f| f.slot()), Some(1));
    }
}
