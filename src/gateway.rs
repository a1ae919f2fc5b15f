//! CAN to GS-USB gateway
//!
//! This module provides [`Gateway`], which owns the frame pool and the
//! dispatch queue and implements the three producers feeding the host: the
//! receive path, the transmit echo path and the error frame synthesizer.
//!
//! Producers and the USB consumer share the gateway by reference; buffers
//! only ever move between them through the two queues.

use log::{debug, error, warn};

use crate::clock::{EmbassyClock, TickSource};
use crate::config::{ErrorPolicy, GatewayConfig};
use crate::constants::{CAN_QUEUE_SIZE, GS_USB_RX_ECHO_ID};
use crate::error::{GatewayError, Result};
use crate::error_frame::{encode_error_frame, FaultSnapshot};
use crate::frame::{CanHeader, HostFrame};
use crate::length_code::length_code_to_bytes;
use crate::pool::FramePool;
use crate::queue::{FrameQueue, Wait};

/// Gateway between the CAN controller and the GS-USB host interface
///
/// # Example
///
/// ```no_run
/// use gs_gateway::{CanHeader, EmbassyClock, Gateway, GatewayConfig, Wait};
///
/// # async fn run() -> gs_gateway::Result<()> {
/// let gateway: Gateway = Gateway::new(GatewayConfig::default(), EmbassyClock);
///
/// // Controller side: a classic frame came off the bus
/// gateway
///     .on_frame_received(&CanHeader::new(0x123, 2), &[0xAB, 0xCD])
///     .await?;
///
/// // USB side: take the frame, send its bytes, recycle the buffer
/// let frame = gateway.next_frame(Wait::Forever).await?;
/// let bytes = frame.pack(true);
/// assert_eq!(bytes.len(), 24);
/// gateway.complete(frame);
/// # Ok(())
/// # }
/// ```
pub struct Gateway<C: TickSource = EmbassyClock, const N: usize = CAN_QUEUE_SIZE> {
    pool: FramePool<N>,
    dispatch: FrameQueue<N>,
    clock: C,
    config: GatewayConfig,
}

impl<C: TickSource, const N: usize> Gateway<C, N> {
    /// Build a gateway with an initialized, populated pool
    pub fn new(config: GatewayConfig, clock: C) -> Self {
        let mut pool = FramePool::new();
        pool.initialize(config.fd_enabled);
        pool.populate();
        Self {
            pool,
            dispatch: FrameQueue::new(),
            clock,
            config,
        }
    }

    /// Switch the buffer layout, e.g. when the host enables CAN FD mode
    ///
    /// Frames still waiting for the host are discarded. Every buffer must have
    /// been returned before calling this.
    pub fn reconfigure(&mut self, fd_enabled: bool) {
        let mut discarded = 0;
        while let Some(frame) = self.dispatch.try_recv() {
            self.pool.release(frame);
            discarded += 1;
        }
        if discarded > 0 {
            debug!("discarded {} pending frames", discarded);
        }

        self.pool.deinitialize();
        self.pool.initialize(fd_enabled);
        self.pool.populate();
        self.config.fd_enabled = fd_enabled;
    }

    /// Release the pool storage; producers fail until [`reconfigure`](Self::reconfigure)
    pub fn shutdown(&mut self) {
        while let Some(frame) = self.dispatch.try_recv() {
            self.pool.release(frame);
        }
        self.pool.deinitialize();
    }

    /// Receive path: forward a frame read from the bus
    ///
    /// Waits without bound for a free buffer so received traffic is never
    /// dropped, then waits at most `queue_timeout` for room in the dispatch
    /// queue. On timeout the buffer goes back to the pool.
    pub async fn on_frame_received(&self, header: &CanHeader, data: &[u8]) -> Result<()> {
        self.check_format(header)?;

        let mut frame = self.pool.acquire(Wait::Forever).await?;
        Self::fill(
            &mut frame,
            header,
            data,
            self.clock.now_us(),
            !header.is_remote(),
        );

        self.dispatch_frame(frame, Wait::For(self.config.queue_timeout))
            .await
    }

    /// Transmit path: report a frame the controller sent on the bus
    ///
    /// Both the buffer and the dispatch slot are waited for at most
    /// `queue_timeout`. Echoes carry a zero timestamp.
    pub async fn on_frame_to_echo(&self, header: &CanHeader, data: &[u8]) -> Result<()> {
        self.check_format(header)?;

        let wait = Wait::For(self.config.queue_timeout);
        let mut frame = self.pool.acquire(wait).await.map_err(|e| {
            warn!("no buffer for echo of {:08X}: {}", header.can_id(), e);
            e
        })?;
        Self::fill(&mut frame, header, data, 0, true);

        self.dispatch_frame(frame, wait).await
    }

    /// Error frame synthesizer: report a controller fault
    ///
    /// Never waits, so it can run from the fault interrupt. A snapshot with no
    /// reportable condition recycles the buffer and succeeds without sending.
    pub fn on_controller_fault(&self, fault: &FaultSnapshot) -> Result<()> {
        let mut frame = self.pool.try_acquire()?;

        if !encode_error_frame(fault, &mut frame, self.clock.now_us()) {
            self.pool.release(frame);
            return Ok(());
        }

        if let Err(frame) = self.dispatch.try_send(frame) {
            warn!("dispatch queue full, error frame {:08X} dropped", frame.can_id);
            self.pool.release(frame);
            return Err(GatewayError::DispatchFull);
        }
        Ok(())
    }

    /// Take the next frame bound for the host, waiting at most `wait`
    pub async fn next_frame(&self, wait: Wait) -> Result<HostFrame> {
        self.dispatch
            .recv(wait)
            .await
            .ok_or(GatewayError::NothingPending)
    }

    /// Take the next frame bound for the host without waiting
    pub fn try_next_frame(&self) -> Result<HostFrame> {
        self.dispatch.try_recv().ok_or(GatewayError::NothingPending)
    }

    /// Hand a consumed frame back to the pool
    pub fn complete(&self, frame: HostFrame) {
        self.pool.release(frame);
    }

    /// Frames waiting for the host
    pub fn pending(&self) -> usize {
        self.dispatch.len()
    }

    pub fn pool(&self) -> &FramePool<N> {
        &self.pool
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    fn check_format(&self, header: &CanHeader) -> Result<()> {
        if !header.is_fd() {
            return Ok(());
        }
        error!("CAN FD frame {:08X} not supported", header.can_id());
        if self.config.error_policy == ErrorPolicy::Halt {
            panic!("unsupported CAN FD frame {:08X}", header.can_id());
        }
        Err(GatewayError::UnsupportedFdFrame)
    }

    fn fill(frame: &mut HostFrame, header: &CanHeader, data: &[u8], timestamp_us: u32, copy: bool) {
        frame.echo_id = GS_USB_RX_ECHO_ID;
        frame.can_id = header.can_id();
        frame.can_dlc = header.length_code;
        frame.channel = 0;
        frame.flags = 0;
        frame.reserved = 0;
        frame.timestamp_us = timestamp_us;

        frame.clear_payload(frame.payload().len());
        if copy {
            let len = length_code_to_bytes(header.length_code).min(data.len());
            frame.copy_payload(&data[..len]);
        }
    }

    async fn dispatch_frame(&self, frame: HostFrame, wait: Wait) -> Result<()> {
        match self.dispatch.send(frame, wait).await {
            Ok(()) => Ok(()),
            Err(frame) => {
                warn!("dispatch queue timeout, frame {:08X} dropped", frame.can_id);
                self.pool.release(frame);
                Err(GatewayError::DispatchTimeout)
            }
        }
    }
}

impl<C: TickSource, const N: usize> std::fmt::Debug for Gateway<C, N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("pool_size", &self.pool.size())
            .field("available", &self.pool.available())
            .field("pending", &self.dispatch.len())
            .field("fd_enabled", &self.config.fd_enabled)
            .finish()
    }
}
