//! Dual-lens session.
//!
//! The glasses present themselves as two independent peripherals, one per
//! lens. [`DualLensSession`] owns both links and coordinates them:
//! - Discovery of both lenses by advertised name
//! - Connection and initialization of both lenses
//! - Keep-alive heartbeats with a shared counter
//! - Paged text, image and dashboard delivery, left lens first
//! - Dispatch of inbound notifications
//!
//! Content delivery is strictly serial: one chunk is written, then the
//! session waits for the lens to acknowledge it before writing the next.
//! Inbound notifications arrive on a single channel which is drained while
//! waiting, so acknowledgments are observed by the same flow that sends.
//! Whatever is already queued is dispatched before the ack flag is cleared,
//! and only the lens being waited on can set it.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::ack::AckTracker;
use crate::bmp::BmpTransfer;
use crate::control::{GlassesConfig, LensDiscovery, LensIdentity, LensSide};
use crate::link::{LinkError, LinkSession};
use crate::pager;
use crate::proto::{
    Command, DashboardUpdate, Frame, Heartbeat, Notification, ProtocolError, INIT_FRAME,
    ORDER_DISPLAY_COMPLETE, RESPONSE_FAILURE, RESPONSE_ORDER_RECEIVED,
};
use crate::transport::{Transport, TransportError};

/// Inbound notifications buffered between the links and the session
const NOTIFICATION_QUEUE: usize = 64;

/// Session lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Scanning,
    BothFound,
    Connecting,
    Connected,
    Disconnecting,
}

/// Outcome of a connect-gated send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum SendStatus {
    /// Frames were written (and acknowledged where required)
    Delivered,
    /// The session was not connected; a connect was made instead of writing
    Deferred,
}

/// Session errors
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Scan timed out before both lenses were found")]
    ScanTimeout,

    #[error("Scan failed: {0}")]
    Scan(#[source] TransportError),

    #[error("Timed out connecting to the lenses")]
    ConnectTimeout,

    #[error("Both lenses must be discovered before connecting")]
    IncompleteSession,

    #[error(transparent)]
    Link(#[from] LinkError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("No acknowledgment from {side} lens for page {page} chunk {chunk}")]
    AckTimeout { side: LensSide, page: u8, chunk: u8 },

    #[error("No acknowledgment from {side} lens for {command}")]
    ImageAckTimeout { side: LensSide, command: Command },
}

/// Session driving both lenses of one pair of glasses
pub struct DualLensSession<T: Transport> {
    transport: Arc<T>,
    config: GlassesConfig,
    discovery: LensDiscovery,

    left_lens: Option<LensIdentity<T::Handle>>,
    right_lens: Option<LensIdentity<T::Handle>>,
    left: Option<LinkSession<T>>,
    right: Option<LinkSession<T>>,

    state: SessionState,
    both_connected: bool,
    heartbeat_seq: u8,
    content_seq: u8,
    last_device_order: Option<u8>,
    ack: AckTracker,
    awaiting: Option<LensSide>,

    notify_tx: mpsc::Sender<(LensSide, Vec<u8>)>,
    notify_rx: mpsc::Receiver<(LensSide, Vec<u8>)>,
}

impl<T: Transport> DualLensSession<T> {
    /// Create an idle session on top of `transport`
    pub fn new(transport: Arc<T>, config: GlassesConfig) -> Self {
        let (notify_tx, notify_rx) = mpsc::channel(NOTIFICATION_QUEUE);
        Self {
            transport,
            discovery: LensDiscovery::new(&config),
            ack: AckTracker::with_poll_interval(config.ack_poll_interval),
            config,
            left_lens: None,
            right_lens: None,
            left: None,
            right: None,
            state: SessionState::Idle,
            both_connected: false,
            heartbeat_seq: 0,
            content_seq: 0,
            last_device_order: None,
            awaiting: None,
            notify_tx,
            notify_rx,
        }
    }

    pub fn config(&self) -> &GlassesConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether both lenses are connected and initialized
    pub fn is_connected(&self) -> bool {
        self.both_connected
    }

    pub fn heartbeat_sequence(&self) -> u8 {
        self.heartbeat_seq
    }

    pub fn content_sequence(&self) -> u8 {
        self.content_seq
    }

    /// Last order raised by either lens
    pub fn last_device_order(&self) -> Option<u8> {
        self.last_device_order
    }

    /// Lens discovered for `side`, if any
    pub fn lens(&self, side: LensSide) -> Option<&LensIdentity<T::Handle>> {
        match side {
            LensSide::Left => self.left_lens.as_ref(),
            LensSide::Right => self.right_lens.as_ref(),
        }
    }

    fn link(&self, side: LensSide) -> Option<&LinkSession<T>> {
        match side {
            LensSide::Left => self.left.as_ref(),
            LensSide::Right => self.right.as_ref(),
        }
    }

    fn link_mut(&mut self, side: LensSide) -> Option<&mut LinkSession<T>> {
        match side {
            LensSide::Left => self.left.as_mut(),
            LensSide::Right => self.right.as_mut(),
        }
    }

    /// Enumerate advertisements until both lenses are found or `timeout`
    /// elapses. Previously found lenses are forgotten first.
    pub async fn scan_for_lenses(&mut self, timeout: Duration) -> Result<(), SessionError> {
        self.forget_lenses().await;
        self.state = SessionState::Scanning;
        info!(timeout = ?timeout, "Scanning for lenses");

        let deadline = Instant::now() + timeout;
        loop {
            let advertisements = match self.transport.scan().await {
                Ok(ads) => ads,
                Err(e) => {
                    self.state = SessionState::Idle;
                    return Err(SessionError::Scan(e));
                }
            };

            for ad in advertisements {
                let Some(side) = self.discovery.classify(&ad.name) else {
                    continue;
                };
                let slot = match side {
                    LensSide::Left => &mut self.left_lens,
                    LensSide::Right => &mut self.right_lens,
                };
                if slot.is_none() {
                    info!(%side, name = %ad.name, "Found lens");
                    *slot = Some(LensIdentity {
                        side,
                        name: ad.name,
                        handle: ad.handle,
                    });
                }
            }

            if self.left_lens.is_some() && self.right_lens.is_some() {
                self.state = SessionState::BothFound;
                return Ok(());
            }

            let now = Instant::now();
            if now >= deadline {
                warn!(
                    left = self.left_lens.is_some(),
                    right = self.right_lens.is_some(),
                    "Scan timed out"
                );
                self.state = SessionState::Idle;
                return Err(SessionError::ScanTimeout);
            }
            tokio::time::sleep(self.config.scan_poll_interval.min(deadline - now)).await;
        }
    }

    /// Connect and initialize both lenses, left first.
    ///
    /// With `scan_first` a fresh scan runs before connecting. Without it both
    /// lenses must already be known.
    pub async fn connect(&mut self, scan_first: bool) -> Result<(), SessionError> {
        if scan_first {
            self.scan_for_lenses(self.config.scan_timeout).await?;
        }
        let (Some(left), Some(right)) = (self.left_lens.clone(), self.right_lens.clone()) else {
            return Err(SessionError::IncompleteSession);
        };

        self.state = SessionState::Connecting;
        let connect_timeout = self.config.connect_timeout;
        match tokio::time::timeout(connect_timeout, self.connect_lenses(left, right)).await {
            Ok(Ok(())) => {
                self.both_connected = true;
                self.heartbeat_seq = 0;
                self.state = SessionState::Connected;
                info!("Both lenses connected");
                Ok(())
            }
            Ok(Err(e)) => {
                self.state = SessionState::Idle;
                Err(e)
            }
            Err(_) => {
                self.state = SessionState::Idle;
                Err(SessionError::ConnectTimeout)
            }
        }
    }

    async fn connect_lenses(
        &mut self,
        left: LensIdentity<T::Handle>,
        right: LensIdentity<T::Handle>,
    ) -> Result<(), SessionError> {
        self.both_connected = false;

        let transport = &self.transport;
        self.left
            .get_or_insert_with(|| LinkSession::new(transport.clone(), left))
            .connect()
            .await?;
        self.right
            .get_or_insert_with(|| LinkSession::new(transport.clone(), right))
            .connect()
            .await?;

        for side in LensSide::ALL {
            let sink = self.notify_tx.clone();
            let Some(link) = self.link_mut(side) else {
                return Err(SessionError::IncompleteSession);
            };
            link.send_frame(&INIT_FRAME).await?;
            link.subscribe(sink).await?;
        }
        Ok(())
    }

    /// Disconnect both lenses, left first. Failures are logged, never returned.
    pub async fn disconnect(&mut self) {
        self.state = SessionState::Disconnecting;
        self.both_connected = false;

        for side in LensSide::ALL {
            if let Some(link) = self.link_mut(side) {
                if let Err(e) = link.disconnect().await {
                    warn!("Disconnect failed: {e}");
                }
            }
        }
        self.state = SessionState::Idle;
    }

    /// Disconnect and drop both lens identities.
    pub async fn forget_lenses(&mut self) {
        if self.left.is_some() || self.right.is_some() {
            self.disconnect().await;
        }
        self.left = None;
        self.right = None;
        self.left_lens = None;
        self.right_lens = None;
    }

    /// Connect when needed. Returns whether the session was already usable.
    async fn ensure_connected(&mut self) -> Result<bool, SessionError> {
        if self.both_connected {
            return Ok(true);
        }
        let scan_first = self.left_lens.is_none() || self.right_lens.is_none();
        info!(scan_first, "Not connected, connecting instead of sending");
        self.connect(scan_first).await?;
        Ok(false)
    }

    async fn write_to(&self, side: LensSide, data: &[u8]) -> Result<(), SessionError> {
        let link = self.link(side).ok_or(SessionError::IncompleteSession)?;
        link.send_frame(data).await?;
        Ok(())
    }

    async fn write_both(&self, data: &[u8]) -> Result<(), SessionError> {
        for side in LensSide::ALL {
            self.write_to(side, data).await?;
        }
        Ok(())
    }

    /// Send one heartbeat to both lenses.
    pub async fn send_heartbeat(&mut self) -> Result<SendStatus, SessionError> {
        if !self.ensure_connected().await? {
            return Ok(SendStatus::Deferred);
        }
        let frame = Heartbeat::new(self.heartbeat_seq).encode();
        self.write_both(&frame).await?;
        debug!(seq = self.heartbeat_seq, "Heartbeat sent");
        self.heartbeat_seq = self.heartbeat_seq.wrapping_add(1);
        Ok(SendStatus::Delivered)
    }

    /// Page `text` and deliver it to the left lens, then the right lens.
    ///
    /// Every chunk must be acknowledged before the next one is written; a
    /// missing acknowledgment aborts the whole send.
    pub async fn send_text(&mut self, text: &str) -> Result<SendStatus, SessionError> {
        let pages = pager::paginate(text)?;
        if pages.is_empty() {
            debug!("Nothing to send");
            return Ok(SendStatus::Delivered);
        }
        if !self.ensure_connected().await? {
            return Ok(SendStatus::Deferred);
        }

        let seq = self.content_seq;
        info!(seq, pages = pages.len(), "Sending text");

        for side in LensSide::ALL {
            for (index, page) in pages.iter().enumerate() {
                for frame in page.frames(seq, true) {
                    if !self.write_acked(side, &frame.encode()).await? {
                        return Err(SessionError::AckTimeout {
                            side,
                            page: page.page_number,
                            chunk: frame.chunk_index,
                        });
                    }
                    tokio::time::sleep(self.config.chunk_spacing).await;
                }
                if index + 1 < pages.len() {
                    tokio::time::sleep(self.config.page_pause).await;
                }
            }
            debug!(%side, "Text delivered");
        }

        self.content_seq = self.content_seq.wrapping_add(1);
        Ok(SendStatus::Delivered)
    }

    /// Send an already encoded frame to both lenses.
    pub async fn send_raw_frame(&mut self, frame: &Frame) -> Result<SendStatus, SessionError> {
        if !self.ensure_connected().await? {
            return Ok(SendStatus::Deferred);
        }
        self.write_both(&frame.encode()).await?;
        Ok(SendStatus::Delivered)
    }

    /// Send a 1-bit BMP file to the left lens, then the right lens.
    pub async fn send_bmp(&mut self, bitmap: &[u8]) -> Result<SendStatus, SessionError> {
        let transfer = BmpTransfer::new(bitmap)?;
        if !self.ensure_connected().await? {
            return Ok(SendStatus::Deferred);
        }
        info!(packets = transfer.packets().len(), "Sending image");

        for side in LensSide::ALL {
            for packet in transfer.packets() {
                self.write_to(side, packet).await?;
                tokio::time::sleep(self.config.chunk_spacing).await;
            }

            for (command, frame) in [
                (Command::BmpEnd, transfer.end_frame()),
                (Command::BmpCrc, transfer.checksum_frame()),
            ] {
                if !self.write_acked(side, &frame).await? {
                    return Err(SessionError::ImageAckTimeout { side, command });
                }
            }
            debug!(%side, "Image delivered");
        }
        Ok(SendStatus::Delivered)
    }

    /// Show time and weather on the dashboard.
    pub async fn send_dashboard(
        &mut self,
        update: &DashboardUpdate,
    ) -> Result<SendStatus, SessionError> {
        if !self.ensure_connected().await? {
            return Ok(SendStatus::Deferred);
        }
        let frame = update.to_frame(self.content_seq);
        self.write_both(&frame.encode()).await?;
        self.content_seq = self.content_seq.wrapping_add(1);
        Ok(SendStatus::Delivered)
    }

    /// Wait for the next raw notification from either lens.
    pub async fn recv_notification(&mut self) -> Option<(LensSide, Vec<u8>)> {
        self.notify_rx.recv().await
    }

    /// Write one frame to `side` and wait for that lens to acknowledge it.
    async fn write_acked(&mut self, side: LensSide, data: &[u8]) -> Result<bool, SessionError> {
        self.drain_pending().await;
        self.ack.reset();
        self.awaiting = Some(side);

        let result = match self.write_to(side, data).await {
            Ok(()) => Ok(self.await_ack(side).await),
            Err(e) => Err(e),
        };
        self.awaiting = None;
        result
    }

    /// Dispatch every notification received so far.
    async fn drain_pending(&mut self) {
        // let the link forwarders hand over what they already hold
        tokio::task::yield_now().await;
        while let Ok((side, buf)) = self.notify_rx.try_recv() {
            self.handle_notification(side, &buf).await;
        }
    }

    fn signal_ack(&self, side: LensSide) {
        if self.awaiting == Some(side) {
            self.ack.signal();
        } else {
            debug!(%side, "Ignoring acknowledgment nobody is waiting for");
        }
    }

    /// Wait for the ack flag while dispatching whatever arrives meanwhile.
    async fn await_ack(&mut self, side: LensSide) -> bool {
        let ack = self.ack.clone();
        let wait = ack.wait(self.config.ack_timeout);
        tokio::pin!(wait);

        loop {
            let inbound = tokio::select! {
                acked = &mut wait => {
                    if !acked {
                        warn!(%side, "Acknowledgment timed out");
                    }
                    return acked;
                }
                inbound = self.notify_rx.recv() => inbound,
            };
            match inbound {
                Some((from, buf)) => {
                    self.handle_notification(from, &buf).await;
                }
                None => return (&mut wait).await,
            }
        }
    }

    /// Decode and act on one inbound buffer.
    ///
    /// Returns the decoded notification, or `None` when the buffer was
    /// malformed and discarded.
    pub async fn handle_notification(
        &mut self,
        side: LensSide,
        buf: &[u8],
    ) -> Option<Notification> {
        if !self.both_connected {
            if let Err(e) = self.ensure_connected().await {
                warn!(%side, "Connect on notification failed: {e}");
            }
        }

        let notification = match Notification::decode(buf) {
            Ok(n) => n,
            Err(e) => {
                warn!(%side, "Discarding notification: {e}");
                return None;
            }
        };

        match &notification {
            Notification::HeartbeatEcho { sequence } => {
                debug!(%side, ?sequence, "Heartbeat echo");
            }
            Notification::DeviceOrder { order } => {
                debug!(%side, order, "Device order");
                self.last_device_order = Some(*order);
                if *order == ORDER_DISPLAY_COMPLETE {
                    self.signal_ack(side);
                }
            }
            Notification::ContentAck { status } => match *status {
                RESPONSE_ORDER_RECEIVED => self.signal_ack(side),
                RESPONSE_FAILURE => warn!(%side, "Lens rejected content"),
                other => debug!(%side, status = other, "Content response"),
            },
            Notification::CommandResponse { command, status } => {
                let image = matches!(
                    command,
                    Command::BmpChunk | Command::BmpEnd | Command::BmpCrc
                );
                match *status {
                    RESPONSE_ORDER_RECEIVED if image => self.signal_ack(side),
                    RESPONSE_FAILURE => warn!(%side, %command, "Lens rejected command"),
                    other => debug!(%side, %command, status = other, "Command response"),
                }
            }
            Notification::MicData { sequence, audio } => {
                debug!(%side, sequence, bytes = audio.len(), "Mic data");
            }
            Notification::Unknown { command_id, raw } => {
                info!(%side, command_id, "Unknown notification {:02X?}", raw);
            }
        }

        Some(notification)
    }
}
