//! Connection to a single lens.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::control::{LensIdentity, LensSide};
use crate::transport::{Transport, TransportError};

/// Link failure, tagged with the lens it happened on
#[derive(Debug, thiserror::Error)]
#[error("{side} lens: {source}")]
pub struct LinkError {
    pub side: LensSide,
    pub source: TransportError,
}

/// One lens: connection state, writes and the notification forwarder.
pub struct LinkSession<T: Transport> {
    transport: Arc<T>,
    identity: LensIdentity<T::Handle>,
    connected: bool,
    forwarder: Option<JoinHandle<()>>,
}

impl<T: Transport> LinkSession<T> {
    /// Create an unconnected link
    pub fn new(transport: Arc<T>, identity: LensIdentity<T::Handle>) -> Self {
        Self {
            transport,
            identity,
            connected: false,
            forwarder: None,
        }
    }

    pub fn side(&self) -> LensSide {
        self.identity.side
    }

    pub fn name(&self) -> &str {
        &self.identity.name
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    fn err(&self, source: TransportError) -> LinkError {
        LinkError {
            side: self.identity.side,
            source,
        }
    }

    /// Connect to the lens.
    pub async fn connect(&mut self) -> Result<(), LinkError> {
        info!(side = %self.side(), name = %self.name(), "Connecting");
        self.transport
            .connect(&self.identity.handle)
            .await
            .map_err(|e| self.err(e))?;
        self.connected = true;
        Ok(())
    }

    /// Disconnect from the lens. Calling this on a closed link is a no-op.
    pub async fn disconnect(&mut self) -> Result<(), LinkError> {
        if let Some(task) = self.forwarder.take() {
            task.abort();
        }
        if !self.connected {
            return Ok(());
        }
        self.connected = false;
        info!(side = %self.side(), "Disconnecting");
        self.transport
            .disconnect(&self.identity.handle)
            .await
            .map_err(|e| self.err(e))
    }

    /// Write one frame.
    pub async fn send_frame(&self, data: &[u8]) -> Result<(), LinkError> {
        if !self.connected {
            return Err(self.err(TransportError::NotConnected));
        }
        debug!(side = %self.side(), len = data.len(), "TX {:02X?}", data);
        self.transport
            .write(&self.identity.handle, data)
            .await
            .map_err(|e| self.err(e))
    }

    /// Forward every notification from this lens into `sink`, tagged with
    /// the lens side. Replaces any previous forwarder.
    pub async fn subscribe(
        &mut self,
        sink: mpsc::Sender<(LensSide, Vec<u8>)>,
    ) -> Result<(), LinkError> {
        let mut rx = self
            .transport
            .subscribe(&self.identity.handle)
            .await
            .map_err(|e| self.err(e))?;

        if let Some(task) = self.forwarder.take() {
            task.abort();
        }

        let side = self.side();
        self.forwarder = Some(tokio::spawn(async move {
            while let Some(buf) = rx.recv().await {
                if sink.send((side, buf)).await.is_err() {
                    break;
                }
            }
            debug!(%side, "Notification stream closed");
        }));
        Ok(())
    }
}

impl<T: Transport> Drop for LinkSession<T> {
    fn drop(&mut self) {
        if let Some(task) = self.forwarder.take() {
            task.abort();
        }
    }
}
