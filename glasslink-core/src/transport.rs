//! Peripheral transport abstraction.
//!
//! This module handles:
//! - Enumerating advertising peripherals
//! - Connecting to and disconnecting from a peripheral
//! - Writing frames to a peripheral's command channel
//! - Subscribing to a peripheral's notification channel
//!
//! The session layer only ever talks to a [`Transport`]; the Bluetooth stack
//! lives behind it in the client, and tests substitute an in-memory one.

use async_trait::async_trait;
use std::fmt;
use tokio::sync::mpsc;

#[cfg(test)]
pub(crate) mod mock;

/// Transport errors
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("No Bluetooth adapter available")]
    NoAdapter,

    #[error("Peripheral not connected")]
    NotConnected,

    #[error("Characteristic not found: {0}")]
    MissingCharacteristic(String),

    #[error("Bluetooth error: {0}")]
    Backend(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// A peripheral seen during one enumeration round
#[derive(Debug, Clone)]
pub struct Advertisement<H> {
    /// Advertised local name
    pub name: String,
    /// Handle used for every later call on this peripheral
    pub handle: H,
}

/// Capability to reach peripherals.
///
/// Implementations must keep writes to one peripheral in call order.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Opaque peripheral handle
    type Handle: Clone + fmt::Debug + Send + Sync + 'static;

    /// One enumeration round of currently advertising, named peripherals.
    async fn scan(&self) -> Result<Vec<Advertisement<Self::Handle>>, TransportError>;

    /// Connect to a peripheral.
    async fn connect(&self, handle: &Self::Handle) -> Result<(), TransportError>;

    /// Disconnect from a peripheral.
    async fn disconnect(&self, handle: &Self::Handle) -> Result<(), TransportError>;

    /// Write one frame to the peripheral's command channel.
    async fn write(&self, handle: &Self::Handle, data: &[u8]) -> Result<(), TransportError>;

    /// Start notifications; every inbound buffer is delivered on the receiver.
    async fn subscribe(
        &self,
        handle: &Self::Handle,
    ) -> Result<mpsc::Receiver<Vec<u8>>, TransportError>;
}
