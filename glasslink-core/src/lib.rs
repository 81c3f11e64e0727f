//! Core library for driving a pair of BLE smart glasses.
//!
//! Each pair of glasses exposes two peripherals, one per lens. This library
//! keeps both in step: it finds them, connects and initializes them, keeps
//! them alive, and delivers content to the left lens and then the right one,
//! waiting for each chunk to be acknowledged.
//!
//! # Architecture
//!
//! The library is organized into several key modules:
//!
//! - `proto`: Wire formats for command, heartbeat, display and dashboard frames
//! - `pager`: Text wrapping and pagination for the lens display
//! - `bmp`: Image transfer packetization
//! - `ack`: Acknowledgment flag polled while a chunk is in flight
//! - `transport`: Peripheral transport abstraction
//! - `link`: Connection to a single lens
//! - `session`: Dual-lens coordination
//! - `control`: Lens discovery and configuration
//!
//! # Example
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use glasslink_core::control::GlassesConfig;
//! # use glasslink_core::session::{DualLensSession, SessionError};
//! # use glasslink_core::transport::Transport;
//! # async fn example<T: Transport>(transport: Arc<T>) -> Result<(), SessionError> {
//! let mut session = DualLensSession::new(transport, GlassesConfig::default());
//! session.connect(true).await?;
//! let _ = session.send_text("Hello from the other side").await?;
//! session.disconnect().await;
//! # Ok(())
//! # }
//! ```

pub mod ack;
pub mod bmp;
pub mod control;
pub mod link;
pub mod pager;
pub mod proto;
pub mod session;
pub mod transport;

pub use control::{GlassesConfig, LensSide};
pub use proto::{Frame, Notification};
pub use session::{DualLensSession, SendStatus, SessionError};
pub use transport::{Advertisement, Transport, TransportError};
