//! Protocol definitions for the glasses command channel.
//!
//! This module defines the wire format for every frame written to, or received
//! from, a lens. The framing is not uniform: each command family carries its own
//! header layout.
//!
//! # Frame Formats
//!
//! Generic command frame (little-endian):
//! - Command ID (1 byte)
//! - Length (2 bytes): total encoded size of the frame
//! - Sequence ID (1 byte)
//! - Subcommand (1 byte)
//! - Payload (variable)
//!
//! Heartbeat frame (little-endian, fixed 6 bytes):
//! - Command ID (1 byte): `0x25`
//! - Sequence (2 bytes)
//! - Length (1 byte): always 6
//! - Subcommand (1 byte): always 0
//! - Sequence (1 byte): repeated on purpose, devices expect it
//!
//! Display page frame (network byte order, 9-byte header):
//! - Command ID (1 byte): `0x4E`
//! - Sequence ID, total chunks, chunk index, status flags (1 byte each)
//! - Reserved (2 bytes, zero)
//! - Page number, total pages (1 byte each)
//! - Payload (at most 191 bytes of UTF-8 text)

use std::fmt;

/// Maximum text bytes carried by a single display page chunk.
pub const MAX_CHUNK_PAYLOAD: usize = 191;

/// Frame written to each lens right after connecting.
pub const INIT_FRAME: [u8; 2] = [Command::Init as u8, 0x01];

/// Device order: the lens finished rendering the last page.
pub const ORDER_DISPLAY_COMPLETE: u8 = 0x40;

/// Response status: the lens accepted the last frame.
pub const RESPONSE_ORDER_RECEIVED: u8 = 0xC9;

/// Response status: the lens rejected the last frame.
pub const RESPONSE_FAILURE: u8 = 0xCA;

/// Known command identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Command {
    Dashboard = 0x06,
    BmpChunk = 0x15,
    BmpCrc = 0x16,
    BmpEnd = 0x20,
    Heartbeat = 0x25,
    Init = 0x4D,
    Text = 0x4E,
    MicData = 0xF1,
    DeviceOrder = 0xF5,
}

impl Command {
    /// Map a raw command byte to a known command.
    pub fn from_byte(byte: u8) -> Option<Self> {
        Some(match byte {
            0x06 => Self::Dashboard,
            0x15 => Self::BmpChunk,
            0x16 => Self::BmpCrc,
            0x20 => Self::BmpEnd,
            0x25 => Self::Heartbeat,
            0x4D => Self::Init,
            0x4E => Self::Text,
            0xF1 => Self::MicData,
            0xF5 => Self::DeviceOrder,
            _ => return None,
        })
    }

    /// Raw command byte.
    pub fn id(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}(0x{:02X})", self, self.id())
    }
}

/// Content status carried in the upper nibble of the display status flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentStatus {
    /// More pages follow
    Normal,
    /// Last page of the message
    Final,
}

impl ContentStatus {
    const NORMAL_TEXT: u8 = 0x30;
    const FINAL_TEXT: u8 = 0x40;

    fn bits(self) -> u8 {
        match self {
            Self::Normal => Self::NORMAL_TEXT,
            Self::Final => Self::FINAL_TEXT,
        }
    }
}

/// Display status flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusFlags(u8);

impl StatusFlags {
    /// Screen action: replace what is on screen with new content.
    pub const NEW_CONTENT: u8 = 0b0000_0001;

    const STATUS_MASK: u8 = 0xF0;

    /// Combine a content status with the screen action bit.
    pub fn new(status: ContentStatus, new_content: bool) -> Self {
        let action = if new_content { Self::NEW_CONTENT } else { 0 };
        Self(status.bits() | action)
    }

    /// Content status, if the upper nibble holds a known value.
    pub fn status(&self) -> Option<ContentStatus> {
        match self.0 & Self::STATUS_MASK {
            ContentStatus::NORMAL_TEXT => Some(ContentStatus::Normal),
            ContentStatus::FINAL_TEXT => Some(ContentStatus::Final),
            _ => None,
        }
    }

    /// Whether the new-content screen action is set
    pub fn is_new_content(&self) -> bool {
        self.0 & Self::NEW_CONTENT != 0
    }

    /// Get raw flags value
    pub fn raw(&self) -> u8 {
        self.0
    }

    /// Create from raw value
    pub fn from_raw(value: u8) -> Self {
        Self(value)
    }
}

/// Generic command frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Command identifier
    pub command_id: u8,
    /// Total encoded length (header + payload)
    pub length: u16,
    /// Sequence identifier
    pub sequence_id: u8,
    /// Subcommand
    pub subcommand: u8,
    /// Command payload
    pub payload: Vec<u8>,
}

impl Frame {
    /// Size of the generic header in bytes
    pub const HEADER_SIZE: usize = 5;

    /// Build a frame whose length field covers header and payload.
    pub fn new(command_id: u8, sequence_id: u8, subcommand: u8, payload: Vec<u8>) -> Self {
        let length = (Self::HEADER_SIZE + payload.len()).min(u16::MAX as usize) as u16;
        Self {
            command_id,
            length,
            sequence_id,
            subcommand,
            payload,
        }
    }

    /// Known command for this frame, if any.
    pub fn command(&self) -> Option<Command> {
        Command::from_byte(self.command_id)
    }

    /// Encode frame to bytes
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::HEADER_SIZE + self.payload.len());
        buf.push(self.command_id);
        buf.extend_from_slice(&self.length.to_le_bytes());
        buf.push(self.sequence_id);
        buf.push(self.subcommand);
        buf.extend_from_slice(&self.payload);
        buf
    }

    /// Decode frame from bytes.
    ///
    /// Unknown command ids are accepted; the payload is kept as-is.
    pub fn decode(buf: &[u8]) -> Result<Self, ProtocolError> {
        if buf.len() < Self::HEADER_SIZE {
            return Err(ProtocolError::MalformedFrame {
                expected: Self::HEADER_SIZE,
                actual: buf.len(),
            });
        }

        Ok(Self {
            command_id: buf[0],
            length: u16::from_le_bytes([buf[1], buf[2]]),
            sequence_id: buf[3],
            subcommand: buf[4],
            payload: buf[Self::HEADER_SIZE..].to_vec(),
        })
    }
}

/// Heartbeat keep-alive frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Heartbeat {
    /// Session-wide heartbeat counter
    pub sequence: u8,
}

impl Heartbeat {
    /// Size of the encoded heartbeat in bytes
    pub const SIZE: usize = 6;

    /// Create a heartbeat for the given counter value
    pub fn new(sequence: u8) -> Self {
        Self { sequence }
    }

    /// Encode heartbeat to bytes
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0] = Command::Heartbeat.id();
        buf[1..3].copy_from_slice(&u16::from(self.sequence).to_le_bytes());
        buf[3] = Self::SIZE as u8;
        buf[4] = 0;
        buf[5] = self.sequence;
        buf
    }

    /// Decode heartbeat from bytes
    pub fn decode(buf: &[u8]) -> Result<Self, ProtocolError> {
        if buf.len() < Self::SIZE {
            return Err(ProtocolError::MalformedFrame {
                expected: Self::SIZE,
                actual: buf.len(),
            });
        }
        expect_command(buf[0], Command::Heartbeat)?;

        let sequence = u16::from_le_bytes([buf[1], buf[2]]) as u8;
        if sequence != buf[5] {
            return Err(ProtocolError::SequenceMismatch {
                header: sequence,
                trailer: buf[5],
            });
        }

        Ok(Self { sequence })
    }
}

/// One chunk of a display page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayPage {
    /// Content sequence (one per send-text call)
    pub sequence_id: u8,
    /// Number of chunks in this page
    pub total_chunks: u8,
    /// Zero-based chunk index within the page
    pub chunk_index: u8,
    /// Content status and screen action
    pub status: StatusFlags,
    /// One-based page number
    pub page_number: u8,
    /// Number of pages in the message
    pub total_pages: u8,
    /// UTF-8 text bytes for this chunk
    pub payload: Vec<u8>,
}

impl DisplayPage {
    /// Size of the display page header in bytes
    pub const HEADER_SIZE: usize = 9;

    /// Total encoded size
    pub fn total_size(&self) -> usize {
        Self::HEADER_SIZE + self.payload.len()
    }

    /// Encode page chunk to bytes
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.total_size());
        buf.extend_from_slice(&[
            Command::Text.id(),
            self.sequence_id,
            self.total_chunks,
            self.chunk_index,
            self.status.raw(),
            0,
            0,
            self.page_number,
            self.total_pages,
        ]);
        buf.extend_from_slice(&self.payload);
        buf
    }

    /// Decode page chunk from bytes
    pub fn decode(buf: &[u8]) -> Result<Self, ProtocolError> {
        if buf.len() < Self::HEADER_SIZE {
            return Err(ProtocolError::MalformedFrame {
                expected: Self::HEADER_SIZE,
                actual: buf.len(),
            });
        }
        expect_command(buf[0], Command::Text)?;

        let page = Self {
            sequence_id: buf[1],
            total_chunks: buf[2],
            chunk_index: buf[3],
            status: StatusFlags::from_raw(buf[4]),
            page_number: buf[7],
            total_pages: buf[8],
            payload: buf[Self::HEADER_SIZE..].to_vec(),
        };
        page.validate()?;
        Ok(page)
    }

    /// Validate header fields
    pub fn validate(&self) -> Result<(), ProtocolError> {
        if self.payload.len() > MAX_CHUNK_PAYLOAD {
            return Err(ProtocolError::PayloadTooLarge(self.payload.len()));
        }
        if self.chunk_index >= self.total_chunks {
            return Err(ProtocolError::InvalidChunkIndex {
                index: self.chunk_index,
                total: self.total_chunks,
            });
        }
        Ok(())
    }
}

/// Time and weather shown on the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DashboardUpdate {
    /// Unix time in seconds
    pub unix_secs: u32,
    /// Unix time in milliseconds
    pub unix_millis: u64,
    /// Weather icon id (0x00 - 0x10)
    pub weather_icon: u8,
    /// Temperature in Celsius
    pub temperature_c: i8,
    /// Let the lens convert to Fahrenheit
    pub fahrenheit: bool,
    /// 12h clock instead of 24h
    pub twelve_hour: bool,
}

impl DashboardUpdate {
    /// Subcommand for the time/weather update
    pub const SUBCOMMAND: u8 = 0x01;

    /// Build the generic frame carrying this update.
    pub fn to_frame(&self, sequence_id: u8) -> Frame {
        let mut payload = Vec::with_capacity(16);
        payload.extend_from_slice(&self.unix_secs.to_le_bytes());
        payload.extend_from_slice(&self.unix_millis.to_le_bytes());
        payload.push(self.weather_icon);
        payload.push(self.temperature_c as u8);
        payload.push(u8::from(self.fahrenheit));
        payload.push(u8::from(self.twelve_hour));
        Frame::new(Command::Dashboard.id(), sequence_id, Self::SUBCOMMAND, payload)
    }
}

/// Inbound notification from a lens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// Heartbeat echoed back by the lens
    HeartbeatEcho { sequence: Option<u8> },
    /// Order raised by the lens (touch, display state, ...)
    DeviceOrder { order: u8 },
    /// Response to a display page chunk
    ContentAck { status: u8 },
    /// Response to any other command we sent
    CommandResponse { command: Command, status: u8 },
    /// Microphone audio
    MicData { sequence: u8, audio: Vec<u8> },
    /// Command id we do not know; raw bytes kept for diagnostics
    Unknown { command_id: u8, raw: Vec<u8> },
}

impl Notification {
    /// Decode a notification buffer.
    ///
    /// Unknown command ids never fail. Known commands shorter than their
    /// minimum size fail with [`ProtocolError::MalformedFrame`].
    pub fn decode(buf: &[u8]) -> Result<Self, ProtocolError> {
        let Some(&command_id) = buf.first() else {
            return Err(ProtocolError::MalformedFrame {
                expected: 1,
                actual: 0,
            });
        };

        let Some(command) = Command::from_byte(command_id) else {
            return Ok(Self::Unknown {
                command_id,
                raw: buf.to_vec(),
            });
        };

        if command == Command::Heartbeat {
            return Ok(Self::HeartbeatEcho {
                sequence: buf.get(1).copied(),
            });
        }

        if buf.len() < 2 {
            return Err(ProtocolError::MalformedFrame {
                expected: 2,
                actual: buf.len(),
            });
        }

        Ok(match command {
            Command::DeviceOrder => Self::DeviceOrder { order: buf[1] },
            Command::Text => Self::ContentAck { status: buf[1] },
            Command::MicData => Self::MicData {
                sequence: buf[1],
                audio: buf[2..].to_vec(),
            },
            Command::Heartbeat
            | Command::Init
            | Command::Dashboard
            | Command::BmpChunk
            | Command::BmpEnd
            | Command::BmpCrc => Self::CommandResponse {
                command,
                status: buf[1],
            },
        })
    }
}

fn expect_command(actual: u8, expected: Command) -> Result<(), ProtocolError> {
    if actual != expected.id() {
        return Err(ProtocolError::UnexpectedCommand {
            expected: expected.id(),
            actual,
        });
    }
    Ok(())
}

/// Protocol-related errors
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Malformed frame: expected at least {expected} bytes, got {actual}")]
    MalformedFrame { expected: usize, actual: usize },

    #[error("Unexpected command id: 0x{actual:02X} (expected 0x{expected:02X})")]
    UnexpectedCommand { expected: u8, actual: u8 },

    #[error("Heartbeat sequence mismatch: header {header}, trailer {trailer}")]
    SequenceMismatch { header: u8, trailer: u8 },

    #[error("Payload too large: {0} bytes")]
    PayloadTooLarge(usize),

    #[error("Invalid chunk index {index} for {total} chunks")]
    InvalidChunkIndex { index: u8, total: u8 },

    #[error("Image too short: {0} bytes")]
    ImageTooShort(usize),

    #[error("Text needs {0} pages, at most 255 fit the page header")]
    TooManyPages(usize),
}
