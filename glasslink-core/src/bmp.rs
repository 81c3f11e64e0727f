//! Image transfer packetization.
//!
//! Turns a 1-bit BMP file into the frame sequence a lens expects:
//! - Image chunks (`0x15`), the first one carrying the storage address
//! - An end-of-transfer frame (`0x20 0x0D 0x0E`)
//! - A checksum frame (`0x16` + little-endian checksum)
//!
//! No session state is involved; the session decides when each frame is sent.

use crate::proto::{Command, ProtocolError};

/// Size of the 1-bit BMP file header skipped before packetizing
pub const BMP_HEADER_SIZE: usize = 62;

/// Image bytes carried per chunk
pub const IMAGE_CHUNK_SIZE: usize = 194;

/// Storage address written in front of the first chunk
const STORAGE_ADDRESS: [u8; 4] = [0x00, 0x1C, 0x00, 0x00];

/// Prepared image transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BmpTransfer {
    packets: Vec<Vec<u8>>,
}

impl BmpTransfer {
    /// Packetize a complete BMP file (header included).
    pub fn new(bitmap: &[u8]) -> Result<Self, ProtocolError> {
        if bitmap.len() <= BMP_HEADER_SIZE {
            return Err(ProtocolError::ImageTooShort(bitmap.len()));
        }
        Ok(Self::from_pixels(&bitmap[BMP_HEADER_SIZE..]))
    }

    /// Packetize raw pixel data (BMP header already stripped).
    pub fn from_pixels(pixels: &[u8]) -> Self {
        let packets = pixels
            .chunks(IMAGE_CHUNK_SIZE)
            .enumerate()
            .map(|(index, data)| {
                let mut packet = Vec::with_capacity(6 + data.len());
                packet.push(Command::BmpChunk.id());
                packet.push((index & 0xFF) as u8);
                if index == 0 {
                    packet.extend_from_slice(&STORAGE_ADDRESS);
                }
                packet.extend_from_slice(data);
                packet
            })
            .collect();

        Self { packets }
    }

    /// Image chunk frames, in send order
    pub fn packets(&self) -> &[Vec<u8>] {
        &self.packets
    }

    /// Frame closing the transfer
    pub fn end_frame(&self) -> [u8; 3] {
        [Command::BmpEnd.id(), 0x0D, 0x0E]
    }

    /// XOR of every byte of every chunk frame
    pub fn checksum(&self) -> u16 {
        let xor = self
            .packets
            .iter()
            .flatten()
            .fold(0u8, |acc, byte| acc ^ byte);
        u16::from(xor)
    }

    /// Frame carrying the checksum
    pub fn checksum_frame(&self) -> [u8; 3] {
        let crc = self.checksum().to_le_bytes();
        [Command::BmpCrc.id(), crc[0], crc[1]]
    }
}
