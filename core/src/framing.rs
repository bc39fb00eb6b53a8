use crate::error::{ModemError, Result};
use crate::{CRC_SIZE, FRAME_HEADER_SIZE, MAX_FRAME_PAYLOAD};

/// CRC-32 (IEEE 802.3, reflected polynomial 0xEDB88320) for frame integrity
pub fn crc32(data: &[u8]) -> u32 {
    const POLYNOMIAL: u32 = 0xEDB8_8320;
    let mut crc: u32 = 0xFFFF_FFFF;
    for &byte in data {
        crc ^= byte as u32;
        for _ in 0..8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ POLYNOMIAL;
            } else {
                crc >>= 1;
            }
        }
    }
    crc ^ 0xFFFF_FFFF
}

/// CRC-8 using polynomial 0xD5 (x^8 + x^7 + x^6 + x^4 + x^2 + 1) for the frame header
fn crc8(data: &[u8]) -> u8 {
    const POLYNOMIAL: u8 = 0xD5;
    let mut crc = 0u8;

    for &byte in data {
        crc ^= byte;
        for _ in 0..8 {
            if (crc & 0x80) != 0 {
                crc = (crc << 1) ^ POLYNOMIAL;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}

/// Append the big-endian CRC-32 of `payload`
pub fn append_crc32(payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(payload.len() + CRC_SIZE);
    frame.extend_from_slice(payload);
    frame.extend_from_slice(&crc32(payload).to_be_bytes());
    frame
}

/// Split a decoded frame into payload and CRC verdict
///
/// Frames shorter than the CRC itself fail verification with an empty payload.
pub fn split_crc32(frame: &[u8]) -> (Vec<u8>, bool) {
    if frame.len() < CRC_SIZE {
        return (Vec::new(), false);
    }
    let (payload, trailer) = frame.split_at(frame.len() - CRC_SIZE);
    let received = u32::from_be_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
    (payload.to_vec(), received == crc32(payload))
}

/// Per-frame header sent ahead of the body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub payload_len: u16,
    pub sequence: u8,
}

impl FrameHeader {
    pub fn new(payload_len: usize, sequence: u8) -> Result<Self> {
        if payload_len > MAX_FRAME_PAYLOAD {
            return Err(ModemError::InvalidFrameSize);
        }
        Ok(Self {
            payload_len: payload_len as u16,
            sequence,
        })
    }

    /// Layout: payload length (2 bytes, big-endian), sequence, CRC-8 of the first three bytes
    pub fn encode(&self) -> [u8; FRAME_HEADER_SIZE] {
        let mut header = [0u8; FRAME_HEADER_SIZE];
        header[..2].copy_from_slice(&self.payload_len.to_be_bytes());
        header[2] = self.sequence;
        header[3] = crc8(&header[..3]);
        header
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < FRAME_HEADER_SIZE {
            return Err(ModemError::InvalidFrameSize);
        }

        if crc8(&data[..3]) != data[3] {
            return Err(ModemError::HeaderCrcMismatch);
        }

        let payload_len = u16::from_be_bytes([data[0], data[1]]);
        if payload_len as usize > MAX_FRAME_PAYLOAD {
            return Err(ModemError::InvalidFrameSize);
        }

        Ok(Self {
            payload_len,
            sequence: data[2],
        })
    }

    /// Body length on the wire: payload plus CRC-32
    pub fn body_len(&self) -> usize {
        self.payload_len as usize + CRC_SIZE
    }
}
