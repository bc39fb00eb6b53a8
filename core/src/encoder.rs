use crate::constellation::{constellation, map_bits, Constellation, Symbol};
use crate::fec::{coded_len, ConvolutionalEncoder};
use crate::framing::{append_crc32, FrameHeader};
use crate::mode::{Mode, Modulation};
use crate::sync::preamble_symbols;
use crate::{CRC_SIZE, FRAME_HEADER_SIZE, MAX_FRAME_PAYLOAD};

/// Symbols carrying the FEC-coded header, always QPSK
pub fn header_symbol_count() -> usize {
    coded_len(FRAME_HEADER_SIZE) / Modulation::Qpsk.bits_per_symbol()
}

/// Symbols carrying the FEC-coded body (payload + CRC-32) of a `payload_len` frame
pub fn body_symbol_count(payload_len: usize, modulation: Modulation) -> usize {
    coded_len(payload_len + CRC_SIZE).div_ceil(modulation.bits_per_symbol())
}

/// One frame ready for the modulator
#[derive(Debug, Clone)]
pub struct EncodedFrame {
    pub header: FrameHeader,
    /// Preamble, header and body symbols in transmission order
    pub symbols: Vec<Symbol>,
}

/// Turns payloads into framed, FEC-coded symbol sequences
#[derive(Debug)]
pub struct Encoder {
    modulation: Modulation,
    body: &'static dyn Constellation,
    header: &'static dyn Constellation,
    fec: ConvolutionalEncoder,
    preamble: Vec<Symbol>,
    sequence: u8,
}

impl Encoder {
    pub fn new(mode: &Mode) -> Self {
        Self {
            modulation: mode.modulation,
            body: constellation(mode.modulation),
            header: constellation(Modulation::Qpsk),
            fec: ConvolutionalEncoder::new(),
            preamble: preamble_symbols(),
            sequence: 0,
        }
    }

    /// Sequence number the next frame will carry
    pub fn next_sequence(&self) -> u8 {
        self.sequence
    }

    /// Split `payload` into frames of at most `MAX_FRAME_PAYLOAD` bytes
    ///
    /// An empty payload still produces one (empty) frame.
    pub fn encode(&mut self, payload: &[u8]) -> Vec<EncodedFrame> {
        if payload.is_empty() {
            return vec![self.encode_frame(&[])];
        }
        payload
            .chunks(MAX_FRAME_PAYLOAD)
            .map(|chunk| self.encode_frame(chunk))
            .collect()
    }

    fn encode_frame(&mut self, chunk: &[u8]) -> EncodedFrame {
        let header = FrameHeader {
            payload_len: chunk.len() as u16,
            sequence: self.sequence,
        };
        self.sequence = self.sequence.wrapping_add(1);

        let header_bits = self.fec.encode(&header.encode());
        let body_bits = self.fec.encode(&append_crc32(chunk));

        let mut symbols = Vec::with_capacity(
            self.preamble.len() + header_symbol_count() + body_symbol_count(chunk.len(), self.modulation),
        );
        symbols.extend_from_slice(&self.preamble);
        symbols.extend(map_bits(self.header, &header_bits));
        symbols.extend(map_bits(self.body, &body_bits));

        log::debug!(
            "Encoded frame seq={} len={} into {} symbols",
            header.sequence,
            header.payload_len,
            symbols.len()
        );

        EncodedFrame { header, symbols }
    }
}
