use crate::constellation::{constellation, demap_symbols, Constellation, Symbol};
use crate::encoder::{body_symbol_count, header_symbol_count};
use crate::error::{ModemError, Result};
use crate::fec::{coded_len, ViterbiDecoder};
use crate::framing::{split_crc32, FrameHeader};
use crate::mode::{Mode, Modulation};
use crate::FRAME_HEADER_SIZE;

/// A frame recovered from the air
///
/// Frames that fail their CRC are still delivered, flagged with
/// `crc_ok = false`; the payload is then whatever the decoder produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedFrame {
    pub payload: Vec<u8>,
    pub sequence: u8,
    pub crc_ok: bool,
}

/// Turns equalized header and body symbols back into frames
#[derive(Debug)]
pub struct Decoder {
    modulation: Modulation,
    body: &'static dyn Constellation,
    header: &'static dyn Constellation,
    viterbi: ViterbiDecoder,
}

impl Decoder {
    pub fn new(mode: &Mode) -> Self {
        Self {
            modulation: mode.modulation,
            body: constellation(mode.modulation),
            header: constellation(Modulation::Qpsk),
            viterbi: ViterbiDecoder::new(),
        }
    }

    /// Body symbols that follow a header announcing `header.payload_len`
    pub fn body_symbol_count(&self, header: &FrameHeader) -> usize {
        body_symbol_count(header.payload_len as usize, self.modulation)
    }

    pub fn decode_header(&mut self, symbols: &[Symbol]) -> Result<FrameHeader> {
        if symbols.len() < header_symbol_count() {
            return Err(ModemError::InvalidFrameSize);
        }
        let bits = demap_symbols(self.header, &symbols[..header_symbol_count()]);
        let bytes = self.viterbi.decode(&bits[..coded_len(FRAME_HEADER_SIZE)]);
        FrameHeader::decode(&bytes)
    }

    /// Decode a body and verify its CRC; never fails
    pub fn decode_body(&mut self, symbols: &[Symbol], header: &FrameHeader) -> ReceivedFrame {
        let mut bits = demap_symbols(self.body, symbols);
        // Drop the zero padding of the last constellation symbol
        bits.truncate(coded_len(header.body_len()));

        let decoded = self.viterbi.decode(&bits);
        let (payload, crc_ok) = split_crc32(&decoded);

        ReceivedFrame {
            payload,
            sequence: header.sequence,
            crc_ok,
        }
    }
}
