/// Convolutional code rate 1/2 with constraint length 7
/// Generator polynomials: G1 = 133 (octal) = 1011011 (binary)
///                        G2 = 171 (octal) = 1111001 (binary)
///
/// This creates a Trellis diagram with 64 states (2^6)
/// Each input bit produces 2 output bits (rate 1/2)
pub const CONSTRAINT_LENGTH: usize = 7;
pub const NUM_STATES: usize = 1 << (CONSTRAINT_LENGTH - 1);
pub const TAIL_BITS: usize = CONSTRAINT_LENGTH - 1;

const G1: u8 = 0b1011011;
const G2: u8 = 0b1111001;

/// Unreachable-state metric; large enough to never win, small enough not to overflow
const UNREACHABLE: u32 = u32::MAX / 4;

/// Number of coded bits produced for `data_len` input bytes, tail included
pub fn coded_len(data_len: usize) -> usize {
    2 * (8 * data_len + TAIL_BITS)
}

#[derive(Debug, Clone)]
pub struct ConvolutionalEncoder {
    // Shift register state (constraint length - 1 = 6 bits)
    state: u8,
}

impl ConvolutionalEncoder {
    pub fn new() -> Self {
        Self { state: 0 }
    }

    /// Encode a single bit, returning the two coded bits
    pub fn encode_bit(&mut self, input: bool) -> [bool; 2] {
        let (out1, out2) = branch_output(self.state, input);
        self.state = next_state(self.state, input);
        [out1 != 0, out2 != 0]
    }

    /// Encode a message MSB-first and flush the register with tail bits
    ///
    /// The encoder is reset first, so every call produces a self-contained
    /// block that terminates in state 0.
    pub fn encode(&mut self, data: &[u8]) -> Vec<bool> {
        self.reset();
        let mut output = Vec::with_capacity(coded_len(data.len()));
        for &byte in data {
            for i in (0..8).rev() {
                output.extend(self.encode_bit((byte >> i) & 1 == 1));
            }
        }
        for _ in 0..TAIL_BITS {
            output.extend(self.encode_bit(false));
        }
        output
    }

    pub fn reset(&mut self) {
        self.state = 0;
    }
}

impl Default for ConvolutionalEncoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Hard-decision Viterbi decoder for the K=7 code
///
/// Survivors are kept as one traceback word per trellis step: bit `s` of the
/// word records which predecessor won for state `s`. The buffer is reused
/// across calls; the path metrics start over on every call.
#[derive(Debug, Clone)]
pub struct ViterbiDecoder {
    // Expected coded pair (out1 << 1 | out2) for (state, input)
    outputs: [[u8; 2]; NUM_STATES],
    decisions: Vec<u64>,
}

impl ViterbiDecoder {
    pub fn new() -> Self {
        let mut outputs = [[0u8; 2]; NUM_STATES];
        for (state, entry) in outputs.iter_mut().enumerate() {
            for input in [false, true] {
                let (out1, out2) = branch_output(state as u8, input);
                entry[input as usize] = (out1 << 1) | out2;
            }
        }
        Self {
            outputs,
            decisions: Vec::new(),
        }
    }

    /// Decode a coded bit stream produced by [`ConvolutionalEncoder::encode`]
    ///
    /// A trailing unpaired bit is ignored. Returns the decoded bytes with the
    /// tail stripped; too many channel errors yield wrong bytes, never an error.
    pub fn decode(&mut self, coded: &[bool]) -> Vec<u8> {
        let steps = coded.len() / 2;
        let bits = self.decode_bits(&coded[..steps * 2]);

        let data_bits = steps.saturating_sub(TAIL_BITS) / 8 * 8;
        bits[..data_bits]
            .chunks(8)
            .map(|chunk| {
                chunk
                    .iter()
                    .fold(0u8, |byte, &bit| (byte << 1) | bit as u8)
            })
            .collect()
    }

    /// Run the trellis and trace back the maximum-likelihood input bits
    pub fn decode_bits(&mut self, coded: &[bool]) -> Vec<bool> {
        let steps = coded.len() / 2;
        self.decisions.clear();
        self.decisions.reserve(steps);

        let mut metrics = [UNREACHABLE; NUM_STATES];
        metrics[0] = 0;

        for pair in coded.chunks_exact(2) {
            let received = ((pair[0] as u8) << 1) | pair[1] as u8;
            let mut next = [UNREACHABLE; NUM_STATES];
            let mut word = 0u64;

            for (state, slot) in next.iter_mut().enumerate() {
                let input = state >> (CONSTRAINT_LENGTH - 2);
                let base = (state << 1) & (NUM_STATES - 1);

                for low in 0..2 {
                    let prev = base | low;
                    let expected = self.outputs[prev][input];
                    let metric = metrics[prev] + hamming_distance(expected, received);
                    if metric < *slot {
                        *slot = metric;
                        if low == 1 {
                            word |= 1 << state;
                        } else {
                            word &= !(1 << state);
                        }
                    }
                }
            }

            metrics = next;
            self.decisions.push(word);
        }

        // Globally best end state; ties resolve to the lowest index (state 0 first)
        let mut state = metrics
            .iter()
            .enumerate()
            .min_by_key(|&(_, &metric)| metric)
            .map(|(state, _)| state)
            .unwrap_or(0);

        let mut bits = vec![false; steps];
        for t in (0..steps).rev() {
            bits[t] = (state >> (CONSTRAINT_LENGTH - 2)) & 1 == 1;
            let low = ((self.decisions[t] >> state) & 1) as usize;
            state = ((state << 1) & (NUM_STATES - 1)) | low;
        }
        bits
    }
}

impl Default for ViterbiDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Output bits for a transition, computed before the state update
fn branch_output(state: u8, input: bool) -> (u8, u8) {
    let combined = (((input as u8) << 6) | state) & 0x7F;
    (parity(combined & G1), parity(combined & G2))
}

fn next_state(state: u8, input: bool) -> u8 {
    (state >> 1) | ((input as u8) << 5)
}

fn hamming_distance(expected: u8, received: u8) -> u32 {
    (expected ^ received).count_ones()
}

/// Parity (XOR of all bits)
fn parity(byte: u8) -> u8 {
    (byte.count_ones() & 1) as u8
}
