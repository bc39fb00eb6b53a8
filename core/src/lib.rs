//! Narrowband audio modem for web payloads
//!
//! Single-carrier QPSK / 16-QAM with root-raised-cosine pulse shaping, a
//! rate-1/2 K=7 convolutional code with Viterbi decoding, CRC32 frame
//! integrity, pilot-tone AFC and spectral SNR estimation feeding an adaptive
//! mode controller.

pub mod error;
pub mod mode;
pub mod fec;
pub mod constellation;
pub mod framing;
pub mod pulse;
pub mod oscillator;
pub mod modulator;
pub mod demodulator;
pub mod sync;
pub mod tracking;
pub mod estimator;
pub mod adaptive;
pub mod encoder;
pub mod decoder;
pub mod receiver;
pub mod session;

pub use adaptive::select_mode;
pub use constellation::Symbol;
pub use error::{ModemError, Result};
pub use mode::{Mode, Modulation, MODES};
pub use session::{LinkPhase, LinkStats, ModemSession, ReceivedFrame, RxStage, SessionConfig, TxStage};

// Session defaults
pub const DEFAULT_SAMPLE_RATE: u32 = 48_000;
pub const DEFAULT_BLOCK_SIZE: usize = 2048;
pub const DEFAULT_MODE: &str = "HTTP-1000";
pub const MIN_BLOCK_SIZE: usize = 256;

// Pulse shaping
pub const RRC_ROLLOFF: f64 = 0.35;
pub const RRC_SPAN_SYMBOLS: usize = 6; // each side of the centre tap

// Transmit levels
pub const TX_AMPLITUDE: f32 = 0.4;
pub const PILOT_AMPLITUDE: f32 = 0.05;
pub const PILOT_INTERVAL_SAMPLES: u64 = 100;

// Frame layout
pub const PREAMBLE_SYMBOLS: usize = 32;
pub const FRAME_HEADER_SIZE: usize = 4; // payload length (2) + sequence (1) + CRC-8 (1)
pub const CRC_SIZE: usize = 4;
pub const MAX_FRAME_PAYLOAD: usize = 4096;
pub const TAIL_SYMBOLS: usize = 2 * RRC_SPAN_SYMBOLS;

// Synchronization
pub const DETECTION_THRESHOLD: f32 = 0.6;
pub const PREAMBLE_SEGMENT_SYMBOLS: usize = 8; // coherent span of the segmented correlation
pub const AFC_SEARCH_HZ: f32 = 50.0;
pub const AFC_SMOOTHING: f32 = 0.1;
pub const AFC_DEADBAND_HZ: f32 = 0.5;
pub const PILOT_MIN_PROMINENCE_DB: f32 = 10.0;
pub const NOISE_GUARD_HZ: f32 = 100.0;
pub const SILENCE_RMS: f32 = 1e-6;

// Carrier tracking (decision-directed PLL, per symbol)
pub const CARRIER_LOOP_BANDWIDTH: f32 = 0.02;
pub const CARRIER_LOOP_DAMPING: f32 = 0.707;
