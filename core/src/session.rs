//! Modem session: one logical link
//!
//! A session owns the transmit chain (encoder and a phase-continuous
//! modulator) and, once samples arrive, a receiver. It is an explicit state
//! machine:
//!
//! ```text
//! Idle ──process_block──▶ Receiving(Accumulating → Estimating → Demodulating → Decoding → Validating → Accumulating …)
//!   │                          │
//!   └──transmit──▶ Transmitting(Encoding → Modulating → Emitting) ──▶ back to the previous state
//! ```
//!
//! Transmitting never discards receive state; `stop_receiving` does.

use crate::adaptive::select_mode;
use crate::encoder::Encoder;
use crate::error::{ModemError, Result};
use crate::mode::Mode;
use crate::modulator::Modulator;
use crate::receiver::Receiver;
use crate::{DEFAULT_BLOCK_SIZE, DEFAULT_MODE, DEFAULT_SAMPLE_RATE, MIN_BLOCK_SIZE};
use std::fmt;
use std::mem;

pub use crate::decoder::ReceivedFrame;
pub use crate::receiver::RxStage;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Mode name, matched case-insensitively
    pub mode: String,
    pub sample_rate: u32,
    /// Analysis block size; a power of two of at least `MIN_BLOCK_SIZE`
    pub block_size: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            mode: DEFAULT_MODE.to_string(),
            sample_rate: DEFAULT_SAMPLE_RATE,
            block_size: DEFAULT_BLOCK_SIZE,
        }
    }
}

impl SessionConfig {
    pub fn new(mode: impl Into<String>) -> Self {
        Self {
            mode: mode.into(),
            ..Self::default()
        }
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    /// Resolve the mode and samples per symbol, or explain what is wrong
    pub fn validate(&self) -> Result<(&'static Mode, usize)> {
        let mode = Mode::by_name(&self.mode)?;

        if self.sample_rate == 0 {
            return Err(ModemError::InvalidConfig("sample rate must be positive".to_string()));
        }

        if self.block_size < MIN_BLOCK_SIZE || !self.block_size.is_power_of_two() {
            return Err(ModemError::InvalidConfig(format!(
                "block size {} must be a power of two of at least {}",
                self.block_size, MIN_BLOCK_SIZE
            )));
        }

        let samples_per_symbol = mode.samples_per_symbol(self.sample_rate)?;

        let nyquist = self.sample_rate as f32 / 2.0;
        if mode.highest_frequency_hz() >= nyquist {
            return Err(ModemError::InvalidConfig(format!(
                "{} reaches {} Hz, above the {} Hz Nyquist limit",
                mode.name,
                mode.highest_frequency_hz(),
                nyquist
            )));
        }

        Ok((mode, samples_per_symbol))
    }
}

/// Link counters, cumulative over the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LinkStats {
    /// Frames decoded, whatever their CRC verdict
    pub frames_received: u64,
    pub crc_failures: u64,
    pub header_failures: u64,
    /// Blocks whose pilot was not usable for AFC
    pub sync_losses: u64,
    pub blocks_processed: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStage {
    Encoding,
    Modulating,
    Emitting,
}

/// Observable lifecycle position of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkPhase {
    Idle,
    Transmitting(TxStage),
    Receiving(RxStage),
}

#[derive(Debug)]
enum SessionState {
    Idle,
    Transmitting(TxStage),
    Receiving(Box<Receiver>),
}

pub struct ModemSession {
    config: SessionConfig,
    mode: &'static Mode,
    samples_per_symbol: usize,
    encoder: Encoder,
    modulator: Modulator,
    state: SessionState,
    stats: LinkStats,
    snr_db: Option<f32>,
    frequency_offset_hz: f32,
}

impl fmt::Debug for ModemSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModemSession")
            .field("mode", &self.mode.name)
            .field("sample_rate", &self.config.sample_rate)
            .field("block_size", &self.config.block_size)
            .field("phase", &self.phase())
            .field("stats", &self.stats)
            .field("snr_db", &self.snr_db)
            .field("frequency_offset_hz", &self.frequency_offset_hz)
            .finish()
    }
}

impl ModemSession {
    pub fn new(config: SessionConfig) -> Result<Self> {
        let (mode, samples_per_symbol) = config.validate()?;
        let modulator = Modulator::new(mode, config.sample_rate)?;

        log::debug!(
            "Session opened: {} at {} Hz, {} samples/symbol, block {}",
            mode.name,
            config.sample_rate,
            samples_per_symbol,
            config.block_size
        );

        Ok(Self {
            config,
            mode,
            samples_per_symbol,
            encoder: Encoder::new(mode),
            modulator,
            state: SessionState::Idle,
            stats: LinkStats::default(),
            snr_db: None,
            frequency_offset_hz: 0.0,
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn mode(&self) -> &'static Mode {
        self.mode
    }

    pub fn samples_per_symbol(&self) -> usize {
        self.samples_per_symbol
    }

    pub fn phase(&self) -> LinkPhase {
        match &self.state {
            SessionState::Idle => LinkPhase::Idle,
            SessionState::Transmitting(stage) => LinkPhase::Transmitting(*stage),
            SessionState::Receiving(receiver) => LinkPhase::Receiving(receiver.stage()),
        }
    }

    /// Render `payload` as a complete burst of samples
    ///
    /// Payloads above `MAX_FRAME_PAYLOAD` bytes go out as consecutive frames.
    /// The session returns to whatever state it was in before the call.
    pub fn transmit(&mut self, payload: &[u8]) -> Vec<f32> {
        let previous = mem::replace(&mut self.state, SessionState::Transmitting(TxStage::Encoding));
        log::trace!("Encoding {} bytes", payload.len());
        let frames = self.encoder.encode(payload);

        self.state = SessionState::Transmitting(TxStage::Modulating);
        let total: usize = frames
            .iter()
            .map(|frame| self.modulator.burst_len(frame.symbols.len()))
            .sum();
        let mut samples = Vec::with_capacity(total);
        for frame in &frames {
            samples.extend(self.modulator.modulate(&frame.symbols));
        }

        self.state = SessionState::Transmitting(TxStage::Emitting);
        log::debug!(
            "Transmitting {} bytes in {} frame(s): {} samples ({:.2} s)",
            payload.len(),
            frames.len(),
            samples.len(),
            samples.len() as f32 / self.config.sample_rate as f32
        );

        self.state = previous;
        samples
    }

    /// Feed received samples of any length; complete blocks are processed now
    pub fn process_block(&mut self, samples: &[f32]) -> Vec<ReceivedFrame> {
        if !matches!(self.state, SessionState::Receiving(_)) {
            match Receiver::new(self.mode, self.config.sample_rate, self.config.block_size) {
                Ok(mut receiver) => {
                    receiver.set_frequency_offset_hz(self.frequency_offset_hz);
                    log::debug!("Receiver started for {}", self.mode.name);
                    self.state = SessionState::Receiving(Box::new(receiver));
                }
                Err(e) => {
                    log::warn!("Receiver unavailable: {}", e);
                    return Vec::new();
                }
            }
        }

        let SessionState::Receiving(receiver) = &mut self.state else {
            return Vec::new();
        };
        let frames = receiver.process(samples, &mut self.stats);
        self.snr_db = receiver.snr_db().or(self.snr_db);
        self.frequency_offset_hz = receiver.frequency_offset_hz();
        frames
    }

    /// Process whatever partial block is buffered
    pub fn flush(&mut self) -> Vec<ReceivedFrame> {
        let SessionState::Receiving(receiver) = &mut self.state else {
            return Vec::new();
        };
        let frames = receiver.flush(&mut self.stats);
        self.snr_db = receiver.snr_db().or(self.snr_db);
        self.frequency_offset_hz = receiver.frequency_offset_hz();
        frames
    }

    /// Flush, then drop all receive state and go idle
    pub fn stop_receiving(&mut self) -> Vec<ReceivedFrame> {
        let frames = self.flush();
        if matches!(self.state, SessionState::Receiving(_)) {
            log::debug!("Receiver stopped");
        }
        self.state = SessionState::Idle;
        frames
    }

    pub fn snr_db(&self) -> Option<f32> {
        self.snr_db
    }

    pub fn frequency_offset_hz(&self) -> f32 {
        self.frequency_offset_hz
    }

    pub fn stats(&self) -> LinkStats {
        self.stats
    }

    /// Mode the adaptive controller picks for the latest SNR
    pub fn recommended_mode(&self) -> &'static Mode {
        select_mode(self.snr_db.unwrap_or(f32::NAN))
    }
}
