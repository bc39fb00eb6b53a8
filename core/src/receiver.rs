use crate::constellation::{constellation, Constellation, Symbol};
use crate::decoder::{Decoder, ReceivedFrame};
use crate::demodulator::Demodulator;
use crate::encoder::header_symbol_count;
use crate::error::Result;
use crate::estimator::ChannelEstimator;
use crate::framing::FrameHeader;
use crate::mode::{Mode, Modulation};
use crate::session::LinkStats;
use crate::sync::{Detection, PreambleCorrelator};
use crate::tracking::CarrierTracker;
use crate::PREAMBLE_SYMBOLS;
use realfft::num_complex::Complex32;
use std::f32::consts::PI;
use std::fmt;

/// Receive pipeline stage, advanced once per analysis block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RxStage {
    Accumulating,
    Estimating,
    Demodulating,
    Decoding,
    Validating,
}

/// Where the framer is within the baseband stream
#[derive(Debug, Clone, Copy)]
enum FrameSync {
    Searching,
    Header {
        start: usize,
        tracker: CarrierTracker,
    },
    Body {
        start: usize,
        tracker: CarrierTracker,
        header: FrameHeader,
    },
}

/// Block-driven receive pipeline
///
/// Samples are buffered until a full analysis block is available. Each block
/// is run through the channel estimator, mixed down and matched-filtered
/// into a baseband buffer, and the framer then walks that buffer: preamble
/// search, header, body. Indices into the baseband buffer are absolute until
/// the consumed prefix is dropped.
///
/// The pilot AFC only retunes the local oscillator between frames. Inside a
/// frame the carrier tracker, seeded from the preamble, follows whatever
/// offset is left.
pub struct Receiver {
    block_size: usize,
    samples_per_symbol: usize,
    symbol_rate: f32,
    pending: Vec<f32>,
    estimator: ChannelEstimator,
    demodulator: Demodulator,
    correlator: PreambleCorrelator,
    decoder: Decoder,
    header_constellation: &'static dyn Constellation,
    body_constellation: &'static dyn Constellation,
    baseband: Vec<Complex32>,
    cursor: usize,
    sync: FrameSync,
    stage: RxStage,
}

impl fmt::Debug for Receiver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Receiver")
            .field("stage", &self.stage)
            .field("sync", &self.sync)
            .field("pending", &self.pending.len())
            .field("baseband", &self.baseband.len())
            .field("cursor", &self.cursor)
            .field("estimator", &self.estimator)
            .finish()
    }
}

impl Receiver {
    pub fn new(mode: &'static Mode, sample_rate: u32, block_size: usize) -> Result<Self> {
        let samples_per_symbol = mode.samples_per_symbol(sample_rate)?;
        Ok(Self {
            block_size,
            samples_per_symbol,
            symbol_rate: mode.symbol_rate as f32,
            pending: Vec::with_capacity(block_size),
            estimator: ChannelEstimator::new(mode, sample_rate, block_size),
            demodulator: Demodulator::new(mode, sample_rate)?,
            correlator: PreambleCorrelator::new(samples_per_symbol),
            decoder: Decoder::new(mode),
            header_constellation: constellation(Modulation::Qpsk),
            body_constellation: constellation(mode.modulation),
            baseband: Vec::new(),
            cursor: 0,
            sync: FrameSync::Searching,
            stage: RxStage::Accumulating,
        })
    }

    pub fn stage(&self) -> RxStage {
        self.stage
    }

    pub fn snr_db(&self) -> Option<f32> {
        self.estimator.snr_db()
    }

    pub fn frequency_offset_hz(&self) -> f32 {
        self.estimator.frequency_offset_hz()
    }

    /// Start from a previously measured offset instead of zero
    pub fn set_frequency_offset_hz(&mut self, offset_hz: f32) {
        self.estimator.set_frequency_offset_hz(offset_hz);
        self.demodulator.set_frequency_offset(offset_hz);
    }

    /// Samples waiting for a full block
    pub fn buffered_samples(&self) -> usize {
        self.pending.len()
    }

    /// Buffer `samples` and run every complete block through the pipeline
    pub fn process(&mut self, samples: &[f32], stats: &mut LinkStats) -> Vec<ReceivedFrame> {
        self.pending.extend_from_slice(samples);

        let mut frames = Vec::new();
        while self.pending.len() >= self.block_size {
            let block: Vec<f32> = self.pending.drain(..self.block_size).collect();
            frames.extend(self.process_block(&block, stats));
        }
        frames
    }

    /// Run the buffered partial block; the estimator sees it zero-padded
    pub fn flush(&mut self, stats: &mut LinkStats) -> Vec<ReceivedFrame> {
        if self.pending.is_empty() {
            return Vec::new();
        }
        let block = std::mem::take(&mut self.pending);
        self.process_block(&block, stats)
    }

    fn process_block(&mut self, block: &[f32], stats: &mut LinkStats) -> Vec<ReceivedFrame> {
        stats.blocks_processed += 1;

        self.stage = RxStage::Estimating;
        log::trace!("Block {}: estimating channel", stats.blocks_processed);
        match self.estimator.process_block(block) {
            Ok(report) if report.sync_lost => stats.sync_losses += 1,
            Ok(_) => {}
            Err(e) => log::warn!("Channel estimation skipped: {}", e),
        }
        if matches!(self.sync, FrameSync::Searching) {
            self.demodulator.set_frequency_offset(self.estimator.frequency_offset_hz());
        }

        self.stage = RxStage::Demodulating;
        log::trace!("Block {}: demodulating {} samples", stats.blocks_processed, block.len());
        self.demodulator.process(block, &mut self.baseband);

        self.stage = RxStage::Decoding;
        let frames = self.run_framer(stats);
        self.compact();

        self.stage = RxStage::Accumulating;
        frames
    }

    /// Walk the baseband buffer as far as it allows
    fn run_framer(&mut self, stats: &mut LinkStats) -> Vec<ReceivedFrame> {
        let sps = self.samples_per_symbol;
        let mut frames = Vec::new();

        loop {
            match self.sync {
                FrameSync::Searching => match self.correlator.detect(&self.baseband, self.cursor) {
                    Detection::Found { offset, correlation } => {
                        log::debug!(
                            "Preamble at baseband sample {} (metric {:.3}, gain {:.3}, residual {:+.2} Hz)",
                            offset,
                            correlation.metric,
                            correlation.gain.norm(),
                            correlation.phase_step * self.symbol_rate / (2.0 * PI)
                        );
                        self.cursor = offset;
                        self.sync = FrameSync::Header {
                            start: offset,
                            tracker: correlation.tracker(PREAMBLE_SYMBOLS),
                        };
                    }
                    Detection::Pending { resume_at } => {
                        self.cursor = resume_at;
                        break;
                    }
                },
                FrameSync::Header { start, mut tracker } => {
                    let first = start + PREAMBLE_SYMBOLS * sps;
                    let Some(symbols) =
                        self.sample_symbols(first, header_symbol_count(), &mut tracker, self.header_constellation)
                    else {
                        break;
                    };
                    match self.decoder.decode_header(&symbols) {
                        Ok(header) => {
                            log::debug!("Header seq={} len={}", header.sequence, header.payload_len);
                            self.sync = FrameSync::Body { start, tracker, header };
                        }
                        Err(e) => {
                            stats.header_failures += 1;
                            log::debug!("Header rejected at baseband sample {}: {}", start, e);
                            self.cursor = start + sps;
                            self.sync = FrameSync::Searching;
                        }
                    }
                }
                FrameSync::Body {
                    start,
                    mut tracker,
                    header,
                } => {
                    let first = start + (PREAMBLE_SYMBOLS + header_symbol_count()) * sps;
                    let count = self.decoder.body_symbol_count(&header);
                    let Some(symbols) = self.sample_symbols(first, count, &mut tracker, self.body_constellation) else {
                        break;
                    };
                    log::trace!(
                        "Body tracked, residual {:+.2} Hz at frame end",
                        tracker.phase_step() * self.symbol_rate / (2.0 * PI)
                    );

                    self.stage = RxStage::Validating;
                    let frame = self.decoder.decode_body(&symbols, &header);
                    stats.frames_received += 1;
                    if frame.crc_ok {
                        log::debug!("Frame seq={} delivered ({} bytes)", frame.sequence, frame.payload.len());
                    } else {
                        stats.crc_failures += 1;
                        log::warn!("Frame seq={} failed CRC", frame.sequence);
                    }
                    frames.push(frame);

                    self.cursor = first + count * sps - sps / 2;
                    self.sync = FrameSync::Searching;
                    self.stage = RxStage::Decoding;
                }
            }
        }

        frames
    }

    /// Tracked symbols at `count` symbol centres from `first`, once all are buffered
    ///
    /// `tracker` is only advanced when the symbols are available.
    fn sample_symbols(
        &self,
        first: usize,
        count: usize,
        tracker: &mut CarrierTracker,
        constellation: &dyn Constellation,
    ) -> Option<Vec<Symbol>> {
        if count > 0 && first + (count - 1) * self.samples_per_symbol >= self.baseband.len() {
            return None;
        }
        Some(
            (0..count)
                .map(|k| tracker.track(self.baseband[first + k * self.samples_per_symbol], constellation))
                .collect(),
        )
    }

    /// Drop baseband the framer can no longer reach
    fn compact(&mut self) {
        let keep_from = match self.sync {
            FrameSync::Searching => self.cursor,
            FrameSync::Header { start, .. } | FrameSync::Body { start, .. } => start.min(self.cursor),
        };
        if keep_from < self.block_size {
            return;
        }

        self.baseband.drain(..keep_from);
        self.cursor -= keep_from;
        match &mut self.sync {
            FrameSync::Searching => {}
            FrameSync::Header { start, .. } | FrameSync::Body { start, .. } => *start -= keep_from,
        }
    }
}
