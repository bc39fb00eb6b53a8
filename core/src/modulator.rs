use crate::constellation::Symbol;
use crate::error::Result;
use crate::mode::Mode;
use crate::oscillator::Nco;
use crate::pulse::rrc_taps;
use crate::{PILOT_AMPLITUDE, PILOT_INTERVAL_SAMPLES, RRC_ROLLOFF, RRC_SPAN_SYMBOLS, TAIL_SYMBOLS, TX_AMPLITUDE};

/// Pulse-shaping passband modulator
///
/// Symbols are shaped by the transmit half of the root-raised-cosine pair and
/// mixed onto the mode's primary carrier. The carrier oscillator and the
/// sample clock persist across calls, so consecutive bursts stay
/// phase-continuous.
#[derive(Debug, Clone)]
pub struct Modulator {
    samples_per_symbol: usize,
    taps: Vec<f32>,
    carrier: Nco,
    pilot: Nco,
    sample_clock: u64,
}

impl Modulator {
    pub fn new(mode: &Mode, sample_rate: u32) -> Result<Self> {
        let samples_per_symbol = mode.samples_per_symbol(sample_rate)?;

        // Scaled so a shaped symbol carries `samples_per_symbol` energy
        let gain = (samples_per_symbol as f32).sqrt();
        let taps = rrc_taps(samples_per_symbol, RRC_ROLLOFF, RRC_SPAN_SYMBOLS)
            .into_iter()
            .map(|t| t * gain)
            .collect();

        Ok(Self {
            samples_per_symbol,
            taps,
            carrier: Nco::new(mode.primary_carrier_hz() as f64, sample_rate),
            pilot: Nco::new(mode.pilot_hz as f64, sample_rate),
            sample_clock: 0,
        })
    }

    pub fn samples_per_symbol(&self) -> usize {
        self.samples_per_symbol
    }

    /// Samples emitted since construction
    pub fn sample_clock(&self) -> u64 {
        self.sample_clock
    }

    /// Number of samples [`Modulator::modulate`] emits for `symbol_count` symbols
    pub fn burst_len(&self, symbol_count: usize) -> usize {
        (symbol_count + TAIL_SYMBOLS) * self.samples_per_symbol
    }

    /// Shaped baseband (I, Q) for a symbol sequence, tail included
    ///
    /// Symbol `k` peaks at sample `k * sps + span * sps`.
    pub fn shape(&self, symbols: &[Symbol]) -> (Vec<f32>, Vec<f32>) {
        let len = self.burst_len(symbols.len());
        let mut i_wave = vec![0.0f32; len];
        let mut q_wave = vec![0.0f32; len];

        for (k, symbol) in symbols.iter().enumerate() {
            let start = k * self.samples_per_symbol;
            for (j, &tap) in self.taps.iter().enumerate() {
                i_wave[start + j] += symbol.i * tap;
                q_wave[start + j] += symbol.q * tap;
            }
        }

        (i_wave, q_wave)
    }

    /// Shape, mix onto the carrier and add the pilot tone
    pub fn modulate(&mut self, symbols: &[Symbol]) -> Vec<f32> {
        let (i_wave, q_wave) = self.shape(symbols);
        let mut samples = Vec::with_capacity(i_wave.len());

        for (&i, &q) in i_wave.iter().zip(q_wave.iter()) {
            if self.sample_clock % PILOT_INTERVAL_SAMPLES == 0 {
                let anchor = self.pilot.phase_at(self.sample_clock);
                self.pilot.set_phase(anchor);
            }

            let (cos, sin) = self.carrier.next();
            let (pilot_cos, _) = self.pilot.next();

            let data = TX_AMPLITUDE * (i * cos as f32 - q * sin as f32);
            samples.push(data + PILOT_AMPLITUDE * pilot_cos as f32);
            self.sample_clock += 1;
        }

        samples
    }
}
