use crate::error::Result;
use crate::mode::Mode;
use crate::oscillator::Nco;
use crate::pulse::rrc_taps;
use crate::{RRC_ROLLOFF, RRC_SPAN_SYMBOLS};
use realfft::num_complex::Complex32;

/// Coherent passband-to-baseband converter
///
/// Each sample is mixed down by the local oscillator and passed through the
/// receive half of the root-raised-cosine pair. One baseband sample is
/// produced per input sample; all state carries over between calls.
#[derive(Debug, Clone)]
pub struct Demodulator {
    carrier_hz: f64,
    lo: Nco,
    taps: Vec<f32>,
    // Two copies of the delay line back to back so the newest L samples are always contiguous
    history_re: Vec<f32>,
    history_im: Vec<f32>,
    pos: usize,
}

impl Demodulator {
    pub fn new(mode: &Mode, sample_rate: u32) -> Result<Self> {
        let samples_per_symbol = mode.samples_per_symbol(sample_rate)?;
        let taps = rrc_taps(samples_per_symbol, RRC_ROLLOFF, RRC_SPAN_SYMBOLS);
        let len = taps.len();
        let carrier_hz = mode.primary_carrier_hz() as f64;

        Ok(Self {
            carrier_hz,
            lo: Nco::new(carrier_hz, sample_rate),
            taps,
            history_re: vec![0.0; 2 * len],
            history_im: vec![0.0; 2 * len],
            pos: 0,
        })
    }

    /// Retune the local oscillator to carrier + `offset_hz`, keeping its phase
    pub fn set_frequency_offset(&mut self, offset_hz: f32) {
        self.lo.set_frequency(self.carrier_hz + offset_hz as f64);
    }

    /// Mix and filter `samples`, appending one baseband value per sample to `out`
    pub fn process(&mut self, samples: &[f32], out: &mut Vec<Complex32>) {
        let len = self.taps.len();
        out.reserve(samples.len());

        for &x in samples {
            let (cos, sin) = self.lo.next();
            let re = 2.0 * x * cos as f32;
            let im = -2.0 * x * sin as f32;

            self.pos = (self.pos + 1) % len;
            self.history_re[self.pos] = re;
            self.history_re[self.pos + len] = re;
            self.history_im[self.pos] = im;
            self.history_im[self.pos + len] = im;

            // Taps are symmetric, so the window needs no reversal
            let window_re = &self.history_re[self.pos + 1..self.pos + 1 + len];
            let window_im = &self.history_im[self.pos + 1..self.pos + 1 + len];
            let mut acc_re = 0.0f32;
            let mut acc_im = 0.0f32;
            for ((&h, &r), &i) in self.taps.iter().zip(window_re).zip(window_im) {
                acc_re += h * r;
                acc_im += h * i;
            }

            out.push(Complex32::new(acc_re, acc_im));
        }
    }
}
