use crate::constellation::{constellation, map_bits, Symbol};
use crate::mode::Modulation;
use crate::tracking::CarrierTracker;
use crate::{DETECTION_THRESHOLD, PREAMBLE_SEGMENT_SYMBOLS, PREAMBLE_SYMBOLS};
use realfft::num_complex::Complex32;

const PREAMBLE_SEED: u32 = 0xDEAD_BEEF;

// Taps for 32-bit LFSR: x^32 + x^31 + x^29 + x^1 + 1
const LFSR_TAPS: u32 = 0xB400_0001;

/// Baseband energy below which a correlation window counts as empty
const MIN_WINDOW_ENERGY: f32 = 1e-9;

/// Pseudo-random bits from a Galois LFSR, least significant bit first
fn prn_bits(seed: u32, count: usize) -> Vec<bool> {
    let mut lfsr = seed;
    (0..count)
        .map(|_| {
            let bit = lfsr & 1 == 1;
            lfsr >>= 1;
            if bit {
                lfsr ^= LFSR_TAPS;
            }
            bit
        })
        .collect()
}

/// Known QPSK sequence sent ahead of every frame
pub fn preamble_symbols() -> Vec<Symbol> {
    let bits = prn_bits(PREAMBLE_SEED, 2 * PREAMBLE_SYMBOLS);
    map_bits(constellation(Modulation::Qpsk), &bits)
}

/// Result of correlating one candidate alignment against the preamble
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Correlation {
    /// Segment-wise normalized correlation in [0, 1]
    pub metric: f32,
    /// One-tap channel estimate at the first preamble symbol
    pub gain: Complex32,
    /// Residual carrier rotation in radians per symbol
    pub phase_step: f32,
}

impl Correlation {
    /// Carrier tracker positioned at `symbol_index` symbols after the first preamble symbol
    pub fn tracker(&self, symbol_index: usize) -> CarrierTracker {
        CarrierTracker::new(self.gain, self.phase_step * symbol_index as f32, self.phase_step)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Detection {
    /// First preamble symbol centre and its correlation
    Found { offset: usize, correlation: Correlation },
    /// No preamble yet; resume the search at this offset once more baseband arrives
    Pending { resume_at: usize },
}

/// Symbol-spaced matched correlator over the baseband stream
#[derive(Debug, Clone)]
pub struct PreambleCorrelator {
    reference: Vec<Complex32>,
    reference_energy: f32,
    samples_per_symbol: usize,
}

impl PreambleCorrelator {
    pub fn new(samples_per_symbol: usize) -> Self {
        let reference: Vec<Complex32> = preamble_symbols().into_iter().map(Complex32::from).collect();
        let reference_energy = reference.iter().map(|p| p.norm_sqr()).sum();
        Self {
            reference,
            reference_energy,
            samples_per_symbol,
        }
    }

    /// Baseband samples one alignment spans
    pub fn span(&self) -> usize {
        (self.reference.len() - 1) * self.samples_per_symbol + 1
    }

    fn symbol_at(&self, baseband: &[Complex32], start: usize, k: usize) -> Complex32 {
        baseband[start + k * self.samples_per_symbol]
    }

    /// Detection metric for the alignment at `start`
    ///
    /// The preamble is correlated in segments of `PREAMBLE_SEGMENT_SYMBOLS`
    /// and the segment magnitudes are added, so a carrier offset that rotates
    /// the whole preamble by several radians still scores close to 1.
    /// Returns `None` when the window runs past the end of the buffer.
    pub fn metric(&self, baseband: &[Complex32], start: usize) -> Option<f32> {
        if start + self.span() > baseband.len() {
            return None;
        }

        let mut coherent = 0.0f32;
        let mut energy = 0.0f32;
        for (s, segment) in self.reference.chunks(PREAMBLE_SEGMENT_SYMBOLS).enumerate() {
            let mut acc = Complex32::new(0.0, 0.0);
            for (j, p) in segment.iter().enumerate() {
                let b = self.symbol_at(baseband, start, s * PREAMBLE_SEGMENT_SYMBOLS + j);
                acc += b * p.conj();
                energy += b.norm_sqr();
            }
            coherent += acc.norm();
        }

        if energy < MIN_WINDOW_ENERGY {
            return Some(0.0);
        }
        Some(coherent * coherent / (energy * self.reference_energy))
    }

    /// Correlate the preamble against `baseband` starting at `start`
    ///
    /// Besides the metric this estimates the residual carrier rotation across
    /// the preamble and the channel gain with that rotation removed.
    pub fn correlate(&self, baseband: &[Complex32], start: usize) -> Option<Correlation> {
        let metric = self.metric(baseband, start)?;

        let products: Vec<Complex32> = self
            .reference
            .iter()
            .enumerate()
            .map(|(k, p)| self.symbol_at(baseband, start, k) * p.conj())
            .collect();
        let phase_step = phase_step(&products);
        let gain = derotate(&products, phase_step, 0) / self.reference_energy;

        Some(Correlation {
            metric,
            gain,
            phase_step,
        })
    }

    /// Scan from `from` for the first alignment above the detection threshold
    ///
    /// The first crossing opens a refinement window of two symbol periods and
    /// the strongest alignment inside it wins. A crossing whose window is not
    /// fully buffered yet is reported as pending at the crossing.
    pub fn detect(&self, baseband: &[Complex32], from: usize) -> Detection {
        let mut offset = from;
        while let Some(metric) = self.metric(baseband, offset) {
            if metric > DETECTION_THRESHOLD {
                return self.refine(baseband, offset);
            }
            offset += 1;
        }
        Detection::Pending { resume_at: offset }
    }

    fn refine(&self, baseband: &[Complex32], crossing: usize) -> Detection {
        let window = 2 * self.samples_per_symbol;
        if crossing + window - 1 + self.span() > baseband.len() {
            return Detection::Pending { resume_at: crossing };
        }

        let mut best: Option<(usize, f32)> = None;
        for offset in crossing..crossing + window {
            if let Some(metric) = self.metric(baseband, offset) {
                if best.map_or(true, |(_, b)| metric > b) {
                    best = Some((offset, metric));
                }
            }
        }

        match best.and_then(|(offset, _)| Some((offset, self.correlate(baseband, offset)?))) {
            Some((offset, correlation)) => Detection::Found { offset, correlation },
            None => Detection::Pending { resume_at: crossing },
        }
    }
}

/// Sum of `products[k]` rotated back by `step * (first + k)`
fn derotate(products: &[Complex32], step: f32, first: usize) -> Complex32 {
    products
        .iter()
        .enumerate()
        .map(|(k, z)| z * Complex32::from_polar(1.0, -step * (first + k) as f32))
        .sum()
}

/// Carrier rotation per symbol across de-spread preamble products
///
/// A lag-one autocorrelation gives a coarse value that cannot alias; the
/// phase between the two derotated halves then refines it over the full
/// preamble length.
fn phase_step(products: &[Complex32]) -> f32 {
    let lag: Complex32 = products.windows(2).map(|w| w[1] * w[0].conj()).sum();
    let coarse = lag.arg();

    let half = products.len() / 2;
    if half == 0 {
        return coarse;
    }
    let first = derotate(&products[..half], coarse, 0);
    let second = derotate(&products[half..], coarse, half);
    coarse + (second * first.conj()).arg() / half as f32
}
