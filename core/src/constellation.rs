//! Gray-coded constellations
//!
//! Bit groups are read MSB-first: for QPSK the first bit selects the sign of
//! I and the second the sign of Q; for 16-QAM the first two bits select the I
//! level and the last two the Q level. Both constellations have unit average
//! energy.

use crate::mode::Modulation;
use realfft::num_complex::Complex32;
use std::f32::consts::FRAC_1_SQRT_2;
use std::fmt::Debug;

/// One modulation interval: in-phase and quadrature amplitudes
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Symbol {
    pub i: f32,
    pub q: f32,
}

impl Symbol {
    pub const fn new(i: f32, q: f32) -> Self {
        Self { i, q }
    }

    pub fn distance_sq(&self, other: &Symbol) -> f32 {
        let di = self.i - other.i;
        let dq = self.q - other.q;
        di * di + dq * dq
    }

    pub fn energy(&self) -> f32 {
        self.i * self.i + self.q * self.q
    }
}

impl From<Complex32> for Symbol {
    fn from(value: Complex32) -> Self {
        Self::new(value.re, value.im)
    }
}

impl From<Symbol> for Complex32 {
    fn from(value: Symbol) -> Self {
        Complex32::new(value.i, value.q)
    }
}

pub trait Constellation: Debug + Send + Sync {
    fn bits_per_symbol(&self) -> usize;

    /// Points indexed by their bit group
    fn points(&self) -> &'static [Symbol];

    fn order(&self) -> usize {
        self.points().len()
    }

    fn map(&self, group: u8) -> Symbol {
        let points = self.points();
        points[group as usize % points.len()]
    }

    /// Nearest point by Euclidean distance
    fn demap(&self, symbol: Symbol) -> u8 {
        let mut best_group = 0u8;
        let mut best_dist = f32::MAX;

        for (group, point) in self.points().iter().enumerate() {
            let dist = point.distance_sq(&symbol);
            if dist < best_dist {
                best_dist = dist;
                best_group = group as u8;
            }
        }

        best_group
    }

    /// Nearest constellation point
    fn slice(&self, symbol: Symbol) -> Symbol {
        self.map(self.demap(symbol))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Qpsk;

#[derive(Debug, Clone, Copy, Default)]
pub struct Qam16;

const A: f32 = FRAC_1_SQRT_2;

const QPSK_POINTS: [Symbol; 4] = [
    Symbol::new(A, A),   // 00
    Symbol::new(A, -A),  // 01
    Symbol::new(-A, A),  // 10
    Symbol::new(-A, -A), // 11
];

/// 1/sqrt(10): unit average energy for levels {-3, -1, 1, 3}
const QAM_SCALE: f32 = 0.316_227_77;

/// Gray-coded axis levels indexed by the two-bit group: 00, 01, 10, 11
const QAM_LEVELS: [f32; 4] = [-3.0 * QAM_SCALE, -QAM_SCALE, 3.0 * QAM_SCALE, QAM_SCALE];

const fn qam16_points() -> [Symbol; 16] {
    let mut points = [Symbol::new(0.0, 0.0); 16];
    let mut group = 0;
    while group < 16 {
        points[group] = Symbol::new(QAM_LEVELS[group >> 2], QAM_LEVELS[group & 0b11]);
        group += 1;
    }
    points
}

const QAM16_POINTS: [Symbol; 16] = qam16_points();

impl Constellation for Qpsk {
    fn bits_per_symbol(&self) -> usize {
        2
    }

    fn points(&self) -> &'static [Symbol] {
        &QPSK_POINTS
    }
}

impl Constellation for Qam16 {
    fn bits_per_symbol(&self) -> usize {
        4
    }

    fn points(&self) -> &'static [Symbol] {
        &QAM16_POINTS
    }
}

static QPSK: Qpsk = Qpsk;
static QAM16: Qam16 = Qam16;

pub fn constellation(modulation: Modulation) -> &'static dyn Constellation {
    match modulation {
        Modulation::Qpsk => &QPSK,
        Modulation::Qam16 => &QAM16,
    }
}

/// Map a bit stream to symbols, zero-padding the last group
pub fn map_bits(constellation: &dyn Constellation, bits: &[bool]) -> Vec<Symbol> {
    let k = constellation.bits_per_symbol();
    bits.chunks(k)
        .map(|chunk| {
            let group = (0..k).fold(0u8, |acc, i| {
                (acc << 1) | chunk.get(i).copied().unwrap_or(false) as u8
            });
            constellation.map(group)
        })
        .collect()
}

/// Hard decisions for a symbol stream, MSB-first per group
pub fn demap_symbols(constellation: &dyn Constellation, symbols: &[Symbol]) -> Vec<bool> {
    let k = constellation.bits_per_symbol();
    let mut bits = Vec::with_capacity(symbols.len() * k);
    for &symbol in symbols {
        let group = constellation.demap(symbol);
        for i in (0..k).rev() {
            bits.push((group >> i) & 1 == 1);
        }
    }
    bits
}
