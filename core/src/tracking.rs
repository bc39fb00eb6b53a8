//! Per-symbol carrier phase tracking
//!
//! A decision-directed second-order loop runs over the symbol centres of a
//! frame. It starts from the preamble's channel gain and phase step, slices
//! every derotated sample to the nearest constellation point and feeds the
//! residual angle through a proportional-integral filter:
//!
//! ```text
//! step  += beta * error
//! phase += step + alpha * error
//! ```
//!
//! Phase and step are in radians per symbol.

use crate::constellation::{Constellation, Symbol};
use crate::{CARRIER_LOOP_BANDWIDTH, CARRIER_LOOP_DAMPING};
use realfft::num_complex::Complex32;
use std::f32::consts::{FRAC_PI_4, PI};

/// Largest phase step the loop will follow, in radians per symbol
const MAX_PHASE_STEP: f32 = FRAC_PI_4;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CarrierTracker {
    /// Channel gain at phase zero
    gain: Complex32,
    phase: f32,
    step: f32,
    alpha: f32,
    beta: f32,
}

impl CarrierTracker {
    /// Loop starting at `phase` and advancing by `step` radians per symbol
    pub fn new(gain: Complex32, phase: f32, step: f32) -> Self {
        let bw = CARRIER_LOOP_BANDWIDTH;
        let damping = CARRIER_LOOP_DAMPING;
        let denom = 1.0 + 2.0 * damping * bw + bw * bw;

        Self {
            gain,
            phase: wrap(phase),
            step: step.clamp(-MAX_PHASE_STEP, MAX_PHASE_STEP),
            alpha: 4.0 * damping * bw / denom,
            beta: 4.0 * bw * bw / denom,
        }
    }

    /// Current frequency estimate in radians per symbol
    pub fn phase_step(&self) -> f32 {
        self.step
    }

    /// Equalize the next symbol-centre sample and update the loop from the decision
    pub fn track(&mut self, sample: Complex32, constellation: &dyn Constellation) -> Symbol {
        let power = self.gain.norm_sqr();
        if power <= f32::EPSILON {
            return Symbol::default();
        }

        let rotation = Complex32::from_polar(1.0, -self.phase);
        let y = sample * rotation * self.gain.conj() / power;
        let decision = Complex32::from(constellation.slice(Symbol::from(y)));
        let error = (y * decision.conj()).arg();

        self.step = (self.step + self.beta * error).clamp(-MAX_PHASE_STEP, MAX_PHASE_STEP);
        self.phase = wrap(self.phase + self.step + self.alpha * error);

        Symbol::from(y)
    }
}

/// Wrap to [-pi, pi]
fn wrap(phase: f32) -> f32 {
    let mut phase = phase % (2.0 * PI);
    if phase > PI {
        phase -= 2.0 * PI;
    } else if phase < -PI {
        phase += 2.0 * PI;
    }
    phase
}
