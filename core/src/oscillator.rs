//! Numerically controlled oscillator
//!
//! Phase is kept in f64 so long bursts do not drift; retuning keeps the phase
//! continuous.

use std::f64::consts::TAU;

#[derive(Debug, Clone)]
pub struct Nco {
    phase: f64,
    phase_inc: f64,
    freq_hz: f64,
    sample_rate: f64,
}

impl Nco {
    pub fn new(freq_hz: f64, sample_rate: u32) -> Self {
        let sample_rate = sample_rate as f64;
        Self {
            phase: 0.0,
            phase_inc: TAU * freq_hz / sample_rate,
            freq_hz,
            sample_rate,
        }
    }

    /// Current (cos, sin), then advance one sample
    pub fn next(&mut self) -> (f64, f64) {
        let (sin, cos) = self.phase.sin_cos();
        self.phase += self.phase_inc;

        // Keep phase in [0, 2π) for numerical stability
        if self.phase >= TAU {
            self.phase -= TAU;
        } else if self.phase < 0.0 {
            self.phase += TAU;
        }

        (cos, sin)
    }

    pub fn phase(&self) -> f64 {
        self.phase
    }

    pub fn set_phase(&mut self, phase: f64) {
        self.phase = phase.rem_euclid(TAU);
    }

    pub fn set_frequency(&mut self, freq_hz: f64) {
        self.freq_hz = freq_hz;
        self.phase_inc = TAU * freq_hz / self.sample_rate;
    }

    /// Phase this oscillator has at absolute sample `clock` when started at phase 0
    pub fn phase_at(&self, clock: u64) -> f64 {
        // Reduce cycles before scaling so large clocks keep their precision
        let cycles = self.freq_hz * (clock as f64) / self.sample_rate;
        TAU * (cycles - cycles.floor())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nco_unit_amplitude() {
        let mut nco = Nco::new(1500.0, 48_000);
        for _ in 0..1000 {
            let (cos, sin) = nco.next();
            assert!((cos * cos + sin * sin - 1.0).abs() < 1e-10);
        }
    }

    #[test]
    fn test_nco_phase_wrapping() {
        let mut nco = Nco::new(10_500.0, 48_000);
        for _ in 0..100_000 {
            nco.next();
        }
        assert!(nco.phase() >= 0.0 && nco.phase() < TAU);
    }

    #[test]
    fn test_retune_keeps_phase() {
        let mut nco = Nco::new(1500.0, 48_000);
        for _ in 0..37 {
            nco.next();
        }
        let before = nco.phase();
        nco.set_frequency(1512.5);
        assert_eq!(nco.phase(), before);

        // Next step advances at the new rate
        nco.next();
        let expected = (before + TAU * 1512.5 / 48_000.0).rem_euclid(TAU);
        assert!((nco.phase() - expected).abs() < 1e-9);
    }

    #[test]
    fn test_phase_at_matches_running_phase() {
        let mut nco = Nco::new(2625.0, 48_000);
        for _ in 0..1000 {
            nco.next();
        }
        let expected = nco.phase_at(1000);
        let diff = (nco.phase() - expected).abs();
        assert!(diff < 1e-6 || (TAU - diff) < 1e-6, "{} vs {}", nco.phase(), expected);
    }

    #[test]
    fn test_negative_frequency_wraps() {
        let mut nco = Nco::new(-40.0, 48_000);
        for _ in 0..5000 {
            nco.next();
        }
        assert!(nco.phase() >= 0.0 && nco.phase() < TAU);
        nco.set_phase(-1.0);
        assert!((nco.phase() - (TAU - 1.0)).abs() < 1e-12);
    }
}
