//! Root-raised-cosine pulse shaping
//!
//! Transmit and receive each apply one root-raised-cosine filter; their
//! cascade is the raised-cosine response, which is free of inter-symbol
//! interference at symbol centres.

use std::f64::consts::PI;

/// Root-raised-cosine taps, normalized to unit energy
///
/// `span` is counted in symbols on each side of the centre tap, so the filter
/// has `2 * span * samples_per_symbol + 1` taps and a group delay of
/// `span * samples_per_symbol` samples.
pub fn rrc_taps(samples_per_symbol: usize, rolloff: f64, span: usize) -> Vec<f32> {
    let filter_len = 2 * span * samples_per_symbol + 1;
    let centre = (filter_len - 1) as f64 / 2.0;

    let mut coeffs: Vec<f64> = (0..filter_len)
        .map(|i| {
            // Time in symbol periods, centred at 0
            let t = (i as f64 - centre) / samples_per_symbol as f64;
            rrc_impulse(t, rolloff)
        })
        .collect();

    let energy: f64 = coeffs.iter().map(|c| c * c).sum();
    let norm = energy.sqrt();
    for c in &mut coeffs {
        *c /= norm;
    }

    coeffs.into_iter().map(|c| c as f32).collect()
}

/// Impulse response at `t` symbol periods, with the two removable singularities handled
fn rrc_impulse(t: f64, alpha: f64) -> f64 {
    if t.abs() < 1e-10 {
        1.0 + alpha * (4.0 / PI - 1.0)
    } else if alpha > 0.0 && (t.abs() - 1.0 / (4.0 * alpha)).abs() < 1e-10 {
        let term1 = (1.0 + 2.0 / PI) * (PI / (4.0 * alpha)).sin();
        let term2 = (1.0 - 2.0 / PI) * (PI / (4.0 * alpha)).cos();
        alpha / 2.0_f64.sqrt() * (term1 + term2)
    } else {
        let num = (PI * t * (1.0 - alpha)).sin() + 4.0 * alpha * t * (PI * t * (1.0 + alpha)).cos();
        let den = PI * t * (1.0 - (4.0 * alpha * t).powi(2));
        num / den
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rrc_filter_length() {
        // 2 * 6 * 4 + 1 = 49 taps
        assert_eq!(rrc_taps(4, 0.35, 6).len(), 49);
    }

    #[test]
    fn test_rrc_symmetry() {
        let coeffs = rrc_taps(8, 0.35, 6);
        let len = coeffs.len();
        for i in 0..len / 2 {
            assert!(
                (coeffs[i] - coeffs[len - 1 - i]).abs() < 1e-6,
                "Asymmetric at index {}: {} vs {}",
                i,
                coeffs[i],
                coeffs[len - 1 - i]
            );
        }
    }

    #[test]
    fn test_rrc_unit_energy_and_peak_at_centre() {
        let coeffs = rrc_taps(16, 0.35, 6);
        let energy: f32 = coeffs.iter().map(|c| c * c).sum();
        assert!((energy - 1.0).abs() < 1e-4);

        let centre = coeffs.len() / 2;
        let peak = coeffs
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(peak, centre);
    }

    #[test]
    fn test_cascade_is_nyquist() {
        // RRC convolved with itself: unit at the centre, near zero one symbol away
        let sps = 8;
        let taps = rrc_taps(sps, 0.35, 6);
        let len = taps.len();
        let cascade = |lag: usize| -> f32 {
            (0..len)
                .filter(|&j| j + lag < len)
                .map(|j| taps[j] * taps[j + lag])
                .sum()
        };

        assert!((cascade(0) - 1.0).abs() < 1e-4);
        for k in 1..6 {
            assert!(cascade(k * sps).abs() < 0.01, "ISI {} at {} symbols", cascade(k * sps), k);
        }
    }

    #[test]
    fn test_singularity_is_finite() {
        // t = 1/(4 * alpha) lands exactly on a tap for alpha = 0.25, sps = 4
        let taps = rrc_taps(4, 0.25, 6);
        assert!(taps.iter().all(|c| c.is_finite()));
    }
}
