//! Per-block channel estimation: pilot-tone AFC and spectral SNR
//!
//! Each analysis block is Hann-windowed and transformed with a real FFT.
//! Bins are kept in dB (`20 * log10(|X| / N)`) and classified against the
//! mode's carriers, passband and pilot:
//!
//! - signal bins lie within the occupied half-bandwidth of a carrier;
//! - noise bins are the rest of the passband, minus a guard band around the
//!   signal and the pilot search window;
//! - the pilot peak is searched within `AFC_SEARCH_HZ` of the pilot.
//!
//! The parabolic peak fit resolves well below one bin, so readings under
//! `AFC_DEADBAND_HZ` are treated as zero and anything larger is smoothed in.
//! What the LO leaves behind is removed per symbol by the carrier tracker.

use crate::error::{ModemError, Result};
use crate::mode::Mode;
use crate::{AFC_DEADBAND_HZ, AFC_SEARCH_HZ, AFC_SMOOTHING, NOISE_GUARD_HZ, PILOT_MIN_PROMINENCE_DB, SILENCE_RMS};
use realfft::num_complex::Complex32;
use realfft::{RealFftPlanner, RealToComplex};
use std::f32::consts::PI;
use std::fmt;
use std::sync::Arc;

/// Magnitude floor before the dB conversion
const MAGNITUDE_FLOOR: f32 = 1e-12;

/// Extra bins excluded from the noise estimate on each side of the pilot window
const PILOT_GUARD_BINS: f32 = 3.0;

/// What the estimator learned from one block
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BlockReport {
    /// Block was below the silence threshold and left telemetry untouched
    pub silent: bool,
    pub snr_db: Option<f32>,
    /// Raw pilot offset measured in this block, if the pilot was usable
    pub pilot_offset_hz: Option<f32>,
    /// Pilot not prominent enough; the previous offset was kept
    pub sync_lost: bool,
}

pub struct ChannelEstimator {
    mode: &'static Mode,
    sample_rate: f32,
    block_size: usize,
    fft: Arc<dyn RealToComplex<f32>>,
    window: Vec<f32>,
    input: Vec<f32>,
    spectrum: Vec<Complex32>,
    bins_db: Vec<f32>,
    snr_db: Option<f32>,
    frequency_offset_hz: f32,
}

impl fmt::Debug for ChannelEstimator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelEstimator")
            .field("mode", &self.mode.name)
            .field("sample_rate", &self.sample_rate)
            .field("block_size", &self.block_size)
            .field("snr_db", &self.snr_db)
            .field("frequency_offset_hz", &self.frequency_offset_hz)
            .finish()
    }
}

impl ChannelEstimator {
    pub fn new(mode: &'static Mode, sample_rate: u32, block_size: usize) -> Self {
        let mut planner = RealFftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(block_size);
        let spectrum = fft.make_output_vec();

        // Periodic Hann window
        let window = (0..block_size)
            .map(|n| 0.5 - 0.5 * (2.0 * PI * n as f32 / block_size as f32).cos())
            .collect();

        Self {
            mode,
            sample_rate: sample_rate as f32,
            block_size,
            fft,
            window,
            input: vec![0.0; block_size],
            bins_db: vec![0.0; spectrum.len()],
            spectrum,
            snr_db: None,
            frequency_offset_hz: 0.0,
        }
    }

    /// Latest SNR estimate, `None` until a non-silent block was analysed
    pub fn snr_db(&self) -> Option<f32> {
        self.snr_db
    }

    /// Smoothed carrier frequency offset
    pub fn frequency_offset_hz(&self) -> f32 {
        self.frequency_offset_hz
    }

    pub fn set_frequency_offset_hz(&mut self, offset_hz: f32) {
        self.frequency_offset_hz = offset_hz;
    }

    pub fn bin_width_hz(&self) -> f32 {
        self.sample_rate / self.block_size as f32
    }

    /// Analyse one block; shorter blocks are zero-padded
    pub fn process_block(&mut self, block: &[f32]) -> Result<BlockReport> {
        let len = block.len().min(self.block_size);
        if len == 0 || rms(&block[..len]) < SILENCE_RMS {
            return Ok(BlockReport {
                silent: true,
                ..BlockReport::default()
            });
        }

        self.analyse(&block[..len])?;

        let noise = self.noise_bins();
        let snr_db = self.measure_snr(&noise);
        if snr_db.is_some() {
            self.snr_db = snr_db;
        }

        let pilot_offset_hz = self.measure_pilot(&noise);
        match pilot_offset_hz {
            Some(raw) => {
                let target = if raw.abs() > AFC_DEADBAND_HZ { raw } else { 0.0 };
                self.frequency_offset_hz += AFC_SMOOTHING * (target - self.frequency_offset_hz);
            }
            None => {
                log::debug!("{}: pilot not found, keeping {:.2} Hz offset", self.mode.name, self.frequency_offset_hz);
            }
        }

        Ok(BlockReport {
            silent: false,
            snr_db,
            pilot_offset_hz,
            sync_lost: pilot_offset_hz.is_none(),
        })
    }

    /// Window, transform and convert to dB into `bins_db`
    fn analyse(&mut self, block: &[f32]) -> Result<()> {
        self.input.iter_mut().for_each(|x| *x = 0.0);
        for ((dst, &x), &w) in self.input.iter_mut().zip(block).zip(&self.window) {
            *dst = x * w;
        }

        self.fft
            .process(&mut self.input, &mut self.spectrum)
            .map_err(|e| ModemError::FftError(format!("FFT forward process failed: {:?}", e)))?;

        let n = self.block_size as f32;
        for (db, x) in self.bins_db.iter_mut().zip(&self.spectrum) {
            *db = 20.0 * (x.norm() / n).max(MAGNITUDE_FLOOR).log10();
        }
        Ok(())
    }

    fn bin_hz(&self, bin: usize) -> f32 {
        bin as f32 * self.bin_width_hz()
    }

    fn distance_to_carrier(&self, hz: f32) -> f32 {
        self.mode
            .carriers_hz
            .iter()
            .map(|c| (hz - c).abs())
            .fold(f32::MAX, f32::min)
    }

    fn signal_bins(&self) -> Vec<usize> {
        let half = self.mode.occupied_half_bandwidth_hz();
        (0..self.bins_db.len())
            .filter(|&bin| self.distance_to_carrier(self.bin_hz(bin)) <= half)
            .collect()
    }

    fn noise_bins(&self) -> Vec<usize> {
        let (low, high) = self.mode.passband_hz;
        let signal_guard = self.mode.occupied_half_bandwidth_hz() + NOISE_GUARD_HZ;
        let pilot_guard = AFC_SEARCH_HZ + PILOT_GUARD_BINS * self.bin_width_hz();
        (0..self.bins_db.len())
            .filter(|&bin| {
                let hz = self.bin_hz(bin);
                hz >= low
                    && hz <= high
                    && self.distance_to_carrier(hz) > signal_guard
                    && (hz - self.mode.pilot_hz).abs() > pilot_guard
            })
            .collect()
    }

    fn measure_snr(&self, noise: &[usize]) -> Option<f32> {
        let signal = self.signal_bins();
        let signal_power = mean_power(&self.bins_db, &signal)?;
        let noise_power = mean_power(&self.bins_db, noise)?;
        Some(10.0 * (signal_power / noise_power).log10())
    }

    /// Raw pilot offset in Hz, or `None` when the pilot is not prominent
    fn measure_pilot(&self, noise: &[usize]) -> Option<f32> {
        let pilot = self.mode.pilot_hz;
        let (peak_bin, peak_db) = (0..self.bins_db.len())
            .filter(|&bin| (self.bin_hz(bin) - pilot).abs() <= AFC_SEARCH_HZ)
            .map(|bin| (bin, self.bins_db[bin]))
            .fold(None, |best: Option<(usize, f32)>, (bin, db)| match best {
                Some((_, best_db)) if best_db >= db => best,
                _ => Some((bin, db)),
            })?;

        if noise.is_empty() {
            return None;
        }
        let noise_floor_db = noise.iter().map(|&bin| self.bins_db[bin]).sum::<f32>() / noise.len() as f32;
        if peak_db - noise_floor_db < PILOT_MIN_PROMINENCE_DB {
            return None;
        }

        let delta = if peak_bin > 0 && peak_bin + 1 < self.bins_db.len() {
            parabolic_offset(
                self.bins_db[peak_bin - 1],
                self.bins_db[peak_bin],
                self.bins_db[peak_bin + 1],
            )
        } else {
            0.0
        };

        Some((peak_bin as f32 + delta) * self.bin_width_hz() - pilot)
    }
}

/// Vertex of the parabola through three equally spaced points, in bins from the centre
fn parabolic_offset(left: f32, centre: f32, right: f32) -> f32 {
    let denom = left - 2.0 * centre + right;
    if denom.abs() < f32::EPSILON {
        return 0.0;
    }
    (0.5 * (left - right) / denom).clamp(-0.5, 0.5)
}

fn mean_power(bins_db: &[f32], bins: &[usize]) -> Option<f32> {
    if bins.is_empty() {
        return None;
    }
    let total: f32 = bins.iter().map(|&bin| 10f32.powf(bins_db[bin] / 10.0)).sum();
    Some(total / bins.len() as f32)
}

fn rms(samples: &[f32]) -> f32 {
    (samples.iter().map(|x| x * x).sum::<f32>() / samples.len() as f32).sqrt()
}
