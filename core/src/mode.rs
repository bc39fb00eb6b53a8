use crate::error::{ModemError, Result};
use crate::RRC_ROLLOFF;

/// Constellation used for the frame body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modulation {
    Qpsk,
    Qam16,
}

impl Modulation {
    pub fn bits_per_symbol(self) -> usize {
        match self {
            Modulation::Qpsk => 2,
            Modulation::Qam16 => 4,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Modulation::Qpsk => "QPSK",
            Modulation::Qam16 => "16-QAM",
        }
    }
}

/// A named operating point of the modem
///
/// `data_rate` is the nominal rate the mode is announced with. The rate the
/// waveform actually carries is [`Mode::net_bit_rate`], which can sit above the
/// nominal figure when the nominal symbol rate would not divide the sample rate.
#[derive(Debug, Clone, PartialEq)]
pub struct Mode {
    pub name: &'static str,
    pub bandwidth_hz: f32,
    pub symbol_rate: u32,
    pub data_rate: u32,
    pub modulation: Modulation,
    pub code_rate: f32,
    pub pilot_hz: f32,
    pub carriers_hz: &'static [f32],
    pub passband_hz: (f32, f32),
}

pub static MODES: [Mode; 5] = [
    Mode {
        name: "HTTP-1000",
        bandwidth_hz: 2700.0,
        symbol_rate: 1000,
        data_rate: 1000,
        modulation: Modulation::Qpsk,
        code_rate: 0.5,
        pilot_hz: 2625.0,
        carriers_hz: &[1500.0],
        passband_hz: (300.0, 3000.0),
    },
    Mode {
        name: "HTTP-2400",
        bandwidth_hz: 4500.0,
        symbol_rate: 2400,
        data_rate: 2400,
        modulation: Modulation::Qpsk,
        code_rate: 0.5,
        pilot_hz: 4500.0,
        carriers_hz: &[2250.0],
        passband_hz: (300.0, 4800.0),
    },
    Mode {
        name: "HTTP-4800",
        bandwidth_hz: 4500.0,
        symbol_rate: 2400,
        data_rate: 4800,
        modulation: Modulation::Qam16,
        code_rate: 0.5,
        pilot_hz: 4500.0,
        carriers_hz: &[2250.0],
        passband_hz: (300.0, 4800.0),
    },
    Mode {
        name: "HTTP-5600",
        bandwidth_hz: 5450.0,
        symbol_rate: 3000,
        data_rate: 5600,
        modulation: Modulation::Qam16,
        code_rate: 0.5,
        pilot_hz: 5250.0,
        carriers_hz: &[2625.0],
        passband_hz: (300.0, 5750.0),
    },
    Mode {
        name: "HTTP-11200",
        bandwidth_hz: 10650.0,
        symbol_rate: 6000,
        data_rate: 11200,
        modulation: Modulation::Qam16,
        code_rate: 0.5,
        pilot_hz: 10500.0,
        carriers_hz: &[5250.0],
        passband_hz: (600.0, 11250.0),
    },
];

impl Mode {
    /// Look a mode up by name (case-insensitive)
    pub fn by_name(name: &str) -> Result<&'static Mode> {
        MODES
            .iter()
            .find(|mode| mode.name.eq_ignore_ascii_case(name.trim()))
            .ok_or_else(|| ModemError::UnknownMode(name.to_string()))
    }

    /// Samples per symbol at `sample_rate`; the pair must divide exactly
    pub fn samples_per_symbol(&self, sample_rate: u32) -> Result<usize> {
        if self.symbol_rate == 0 || sample_rate % self.symbol_rate != 0 {
            return Err(ModemError::NonIntegerSamplesPerSymbol {
                sample_rate,
                symbol_rate: self.symbol_rate,
            });
        }
        Ok((sample_rate / self.symbol_rate) as usize)
    }

    pub fn primary_carrier_hz(&self) -> f32 {
        self.carriers_hz[0]
    }

    pub fn bits_per_symbol(&self) -> usize {
        self.modulation.bits_per_symbol()
    }

    /// Information rate after FEC, in bits/s
    pub fn net_bit_rate(&self) -> f32 {
        self.symbol_rate as f32 * self.bits_per_symbol() as f32 * self.code_rate
    }

    /// Half of the raised-cosine occupied bandwidth around each carrier
    pub fn occupied_half_bandwidth_hz(&self) -> f32 {
        (1.0 + RRC_ROLLOFF as f32) * self.symbol_rate as f32 / 2.0
    }

    /// Highest frequency the mode puts on air
    pub fn highest_frequency_hz(&self) -> f32 {
        let occupied = self
            .carriers_hz
            .iter()
            .map(|c| c + self.occupied_half_bandwidth_hz())
            .fold(0.0f32, f32::max);
        occupied.max(self.pilot_hz).max(self.passband_hz.1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_name() {
        let mode = Mode::by_name("HTTP-4800").unwrap();
        assert_eq!(mode.symbol_rate, 2400);
        assert_eq!(mode.modulation, Modulation::Qam16);

        assert_eq!(Mode::by_name("http-1000").unwrap().name, "HTTP-1000");
        assert!(matches!(Mode::by_name("HTTP-9999"), Err(ModemError::UnknownMode(_))));
    }

    #[test]
    fn test_all_modes_integer_at_48k() {
        for mode in MODES.iter() {
            let sps = mode.samples_per_symbol(48_000).unwrap();
            assert_eq!(sps as u32 * mode.symbol_rate, 48_000, "{}", mode.name);
        }
    }

    #[test]
    fn test_non_integer_samples_per_symbol() {
        let mode = Mode::by_name("HTTP-2400").unwrap();
        match mode.samples_per_symbol(44_100) {
            Err(ModemError::NonIntegerSamplesPerSymbol { sample_rate, symbol_rate }) => {
                assert_eq!(sample_rate, 44_100);
                assert_eq!(symbol_rate, 2400);
            }
            other => panic!("Expected NonIntegerSamplesPerSymbol, got {:?}", other),
        }
    }

    #[test]
    fn test_net_rate_covers_nominal() {
        for mode in MODES.iter() {
            assert!(
                mode.net_bit_rate() >= mode.data_rate as f32,
                "{} carries {} < {}",
                mode.name,
                mode.net_bit_rate(),
                mode.data_rate
            );
        }
    }

    #[test]
    fn test_pilot_clear_of_data_band() {
        for mode in MODES.iter() {
            let edge = mode.primary_carrier_hz() + mode.occupied_half_bandwidth_hz();
            assert!(mode.pilot_hz > edge + crate::AFC_SEARCH_HZ, "{}", mode.name);
            assert!(mode.pilot_hz < mode.passband_hz.1, "{}", mode.name);
            // Image of the carrier must fall outside the matched filter passband
            assert!(mode.primary_carrier_hz() > mode.occupied_half_bandwidth_hz(), "{}", mode.name);
            assert_eq!(mode.bandwidth_hz, mode.passband_hz.1 - mode.passband_hz.0);
        }
    }
}
