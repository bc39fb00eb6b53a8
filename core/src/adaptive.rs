use crate::mode::{Mode, MODES};

// Indices into MODES
const HTTP_1000: usize = 0;
const HTTP_4800: usize = 2;
const HTTP_5600: usize = 3;
const HTTP_11200: usize = 4;

/// Pick the fastest mode the measured SNR supports
///
/// NaN compares false against every threshold and lands on the most robust
/// mode. HTTP-2400 is never chosen here.
pub fn select_mode(snr_db: f32) -> &'static Mode {
    let index = if snr_db > 20.0 {
        HTTP_11200
    } else if snr_db > 10.0 {
        HTTP_5600
    } else if snr_db > 0.0 {
        HTTP_4800
    } else {
        HTTP_1000
    };
    &MODES[index]
}
