// Round trips through a channel that shifts the whole passband in frequency,
// as a sound card pair with mismatched clocks or a heterodyne path would

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use realfft::num_complex::Complex32;
use realfft::RealFftPlanner;
use webmodem_core::{ModemSession, ReceivedFrame, SessionConfig};

const SAMPLE_RATE: f64 = 48_000.0;
const LEAD_SAMPLES: usize = 3000;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn session(mode: &str) -> ModemSession {
    ModemSession::new(SessionConfig::new(mode)).expect("Failed to create session")
}

fn random_payload(len: usize, seed: u64) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..len).map(|_| rng.gen()).collect()
}

/// Hilbert transform through the real FFT: -j on positive frequencies, DC and Nyquist dropped
fn hilbert(samples: &[f32]) -> Vec<f32> {
    let n = samples.len();
    let mut planner = RealFftPlanner::<f32>::new();
    let forward = planner.plan_fft_forward(n);
    let inverse = planner.plan_fft_inverse(n);

    let mut input = samples.to_vec();
    let mut spectrum = forward.make_output_vec();
    forward.process(&mut input, &mut spectrum).expect("forward FFT");

    let last = spectrum.len() - 1;
    spectrum[0] = Complex32::new(0.0, 0.0);
    spectrum[last] = Complex32::new(0.0, 0.0);
    for x in spectrum[1..last].iter_mut() {
        *x = Complex32::new(x.im, -x.re);
    }

    let mut output = inverse.make_output_vec();
    inverse.process(&mut spectrum, &mut output).expect("inverse FFT");
    output.iter().map(|h| h / n as f32).collect()
}

/// Single-sideband shift of every component by `offset_hz`
fn frequency_shift(samples: &[f32], offset_hz: f64) -> Vec<f32> {
    let h = hilbert(samples);
    samples
        .iter()
        .zip(&h)
        .enumerate()
        .map(|(n, (&x, &h))| {
            let (sin, cos) = (2.0 * std::f64::consts::PI * offset_hz * n as f64 / SAMPLE_RATE).sin_cos();
            x * cos as f32 - h * sin as f32
        })
        .collect()
}

/// Burst framed by silence, padded to an even length for the real FFT
fn padded(burst: Vec<f32>) -> Vec<f32> {
    let mut samples = vec![0.0f32; LEAD_SAMPLES];
    samples.extend(burst);
    samples.extend(std::iter::repeat(0.0).take(LEAD_SAMPLES + samples.len() % 2));
    samples
}

fn receive_all(rx: &mut ModemSession, samples: &[f32]) -> Vec<ReceivedFrame> {
    let mut frames = rx.process_block(samples);
    frames.extend(rx.flush());
    frames
}

fn assert_single_frame(frames: &[ReceivedFrame], payload: &[u8], context: &str) {
    assert_eq!(frames.len(), 1, "{}: expected one frame, got {}", context, frames.len());
    assert!(frames[0].crc_ok, "{}: CRC failed", context);
    assert_eq!(frames[0].payload, payload, "{}: payload mismatch", context);
}

#[test]
fn test_shift_moves_a_tone() {
    // 1000 Hz moved by 40 Hz lands on bin 1040 of a 48000-point transform
    let tone: Vec<f32> = (0..48_000)
        .map(|n| (2.0 * std::f64::consts::PI * 1000.0 * n as f64 / SAMPLE_RATE).cos() as f32)
        .collect();
    let shifted = frequency_shift(&tone, 40.0);

    let mut planner = RealFftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(shifted.len());
    let mut input = shifted;
    let mut spectrum = fft.make_output_vec();
    fft.process(&mut input, &mut spectrum).unwrap();

    let peak = spectrum
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.norm().total_cmp(&b.1.norm()))
        .map(|(bin, _)| bin)
        .unwrap();
    assert_eq!(peak, 1040);
}

#[test]
fn test_offsets_qpsk_and_qam16() {
    init_logging();
    for mode in ["HTTP-2400", "HTTP-4800"] {
        for offset in [3.0_f64, -3.0, 10.0, -10.0, 40.0, -40.0] {
            let payload = random_payload(100, offset.abs() as u64);
            let mut tx = session(mode);
            let mut rx = session(mode);

            let samples = frequency_shift(&padded(tx.transmit(&payload)), offset);
            let frames = receive_all(&mut rx, &samples);

            let context = format!("{} at {:+} Hz", mode, offset);
            assert_single_frame(&frames, &payload, &context);
            assert_eq!(rx.stats().header_failures, 0, "{}", context);
        }
    }
}

#[test]
fn test_offsets_slow_and_fast_modes() {
    init_logging();
    for (mode, offset) in [("HTTP-1000", 10.0), ("HTTP-1000", -10.0), ("HTTP-11200", 40.0), ("HTTP-11200", -40.0)] {
        let payload = random_payload(100, 17);
        let mut tx = session(mode);
        let mut rx = session(mode);

        let samples = frequency_shift(&padded(tx.transmit(&payload)), offset);
        let frames = receive_all(&mut rx, &samples);
        assert_single_frame(&frames, &payload, &format!("{} at {:+} Hz", mode, offset));
    }
}

#[test]
fn test_long_frame_survives_offset() {
    init_logging();
    for offset in [40.0, -10.0] {
        let payload = random_payload(1500, 1500);
        let mut tx = session("HTTP-4800");
        let mut rx = session("HTTP-4800");

        let samples = frequency_shift(&padded(tx.transmit(&payload)), offset);
        let frames = receive_all(&mut rx, &samples);
        assert_single_frame(&frames, &payload, &format!("1500 bytes at {:+} Hz", offset));

        // The pilot AFC has moved toward the offset by the end of the burst
        assert!(rx.frequency_offset_hz() * offset as f32 > 0.0, "AFC at {} Hz", rx.frequency_offset_hz());
    }
}

#[test]
fn test_offset_with_noise() {
    init_logging();
    for (mode, sigma) in [("HTTP-4800", 0.05f32), ("HTTP-2400", 0.1)] {
        for offset in [10.0, -40.0] {
            let payload = random_payload(64, 64);
            let mut tx = session(mode);
            let mut rx = session(mode);

            let mut samples = frequency_shift(&padded(tx.transmit(&payload)), offset);
            let mut rng = StdRng::seed_from_u64(42);
            let normal = Normal::new(0.0f32, sigma).unwrap();
            for s in samples.iter_mut() {
                *s += normal.sample(&mut rng);
            }

            let frames = receive_all(&mut rx, &samples);
            assert_single_frame(&frames, &payload, &format!("{} at {:+} Hz, sigma {}", mode, offset, sigma));
        }
    }
}
