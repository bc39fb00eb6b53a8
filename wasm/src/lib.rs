use js_sys::{Array, Float32Array, Uint8Array};
use wasm_bindgen::prelude::*;
use webmodem_core::{ModemSession, SessionConfig};

fn to_js_error(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

#[wasm_bindgen]
pub struct WasmModem {
    inner: ModemSession,
}

#[wasm_bindgen]
impl WasmModem {
    /// Mode name such as "HTTP-4800", the AudioContext sample rate and the
    /// analysis block size
    #[wasm_bindgen(constructor)]
    pub fn new(mode: &str, sample_rate: u32, block_size: usize) -> Result<WasmModem, JsValue> {
        let config = SessionConfig::new(mode)
            .with_sample_rate(sample_rate)
            .with_block_size(block_size);
        ModemSession::new(config)
            .map(|session| WasmModem { inner: session })
            .map_err(to_js_error)
    }

    /// Takes a Uint8Array and returns the burst as a Float32Array
    #[wasm_bindgen]
    pub fn transmit(&mut self, data: &[u8]) -> Float32Array {
        let samples = self.inner.transmit(data);
        Float32Array::from(samples.as_slice())
    }

    /// Feed captured samples; returns the payloads of frames that passed CRC
    #[wasm_bindgen]
    pub fn receive(&mut self, samples: &[f32]) -> Array {
        let frames = self.inner.process_block(samples);
        valid_payloads(frames)
    }

    /// Process the buffered partial block
    #[wasm_bindgen]
    pub fn flush(&mut self) -> Array {
        let frames = self.inner.flush();
        valid_payloads(frames)
    }

    /// Latest SNR estimate in dB, or NaN before the first non-silent block
    #[wasm_bindgen]
    pub fn snr_db(&self) -> f32 {
        self.inner.snr_db().unwrap_or(f32::NAN)
    }

    #[wasm_bindgen]
    pub fn frequency_offset_hz(&self) -> f32 {
        self.inner.frequency_offset_hz()
    }

    #[wasm_bindgen]
    pub fn crc_failures(&self) -> u32 {
        self.inner.stats().crc_failures as u32
    }

    #[wasm_bindgen]
    pub fn recommended_mode(&self) -> String {
        self.inner.recommended_mode().name.to_string()
    }

    #[wasm_bindgen]
    pub fn mode(&self) -> String {
        self.inner.mode().name.to_string()
    }
}

fn valid_payloads(frames: Vec<webmodem_core::ReceivedFrame>) -> Array {
    frames
        .into_iter()
        .filter(|frame| frame.crc_ok)
        .map(|frame| JsValue::from(Uint8Array::from(frame.payload.as_slice())))
        .collect()
}

/// Mode name for a measured SNR in dB
#[wasm_bindgen]
pub fn select_mode(snr_db: f32) -> String {
    webmodem_core::select_mode(snr_db).name.to_string()
}
