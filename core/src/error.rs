use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModemError {
    #[error("Unknown mode: {0}")]
    UnknownMode(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Sample rate {sample_rate} Hz is not an integer multiple of {symbol_rate} Bd")]
    NonIntegerSamplesPerSymbol { sample_rate: u32, symbol_rate: u32 },

    #[error("CRC mismatch in frame header")]
    HeaderCrcMismatch,

    #[error("Invalid frame size")]
    InvalidFrameSize,

    #[error("FFT error: {0}")]
    FftError(String),
}

pub type Result<T> = std::result::Result<T, ModemError>;
