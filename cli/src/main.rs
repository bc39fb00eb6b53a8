use clap::{Parser, Subcommand};
use hound::WavSpec;
use serde::Serialize;
use std::fs::File;
use std::path::{Path, PathBuf};
use thiserror::Error;
use webmodem_core::{
    select_mode, LinkStats, Mode, ModemError, ModemSession, ReceivedFrame, SessionConfig, DEFAULT_BLOCK_SIZE, DEFAULT_MODE,
    DEFAULT_SAMPLE_RATE, MODES,
};

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Modem(#[from] ModemError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported WAV format: {0}")]
    UnsupportedWav(String),

    #[error("No valid frame found in {0}")]
    NoValidFrames(String),
}

type CliResult<T> = std::result::Result<T, CliError>;

#[derive(Parser)]
#[command(name = "webmodem")]
#[command(about = "Adaptive audio-band modem: encode data to WAV and back")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode binary data to WAV audio file
    Encode {
        /// Input binary file
        #[arg(value_name = "INPUT.BIN")]
        input: PathBuf,

        /// Output WAV file
        #[arg(value_name = "OUTPUT.WAV")]
        output: PathBuf,

        /// Operating mode (see `webmodem modes`)
        #[arg(short, long, default_value = DEFAULT_MODE)]
        mode: String,

        /// Output sample rate in Hz
        #[arg(short = 'r', long, default_value_t = DEFAULT_SAMPLE_RATE)]
        sample_rate: u32,

        /// Analysis block size (validated with the rest of the configuration)
        #[arg(short, long, default_value_t = DEFAULT_BLOCK_SIZE)]
        block_size: usize,
    },

    /// Decode WAV audio file to binary data
    Decode {
        /// Input WAV file
        #[arg(value_name = "INPUT.WAV")]
        input: PathBuf,

        /// Output binary file
        #[arg(value_name = "OUTPUT.BIN")]
        output: PathBuf,

        /// Operating mode the recording was made with
        #[arg(short, long, default_value = DEFAULT_MODE)]
        mode: String,

        /// Analysis block size
        #[arg(short, long, default_value_t = DEFAULT_BLOCK_SIZE)]
        block_size: usize,
    },

    /// List the operating modes
    Modes {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Recommend a mode for a measured SNR
    Select {
        /// Signal-to-noise ratio in dB
        #[arg(long, allow_hyphen_values = true)]
        snr: f32,
    },

    /// Run the receiver over a recording and report channel telemetry
    Analyze {
        /// Input WAV file
        #[arg(value_name = "INPUT.WAV")]
        input: PathBuf,

        /// Operating mode the recording was made with
        #[arg(short, long, default_value = DEFAULT_MODE)]
        mode: String,

        /// Analysis block size
        #[arg(short, long, default_value_t = DEFAULT_BLOCK_SIZE)]
        block_size: usize,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    if let Err(e) = run(cli.command) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(command: Commands) -> CliResult<()> {
    match command {
        Commands::Encode {
            input,
            output,
            mode,
            sample_rate,
            block_size,
        } => encode_command(&input, &output, &mode, sample_rate, block_size),
        Commands::Decode {
            input,
            output,
            mode,
            block_size,
        } => decode_command(&input, &output, &mode, block_size),
        Commands::Modes { json } => modes_command(json),
        Commands::Select { snr } => {
            println!("{}", select_mode(snr).name);
            Ok(())
        }
        Commands::Analyze {
            input,
            mode,
            block_size,
            json,
        } => analyze_command(&input, &mode, block_size, json),
    }
}

fn encode_command(
    input_path: &Path,
    output_path: &Path,
    mode: &str,
    sample_rate: u32,
    block_size: usize,
) -> CliResult<()> {
    let data = std::fs::read(input_path)?;
    println!("Read {} bytes from {}", data.len(), input_path.display());

    let config = SessionConfig::new(mode)
        .with_sample_rate(sample_rate)
        .with_block_size(block_size);
    let mut session = ModemSession::new(config)?;
    let samples = session.transmit(&data);
    println!(
        "Encoded to {} audio samples ({}, {:.2} s)",
        samples.len(),
        session.mode().name,
        samples.len() as f32 / sample_rate as f32
    );

    write_wav(output_path, &samples, sample_rate)?;
    println!("Wrote {}", output_path.display());
    Ok(())
}

fn decode_command(input_path: &Path, output_path: &Path, mode: &str, block_size: usize) -> CliResult<()> {
    let (samples, sample_rate) = read_wav(input_path)?;
    let (session, frames) = receive_recording(&samples, sample_rate, mode, block_size)?;

    let stats = session.stats();
    let data: Vec<u8> = frames
        .iter()
        .filter(|frame| frame.crc_ok)
        .flat_map(|frame| frame.payload.iter().copied())
        .collect();
    let valid = frames.iter().filter(|frame| frame.crc_ok).count();
    log::info!("{} frames decoded, {} valid", frames.len(), valid);

    if valid == 0 {
        return Err(CliError::NoValidFrames(input_path.display().to_string()));
    }
    if stats.crc_failures > 0 {
        eprintln!("Warning: {} frame(s) failed CRC and were dropped", stats.crc_failures);
    }

    std::fs::write(output_path, &data)?;
    println!("Decoded {} bytes from {} frame(s)", data.len(), valid);
    println!("Wrote {}", output_path.display());
    Ok(())
}

/// Run a whole recording through a fresh session, trailing partial block included
fn receive_recording(
    samples: &[f32],
    sample_rate: u32,
    mode: &str,
    block_size: usize,
) -> CliResult<(ModemSession, Vec<ReceivedFrame>)> {
    let config = SessionConfig::new(mode)
        .with_sample_rate(sample_rate)
        .with_block_size(block_size);
    let mut session = ModemSession::new(config)?;
    log::info!("Receiving {} samples as {}", samples.len(), session.mode().name);

    let mut frames = session.process_block(samples);
    frames.extend(session.flush());
    Ok((session, frames))
}

#[derive(Serialize)]
struct ModeInfo {
    name: &'static str,
    modulation: &'static str,
    symbol_rate: u32,
    data_rate: u32,
    net_bit_rate: f32,
    bandwidth_hz: f32,
    carriers_hz: Vec<f32>,
    pilot_hz: f32,
}

impl From<&Mode> for ModeInfo {
    fn from(mode: &Mode) -> Self {
        Self {
            name: mode.name,
            modulation: mode.modulation.name(),
            symbol_rate: mode.symbol_rate,
            data_rate: mode.data_rate,
            net_bit_rate: mode.net_bit_rate(),
            bandwidth_hz: mode.bandwidth_hz,
            carriers_hz: mode.carriers_hz.to_vec(),
            pilot_hz: mode.pilot_hz,
        }
    }
}

fn modes_command(json: bool) -> CliResult<()> {
    let modes: Vec<ModeInfo> = MODES.iter().map(ModeInfo::from).collect();
    if json {
        println!("{}", serde_json::to_string_pretty(&modes)?);
        return Ok(());
    }

    println!(
        "{:<12} {:<7} {:>7} {:>9} {:>10} {:>9}",
        "MODE", "MOD", "BAUD", "RATE", "BANDWIDTH", "PILOT"
    );
    for mode in &modes {
        println!(
            "{:<12} {:<7} {:>7} {:>9} {:>8} Hz {:>6} Hz",
            mode.name, mode.modulation, mode.symbol_rate, mode.data_rate, mode.bandwidth_hz, mode.pilot_hz
        );
    }
    Ok(())
}

#[derive(Serialize)]
struct AnalysisReport {
    mode: &'static str,
    sample_rate: u32,
    samples: usize,
    snr_db: Option<f32>,
    frequency_offset_hz: f32,
    valid_frames: usize,
    payload_bytes: usize,
    stats: StatsReport,
    recommended_mode: &'static str,
}

#[derive(Serialize)]
struct StatsReport {
    frames_received: u64,
    crc_failures: u64,
    header_failures: u64,
    sync_losses: u64,
    blocks_processed: u64,
}

impl From<LinkStats> for StatsReport {
    fn from(stats: LinkStats) -> Self {
        Self {
            frames_received: stats.frames_received,
            crc_failures: stats.crc_failures,
            header_failures: stats.header_failures,
            sync_losses: stats.sync_losses,
            blocks_processed: stats.blocks_processed,
        }
    }
}

fn analyze_command(input_path: &Path, mode: &str, block_size: usize, json: bool) -> CliResult<()> {
    let (samples, sample_rate) = read_wav(input_path)?;
    let (session, frames) = receive_recording(&samples, sample_rate, mode, block_size)?;

    let valid: Vec<_> = frames.iter().filter(|frame| frame.crc_ok).collect();
    let report = AnalysisReport {
        mode: session.mode().name,
        sample_rate,
        samples: samples.len(),
        snr_db: session.snr_db(),
        frequency_offset_hz: session.frequency_offset_hz(),
        valid_frames: valid.len(),
        payload_bytes: valid.iter().map(|frame| frame.payload.len()).sum(),
        stats: session.stats().into(),
        recommended_mode: session.recommended_mode().name,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    match report.snr_db {
        Some(snr) => println!("SNR:              {:.1} dB", snr),
        None => println!("SNR:              n/a"),
    }
    println!("Frequency offset: {:+.2} Hz", report.frequency_offset_hz);
    println!(
        "Frames:           {} decoded, {} valid, {} CRC failures, {} header failures",
        report.stats.frames_received, report.valid_frames, report.stats.crc_failures, report.stats.header_failures
    );
    println!(
        "Blocks:           {} processed, {} without pilot",
        report.stats.blocks_processed, report.stats.sync_losses
    );
    println!("Recommended mode: {}", report.recommended_mode);
    Ok(())
}

fn write_wav(path: &Path, samples: &[f32], sample_rate: u32) -> CliResult<()> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let file = File::create(path)?;
    let mut writer = hound::WavWriter::new(file, spec)?;
    for &sample in samples {
        writer.write_sample((sample.clamp(-1.0, 1.0) * 32767.0) as i16)?;
    }
    writer.finalize()?;
    Ok(())
}

/// Mono samples in [-1, 1] and the recording's sample rate
fn read_wav(path: &Path) -> CliResult<(Vec<f32>, u32)> {
    let file = File::open(path)?;
    let mut reader = hound::WavReader::new(file)?;

    let spec = reader.spec();
    log::info!(
        "Read WAV: {} Hz, {} channels, {} bits",
        spec.sample_rate,
        spec.channels,
        spec.bits_per_sample
    );
    if spec.channels != 1 {
        return Err(CliError::UnsupportedWav(format!("{} channels, expected mono", spec.channels)));
    }

    let samples = match (spec.sample_format, spec.bits_per_sample) {
        (hound::SampleFormat::Int, 16) => reader
            .samples::<i16>()
            .map(|s| s.map(|s| s as f32 / 32768.0))
            .collect::<Result<Vec<f32>, _>>()?,
        (hound::SampleFormat::Float, 32) => reader.samples::<f32>().collect::<Result<Vec<f32>, _>>()?,
        (format, bits) => {
            return Err(CliError::UnsupportedWav(format!("{:?} with {} bits", format, bits)));
        }
    };

    Ok((samples, spec.sample_rate))
}
