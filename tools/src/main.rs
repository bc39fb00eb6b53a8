use std::fmt::Write as _;
use std::fs;
use std::path::PathBuf;
use webmodem_core::*;

fn render() -> String {
    let mut content = format!(
        r#"// AUTO-GENERATED FILE - DO NOT EDIT MANUALLY
// Generated from core/src/lib.rs and core/src/mode.rs
// Run `cargo run -p webmodem-tools -- <OUTPUT.ts>` to regenerate

export const DEFAULT_SAMPLE_RATE = {}
export const DEFAULT_BLOCK_SIZE = {}
export const DEFAULT_MODE = "{}"
export const PREAMBLE_SYMBOLS = {}
export const FRAME_HEADER_BYTES = {}
export const CRC_BYTES = {}
export const MAX_FRAME_PAYLOAD_BYTES = {}

export interface ModemMode {{
  name: string
  modulation: "QPSK" | "16-QAM"
  symbolRate: number
  dataRate: number
  bandwidthHz: number
  carriersHz: number[]
  pilotHz: number
}}

export const MODES: ModemMode[] = [
"#,
        DEFAULT_SAMPLE_RATE,
        DEFAULT_BLOCK_SIZE,
        DEFAULT_MODE,
        PREAMBLE_SYMBOLS,
        FRAME_HEADER_SIZE,
        CRC_SIZE,
        MAX_FRAME_PAYLOAD,
    );

    for mode in MODES.iter() {
        let carriers: Vec<String> = mode.carriers_hz.iter().map(|c| c.to_string()).collect();
        // Writing to a String cannot fail
        let _ = writeln!(
            content,
            r#"  {{ name: "{}", modulation: "{}", symbolRate: {}, dataRate: {}, bandwidthHz: {}, carriersHz: [{}], pilotHz: {} }},"#,
            mode.name,
            mode.modulation.name(),
            mode.symbol_rate,
            mode.data_rate,
            mode.bandwidth_hz,
            carriers.join(", "),
            mode.pilot_hz
        );
    }
    content.push_str("]\n");
    content
}

fn main() {
    let content = render();

    match std::env::args_os().nth(1).map(PathBuf::from) {
        Some(path) => {
            if let Err(e) = fs::write(&path, content) {
                eprintln!("Failed to write {}: {}", path.display(), e);
                std::process::exit(1);
            }
            println!("Generated: {}", path.display());
        }
        None => print!("{}", content),
    }
}
