use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use shared::frame::{checksum, decode_frame, encode_frame, FRAME_LEN, START_BYTE};

#[derive(Parser, Debug)]
#[command(about = "Inspect and build plant telemetry frames")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decode a frame given as hex, e.g. `aa 28 32 00 00 00 04 00 00 b4`.
    Decode { hex: Vec<String> },
    /// Build a frame with a valid checksum and print it as hex.
    Encode {
        #[arg(long, default_value_t = 0)]
        level_1: u8,
        #[arg(long, default_value_t = 0)]
        level_2: u8,
        #[arg(long, default_value_t = 0)]
        tds: u8,
        #[arg(long, default_value_t = 0)]
        flow: u8,
        #[arg(long, default_value_t = 0)]
        pressure: u8,
        /// Raw input flag byte, LSB first.
        #[arg(long, default_value_t = 0)]
        inputs: u8,
        #[arg(long, default_value_t = 0)]
        outputs: u8,
        #[arg(long, default_value_t = 0)]
        outputs_2: u8,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Decode { hex } => {
            let bytes = parse_hex(&hex.join(" "))?;
            let telemetry = decode_frame(&bytes).context("frame rejected")?;
            println!("{telemetry:#?}");
        }
        Command::Encode {
            level_1,
            level_2,
            tds,
            flow,
            pressure,
            inputs,
            outputs,
            outputs_2,
        } => {
            let mut frame = [
                START_BYTE, level_1, level_2, tds, flow, pressure, inputs, outputs, outputs_2, 0,
            ];
            frame[FRAME_LEN - 1] = checksum(&frame[..FRAME_LEN - 1]);
            let telemetry = decode_frame(&frame)?;
            println!("{}", to_hex(&encode_frame(&telemetry)));
        }
    }

    Ok(())
}

fn parse_hex(input: &str) -> Result<Vec<u8>> {
    let digits: String = input
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ':' && *c != ',')
        .collect();
    let digits = digits.strip_prefix("0x").unwrap_or(&digits);
    hex::decode(digits).context("invalid hex")
}

fn to_hex(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_hex_accepts_common_separators() {
        assert_eq!(parse_hex("aa:01, 0F").expect("hex"), vec![0xaa, 0x01, 0x0f]);
        assert_eq!(parse_hex("0xaa01").expect("hex"), vec![0xaa, 0x01]);
        assert!(parse_hex("abc").is_err());
        assert!(parse_hex("zz").is_err());
    }

    #[test]
    fn parse_hex_rejects_non_ascii_digits() {
        assert!(parse_hex("aéa").is_err());
        assert!(parse_hex("ééé").is_err());
    }

    #[test]
    fn encoded_frames_decode_back() {
        let mut frame = [START_BYTE, 40, 50, 0, 0, 0, 0b100, 0, 0, 0];
        frame[9] = checksum(&frame[..9]);
        let text = to_hex(&frame);
        let telemetry = decode_frame(&parse_hex(&text).expect("hex")).expect("frame");
        assert_eq!((telemetry.level_1, telemetry.level_2), (40, 50));
        assert!(telemetry.inputs.mode_standby);
    }
}
