use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};
use comlink_transport::serial::DEFAULT_BAUD_RATE;

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod decode;
pub mod encode;
pub mod link;
pub mod listen;
pub mod ports;
pub mod read;
pub mod send;
pub mod serve;
pub mod version;
pub mod write;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Encode one message and print its wire bytes.
    Encode(EncodeArgs),
    /// Parse wire bytes and print the messages they contain.
    Decode(DecodeArgs),
    /// Send a single message.
    Send(SendArgs),
    /// Read a memory range from the target (READ_FROM).
    Read(ReadArgs),
    /// Write a memory range on the target (WRITE_TO).
    Write(WriteArgs),
    /// Print received messages.
    Listen(ListenArgs),
    /// Act as a target: answer memory commands against a simulated RAM region.
    Serve(ServeArgs),
    /// List serial devices visible to the host.
    Ports,
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Encode(args) => encode::run(args, format),
        Command::Decode(args) => decode::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Read(args) => read::run(args, format),
        Command::Write(args) => write::run(args, format),
        Command::Listen(args) => listen::run(args, format),
        Command::Serve(args) => serve::run(args),
        Command::Ports => ports::run(format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct DeviceArgs {
    /// Serial device path (e.g. /dev/ttyUSB0, COM3).
    #[arg(env = "COMLINK_DEVICE")]
    pub device: String,
    /// Line speed in baud.
    #[arg(long, env = "COMLINK_BAUD", default_value_t = DEFAULT_BAUD_RATE)]
    pub baud: u32,
}

#[derive(Args, Debug)]
pub struct PayloadArgs {
    /// Payload as hex (e.g. "de ad be ef").
    #[arg(long, conflicts_with_all = ["text", "file"])]
    pub data: Option<String>,
    /// Payload as a UTF-8 string.
    #[arg(long, conflicts_with_all = ["data", "file"])]
    pub text: Option<String>,
    /// Read payload from file.
    #[arg(long, conflicts_with_all = ["data", "text"])]
    pub file: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// Interface id (0-15).
    #[arg(long, short = 'i', value_parser = clap::value_parser!(u8).range(0..16))]
    pub interface: u8,
    /// Message id (0-15).
    #[arg(long, default_value = "0", value_parser = clap::value_parser!(u8).range(0..16))]
    pub id: u8,
    #[command(flatten)]
    pub payload: PayloadArgs,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Wire bytes as hex, delimiters included.
    #[arg(conflicts_with = "file")]
    pub hex: Option<String>,
    /// Read raw wire bytes from file.
    #[arg(long)]
    pub file: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    #[command(flatten)]
    pub link: DeviceArgs,
    /// Interface id (0-15).
    #[arg(long, short = 'i', value_parser = clap::value_parser!(u8).range(0..16))]
    pub interface: u8,
    /// Message id (0-15).
    #[arg(long, default_value = "0", value_parser = clap::value_parser!(u8).range(0..16))]
    pub id: u8,
    #[command(flatten)]
    pub payload: PayloadArgs,
    /// Wait for one message on the same interface (or a control ERROR) and print it.
    #[arg(long)]
    pub wait: bool,
    /// Maximum time to wait for the transmit queue to drain and for a reply.
    #[arg(long, default_value = "2s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct ReadArgs {
    #[command(flatten)]
    pub link: DeviceArgs,
    /// Start address (decimal or 0x-prefixed hex).
    #[arg(long, value_parser = parse_address)]
    pub address: u32,
    /// Number of bytes to read.
    #[arg(long)]
    pub len: u16,
    /// Maximum time to wait for the reply.
    #[arg(long, default_value = "2s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct WriteArgs {
    #[command(flatten)]
    pub link: DeviceArgs,
    /// Start address (decimal or 0x-prefixed hex).
    #[arg(long, value_parser = parse_address)]
    pub address: u32,
    /// Bytes to write, as hex.
    #[arg(long)]
    pub data: String,
    /// How long to watch for an ERROR reply after sending.
    #[arg(long, default_value = "200ms")]
    pub settle: String,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    #[command(flatten)]
    pub link: DeviceArgs,
    /// Only print these interfaces (comma-separated, 0-15).
    #[arg(long, value_delimiter = ',', value_parser = clap::value_parser!(u8).range(0..16))]
    pub interfaces: Option<Vec<u8>>,
    /// Exit after printing N messages.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    #[command(flatten)]
    pub link: DeviceArgs,
    /// Base address of the simulated RAM region.
    #[arg(long, value_parser = parse_address, default_value = "0x20000000")]
    pub base: u32,
    /// Size of the simulated RAM region in bytes.
    #[arg(long, default_value = "1024")]
    pub size: usize,
    /// Reject WRITE_TO requests.
    #[arg(long)]
    pub read_only: bool,
    /// Interfaces to echo back to the sender (comma-separated, 1-15).
    #[arg(long, value_delimiter = ',', value_parser = clap::value_parser!(u8).range(0..16))]
    pub echo: Option<Vec<u8>>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub fn parse_address(input: &str) -> Result<u32, String> {
    let input = input.trim();
    let parsed = match input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
    {
        Some(hex) => u32::from_str_radix(&hex.replace('_', ""), 16),
        None => input.replace('_', "").parse(),
    };
    parsed.map_err(|err| format!("invalid address {input:?}: {err}"))
}

/// Parse hex bytes. Whitespace, `:` and `-` separators are ignored, as is a
/// leading `0x`.
pub fn parse_hex(input: &str) -> CliResult<Vec<u8>> {
    let digits: String = input
        .trim()
        .trim_start_matches("0x")
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ':' && *c != '-')
        .collect();

    if !digits.is_ascii() {
        return Err(CliError::new(USAGE, "hex input contains non-hex characters"));
    }
    if digits.len() % 2 != 0 {
        return Err(CliError::new(USAGE, "hex input has an odd number of digits"));
    }

    (0..digits.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .map_err(|_| CliError::new(USAGE, format!("invalid hex byte: {}", &digits[i..i + 2])))
        })
        .collect()
}

pub fn resolve_payload(args: &PayloadArgs) -> CliResult<Vec<u8>> {
    if let Some(hex) = &args.data {
        return parse_hex(hex);
    }
    if let Some(text) = &args.text {
        return Ok(text.as_bytes().to_vec());
    }
    if let Some(path) = &args.file {
        return std::fs::read(path).map_err(|err| {
            crate::exit::io_error(&format!("failed reading {}", path.display()), err)
        });
    }
    Ok(Vec::new())
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_hex_accepts_separators() {
        assert_eq!(parse_hex("de ad:be-ef").unwrap(), [0xDE, 0xAD, 0xBE, 0xEF]);
        assert_eq!(parse_hex("0x0102").unwrap(), [1, 2]);
        assert!(parse_hex("").unwrap().is_empty());
    }

    #[test]
    fn parse_hex_rejects_bad_input() {
        assert!(parse_hex("abc").is_err());
        assert!(parse_hex("zz").is_err());
    }

    #[test]
    fn parse_address_forms() {
        assert_eq!(parse_address("0x2000_0000").unwrap(), 0x2000_0000);
        assert_eq!(parse_address("4096").unwrap(), 4096);
        assert!(parse_address("0x1_0000_0000").is_err());
        assert!(parse_address("ram").is_err());
    }

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
    }
}
