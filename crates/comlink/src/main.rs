mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "comlink", version, about = "COBS-framed serial link CLI")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_send_subcommand() {
        let cli = Cli::try_parse_from([
            "comlink",
            "send",
            "/dev/ttyUSB0",
            "--interface",
            "3",
            "--id",
            "1",
            "--data",
            "cafe",
        ])
        .expect("send args should parse");

        assert!(matches!(cli.command, Command::Send(_)));
    }

    #[test]
    fn rejects_conflicting_payload_args() {
        let err = Cli::try_parse_from([
            "comlink",
            "send",
            "/dev/ttyUSB0",
            "--interface",
            "3",
            "--data",
            "00",
            "--text",
            "hello",
        ])
        .expect_err("conflicting args should fail");

        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn parses_read_with_hex_address() {
        let cli = Cli::try_parse_from([
            "comlink",
            "read",
            "/dev/ttyACM0",
            "--address",
            "0x20000000",
            "--len",
            "4",
            "--timeout",
            "500ms",
        ])
        .expect("read args should parse");

        match cli.command {
            Command::Read(args) => {
                assert_eq!(args.address, 0x2000_0000);
                assert_eq!(args.len, 4);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_ports_with_json_format() {
        let cli = Cli::try_parse_from(["comlink", "ports", "--format", "json"])
            .expect("ports should parse");
        assert!(matches!(cli.command, Command::Ports));
        assert!(matches!(cli.format, Some(OutputFormat::Json)));
    }

    #[test]
    fn listen_rejects_interface_filter_out_of_range() {
        let err = Cli::try_parse_from([
            "comlink",
            "listen",
            "/dev/ttyUSB0",
            "--interfaces",
            "3,16",
        ])
        .expect_err("interface 16 should be rejected");
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);

        let cli = Cli::try_parse_from([
            "comlink",
            "listen",
            "/dev/ttyUSB0",
            "--interfaces",
            "0,15",
        ])
        .expect("in-range filter should parse");
        match cli.command {
            Command::Listen(args) => assert_eq!(args.interfaces, Some(vec![0, 15])),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn serve_rejects_echo_interface_out_of_range() {
        let err = Cli::try_parse_from(["comlink", "serve", "/dev/ttyUSB0", "--echo", "2,99"])
            .expect_err("interface 99 should be rejected");
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn rejects_interface_out_of_range() {
        let err = Cli::try_parse_from(["comlink", "encode", "--interface", "16"])
            .expect_err("interface 16 should be rejected");
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }
}
