use comlink_frame::Parser;
use tracing::{debug, warn};

use crate::cmd::{parse_hex, DecodeArgs};
use crate::exit::{io_error, CliError, CliResult, DATA_INVALID, SUCCESS, USAGE};
use crate::output::{print_messages, OutputFormat};

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let wire = resolve_input(&args)?;

    let mut parser = Parser::new(0);
    let mut messages = Vec::new();
    parser.push(&wire, |msg| messages.push(msg));

    let stats = parser.stats();
    debug!(?stats, "decode finished");
    if parser.buffered() > 0 {
        warn!(bytes = parser.buffered(), "input ends inside a frame");
    }

    if messages.is_empty() {
        return Err(CliError::new(
            DATA_INVALID,
            format!(
                "no complete messages in {} input bytes ({} corrupt, {} truncated, {} oversized, {} overlong frames)",
                wire.len(),
                stats.decode_errors + stats.overflows,
                stats.truncated,
                stats.oversized,
                stats.length_mismatch
            ),
        ));
    }

    print_messages(&messages, format);
    Ok(SUCCESS)
}

fn resolve_input(args: &DecodeArgs) -> CliResult<Vec<u8>> {
    if let Some(hex) = &args.hex {
        return parse_hex(hex);
    }
    if let Some(path) = &args.file {
        return std::fs::read(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err));
    }
    Err(CliError::new(USAGE, "provide wire bytes as hex or with --file"))
}
