use comlink_frame::{CONTROL, ERROR, WRITE_TO};
use comlink_port::{parse_error, write_request};
use serde::Serialize;

use crate::cmd::{link, parse_duration, parse_hex, WriteArgs};
use crate::exit::{port_error, CliError, CliResult, COMMAND_REJECTED, SUCCESS};
use crate::output::OutputFormat;

#[derive(Serialize)]
struct WriteOutput {
    address: u32,
    len: usize,
    status: &'static str,
}

pub fn run(args: WriteArgs, format: OutputFormat) -> CliResult<i32> {
    let settle = parse_duration(&args.settle)?;
    let data = parse_hex(&args.data)?;
    let request = write_request(0, args.address, &data)
        .map_err(|err| port_error("invalid request", err))?;

    let mut port = link::open(&args.link)?;
    link::send(&mut port, &request, settle)?;

    // WRITE_TO is silent on success; only a rejection produces a reply.
    let rejection = link::wait_for(&mut port, settle, |m| {
        m.interface() == CONTROL
            && m.id() == ERROR
            && parse_error(&m.payload).is_some_and(|(id, _)| id == WRITE_TO)
    })?;
    if let Some((_, fault)) = rejection.as_ref().and_then(|m| parse_error(&m.payload)) {
        return Err(CliError::new(
            COMMAND_REJECTED,
            format!("target rejected WRITE_TO: {fault}"),
        ));
    }

    match format {
        OutputFormat::Json => {
            let out = WriteOutput {
                address: args.address,
                len: data.len(),
                status: "ok",
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Raw => {}
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("wrote {} bytes at 0x{:08x}", data.len(), args.address);
        }
    }
    Ok(SUCCESS)
}
