use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use comlink_port::{Access, Hub, MemoryMap, PollReport};
use comlink_transport::serial;
use tracing::{info, warn};

use crate::cmd::listen::install_ctrlc_handler;
use crate::cmd::ServeArgs;
use crate::exit::{port_error, transport_error, CliError, CliResult, SUCCESS, TRANSPORT_ERROR, USAGE};

const IDLE_BACKOFF: Duration = Duration::from_millis(1);

pub fn run(args: ServeArgs) -> CliResult<i32> {
    let mut hub = build_hub(&args)?;
    let transport = serial::open(&args.link.device, args.link.baud)
        .map_err(|err| transport_error("open failed", err))?;
    hub.add_port(transport)
        .map_err(|err| port_error("port setup failed", err))?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    info!(
        device = %args.link.device,
        base = format_args!("0x{:08x}", args.base),
        size = args.size,
        read_only = args.read_only,
        "serving memory commands"
    );

    let mut totals = PollReport::default();
    while running.load(Ordering::SeqCst) {
        let report = hub.poll().map_err(|err| port_error("poll failed", err))?;
        totals.bytes_received += report.bytes_received;
        totals.bytes_sent += report.bytes_sent;
        totals.messages += report.messages;
        totals.rejected += report.rejected;
        if report.failed_ports > 0 {
            return Err(CliError::new(
                TRANSPORT_ERROR,
                format!("link on {} failed, stopping", args.link.device),
            ));
        }
        if report.rejected > 0 {
            warn!(rejected = report.rejected, "messages rejected this tick");
        }
        if report.is_idle() {
            thread::sleep(IDLE_BACKOFF);
        }
    }

    info!(
        messages = totals.messages,
        rejected = totals.rejected,
        bytes_received = totals.bytes_received,
        bytes_sent = totals.bytes_sent,
        "stopped"
    );
    Ok(SUCCESS)
}

fn build_hub(args: &ServeArgs) -> CliResult<Hub> {
    let access = if args.read_only {
        Access::ReadOnly
    } else {
        Access::ReadWrite
    };
    let room = u64::from(u32::MAX) - u64::from(args.base) + 1;
    if args.size as u64 > room {
        return Err(CliError::new(
            USAGE,
            format!(
                "region of {} bytes at 0x{:08x} runs past the 32-bit address space ({room} bytes left)",
                args.size, args.base
            ),
        ));
    }

    let mut memory = MemoryMap::new();
    memory
        .add_region("ram", args.base, vec![0u8; args.size], access)
        .map_err(|err| CliError::new(USAGE, format!("invalid memory region: {err}")))?;

    let mut hub = Hub::with_memory(memory);
    for &interface in args.echo.iter().flatten() {
        if interface == 0 {
            return Err(CliError::new(USAGE, "interface 0 is reserved for memory commands"));
        }
        hub.register_interface(interface, |msg, outbox| {
            let Ok(reply) = msg.reply(msg.id(), msg.payload.clone()) else {
                return;
            };
            if let Err(err) = outbox.put_message(&reply) {
                warn!(%err, "echo reply dropped");
            }
        })
        .map_err(|err| port_error("echo setup failed", err))?;
    }
    Ok(hub)
}
