use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use comlink_frame::Message;

use crate::cmd::{link, ListenArgs};
use crate::exit::{port_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_message, OutputFormat};

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let mut port = link::open(&args.link)?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut printed = 0usize;
    let mut inbox: Vec<Message> = Vec::new();

    while running.load(Ordering::SeqCst) {
        port.receive(|msg| inbox.push(msg))
            .map_err(|err| port_error("receive failed", err))?;

        for msg in inbox.drain(..) {
            if let Some(interfaces) = &args.interfaces {
                if !interfaces.contains(&msg.interface()) {
                    continue;
                }
            }

            print_message(&msg, format);
            printed = printed.saturating_add(1);

            if let Some(count) = args.count {
                if printed >= count {
                    return Ok(SUCCESS);
                }
            }
        }
    }

    Ok(SUCCESS)
}

pub(crate) fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
