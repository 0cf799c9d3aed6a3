use comlink_frame::{Message, CONTROL, ERROR};
use comlink_port::parse_error;
use tracing::warn;

use crate::cmd::{link, parse_duration, resolve_payload, SendArgs};
use crate::exit::{frame_error, CliError, CliResult, SUCCESS, TIMEOUT};
use crate::output::{print_message, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let payload = resolve_payload(&args.payload)?;
    let msg = Message::new(0, args.interface, args.id, payload)
        .map_err(|err| frame_error("invalid message", err))?;

    let mut port = link::open(&args.link)?;
    link::send(&mut port, &msg, timeout)?;

    if args.wait {
        let interface = args.interface;
        let reply = link::wait_for(&mut port, timeout, |m| is_response(m, interface))?
            .ok_or_else(|| CliError::new(TIMEOUT, format!("no reply within {timeout:?}")))?;

        if reply.interface() == CONTROL && reply.id() == ERROR && interface != CONTROL {
            if let Some((id, fault)) = parse_error(&reply.payload) {
                warn!(id, %fault, "target reported an error");
            }
        }
        print_message(&reply, format);
    }

    Ok(SUCCESS)
}

/// A reply on the request's interface, or a control ERROR.
fn is_response(msg: &Message, interface: u8) -> bool {
    msg.interface() == interface || (msg.interface() == CONTROL && msg.id() == ERROR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_errors_count_as_responses() {
        let error = Message::new(0, CONTROL, ERROR, vec![1u8, 4]).unwrap();
        let other = Message::new(0, 6, 0, Vec::new()).unwrap();
        let same = Message::new(0, 3, 2, Vec::new()).unwrap();

        assert!(is_response(&error, 3));
        assert!(!is_response(&other, 3));
        assert!(is_response(&same, 3));
    }
}
