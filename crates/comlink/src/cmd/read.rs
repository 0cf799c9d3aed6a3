use comlink_frame::{Message, CONTROL, ERROR, READ_FROM};
use comlink_port::{parse_error, read_request};
use tracing::warn;

use crate::cmd::{link, parse_duration, ReadArgs};
use crate::exit::{port_error, CliError, CliResult, COMMAND_REJECTED, DATA_INVALID, SUCCESS, TIMEOUT};
use crate::output::{print_message, OutputFormat};

pub fn run(args: ReadArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let request = read_request(0, args.address, args.len)
        .map_err(|err| port_error("invalid request", err))?;

    let mut port = link::open(&args.link)?;
    link::send(&mut port, &request, timeout)?;

    let reply = link::wait_for(&mut port, timeout, is_read_reply)?.ok_or_else(|| {
        CliError::new(TIMEOUT, format!("no READ_FROM reply within {timeout:?}"))
    })?;
    check_reply(&reply, args.len)?;

    print_message(&reply, format);
    Ok(SUCCESS)
}

fn is_read_reply(msg: &Message) -> bool {
    msg.interface() == CONTROL && matches!(msg.id(), READ_FROM | ERROR)
}

fn check_reply(reply: &Message, len: u16) -> CliResult<()> {
    if reply.id() == ERROR {
        return Err(match parse_error(&reply.payload) {
            Some((_, fault)) => {
                CliError::new(COMMAND_REJECTED, format!("target rejected READ_FROM: {fault}"))
            }
            None => CliError::new(DATA_INVALID, "target sent an unreadable ERROR reply"),
        });
    }
    if reply.payload.len() != usize::from(len) {
        warn!(
            requested = len,
            received = reply.payload.len(),
            "READ_FROM reply length differs from request"
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use comlink_port::{error_reply, CommandFault};

    use super::*;

    #[test]
    fn error_reply_becomes_rejection() {
        let request = read_request(0, 0x1000, 4).unwrap();
        let reply = error_reply(&request, CommandFault::AccessDenied).unwrap();

        assert!(is_read_reply(&reply));
        let err = check_reply(&reply, 4).unwrap_err();
        assert_eq!(err.code, COMMAND_REJECTED);
        assert!(err.message.contains("access denied"));
    }

    #[test]
    fn data_reply_is_accepted() {
        let reply = Message::new(0, CONTROL, READ_FROM, vec![1u8, 2, 3, 4]).unwrap();
        assert!(check_reply(&reply, 4).is_ok());

        let write = Message::new(0, CONTROL, 1, Vec::new()).unwrap();
        assert!(!is_read_reply(&write));
    }
}
