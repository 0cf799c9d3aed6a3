use bytes::BytesMut;
use comlink_frame::encode_frame;

use crate::cmd::{resolve_payload, EncodeArgs};
use crate::exit::{frame_error, CliResult, SUCCESS};
use crate::output::{print_wire, OutputFormat};

pub fn run(args: EncodeArgs, format: OutputFormat) -> CliResult<i32> {
    let data = resolve_payload(&args.payload)?;
    let mut wire = BytesMut::new();
    encode_frame(args.interface, args.id, &data, &mut wire)
        .map_err(|err| frame_error("encode failed", err))?;

    print_wire(args.interface, args.id, data.len(), &wire, format);
    Ok(SUCCESS)
}
