use comlink_transport::serial;
use tracing::debug;

use crate::exit::{transport_error, CliResult, SUCCESS};
use crate::output::{print_devices, OutputFormat};

pub fn run(format: OutputFormat) -> CliResult<i32> {
    let devices = serial::available_ports()
        .map_err(|err| transport_error("serial port enumeration failed", err))?;
    if devices.is_empty() {
        debug!("no serial devices found");
    }
    print_devices(&devices, format);
    Ok(SUCCESS)
}
