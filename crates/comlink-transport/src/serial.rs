//! Serial devices (UART, USB CDC) via the `serialport` crate.

use std::path::PathBuf;
use std::time::Duration;

use serialport::{SerialPort, SerialPortInfo, SerialPortType};
use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::StreamTransport;

/// Baud rate used when none is configured.
pub const DEFAULT_BAUD_RATE: u32 = 230_400;

/// Read timeout applied to opened devices. Kept short so a poll tick with
/// nothing on the line returns promptly.
pub const POLL_TIMEOUT: Duration = Duration::from_millis(1);

/// A serial device adapted to the [`crate::Transport`] contract.
pub type SerialTransport = StreamTransport<Box<dyn SerialPort>>;

/// Open a serial device in 8N1 raw mode.
pub fn open(path: &str, baud_rate: u32) -> Result<SerialTransport> {
    debug!(path, baud_rate, "opening serial device");
    let port = serialport::new(path, baud_rate)
        .data_bits(serialport::DataBits::Eight)
        .parity(serialport::Parity::None)
        .stop_bits(serialport::StopBits::One)
        .flow_control(serialport::FlowControl::None)
        .timeout(POLL_TIMEOUT)
        .open()
        .map_err(|err| TransportError::Open {
            path: PathBuf::from(path),
            source: err.into(),
        })?;

    port.clear(serialport::ClearBuffer::All)
        .map_err(|err| TransportError::Io(err.into()))?;

    info!(path, baud_rate, "serial device opened");
    Ok(StreamTransport::new(port))
}

/// Bus a serial device hangs off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    Usb,
    Pci,
    Bluetooth,
    Unknown,
}

impl DeviceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DeviceKind::Usb => "usb",
            DeviceKind::Pci => "pci",
            DeviceKind::Bluetooth => "bluetooth",
            DeviceKind::Unknown => "unknown",
        }
    }
}

/// A serial device the host can open with [`open`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub path: String,
    pub kind: DeviceKind,
    /// USB vendor and product id, for USB devices.
    pub usb_id: Option<(u16, u16)>,
    pub serial_number: Option<String>,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
}

impl From<SerialPortInfo> for DeviceInfo {
    fn from(info: SerialPortInfo) -> Self {
        let mut device = DeviceInfo {
            path: info.port_name,
            kind: DeviceKind::Unknown,
            usb_id: None,
            serial_number: None,
            manufacturer: None,
            product: None,
        };
        match info.port_type {
            SerialPortType::UsbPort(usb) => {
                device.kind = DeviceKind::Usb;
                device.usb_id = Some((usb.vid, usb.pid));
                device.serial_number = usb.serial_number;
                device.manufacturer = usb.manufacturer;
                device.product = usb.product;
            }
            SerialPortType::PciPort => device.kind = DeviceKind::Pci,
            SerialPortType::BluetoothPort => device.kind = DeviceKind::Bluetooth,
            SerialPortType::Unknown => {}
        }
        device
    }
}

/// List the serial devices currently visible to the host, sorted by path.
pub fn available_ports() -> Result<Vec<DeviceInfo>> {
    let mut devices: Vec<DeviceInfo> = serialport::available_ports()
        .map_err(|err| TransportError::Io(err.into()))?
        .into_iter()
        .map(DeviceInfo::from)
        .collect();
    devices.sort_by(|a, b| a.path.cmp(&b.path));
    debug!(count = devices.len(), "enumerated serial devices");
    Ok(devices)
}
