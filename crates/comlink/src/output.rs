use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use comlink_frame::interface::{control_id_name, interface_name};
use comlink_frame::{Message, CONTROL};
use comlink_transport::serial::DeviceInfo;
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct MessageOutput<'a> {
    port: u8,
    interface: u8,
    interface_name: &'a str,
    id: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    id_name: Option<&'a str>,
    size: usize,
    payload_hex: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    payload_text: Option<String>,
    timestamp: String,
}

pub fn print_message(msg: &Message, format: OutputFormat) {
    print_messages(std::slice::from_ref(msg), format);
}

/// Print several messages; table output groups them into one table.
pub fn print_messages(messages: &[Message], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            for msg in messages {
                let out = MessageOutput {
                    port: msg.port,
                    interface: msg.interface(),
                    interface_name: interface_name(msg.interface()),
                    id: msg.id(),
                    id_name: id_name(msg),
                    size: msg.payload.len(),
                    payload_hex: to_hex(&msg.payload),
                    payload_text: text_preview(&msg.payload),
                    timestamp: now_unix_seconds(),
                };
                println!(
                    "{}",
                    serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
                );
            }
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["PORT", "INTERFACE", "ID", "SIZE", "PAYLOAD"]);
            for msg in messages {
                table.add_row(vec![
                    msg.port.to_string(),
                    format!("{} ({})", msg.interface(), interface_name(msg.interface())),
                    match id_name(msg) {
                        Some(name) => format!("{} ({name})", msg.id()),
                        None => msg.id().to_string(),
                    },
                    msg.payload.len().to_string(),
                    payload_preview(&msg.payload),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for msg in messages {
                println!(
                    "port={} interface={} ({}) id={} size={} payload={}",
                    msg.port,
                    msg.interface(),
                    interface_name(msg.interface()),
                    msg.id(),
                    msg.payload.len(),
                    payload_preview(&msg.payload)
                );
            }
        }
        OutputFormat::Raw => {
            for msg in messages {
                print_raw(&msg.payload);
            }
        }
    }
}

#[derive(Serialize)]
struct WireOutput<'a> {
    interface: u8,
    id: u8,
    size: usize,
    frame_len: usize,
    frame_hex: &'a str,
}

/// Print an encoded frame.
pub fn print_wire(interface: u8, id: u8, size: usize, wire: &[u8], format: OutputFormat) {
    let hex = to_hex(wire);
    match format {
        OutputFormat::Json => {
            let out = WireOutput {
                interface,
                id,
                size,
                frame_len: wire.len(),
                frame_hex: &hex,
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["INTERFACE", "ID", "SIZE", "FRAME"])
                .add_row(vec![
                    interface.to_string(),
                    id.to_string(),
                    size.to_string(),
                    hex,
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => println!("{hex}"),
        OutputFormat::Raw => print_raw(wire),
    }
}

#[derive(Serialize)]
struct DeviceOutput<'a> {
    path: &'a str,
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    usb_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    serial_number: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    manufacturer: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    product: Option<&'a str>,
}

/// Print the serial devices found on the host. Raw output is one path per
/// line.
pub fn print_devices(devices: &[DeviceInfo], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            for device in devices {
                let out = DeviceOutput {
                    path: &device.path,
                    kind: device.kind.as_str(),
                    usb_id: device.usb_id.map(usb_id),
                    serial_number: device.serial_number.as_deref(),
                    manufacturer: device.manufacturer.as_deref(),
                    product: device.product.as_deref(),
                };
                println!(
                    "{}",
                    serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
                );
            }
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["DEVICE", "KIND", "USB ID", "DESCRIPTION"]);
            for device in devices {
                table.add_row(vec![
                    device.path.clone(),
                    device.kind.as_str().to_string(),
                    device.usb_id.map(usb_id).unwrap_or_default(),
                    describe(device),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for device in devices {
                match device.usb_id {
                    Some(id) => println!(
                        "{} {} {} {}",
                        device.path,
                        device.kind.as_str(),
                        usb_id(id),
                        describe(device)
                    ),
                    None => println!("{} {}", device.path, device.kind.as_str()),
                }
            }
        }
        OutputFormat::Raw => {
            for device in devices {
                println!("{}", device.path);
            }
        }
    }
}

fn usb_id((vid, pid): (u16, u16)) -> String {
    format!("{vid:04x}:{pid:04x}")
}

fn describe(device: &DeviceInfo) -> String {
    [device.manufacturer.as_deref(), device.product.as_deref()]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

pub fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn id_name(msg: &Message) -> Option<&'static str> {
    (msg.interface() == CONTROL).then(|| control_id_name(msg.id()))
}

fn text_preview(payload: &[u8]) -> Option<String> {
    std::str::from_utf8(payload)
        .ok()
        .filter(|text| !text.is_empty() && !text.chars().any(char::is_control))
        .map(str::to_string)
}

fn payload_preview(payload: &[u8]) -> String {
    text_preview(payload).unwrap_or_else(|| to_hex(payload))
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
