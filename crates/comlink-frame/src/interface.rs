//! Interface and message ids.
//!
//! A header carries a 4-bit interface id (16 logical channels per port) and
//! a 4-bit message id. Interface 0 is the built-in control interface.

/// Number of bits holding the interface id.
pub const INTERFACE_BITS: u8 = 4;

/// Number of bits holding the message id.
pub const ID_BITS: u8 = 8 - INTERFACE_BITS;

/// Number of addressable interfaces.
pub const NUM_INTERFACES: usize = 1 << INTERFACE_BITS;

/// Number of message ids per interface.
pub const NUM_IDS: usize = 1 << ID_BITS;

/// Built-in control interface (memory access commands).
pub const CONTROL: u8 = 0;

/// Control id: fault report.
pub const ERROR: u8 = 0;

/// Control id: write a memory range.
pub const WRITE_TO: u8 = 1;

/// Control id: read a memory range.
pub const READ_FROM: u8 = 2;

/// Returns a human-readable name for a control message id.
pub fn control_id_name(id: u8) -> &'static str {
    match id {
        ERROR => "ERROR",
        WRITE_TO => "WRITE_TO",
        READ_FROM => "READ_FROM",
        _ => "UNKNOWN",
    }
}

/// Returns a human-readable name for an interface id.
pub fn interface_name(interface: u8) -> &'static str {
    match interface {
        CONTROL => "CONTROL",
        1..=15 => "USER",
        _ => "INVALID",
    }
}

/// Returns true if the interface id fits the header field.
pub fn is_valid_interface(interface: u8) -> bool {
    usize::from(interface) < NUM_INTERFACES
}

/// Returns true if the message id fits the header field.
pub fn is_valid_id(id: u8) -> bool {
    usize::from(id) < NUM_IDS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_widths() {
        assert_eq!(NUM_INTERFACES, 16);
        assert_eq!(NUM_IDS, 16);
        assert!(is_valid_interface(15));
        assert!(!is_valid_interface(16));
        assert!(!is_valid_id(200));
    }

    #[test]
    fn names() {
        assert_eq!(interface_name(CONTROL), "CONTROL");
        assert_eq!(interface_name(7), "USER");
        assert_eq!(control_id_name(READ_FROM), "READ_FROM");
        assert_eq!(control_id_name(9), "UNKNOWN");
    }
}
