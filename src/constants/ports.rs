//! I/O port definitions.

/// Base I/O port address for the first serial port (COM1).
pub const SERIAL_PORT: u16 = 0x3F8;

/// Unused POST diagnostic port; writing to it gives the bus a few cycles.
pub const IO_WAIT_PORT: u16 = 0x80;
