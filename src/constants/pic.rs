//! 8259 programmable interrupt controller configuration.

pub const PIC_1_COMMAND: u16 = 0x20;
pub const PIC_1_DATA: u16 = 0x21;
pub const PIC_2_COMMAND: u16 = 0xA0;
pub const PIC_2_DATA: u16 = 0xA1;

/// Master lines land on the first vector after the exception range.
pub const PIC_1_OFFSET: u8 = 32;
pub const PIC_2_OFFSET: u8 = PIC_1_OFFSET + 8;

pub const CMD_END_OF_INTERRUPT: u8 = 0x20;

pub const ICW1_ICW4: u8 = 0x01;
pub const ICW1_INIT: u8 = 0x10;
pub const ICW4_8086: u8 = 0x01;

/// ICW3 for the master: the slave hangs off line 2.
pub const CASCADE_LINE_MASK: u8 = 1 << 2;
/// ICW3 for the slave: its cascade identity.
pub const CASCADE_IDENTITY: u8 = 2;

pub const LINES_PER_CHIP: u8 = 8;
pub const TOTAL_LINES: u8 = 16;
