//! Interrupt Descriptor Table configuration.

pub const IDT_ENTRIES: usize = 256;

/// Vectors 0..32 are reserved by the CPU for exceptions.
pub const EXCEPTION_VECTORS: u8 = 32;

/// Vectors backed by a trampoline: every exception plus the 16 controller lines.
pub const TRAMPOLINE_VECTORS: usize = 48;

/// Present, DPL 0, 32-bit interrupt gate.
pub const INTERRUPT_GATE: u8 = 0x8E;

pub const PAGE_FAULT_VECTOR: u8 = 14;

/// Vector assigned to the timer line (IRQ0) after remapping.
pub const TIMER_VECTOR: u8 = 32;
