//! System-wide constants and hardware-specific values.

pub mod boot;
pub mod gdt;
pub mod idt;
pub mod memory;
pub mod pic;
pub mod ports;
