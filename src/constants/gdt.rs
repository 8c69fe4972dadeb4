//! Global Descriptor Table layout.

/// Null + kernel code + kernel data.
pub const GDT_ENTRIES: usize = 3;

pub const KERNEL_CODE_INDEX: u16 = 1;
pub const KERNEL_DATA_INDEX: u16 = 2;

/// Present, ring 0, code, execute/read.
pub const KERNEL_CODE_ACCESS: u8 = 0x9A;
/// Present, ring 0, data, read/write.
pub const KERNEL_DATA_ACCESS: u8 = 0x92;

/// Upper nibble of the granularity byte: 4 KiB granularity, 32-bit operand size.
pub const FLAT_GRANULARITY: u8 = 0xC0;

/// Limit in 4 KiB units; with page granularity this spans the full 4 GiB.
pub const FLAT_LIMIT: u32 = 0xF_FFFF;
