//! Flat-model Global Descriptor Table.
//!
//! A null descriptor followed by one ring 0 code and one ring 0 data segment,
//! both with base 0 and a page-granular limit spanning the whole 4 GiB space.

use x86_64::structures::gdt::SegmentSelector;
use x86_64::PrivilegeLevel;

use crate::{
    constants::gdt::{
        FLAT_GRANULARITY, FLAT_LIMIT, GDT_ENTRIES, KERNEL_CODE_ACCESS, KERNEL_CODE_INDEX,
        KERNEL_DATA_ACCESS, KERNEL_DATA_INDEX,
    },
    hal::{Cpu, DescriptorTablePointer},
};

/// Selector for the kernel code segment (0x08).
pub const KERNEL_CODE_SELECTOR: SegmentSelector =
    SegmentSelector::new(KERNEL_CODE_INDEX, PrivilegeLevel::Ring0);

/// Selector for the kernel data segment (0x10).
pub const KERNEL_DATA_SELECTOR: SegmentSelector =
    SegmentSelector::new(KERNEL_DATA_INDEX, PrivilegeLevel::Ring0);

/// One 8-byte segment descriptor in the layout the CPU reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(C)]
pub struct SegmentDescriptor {
    limit_low: u16,
    base_low: u16,
    base_middle: u8,
    access: u8,
    /// High nibble: flags. Low nibble: limit bits 16..20.
    granularity: u8,
    base_high: u8,
}

const _: () = assert!(core::mem::size_of::<SegmentDescriptor>() == 8);

impl SegmentDescriptor {
    pub const NULL: Self = Self {
        limit_low: 0,
        base_low: 0,
        base_middle: 0,
        access: 0,
        granularity: 0,
        base_high: 0,
    };

    /// Packs `base`, the low 20 bits of `limit`, the `access` byte and the
    /// high nibble of `flags` into descriptor form.
    pub const fn new(base: u32, limit: u32, access: u8, flags: u8) -> Self {
        Self {
            limit_low: (limit & 0xFFFF) as u16,
            base_low: (base & 0xFFFF) as u16,
            base_middle: ((base >> 16) & 0xFF) as u8,
            access,
            granularity: ((limit >> 16) & 0x0F) as u8 | (flags & 0xF0),
            base_high: ((base >> 24) & 0xFF) as u8,
        }
    }

    pub fn base(&self) -> u32 {
        u32::from(self.base_low)
            | u32::from(self.base_middle) << 16
            | u32::from(self.base_high) << 24
    }

    pub fn limit(&self) -> u32 {
        u32::from(self.limit_low) | u32::from(self.granularity & 0x0F) << 16
    }

    pub fn access(&self) -> u8 {
        self.access
    }

    pub fn flags(&self) -> u8 {
        self.granularity & 0xF0
    }

    pub fn is_present(&self) -> bool {
        self.access & 0x80 != 0
    }

    /// Descriptor privilege level encoded in the access byte.
    pub fn privilege_level(&self) -> PrivilegeLevel {
        PrivilegeLevel::from_u16(u16::from((self.access >> 5) & 0b11))
    }
}

/// Rejected attempt to write past the end of the descriptor table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorIndexOutOfRange {
    pub index: usize,
}

impl core::fmt::Display for DescriptorIndexOutOfRange {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "descriptor index {} out of range (table holds {})",
            self.index, GDT_ENTRIES
        )
    }
}

#[derive(Debug, Clone)]
#[repr(C, align(8))]
pub struct GlobalDescriptorTable {
    entries: [SegmentDescriptor; GDT_ENTRIES],
}

impl Default for GlobalDescriptorTable {
    fn default() -> Self {
        Self::new()
    }
}

impl GlobalDescriptorTable {
    /// A table of null descriptors.
    pub const fn new() -> Self {
        Self {
            entries: [SegmentDescriptor::NULL; GDT_ENTRIES],
        }
    }

    /// Encodes one descriptor. Out-of-range indices leave the table untouched.
    pub fn set_entry(
        &mut self,
        index: usize,
        base: u32,
        limit: u32,
        access: u8,
        flags: u8,
    ) -> Result<(), DescriptorIndexOutOfRange> {
        let entry = self
            .entries
            .get_mut(index)
            .ok_or(DescriptorIndexOutOfRange { index })?;
        *entry = SegmentDescriptor::new(base, limit, access, flags);
        Ok(())
    }

    pub fn entry(&self, index: usize) -> Option<&SegmentDescriptor> {
        self.entries.get(index)
    }

    pub fn entries(&self) -> &[SegmentDescriptor] {
        &self.entries
    }

    /// Fills the table with the flat model: null, kernel code, kernel data.
    pub fn populate_flat(&mut self) -> Result<(), DescriptorIndexOutOfRange> {
        self.entries = [SegmentDescriptor::NULL; GDT_ENTRIES];
        self.set_entry(0, 0, 0, 0, 0)?;
        self.set_entry(
            usize::from(KERNEL_CODE_INDEX),
            0,
            FLAT_LIMIT,
            KERNEL_CODE_ACCESS,
            FLAT_GRANULARITY,
        )?;
        self.set_entry(
            usize::from(KERNEL_DATA_INDEX),
            0,
            FLAT_LIMIT,
            KERNEL_DATA_ACCESS,
            FLAT_GRANULARITY,
        )
    }

    pub fn pointer(&self) -> DescriptorTablePointer {
        DescriptorTablePointer::of(&self.entries)
    }

    /// Loads GDTR with this table and switches every segment register over.
    ///
    /// # Safety
    /// The table must stay at its current address for as long as the CPU uses
    /// it, and must already hold the descriptors the selectors refer to.
    pub unsafe fn load(&self, cpu: &mut impl Cpu) {
        cpu.load_gdt(&self.pointer());
        cpu.reload_segments(KERNEL_CODE_SELECTOR, KERNEL_DATA_SELECTOR);
    }
}

/// Builds the flat table in `gdt` and makes it live.
///
/// # Safety
/// See [`GlobalDescriptorTable::load`].
pub unsafe fn init(gdt: &mut GlobalDescriptorTable, cpu: &mut impl Cpu) {
    gdt.populate_flat()
        .expect("flat GDT layout must fit the descriptor table");
    gdt.load(cpu);
    log::debug!(
        "GDT loaded: {} descriptors, cs={:#x} ds={:#x}",
        GDT_ENTRIES,
        KERNEL_CODE_SELECTOR.0,
        KERNEL_DATA_SELECTOR.0
    );
}
