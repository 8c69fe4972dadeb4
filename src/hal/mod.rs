//! Hardware access seams.
//!
//! Everything privileged the bring-up code does goes through [`PortIo`] or
//! [`Cpu`]. On the real machine these are backed by [`x86`] and issue the raw
//! instructions; in tests they are backed by [`mock`] so the same bring-up and
//! dispatch code can be exercised on a host.

use x86_64::structures::gdt::SegmentSelector;

#[cfg(target_arch = "x86")]
pub mod x86;

#[cfg(test)]
pub mod mock;

/// Byte-wide access to the legacy I/O port space.
pub trait PortIo {
    fn inb(&mut self, port: u16) -> u8;

    fn outb(&mut self, port: u16, value: u8);

    /// Gives slow ISA devices time to settle between consecutive writes.
    fn io_wait(&mut self) {
        self.outb(crate::constants::ports::IO_WAIT_PORT, 0);
    }
}

/// The `(limit, base)` pair loaded into GDTR or IDTR.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C, packed(2))]
pub struct DescriptorTablePointer {
    /// Size of the table in bytes, minus one.
    pub limit: u16,
    /// Linear address of the first entry.
    pub base: u32,
}

const _: () = assert!(core::mem::size_of::<DescriptorTablePointer>() == 6);

impl DescriptorTablePointer {
    /// Describes a table occupying exactly `value`.
    pub fn of<T>(value: &T) -> Self {
        Self {
            limit: (core::mem::size_of::<T>() - 1) as u16,
            base: physical_address(value),
        }
    }
}

/// Control-register, descriptor-register and interrupt-flag operations.
pub trait Cpu {
    /// Loads GDTR.
    ///
    /// # Safety
    /// `pointer` must describe a valid table that outlives its use by the CPU.
    unsafe fn load_gdt(&mut self, pointer: &DescriptorTablePointer);

    fn read_gdtr(&self) -> DescriptorTablePointer;

    /// Reloads the data segment registers and, through a far return, `cs`.
    ///
    /// # Safety
    /// Both selectors must index valid descriptors in the loaded GDT.
    unsafe fn reload_segments(&mut self, code: SegmentSelector, data: SegmentSelector);

    /// Loads IDTR.
    ///
    /// # Safety
    /// `pointer` must describe a valid table that outlives its use by the CPU.
    unsafe fn load_idt(&mut self, pointer: &DescriptorTablePointer);

    fn read_idtr(&self) -> DescriptorTablePointer;

    /// Installs the root of the translation structures.
    ///
    /// # Safety
    /// `directory` must be the physical address of a valid page directory.
    unsafe fn write_cr3(&mut self, directory: u32);

    fn read_cr3(&self) -> u32;

    /// Sets CR0.PG.
    ///
    /// # Safety
    /// CR3 must already hold a directory that maps the executing code.
    unsafe fn enable_paging(&mut self);

    fn paging_enabled(&self) -> bool;

    /// Linear address that caused the most recent page fault.
    fn read_cr2(&self) -> u32;

    fn enable_interrupts(&mut self);

    fn disable_interrupts(&mut self);

    fn interrupts_enabled(&self) -> bool;
}

/// Runs `f` with interrupts disabled, restoring the previous state afterwards.
pub fn without_interrupts<C, F, R>(cpu: &mut C, f: F) -> R
where
    C: Cpu,
    F: FnOnce() -> R,
{
    let was_enabled = cpu.interrupts_enabled();
    if was_enabled {
        cpu.disable_interrupts();
    }

    let result = f();

    if was_enabled {
        cpu.enable_interrupts();
    }

    result
}

/// Address of `value` as the CPU sees it.
///
/// Valid as a physical address because everything the kernel hands to the CPU
/// lives inside the identity-mapped window.
pub fn physical_address<T>(value: &T) -> u32 {
    value as *const T as usize as u32
}

#[cfg(test)]
mod tests {
    use super::mock::{CpuOp, MockCpu};
    use super::*;

    #[test]
    fn without_interrupts_restores_prior_state() {
        let mut cpu = MockCpu::new();
        cpu.enable_interrupts();
        cpu.ops.clear();

        let seen = without_interrupts(&mut cpu, || 7);
        assert_eq!(seen, 7);
        assert!(cpu.interrupts_enabled());
        assert_eq!(cpu.ops, [CpuOp::DisableInterrupts, CpuOp::EnableInterrupts]);

        cpu.disable_interrupts();
        cpu.ops.clear();
        without_interrupts(&mut cpu, || ());
        assert!(!cpu.interrupts_enabled());
        assert!(cpu.ops.is_empty());
    }

    #[test]
    fn table_pointer_describes_the_whole_value() {
        let table = [0u64; 4];
        let pointer = DescriptorTablePointer::of(&table);
        let limit = pointer.limit;
        let base = pointer.base;
        assert_eq!(limit, 31);
        assert_eq!(base, physical_address(&table));
    }
}
