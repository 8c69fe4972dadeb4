//! Bare-metal backing for the hardware seams on 32-bit x86.

use core::arch::asm;

use x86_64::structures::gdt::SegmentSelector;

use super::{Cpu, DescriptorTablePointer, PortIo};

const CR0_PAGING: u32 = 1 << 31;
const EFLAGS_INTERRUPT: u32 = 1 << 9;

/// Direct `in`/`out` port access.
#[derive(Debug)]
pub struct RawPorts(());

impl RawPorts {
    /// # Safety
    /// Port writes have arbitrary effects on hardware; the caller must own the
    /// devices it talks to through this handle.
    pub const unsafe fn new() -> Self {
        Self(())
    }
}

impl PortIo for RawPorts {
    #[inline]
    fn inb(&mut self, port: u16) -> u8 {
        let value: u8;
        unsafe {
            asm!(
                "in al, dx",
                out("al") value,
                in("dx") port,
                options(nomem, nostack, preserves_flags)
            );
        }
        value
    }

    #[inline]
    fn outb(&mut self, port: u16, value: u8) {
        unsafe {
            asm!(
                "out dx, al",
                in("dx") port,
                in("al") value,
                options(nomem, nostack, preserves_flags)
            );
        }
    }
}

/// The executing processor.
#[derive(Debug)]
pub struct X86Cpu(());

impl X86Cpu {
    /// # Safety
    /// Only the boot path and the interrupt entry may drive the processor state.
    pub const unsafe fn new() -> Self {
        Self(())
    }
}

impl Cpu for X86Cpu {
    unsafe fn load_gdt(&mut self, pointer: &DescriptorTablePointer) {
        asm!("lgdt [{}]", in(reg) pointer, options(readonly, nostack, preserves_flags));
    }

    fn read_gdtr(&self) -> DescriptorTablePointer {
        let mut pointer = DescriptorTablePointer { limit: 0, base: 0 };
        unsafe {
            asm!("sgdt [{}]", in(reg) &mut pointer, options(nostack, preserves_flags));
        }
        pointer
    }

    unsafe fn reload_segments(&mut self, code: SegmentSelector, data: SegmentSelector) {
        asm!(
            "mov ds, {sel:x}",
            "mov es, {sel:x}",
            "mov fs, {sel:x}",
            "mov gs, {sel:x}",
            "mov ss, {sel:x}",
            sel = in(reg) u32::from(data.0),
            options(nostack, preserves_flags)
        );
        // cs cannot be the target of a mov; a far return pops it instead.
        asm!(
            "push {sel}",
            "lea {tmp}, [55f]",
            "push {tmp}",
            "retf",
            "55:",
            sel = in(reg) u32::from(code.0),
            tmp = lateout(reg) _,
            options(preserves_flags)
        );
    }

    unsafe fn load_idt(&mut self, pointer: &DescriptorTablePointer) {
        asm!("lidt [{}]", in(reg) pointer, options(readonly, nostack, preserves_flags));
    }

    fn read_idtr(&self) -> DescriptorTablePointer {
        let mut pointer = DescriptorTablePointer { limit: 0, base: 0 };
        unsafe {
            asm!("sidt [{}]", in(reg) &mut pointer, options(nostack, preserves_flags));
        }
        pointer
    }

    unsafe fn write_cr3(&mut self, directory: u32) {
        asm!("mov cr3, {}", in(reg) directory, options(nostack, preserves_flags));
    }

    fn read_cr3(&self) -> u32 {
        let value: u32;
        unsafe {
            asm!("mov {}, cr3", out(reg) value, options(nomem, nostack, preserves_flags));
        }
        value
    }

    unsafe fn enable_paging(&mut self) {
        asm!(
            "mov {tmp}, cr0",
            "or {tmp}, {pg}",
            "mov cr0, {tmp}",
            tmp = out(reg) _,
            pg = const CR0_PAGING,
            options(nostack, preserves_flags)
        );
    }

    fn paging_enabled(&self) -> bool {
        let value: u32;
        unsafe {
            asm!("mov {}, cr0", out(reg) value, options(nomem, nostack, preserves_flags));
        }
        value & CR0_PAGING != 0
    }

    fn read_cr2(&self) -> u32 {
        let value: u32;
        unsafe {
            asm!("mov {}, cr2", out(reg) value, options(nomem, nostack, preserves_flags));
        }
        value
    }

    fn enable_interrupts(&mut self) {
        unsafe {
            asm!("sti", options(nomem, nostack));
        }
    }

    fn disable_interrupts(&mut self) {
        unsafe {
            asm!("cli", options(nomem, nostack));
        }
    }

    fn interrupts_enabled(&self) -> bool {
        let flags: u32;
        unsafe {
            asm!("pushfd", "pop {}", out(reg) flags, options(nomem, preserves_flags));
        }
        flags & EFLAGS_INTERRUPT != 0
    }
}

/// Stops the processor for good: interrupts off, then `hlt` forever.
pub fn halt_forever() -> ! {
    loop {
        unsafe {
            asm!("cli", "hlt", options(nomem, nostack));
        }
    }
}

/// Sleeps until the next interrupt, forever.
pub fn idle_loop() -> ! {
    loop {
        unsafe {
            asm!("hlt", options(nomem, nostack, preserves_flags));
        }
    }
}
