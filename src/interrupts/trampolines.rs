//! Per-vector interrupt entry stubs.
//!
//! Each stub normalizes the stack so every vector looks the same: vectors
//! without a hardware error code push a zero placeholder, then every stub pushes
//! its vector number and jumps to the common path. The common path saves the
//! general-purpose registers and `ds`, switches to the kernel data segment and
//! calls `isr_dispatch` with a pointer to the resulting
//! [`InterruptFrame`](super::frame::InterruptFrame).

use core::arch::global_asm;

use super::{gdt::KERNEL_DATA_SELECTOR, idt::TrampolineTable};

global_asm!(
    r#"
.pushsection .text

.macro ISR_NOERR vec
isr_stub_\vec:
    push 0
    push \vec
    jmp isr_common
.endm

.macro ISR_ERR vec
isr_stub_\vec:
    push \vec
    jmp isr_common
.endm

.irp vec, 0, 1, 2, 3, 4, 5, 6, 7, 9, 15, 16, 18, 19, 20, 22, 23, 24, 25, 26, 27, 28, 31
    ISR_NOERR \vec
.endr

.irp vec, 8, 10, 11, 12, 13, 14, 17, 21, 29, 30
    ISR_ERR \vec
.endr

.irp vec, 32, 33, 34, 35, 36, 37, 38, 39, 40, 41, 42, 43, 44, 45, 46, 47
    ISR_NOERR \vec
.endr

isr_common:
    pushad
    xor eax, eax
    mov ax, ds
    push eax

    mov ax, {data_selector}
    mov ds, ax
    mov es, ax
    mov fs, ax
    mov gs, ax

    push esp
    cld
    call isr_dispatch
    add esp, 4

    pop eax
    mov ds, ax
    mov es, ax
    mov fs, ax
    mov gs, ax

    popad
    add esp, 8
    iretd

.popsection

.pushsection .rodata
.p2align 2
.global isr_stub_table
isr_stub_table:
.irp vec, 0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23, 24, 25, 26, 27, 28, 29, 30, 31, 32, 33, 34, 35, 36, 37, 38, 39, 40, 41, 42, 43, 44, 45, 46, 47
    .long isr_stub_\vec
.endr
.popsection
"#,
    data_selector = const KERNEL_DATA_SELECTOR.0,
);

extern "C" {
    static isr_stub_table: TrampolineTable;
}

/// Entry point of every stub, indexed by vector.
pub fn trampolines() -> &'static TrampolineTable {
    unsafe { &*core::ptr::addr_of!(isr_stub_table) }
}
