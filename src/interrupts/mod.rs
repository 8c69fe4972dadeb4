//! Descriptor tables, the interrupt controller and interrupt delivery.

pub mod dispatch;
pub mod exceptions;
pub mod frame;
pub mod gdt;
pub mod idt;
pub mod pic;
pub mod timer;

#[cfg(all(target_arch = "x86", target_os = "none"))]
mod runtime;
#[cfg(all(target_arch = "x86", target_os = "none"))]
mod trampolines;

#[cfg(all(target_arch = "x86", target_os = "none"))]
pub use runtime::{
    are_enabled, disable, enable, register_interrupt_handler, unregister_interrupt_handler,
    with_pics, without_interrupts,
};
#[cfg(all(target_arch = "x86", target_os = "none"))]
pub use trampolines::trampolines;
