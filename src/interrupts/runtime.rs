//! Interrupt state of the running kernel.

use spin::Mutex;

use crate::{
    constants::pic::{PIC_1_OFFSET, PIC_2_OFFSET},
    hal::{
        self,
        x86::{halt_forever, RawPorts, X86Cpu},
        Cpu,
    },
    interrupts::{
        dispatch::{dispatch_shared, Dispatcher, Disposition, InterruptHandler},
        frame::InterruptFrame,
        pic::ChainedPics,
    },
};

static DISPATCHER: Mutex<Dispatcher<RawPorts>> = Mutex::new(Dispatcher::new(ChainedPics::new(
    unsafe { RawPorts::new() },
    PIC_1_OFFSET,
    PIC_2_OFFSET,
)));

fn cpu() -> X86Cpu {
    unsafe { X86Cpu::new() }
}

/// Installs `handler` for `vector`, replacing any previous one.
///
/// Interrupts are held off for the duration so delivery never observes a
/// half-written slot. Handlers may call this too.
pub fn register_interrupt_handler(vector: u8, handler: InterruptHandler) {
    without_interrupts(|| DISPATCHER.lock().register(vector, handler));
}

pub fn unregister_interrupt_handler(vector: u8) {
    without_interrupts(|| DISPATCHER.lock().unregister(vector));
}

/// Runs `f` against the interrupt controller pair with interrupts held off.
pub fn with_pics<F, R>(f: F) -> R
where
    F: FnOnce(&mut ChainedPics<RawPorts>) -> R,
{
    without_interrupts(|| f(DISPATCHER.lock().pics_mut()))
}

/// Enables interrupts on the current CPU.
pub fn enable() {
    cpu().enable_interrupts();
}

/// Disables interrupts on the current CPU.
pub fn disable() {
    cpu().disable_interrupts();
}

pub fn are_enabled() -> bool {
    cpu().interrupts_enabled()
}

/// Executes a closure with interrupts disabled, restoring the previous state after.
pub fn without_interrupts<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    hal::without_interrupts(&mut cpu(), f)
}

/// Called by the common trampoline with the frame it built on the stack.
#[no_mangle]
extern "C" fn isr_dispatch(frame: *mut InterruptFrame) {
    let frame = unsafe { &mut *frame };

    if let Disposition::Halt(_) = dispatch_shared(&DISPATCHER, frame, &cpu()) {
        halt_forever();
    }
}
