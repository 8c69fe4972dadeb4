//! Processor bring-up.
//!
//! [`HardwareContext`] owns the tables the CPU reads directly and walks through
//! the privileged steps in the only order that is safe: segments, paging, gate
//! table, controller remap, then the global interrupt enable. Each step checks
//! that its predecessor has run.

use core::fmt;

use crate::{
    hal::{Cpu, PortIo},
    interrupts::{
        gdt::{self, GlobalDescriptorTable},
        idt::{self, InterruptDescriptorTable, TrampolineTable},
        pic::ChainedPics,
    },
    memory::paging::{self, IdentityPaging},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BootStage {
    Reset,
    Segmented,
    Paged,
    VectorsInstalled,
    ControllerRemapped,
    InterruptsEnabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootError {
    /// A step ran while the machine was not in the stage it requires.
    OutOfOrder {
        expected: BootStage,
        found: BootStage,
    },
}

impl fmt::Display for BootError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BootError::OutOfOrder { expected, found } => write!(
                f,
                "bring-up step out of order: requires {:?}, machine is at {:?}",
                expected, found
            ),
        }
    }
}

/// The boot-time processor tables and how far bring-up has got.
///
/// The paging structures come first so the whole context can sit at a page
/// boundary.
#[derive(Clone)]
#[repr(C, align(4096))]
pub struct HardwareContext {
    paging: IdentityPaging,
    gdt: GlobalDescriptorTable,
    idt: InterruptDescriptorTable,
    stage: BootStage,
}

impl Default for HardwareContext {
    fn default() -> Self {
        Self::new()
    }
}

impl HardwareContext {
    pub const fn new() -> Self {
        Self {
            paging: IdentityPaging::new(),
            gdt: GlobalDescriptorTable::new(),
            idt: InterruptDescriptorTable::new(),
            stage: BootStage::Reset,
        }
    }

    pub fn stage(&self) -> BootStage {
        self.stage
    }

    pub fn gdt(&self) -> &GlobalDescriptorTable {
        &self.gdt
    }

    pub fn paging(&self) -> &IdentityPaging {
        &self.paging
    }

    pub fn idt(&self) -> &InterruptDescriptorTable {
        &self.idt
    }

    /// # Safety
    /// `self` must not move for as long as the CPU uses its tables.
    pub unsafe fn init_gdt(&mut self, cpu: &mut impl Cpu) -> Result<(), BootError> {
        self.require(BootStage::Reset)?;
        gdt::init(&mut self.gdt, cpu);
        self.stage = BootStage::Segmented;
        Ok(())
    }

    /// # Safety
    /// As for [`Self::init_gdt`]; additionally the running code, its stack and
    /// `self` must lie inside the identity window.
    pub unsafe fn init_paging(&mut self, cpu: &mut impl Cpu) -> Result<(), BootError> {
        self.require(BootStage::Segmented)?;
        paging::init(&mut self.paging, cpu);
        self.stage = BootStage::Paged;
        Ok(())
    }

    /// # Safety
    /// As for [`Self::init_gdt`]; every entry in `trampolines` must be a valid
    /// interrupt entry point.
    pub unsafe fn init_idt(
        &mut self,
        trampolines: &TrampolineTable,
        cpu: &mut impl Cpu,
    ) -> Result<(), BootError> {
        self.require(BootStage::Paged)?;
        idt::init_idt(&mut self.idt, trampolines, cpu);
        self.stage = BootStage::VectorsInstalled;
        Ok(())
    }

    pub fn init_pic<P: PortIo>(&mut self, pics: &mut ChainedPics<P>) -> Result<(), BootError> {
        self.require(BootStage::VectorsInstalled)?;
        pics.initialize();
        self.stage = BootStage::ControllerRemapped;
        Ok(())
    }

    /// Final step: sets the interrupt flag.
    pub fn enable_interrupts(&mut self, cpu: &mut impl Cpu) -> Result<(), BootError> {
        self.require(BootStage::ControllerRemapped)?;
        cpu.enable_interrupts();
        self.stage = BootStage::InterruptsEnabled;
        log::info!("Interrupts enabled");
        Ok(())
    }

    fn require(&self, expected: BootStage) -> Result<(), BootError> {
        if self.stage == expected {
            Ok(())
        } else {
            Err(BootError::OutOfOrder {
                expected,
                found: self.stage,
            })
        }
    }
}

#[cfg(all(target_arch = "x86", target_os = "none"))]
static CONTEXT: spin::Mutex<HardwareContext> = spin::Mutex::new(HardwareContext::new());

/// Brings the boot processor from the loader's state to taking interrupts,
/// with the tick counter on controller line 0.
#[cfg(all(target_arch = "x86", target_os = "none"))]
pub fn init() {
    use crate::{
        constants::idt::TIMER_VECTOR,
        hal::x86::X86Cpu,
        interrupts::{self, timer},
    };

    let mut cpu = unsafe { X86Cpu::new() };
    let mut context = CONTEXT.lock();

    unsafe {
        context.init_gdt(&mut cpu).expect("Failed to load GDT");
        context.init_paging(&mut cpu).expect("Failed to enable paging");
        context
            .init_idt(interrupts::trampolines(), &mut cpu)
            .expect("Failed to load IDT");
    }

    interrupts::with_pics(|pics| {
        context.init_pic(pics)?;
        pics.enable_line(timer::TIMER_LINE);
        Ok::<(), BootError>(())
    })
    .expect("Failed to remap PIC");

    interrupts::register_interrupt_handler(TIMER_VECTOR, timer::on_tick);

    context
        .enable_interrupts(&mut cpu)
        .expect("Failed to enable interrupts");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::pic::{PIC_1_COMMAND, PIC_1_OFFSET, PIC_2_OFFSET};
    use crate::hal::{
        mock::{fake_trampolines, CpuOp, MockCpu, MockPorts},
        physical_address,
    };
    use crate::interrupts::{
        dispatch::{Dispatcher, Disposition},
        frame::InterruptFrame,
        gdt::{KERNEL_CODE_SELECTOR, KERNEL_DATA_SELECTOR},
    };

    fn pics() -> ChainedPics<MockPorts> {
        ChainedPics::new(MockPorts::new(), PIC_1_OFFSET, PIC_2_OFFSET)
    }

    unsafe fn boot(
        context: &mut HardwareContext,
        pics: &mut ChainedPics<MockPorts>,
        cpu: &mut MockCpu,
    ) -> Result<(), BootError> {
        context.init_gdt(cpu)?;
        context.init_paging(cpu)?;
        context.init_idt(&fake_trampolines(), cpu)?;
        context.init_pic(pics)?;
        context.enable_interrupts(cpu)
    }

    #[test]
    fn context_is_page_aligned() {
        let context = Box::new(HardwareContext::new());
        assert_eq!(physical_address(&*context) % 4096, 0);
        assert_eq!(context.stage(), BootStage::Reset);
    }

    #[test]
    fn privileged_steps_run_in_hardware_order() {
        let mut context = Box::new(HardwareContext::new());
        let mut pics = pics();
        let mut cpu = MockCpu::new();

        unsafe { boot(&mut context, &mut pics, &mut cpu) }.unwrap();

        assert_eq!(
            cpu.ops,
            [
                CpuOp::LoadGdt,
                CpuOp::ReloadSegments,
                CpuOp::WriteCr3,
                CpuOp::EnablePaging,
                CpuOp::LoadIdt,
                CpuOp::EnableInterrupts,
            ]
        );
        assert_eq!(context.stage(), BootStage::InterruptsEnabled);
        assert!(cpu.interrupts_enabled());
        assert_eq!(cpu.code_selector, KERNEL_CODE_SELECTOR.0);
        assert_eq!(cpu.data_selector, KERNEL_DATA_SELECTOR.0);
        assert_eq!(pics.ports().master.vector_offset, PIC_1_OFFSET);
        assert_eq!(pics.ports().slave.vector_offset, PIC_2_OFFSET);
    }

    #[test]
    fn registers_point_at_the_context_tables() {
        let mut context = Box::new(HardwareContext::new());
        let mut cpu = MockCpu::new();
        unsafe { boot(&mut context, &mut pics(), &mut cpu) }.unwrap();

        assert_eq!(cpu.read_gdtr(), context.gdt().pointer());
        assert_eq!(cpu.read_idtr(), context.idt().pointer());
        assert_eq!(cpu.read_cr3(), context.paging().directory_address());
        assert!(cpu.paging_enabled());
    }

    #[test]
    fn out_of_order_steps_are_rejected_without_side_effects() {
        let mut context = Box::new(HardwareContext::new());
        let mut pics = pics();
        let mut cpu = MockCpu::new();

        let err = unsafe { context.init_paging(&mut cpu) }.unwrap_err();
        assert_eq!(
            err,
            BootError::OutOfOrder {
                expected: BootStage::Segmented,
                found: BootStage::Reset,
            }
        );
        assert!(context.init_pic(&mut pics).is_err());
        assert!(context.enable_interrupts(&mut cpu).is_err());
        assert!(cpu.ops.is_empty());
        assert!(pics.ports().log.is_empty());

        unsafe { context.init_gdt(&mut cpu) }.unwrap();
        assert!(unsafe { context.init_gdt(&mut cpu) }.is_err());
        assert_eq!(context.stage(), BootStage::Segmented);
    }

    #[test]
    fn out_of_order_error_names_both_stages() {
        let err = BootError::OutOfOrder {
            expected: BootStage::Paged,
            found: BootStage::Reset,
        };
        assert_eq!(
            err.to_string(),
            "bring-up step out of order: requires Paged, machine is at Reset"
        );
    }

    #[test]
    fn booted_machine_delivers_timer_interrupts() {
        fn on_timer(frame: &mut InterruptFrame) {
            frame.eax += 1;
        }

        let mut context = Box::new(HardwareContext::new());
        let mut pics = pics();
        let mut cpu = MockCpu::new();
        unsafe { boot(&mut context, &mut pics, &mut cpu) }.unwrap();
        pics.ports_mut().clear_log();

        let mut dispatcher = Dispatcher::new(pics);
        dispatcher.register(32, on_timer);

        let gate = context.idt().gate(32);
        assert!(gate.is_present());
        assert_eq!(gate.handler_address(), fake_trampolines()[32]);

        let mut frame = InterruptFrame::for_vector(32);
        assert_eq!(dispatcher.dispatch(&mut frame, &cpu), Disposition::Resume);
        assert_eq!(frame.eax, 1);
        assert_eq!(dispatcher.pics().ports().writes(), [(PIC_1_COMMAND, 0x20)]);
    }
}
