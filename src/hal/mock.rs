//! Host-side stand-ins for the hardware seams.

use x86_64::structures::gdt::SegmentSelector;

use super::{Cpu, DescriptorTablePointer, PortIo};
use crate::constants::pic::{
    CMD_END_OF_INTERRUPT, ICW1_ICW4, ICW1_INIT, PIC_1_COMMAND, PIC_1_DATA, PIC_2_COMMAND,
    PIC_2_DATA,
};
use crate::constants::ports::IO_WAIT_PORT;
use crate::interrupts::idt::TrampolineTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortOp {
    Read(u16, u8),
    Write(u16, u8),
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
enum InitStep {
    #[default]
    Idle,
    VectorOffset,
    Cascade,
    Mode,
}

/// One simulated 8259: tracks where it is in the initialization sequence and
/// what its mask register holds.
#[derive(Debug, Default, Clone, Copy)]
pub struct MockChip {
    pub mask: u8,
    pub vector_offset: u8,
    pub cascade: u8,
    pub mode: u8,
    pub end_of_interrupts: u32,
    step: InitStep,
    expects_mode: bool,
}

impl MockChip {
    fn command(&mut self, value: u8) {
        if value & ICW1_INIT != 0 {
            // ICW1 clears the mask register on real hardware.
            self.mask = 0;
            self.step = InitStep::VectorOffset;
            self.expects_mode = value & ICW1_ICW4 != 0;
        } else if value == CMD_END_OF_INTERRUPT {
            self.end_of_interrupts += 1;
        }
    }

    fn data(&mut self, value: u8) {
        self.step = match self.step {
            InitStep::Idle => {
                self.mask = value;
                InitStep::Idle
            }
            InitStep::VectorOffset => {
                self.vector_offset = value;
                InitStep::Cascade
            }
            InitStep::Cascade => {
                self.cascade = value;
                if self.expects_mode {
                    InitStep::Mode
                } else {
                    InitStep::Idle
                }
            }
            InitStep::Mode => {
                self.mode = value;
                InitStep::Idle
            }
        };
    }
}

/// Records every port access and models the two interrupt controllers.
#[derive(Debug, Default)]
pub struct MockPorts {
    pub log: Vec<PortOp>,
    pub master: MockChip,
    pub slave: MockChip,
}

impl MockPorts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Port writes, excluding the bus-settling writes to the POST port.
    pub fn writes(&self) -> Vec<(u16, u8)> {
        self.log
            .iter()
            .filter_map(|op| match *op {
                PortOp::Write(port, value) if port != IO_WAIT_PORT => Some((port, value)),
                _ => None,
            })
            .collect()
    }

    pub fn clear_log(&mut self) {
        self.log.clear();
    }
}

impl PortIo for MockPorts {
    fn inb(&mut self, port: u16) -> u8 {
        let value = match port {
            PIC_1_DATA => self.master.mask,
            PIC_2_DATA => self.slave.mask,
            _ => 0,
        };
        self.log.push(PortOp::Read(port, value));
        value
    }

    fn outb(&mut self, port: u16, value: u8) {
        self.log.push(PortOp::Write(port, value));
        match port {
            PIC_1_COMMAND => self.master.command(value),
            PIC_2_COMMAND => self.slave.command(value),
            PIC_1_DATA => self.master.data(value),
            PIC_2_DATA => self.slave.data(value),
            _ => {}
        }
    }
}

/// A privileged operation observed by [`MockCpu`], in program order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuOp {
    LoadGdt,
    ReloadSegments,
    LoadIdt,
    WriteCr3,
    EnablePaging,
    EnableInterrupts,
    DisableInterrupts,
}

#[derive(Debug, Default)]
pub struct MockCpu {
    pub gdtr: Option<DescriptorTablePointer>,
    pub idtr: Option<DescriptorTablePointer>,
    pub code_selector: u16,
    pub data_selector: u16,
    pub cr2: u32,
    pub cr3: u32,
    pub paging: bool,
    pub interrupts: bool,
    pub ops: Vec<CpuOp>,
}

impl MockCpu {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Cpu for MockCpu {
    unsafe fn load_gdt(&mut self, pointer: &DescriptorTablePointer) {
        self.gdtr = Some(*pointer);
        self.ops.push(CpuOp::LoadGdt);
    }

    fn read_gdtr(&self) -> DescriptorTablePointer {
        self.gdtr.unwrap_or(DescriptorTablePointer { limit: 0, base: 0 })
    }

    unsafe fn reload_segments(&mut self, code: SegmentSelector, data: SegmentSelector) {
        self.code_selector = code.0;
        self.data_selector = data.0;
        self.ops.push(CpuOp::ReloadSegments);
    }

    unsafe fn load_idt(&mut self, pointer: &DescriptorTablePointer) {
        self.idtr = Some(*pointer);
        self.ops.push(CpuOp::LoadIdt);
    }

    fn read_idtr(&self) -> DescriptorTablePointer {
        self.idtr.unwrap_or(DescriptorTablePointer { limit: 0, base: 0 })
    }

    unsafe fn write_cr3(&mut self, directory: u32) {
        self.cr3 = directory;
        self.ops.push(CpuOp::WriteCr3);
    }

    fn read_cr3(&self) -> u32 {
        self.cr3
    }

    unsafe fn enable_paging(&mut self) {
        self.paging = true;
        self.ops.push(CpuOp::EnablePaging);
    }

    fn paging_enabled(&self) -> bool {
        self.paging
    }

    fn read_cr2(&self) -> u32 {
        self.cr2
    }

    fn enable_interrupts(&mut self) {
        self.interrupts = true;
        self.ops.push(CpuOp::EnableInterrupts);
    }

    fn disable_interrupts(&mut self) {
        self.interrupts = false;
        self.ops.push(CpuOp::DisableInterrupts);
    }

    fn interrupts_enabled(&self) -> bool {
        self.interrupts
    }
}

/// Stand-in entry points, 16 bytes apart like the real stubs.
pub fn fake_trampolines() -> TrampolineTable {
    core::array::from_fn(|vector| 0x0010_0000 + vector as u32 * 16)
}
