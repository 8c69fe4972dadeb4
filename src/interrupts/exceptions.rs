//! CPU exception classification and fault decoding.

use core::fmt;

use x86_64::structures::idt::PageFaultErrorCode;

use crate::{
    constants::{
        idt::{EXCEPTION_VECTORS, PAGE_FAULT_VECTOR},
        memory::IDENTITY_WINDOW,
    },
    hal::Cpu,
    interrupts::frame::{pushes_error_code, InterruptFrame},
};

/// Names of the 32 architecturally reserved vectors.
pub const EXCEPTION_NAMES: [&str; EXCEPTION_VECTORS as usize] = [
    "Divide Error",
    "Debug",
    "Non-Maskable Interrupt",
    "Breakpoint",
    "Overflow",
    "Bound Range Exceeded",
    "Invalid Opcode",
    "Device Not Available",
    "Double Fault",
    "Coprocessor Segment Overrun",
    "Invalid TSS",
    "Segment Not Present",
    "Stack-Segment Fault",
    "General Protection Fault",
    "Page Fault",
    "Reserved",
    "x87 Floating-Point Exception",
    "Alignment Check",
    "Machine Check",
    "SIMD Floating-Point Exception",
    "Virtualization Exception",
    "Control Protection Exception",
    "Reserved",
    "Reserved",
    "Reserved",
    "Reserved",
    "Reserved",
    "Reserved",
    "Hypervisor Injection Exception",
    "VMM Communication Exception",
    "Security Exception",
    "Reserved",
];

pub fn exception_name(vector: u8) -> Option<&'static str> {
    EXCEPTION_NAMES.get(usize::from(vector)).copied()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultCause {
    NotPresent,
    ProtectionViolation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessKind {
    Read,
    Write,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorMode {
    Supervisor,
    User,
}

impl fmt::Display for FaultCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FaultCause::NotPresent => "non-present page",
            FaultCause::ProtectionViolation => "protection violation",
        })
    }
}

impl fmt::Display for AccessKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AccessKind::Read => "read",
            AccessKind::Write => "write",
        })
    }
}

impl fmt::Display for ProcessorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ProcessorMode::Supervisor => "supervisor-mode",
            ProcessorMode::User => "user-mode",
        })
    }
}

/// Decoded page-fault error code plus the faulting address from CR2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageFaultInfo {
    pub address: u32,
    pub cause: FaultCause,
    pub access: AccessKind,
    pub mode: ProcessorMode,
    pub reserved_bit_violation: bool,
    pub instruction_fetch: bool,
    /// Whether `address` lies in the identity-mapped window.
    pub in_identity_window: bool,
}

impl PageFaultInfo {
    pub fn decode(error_code: u32, address: u32) -> Self {
        let code = PageFaultErrorCode::from_bits_truncate(u64::from(error_code));
        Self {
            address,
            cause: if code.contains(PageFaultErrorCode::PROTECTION_VIOLATION) {
                FaultCause::ProtectionViolation
            } else {
                FaultCause::NotPresent
            },
            access: if code.contains(PageFaultErrorCode::CAUSED_BY_WRITE) {
                AccessKind::Write
            } else {
                AccessKind::Read
            },
            mode: if code.contains(PageFaultErrorCode::USER_MODE) {
                ProcessorMode::User
            } else {
                ProcessorMode::Supervisor
            },
            reserved_bit_violation: code.contains(PageFaultErrorCode::MALFORMED_TABLE),
            instruction_fetch: code.contains(PageFaultErrorCode::INSTRUCTION_FETCH),
            in_identity_window: address < IDENTITY_WINDOW,
        }
    }
}

impl fmt::Display for PageFaultInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} on {} at {:#010x} in {}",
            self.cause, self.access, self.address, self.mode
        )?;
        if self.reserved_bit_violation {
            f.write_str(", reserved bit set")?;
        }
        if self.instruction_fetch {
            f.write_str(", instruction fetch")?;
        }
        if !self.in_identity_window {
            f.write_str(", outside the identity-mapped window")?;
        }
        Ok(())
    }
}

/// Everything known about a fatal CPU exception.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionReport {
    pub vector: u8,
    pub name: &'static str,
    /// Present only for vectors where the CPU supplies one.
    pub error_code: Option<u32>,
    pub page_fault: Option<PageFaultInfo>,
    pub eip: u32,
    pub cs: u32,
    pub eflags: u32,
}

impl ExceptionReport {
    /// Classifies an exception frame. `fault_address` is CR2 at entry.
    ///
    /// Returns `None` for vectors outside the exception range.
    pub fn classify(frame: &InterruptFrame, fault_address: u32) -> Option<Self> {
        let vector = frame.vector();
        let name = exception_name(vector)?;
        let error_code = pushes_error_code(vector).then_some(frame.error_code);
        let page_fault = (vector == PAGE_FAULT_VECTOR)
            .then(|| PageFaultInfo::decode(frame.error_code, fault_address));

        Some(Self {
            vector,
            name,
            error_code,
            page_fault,
            eip: frame.eip,
            cs: frame.cs,
            eflags: frame.eflags,
        })
    }
}

/// Classifies `frame` and, if it is a CPU exception, logs the diagnostic.
///
/// CR2 is read only for page faults. `None` means the vector is not an
/// exception and delivery should continue.
pub fn report_fatal(frame: &InterruptFrame, cpu: &impl Cpu) -> Option<ExceptionReport> {
    let fault_address = if frame.vector() == PAGE_FAULT_VECTOR {
        cpu.read_cr2()
    } else {
        0
    };
    let report = ExceptionReport::classify(frame, fault_address)?;

    log::error!("{}", report);
    log::error!("{:#x?}", frame);
    log::error!("System halted");
    Some(report)
}

impl fmt::Display for ExceptionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EXCEPTION: {} (vector {})", self.name, self.vector)?;
        if let Some(code) = self.error_code {
            write!(f, ", error code {:#x}", code)?;
        }
        write!(
            f,
            " at {:#06x}:{:#010x}, eflags {:#010x}",
            self.cs, self.eip, self.eflags
        )?;
        if let Some(page_fault) = &self.page_fault {
            write!(f, "\n  page fault: {}", page_fault)?;
        }
        Ok(())
    }
}
