//! Interrupt Descriptor Table.
//!
//! Vectors 0..48 (every CPU exception plus the sixteen controller lines) get an
//! interrupt gate pointing at their own trampoline. Everything above stays
//! absent; delivering one of those raises a fault that goes down the normal
//! exception path.

use x86_64::structures::gdt::SegmentSelector;
use x86_64::PrivilegeLevel;

use crate::{
    constants::idt::{IDT_ENTRIES, INTERRUPT_GATE, TRAMPOLINE_VECTORS},
    hal::{Cpu, DescriptorTablePointer},
    interrupts::gdt::KERNEL_CODE_SELECTOR,
};

const GATE_PRESENT: u8 = 0x80;
const GATE_TYPE_MASK: u8 = 0x1F;

/// One 8-byte gate descriptor in the layout the CPU reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(C)]
pub struct GateDescriptor {
    offset_low: u16,
    selector: u16,
    zero: u8,
    flags: u8,
    offset_high: u16,
}

const _: () = assert!(core::mem::size_of::<GateDescriptor>() == 8);

impl GateDescriptor {
    pub const MISSING: Self = Self {
        offset_low: 0,
        selector: 0,
        zero: 0,
        flags: 0,
        offset_high: 0,
    };

    pub const fn new(handler: u32, selector: SegmentSelector, flags: u8) -> Self {
        Self {
            offset_low: (handler & 0xFFFF) as u16,
            selector: selector.0,
            zero: 0,
            flags,
            offset_high: (handler >> 16) as u16,
        }
    }

    pub fn handler_address(&self) -> u32 {
        u32::from(self.offset_low) | u32::from(self.offset_high) << 16
    }

    pub fn selector(&self) -> SegmentSelector {
        SegmentSelector(self.selector)
    }

    pub fn flags(&self) -> u8 {
        self.flags
    }

    pub fn is_present(&self) -> bool {
        self.flags & GATE_PRESENT != 0
    }

    pub fn privilege_level(&self) -> PrivilegeLevel {
        PrivilegeLevel::from_u16(u16::from((self.flags >> 5) & 0b11))
    }

    /// Gate type nibble plus the storage-segment bit (0x0E for a 32-bit interrupt gate).
    pub fn gate_type(&self) -> u8 {
        self.flags & GATE_TYPE_MASK
    }
}

/// Entry points for the vectors that get a gate, indexed by vector.
pub type TrampolineTable = [u32; TRAMPOLINE_VECTORS];

#[derive(Debug, Clone)]
#[repr(C, align(8))]
pub struct InterruptDescriptorTable {
    entries: [GateDescriptor; IDT_ENTRIES],
}

impl Default for InterruptDescriptorTable {
    fn default() -> Self {
        Self::new()
    }
}

impl InterruptDescriptorTable {
    pub const fn new() -> Self {
        Self {
            entries: [GateDescriptor::MISSING; IDT_ENTRIES],
        }
    }

    pub fn set_gate(&mut self, vector: u8, handler: u32, selector: SegmentSelector, flags: u8) {
        self.entries[usize::from(vector)] = GateDescriptor::new(handler, selector, flags);
    }

    /// Throws away every gate and installs one interrupt gate per trampoline.
    pub fn build(&mut self, trampolines: &TrampolineTable) {
        self.entries = [GateDescriptor::MISSING; IDT_ENTRIES];
        for (vector, &handler) in trampolines.iter().enumerate() {
            self.set_gate(vector as u8, handler, KERNEL_CODE_SELECTOR, INTERRUPT_GATE);
        }
    }

    pub fn gate(&self, vector: u8) -> &GateDescriptor {
        &self.entries[usize::from(vector)]
    }

    pub fn gates(&self) -> &[GateDescriptor] {
        &self.entries
    }

    pub fn present_count(&self) -> usize {
        self.entries.iter().filter(|gate| gate.is_present()).count()
    }

    pub fn pointer(&self) -> DescriptorTablePointer {
        DescriptorTablePointer::of(&self.entries)
    }

    /// Loads IDTR with this table.
    ///
    /// # Safety
    /// The table must stay at its current address for as long as the CPU uses it.
    pub unsafe fn load(&self, cpu: &mut impl Cpu) {
        cpu.load_idt(&self.pointer());
    }
}

/// Rebuilds `idt` from `trampolines` and makes it live.
///
/// # Safety
/// See [`InterruptDescriptorTable::load`]; every address in `trampolines` must
/// be a valid interrupt entry point.
pub unsafe fn init_idt(
    idt: &mut InterruptDescriptorTable,
    trampolines: &TrampolineTable,
    cpu: &mut impl Cpu,
) {
    idt.build(trampolines);
    idt.load(cpu);
    log::debug!("IDT loaded: {} of {} gates present", idt.present_count(), IDT_ENTRIES);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::{
        mock::{fake_trampolines, MockCpu},
        physical_address,
    };

    #[test]
    fn gate_encoding_matches_cpu_layout() {
        let gate = GateDescriptor::new(0x1234_5678, KERNEL_CODE_SELECTOR, INTERRUPT_GATE);
        let raw: [u8; 8] = unsafe { core::mem::transmute(gate) };
        assert_eq!(raw, [0x78, 0x56, 0x08, 0x00, 0x00, 0x8E, 0x34, 0x12]);

        assert_eq!(gate.handler_address(), 0x1234_5678);
        assert_eq!(gate.selector(), KERNEL_CODE_SELECTOR);
        assert_eq!(gate.privilege_level(), PrivilegeLevel::Ring0);
        assert_eq!(gate.gate_type(), 0x0E);
    }

    #[test]
    fn present_gates_resolve_to_distinct_trampolines() {
        let trampolines = fake_trampolines();
        let mut idt = InterruptDescriptorTable::new();
        idt.build(&trampolines);

        let mut seen = std::collections::BTreeSet::new();
        for vector in 0..=255u8 {
            let gate = idt.gate(vector);
            if gate.is_present() {
                let address = gate.handler_address();
                assert!(trampolines.contains(&address));
                assert!(seen.insert(address), "vector {} reuses {:#x}", vector, address);
                assert_eq!(gate.flags(), INTERRUPT_GATE);
                assert_eq!(gate.selector(), KERNEL_CODE_SELECTOR);
            } else {
                assert_eq!(*gate, GateDescriptor::MISSING);
            }
        }
        assert_eq!(seen.len(), TRAMPOLINE_VECTORS);
    }

    #[test]
    fn exception_and_controller_vectors_are_present() {
        let mut idt = InterruptDescriptorTable::new();
        idt.build(&fake_trampolines());

        assert!((0..48u8).all(|vector| idt.gate(vector).is_present()));
        assert!((48..=255u8).all(|vector| !idt.gate(vector).is_present()));
    }

    #[test]
    fn rebuild_discards_previous_gates() {
        let mut idt = InterruptDescriptorTable::new();
        idt.set_gate(0x80, 0xDEAD_0000, KERNEL_CODE_SELECTOR, INTERRUPT_GATE);
        idt.build(&fake_trampolines());

        assert!(!idt.gate(0x80).is_present());
        assert_eq!(idt.present_count(), TRAMPOLINE_VECTORS);
    }

    #[test]
    fn idtr_round_trips_base_and_limit() {
        let mut idt = InterruptDescriptorTable::new();
        let mut cpu = MockCpu::new();
        unsafe { init_idt(&mut idt, &fake_trampolines(), &mut cpu) };

        let idtr = cpu.read_idtr();
        let limit = idtr.limit;
        let base = idtr.base;
        assert_eq!(limit, (IDT_ENTRIES * 8 - 1) as u16);
        assert_eq!(base, physical_address(&idt.entries));
    }
}
