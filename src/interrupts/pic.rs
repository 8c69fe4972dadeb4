//! # Programmable Interrupt Controller (8259 PIC)
//!
//! Drives the legacy master/slave 8259 pair.
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐
//! │   PIC 1     │◀────│   PIC 2     │
//! │  (Master)   │     │  (Slave)    │
//! │ IRQ 0-7     │     │ IRQ 8-15    │
//! └─────────────┘     └─────────────┘
//!       │  (slave cascades into master line 2)
//!       ▼
//!     CPU
//! ```
//!
//! Out of reset both chips deliver on vectors that overlap the CPU exception
//! range, so they are reprogrammed: master lines land on 32..40, slave lines on
//! 40..48.

use crate::{
    constants::pic::{
        CASCADE_IDENTITY, CASCADE_LINE_MASK, CMD_END_OF_INTERRUPT, ICW1_ICW4, ICW1_INIT,
        ICW4_8086, LINES_PER_CHIP, PIC_1_COMMAND, PIC_1_DATA, PIC_2_COMMAND, PIC_2_DATA,
        TOTAL_LINES,
    },
    constants::idt::EXCEPTION_VECTORS,
    hal::PortIo,
};

/// One 8259 chip.
#[derive(Debug, Clone, Copy)]
struct Pic {
    offset: u8,
    command: u16,
    data: u16,
}

impl Pic {
    fn handles_interrupt(&self, vector: u8) -> bool {
        self.offset <= vector && vector < self.offset.saturating_add(LINES_PER_CHIP)
    }
}

/// The master/slave pair sharing one set of ports.
#[derive(Debug)]
pub struct ChainedPics<P: PortIo> {
    ports: P,
    pics: [Pic; 2],
}

impl<P: PortIo> ChainedPics<P> {
    /// Describes a controller pair whose lines will start at the given vectors.
    ///
    /// Panics if either range would overlap the CPU exception vectors or the
    /// two ranges would overlap each other.
    pub const fn new(ports: P, master_offset: u8, slave_offset: u8) -> Self {
        assert!(
            master_offset >= EXCEPTION_VECTORS && slave_offset >= EXCEPTION_VECTORS,
            "controller vectors must not overlap CPU exceptions"
        );
        assert!(
            master_offset <= u8::MAX - LINES_PER_CHIP && slave_offset <= u8::MAX - LINES_PER_CHIP,
            "controller vectors must fit in the vector space"
        );
        assert!(
            master_offset + LINES_PER_CHIP <= slave_offset
                || slave_offset + LINES_PER_CHIP <= master_offset,
            "master and slave vector ranges overlap"
        );

        Self {
            ports,
            pics: [
                Pic {
                    offset: master_offset,
                    command: PIC_1_COMMAND,
                    data: PIC_1_DATA,
                },
                Pic {
                    offset: slave_offset,
                    command: PIC_2_COMMAND,
                    data: PIC_2_DATA,
                },
            ],
        }
    }

    /// Runs the four-word initialization sequence on both chips, keeping
    /// whatever lines were unmasked before.
    pub fn initialize(&mut self) {
        let saved_masks = self.read_masks();
        let [master, slave] = self.pics;

        // ICW1: start initialization, ICW4 follows.
        self.write(master.command, ICW1_INIT | ICW1_ICW4);
        self.write(slave.command, ICW1_INIT | ICW1_ICW4);

        // ICW2: vector offsets.
        self.write(master.data, master.offset);
        self.write(slave.data, slave.offset);

        // ICW3: cascade wiring.
        self.write(master.data, CASCADE_LINE_MASK);
        self.write(slave.data, CASCADE_IDENTITY);

        // ICW4: 8086 mode, manual end-of-interrupt.
        self.write(master.data, ICW4_8086);
        self.write(slave.data, ICW4_8086);

        self.write_masks(saved_masks[0], saved_masks[1]);

        log::debug!(
            "PIC remapped: master -> {}, slave -> {}, masks {:#04x}/{:#04x}",
            master.offset,
            slave.offset,
            saved_masks[0],
            saved_masks[1]
        );
    }

    /// `[master, slave]` mask registers; a set bit means the line is masked.
    pub fn read_masks(&mut self) -> [u8; 2] {
        let [master, slave] = self.pics;
        [self.ports.inb(master.data), self.ports.inb(slave.data)]
    }

    pub fn write_masks(&mut self, master_mask: u8, slave_mask: u8) {
        let [master, slave] = self.pics;
        self.ports.outb(master.data, master_mask);
        self.ports.outb(slave.data, slave_mask);
    }

    /// Masks every line on both chips.
    pub fn disable(&mut self) {
        self.write_masks(u8::MAX, u8::MAX);
    }

    /// Unmasks one line (0..16).
    pub fn enable_line(&mut self, line: u8) {
        let (data, bit) = self.locate(line);
        let mask = self.ports.inb(data) & !(1 << bit);
        self.ports.outb(data, mask);
    }

    /// Masks one line (0..16).
    pub fn disable_line(&mut self, line: u8) {
        let (data, bit) = self.locate(line);
        let mask = self.ports.inb(data) | (1 << bit);
        self.ports.outb(data, mask);
    }

    pub fn is_line_masked(&mut self, line: u8) -> bool {
        let (data, bit) = self.locate(line);
        self.ports.inb(data) & (1 << bit) != 0
    }

    /// Acknowledges `line`: the slave first when it owns the line, then always
    /// the master, which sees every slave line through its cascade input.
    pub fn end_of_interrupt(&mut self, line: u8) {
        let [master, slave] = self.pics;
        if line >= LINES_PER_CHIP {
            self.ports.outb(slave.command, CMD_END_OF_INTERRUPT);
        }
        self.ports.outb(master.command, CMD_END_OF_INTERRUPT);
    }

    /// Whether `vector` is one of the sixteen controller vectors.
    pub fn handles_interrupt(&self, vector: u8) -> bool {
        self.pics.iter().any(|pic| pic.handles_interrupt(vector))
    }

    /// Controller line that delivers on `vector`, if any.
    pub fn line_for_vector(&self, vector: u8) -> Option<u8> {
        let [master, slave] = self.pics;
        if master.handles_interrupt(vector) {
            Some(vector - master.offset)
        } else if slave.handles_interrupt(vector) {
            Some(vector - slave.offset + LINES_PER_CHIP)
        } else {
            None
        }
    }

    /// Vector the CPU receives for `line`.
    pub fn vector_for_line(&self, line: u8) -> u8 {
        assert!(line < TOTAL_LINES, "IRQ line {} out of range", line);
        let [master, slave] = self.pics;
        if line < LINES_PER_CHIP {
            master.offset + line
        } else {
            slave.offset + line - LINES_PER_CHIP
        }
    }

    pub fn ports(&self) -> &P {
        &self.ports
    }

    pub fn ports_mut(&mut self) -> &mut P {
        &mut self.ports
    }

    fn locate(&self, line: u8) -> (u16, u8) {
        assert!(line < TOTAL_LINES, "IRQ line {} out of range", line);
        if line < LINES_PER_CHIP {
            (self.pics[0].data, line)
        } else {
            (self.pics[1].data, line - LINES_PER_CHIP)
        }
    }

    fn write(&mut self, port: u16, value: u8) {
        self.ports.outb(port, value);
        self.ports.io_wait();
    }
}
