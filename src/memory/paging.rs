//! Two-level 32-bit paging with a single identity-mapped window.
//!
//! One page directory and one page table. The table maps the first 4 MiB onto
//! itself; every other directory slot stays absent so stray accesses past the
//! window fault instead of resolving to something.

use bitflags::bitflags;

use crate::{
    constants::memory::{ENTRIES_PER_TABLE, IDENTITY_WINDOW, PAGE_SIZE, TABLE_SPAN},
    hal::{physical_address, Cpu},
};

bitflags! {
    /// Low twelve bits of a directory or table entry.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PageTableFlags: u32 {
        const PRESENT = 1 << 0;
        const WRITABLE = 1 << 1;
        const USER_ACCESSIBLE = 1 << 2;
        const WRITE_THROUGH = 1 << 3;
        const NO_CACHE = 1 << 4;
        const ACCESSED = 1 << 5;
        const DIRTY = 1 << 6;
        /// 4 MiB page in a directory entry; PAT index in a table entry.
        const HUGE_PAGE = 1 << 7;
        const GLOBAL = 1 << 8;
    }
}

const FLAGS_MASK: u32 = 0xFFF;
const FRAME_MASK: u32 = !FLAGS_MASK;

/// A 32-bit directory or table entry: frame address in the top 20 bits.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
#[repr(transparent)]
pub struct PageTableEntry(u32);

impl PageTableEntry {
    pub const UNUSED: Self = Self(0);

    /// `frame` must be 4 KiB aligned.
    pub fn new(frame: u32, flags: PageTableFlags) -> Self {
        debug_assert_eq!(frame & FLAGS_MASK, 0, "frame {:#x} is not page aligned", frame);
        Self((frame & FRAME_MASK) | flags.bits())
    }

    pub fn frame(&self) -> u32 {
        self.0 & FRAME_MASK
    }

    pub fn flags(&self) -> PageTableFlags {
        PageTableFlags::from_bits_truncate(self.0 & FLAGS_MASK)
    }

    pub fn is_present(&self) -> bool {
        self.flags().contains(PageTableFlags::PRESENT)
    }

    pub fn is_unused(&self) -> bool {
        self.0 == 0
    }

    pub fn bits(&self) -> u32 {
        self.0
    }
}

impl core::fmt::Debug for PageTableEntry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PageTableEntry")
            .field("frame", &format_args!("{:#x}", self.frame()))
            .field("flags", &self.flags())
            .finish()
    }
}

/// 1024 entries, one page, page aligned. Used for both levels.
#[derive(Clone)]
#[repr(C, align(4096))]
pub struct PageTable {
    entries: [PageTableEntry; ENTRIES_PER_TABLE],
}

const _: () = assert!(core::mem::size_of::<PageTable>() == PAGE_SIZE as usize);
const _: () = assert!(core::mem::align_of::<PageTable>() == PAGE_SIZE as usize);

impl Default for PageTable {
    fn default() -> Self {
        Self::new()
    }
}

impl PageTable {
    pub const fn new() -> Self {
        Self {
            entries: [PageTableEntry::UNUSED; ENTRIES_PER_TABLE],
        }
    }

    pub fn zero(&mut self) {
        self.entries = [PageTableEntry::UNUSED; ENTRIES_PER_TABLE];
    }

    pub fn iter(&self) -> impl Iterator<Item = &PageTableEntry> {
        self.entries.iter()
    }
}

impl core::ops::Index<usize> for PageTable {
    type Output = PageTableEntry;

    fn index(&self, index: usize) -> &Self::Output {
        &self.entries[index]
    }
}

impl core::ops::IndexMut<usize> for PageTable {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.entries[index]
    }
}

/// A page directory has the same shape as a page table.
pub type PageDirectory = PageTable;

/// Why a software walk could not translate an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranslationFault {
    /// No page table behind this directory slot.
    DirectoryEntryAbsent { index: usize },
    /// The page table exists but the page is not mapped.
    TableEntryAbsent { index: usize },
    /// The directory names a table this bootstrapper does not own.
    ForeignTable { frame: u32 },
}

impl core::fmt::Display for TranslationFault {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            TranslationFault::DirectoryEntryAbsent { index } => {
                write!(f, "page directory entry {} not present", index)
            }
            TranslationFault::TableEntryAbsent { index } => {
                write!(f, "page table entry {} not present", index)
            }
            TranslationFault::ForeignTable { frame } => {
                write!(f, "page table at {:#x} is not managed here", frame)
            }
        }
    }
}

pub fn directory_index(virt: u32) -> usize {
    (virt >> 22) as usize
}

pub fn table_index(virt: u32) -> usize {
    ((virt >> 12) & 0x3FF) as usize
}

/// The boot-time translation structures.
#[derive(Clone)]
#[repr(C, align(4096))]
pub struct IdentityPaging {
    directory: PageDirectory,
    first_table: PageTable,
}

const _: () = assert!(core::mem::size_of::<IdentityPaging>() == 2 * PAGE_SIZE as usize);

impl Default for IdentityPaging {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityPaging {
    pub const fn new() -> Self {
        Self {
            directory: PageTable::new(),
            first_table: PageTable::new(),
        }
    }

    /// Zeroes both structures and fills in the identity window. Does not touch
    /// the CPU.
    pub fn map_identity_window(&mut self) {
        self.directory.zero();
        self.first_table.zero();

        let kernel_rw = PageTableFlags::PRESENT | PageTableFlags::WRITABLE;
        for index in 0..ENTRIES_PER_TABLE {
            self.first_table[index] = PageTableEntry::new(index as u32 * PAGE_SIZE, kernel_rw);
        }

        let table_frame = physical_address(&self.first_table);
        self.directory[0] = PageTableEntry::new(table_frame, kernel_rw);
    }

    /// Hands the directory to the CPU and turns translation on.
    ///
    /// # Safety
    /// The structures must stay at their current address while paging is on,
    /// and the executing code and stack must lie inside the identity window.
    pub unsafe fn activate(&self, cpu: &mut impl Cpu) {
        cpu.write_cr3(self.directory_address());
        cpu.enable_paging();
    }

    pub fn directory_address(&self) -> u32 {
        physical_address(&self.directory)
    }

    pub fn directory(&self) -> &PageDirectory {
        &self.directory
    }

    pub fn first_table(&self) -> &PageTable {
        &self.first_table
    }

    /// Walks the structures the way the MMU would.
    pub fn translate(&self, virt: u32) -> Result<u32, TranslationFault> {
        let dir_index = directory_index(virt);
        let pde = self.directory[dir_index];
        if !pde.is_present() {
            return Err(TranslationFault::DirectoryEntryAbsent { index: dir_index });
        }
        if pde.frame() != physical_address(&self.first_table) {
            return Err(TranslationFault::ForeignTable { frame: pde.frame() });
        }

        let tbl_index = table_index(virt);
        let pte = self.first_table[tbl_index];
        if !pte.is_present() {
            return Err(TranslationFault::TableEntryAbsent { index: tbl_index });
        }

        Ok(pte.frame() | (virt & (PAGE_SIZE - 1)))
    }

    pub fn is_identity_mapped(&self, virt: u32) -> bool {
        virt < IDENTITY_WINDOW && self.translate(virt) == Ok(virt)
    }

    /// Number of bytes reachable through the directory.
    pub fn mapped_span(&self) -> u32 {
        self.directory.iter().filter(|pde| pde.is_present()).count() as u32 * TABLE_SPAN
    }
}

/// Builds the identity window in `paging` and enables translation.
///
/// # Safety
/// See [`IdentityPaging::activate`].
pub unsafe fn init(paging: &mut IdentityPaging, cpu: &mut impl Cpu) {
    paging.map_identity_window();
    paging.activate(cpu);
    log::debug!(
        "Paging enabled: directory at {:#x}, {} KiB identity mapped",
        paging.directory_address(),
        paging.mapped_span() / 1024
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::mock::{CpuOp, MockCpu};

    fn mapped() -> Box<IdentityPaging> {
        let mut paging = Box::new(IdentityPaging::new());
        paging.map_identity_window();
        paging
    }

    #[test]
    fn structures_are_page_sized_and_aligned() {
        let paging = mapped();
        assert_eq!(paging.directory_address() % PAGE_SIZE, 0);
        assert_eq!(physical_address(paging.first_table()) % PAGE_SIZE, 0);
        assert_eq!(core::mem::size_of::<PageTableEntry>(), 4);
    }

    #[test]
    fn window_translates_to_itself() {
        let paging = mapped();
        for page in 0..ENTRIES_PER_TABLE as u32 {
            let base = page * PAGE_SIZE;
            for addr in [base, base + 1, base + 0x7FF, base + PAGE_SIZE - 1] {
                assert_eq!(paging.translate(addr), Ok(addr));
            }
        }
        assert!(paging.is_identity_mapped(IDENTITY_WINDOW - 1));
    }

    #[test]
    fn addresses_past_window_fault() {
        let paging = mapped();
        for addr in [
            IDENTITY_WINDOW,
            IDENTITY_WINDOW + 0x1234,
            0x0800_0000,
            0xC000_0000,
            u32::MAX,
        ] {
            assert_eq!(
                paging.translate(addr),
                Err(TranslationFault::DirectoryEntryAbsent {
                    index: directory_index(addr)
                })
            );
            assert!(!paging.is_identity_mapped(addr));
        }
    }

    #[test]
    fn only_first_directory_slot_is_present() {
        let paging = mapped();
        let present: usize = paging.directory().iter().filter(|e| e.is_present()).count();
        assert_eq!(present, 1);
        assert_eq!(paging.mapped_span(), IDENTITY_WINDOW);
        assert!(paging.directory().iter().skip(1).all(|e| e.is_unused()));
    }

    #[test]
    fn entries_are_supervisor_only() {
        let paging = mapped();
        let expected = PageTableFlags::PRESENT | PageTableFlags::WRITABLE;
        assert_eq!(paging.directory()[0].flags(), expected);
        assert!(paging.first_table().iter().all(|e| e.flags() == expected));
        assert_eq!(paging.first_table()[3].frame(), 3 * PAGE_SIZE);
    }

    #[test]
    fn remapping_clears_stale_entries() {
        let mut paging = mapped();
        paging.directory[7] = PageTableEntry::new(0x0040_0000, PageTableFlags::PRESENT);
        paging.map_identity_window();
        assert!(paging.directory()[7].is_unused());
    }

    #[test]
    fn init_loads_cr3_before_enabling_paging() {
        let mut paging = Box::new(IdentityPaging::new());
        let mut cpu = MockCpu::new();
        unsafe { init(&mut paging, &mut cpu) };

        assert_eq!(cpu.ops, [CpuOp::WriteCr3, CpuOp::EnablePaging]);
        assert_eq!(cpu.read_cr3(), paging.directory_address());
        assert!(cpu.paging_enabled());
    }
}
