pub const PAGE_SIZE: u32 = 4096;

/// Entries in a page directory or page table.
pub const ENTRIES_PER_TABLE: usize = 1024;

/// Bytes covered by one page table (one directory slot).
pub const TABLE_SPAN: u32 = PAGE_SIZE * ENTRIES_PER_TABLE as u32;

/// Everything below this address is identity mapped once paging is on.
pub const IDENTITY_WINDOW: u32 = TABLE_SPAN;
