//! Multiboot v1 handoff.

/// Marks the kernel image as Multiboot-loadable.
pub const MULTIBOOT_HEADER_MAGIC: u32 = 0x1BAD_B002;

/// Page-align modules, provide the memory map.
pub const MULTIBOOT_HEADER_FLAGS: u32 = 0b11;

/// Magic, flags and checksum must sum to zero.
pub const MULTIBOOT_HEADER_CHECKSUM: u32 =
    0u32.wrapping_sub(MULTIBOOT_HEADER_MAGIC.wrapping_add(MULTIBOOT_HEADER_FLAGS));

/// Value a compliant loader leaves in `eax`.
pub const MULTIBOOT_BOOTLOADER_MAGIC: u32 = 0x2BAD_B002;

/// Stack the entry stub switches to before calling into Rust.
pub const BOOT_STACK_SIZE: usize = 16 * 1024;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_checksum_cancels_out() {
        assert_eq!(
            MULTIBOOT_HEADER_MAGIC
                .wrapping_add(MULTIBOOT_HEADER_FLAGS)
                .wrapping_add(MULTIBOOT_HEADER_CHECKSUM),
            0
        );
    }
}
