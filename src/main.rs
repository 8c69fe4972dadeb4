#![cfg_attr(target_os = "none", no_std)]
#![cfg_attr(target_os = "none", no_main)]

#[cfg(all(target_arch = "x86", target_os = "none"))]
mod kernel {
    use core::arch::global_asm;

    use protos::{
        constants::boot::{
            BOOT_STACK_SIZE, MULTIBOOT_BOOTLOADER_MAGIC, MULTIBOOT_HEADER_CHECKSUM,
            MULTIBOOT_HEADER_FLAGS, MULTIBOOT_HEADER_MAGIC,
        },
        idle_loop, init, logging,
        prelude::*,
    };
    use raw_cpuid::CpuId;

    global_asm!(
        r#"
.pushsection .multiboot, "a"
.p2align 2
    .long {magic}
    .long {flags}
    .long {checksum}
.popsection

.pushsection .bss
.p2align 4
boot_stack_bottom:
    .skip {stack_size}
boot_stack_top:
.popsection

.pushsection .text
.global _start
_start:
    mov esp, offset boot_stack_top
    xor ebp, ebp
    push ebx
    push eax
    call kmain
2:
    cli
    hlt
    jmp 2b
.popsection
"#,
        magic = const MULTIBOOT_HEADER_MAGIC,
        flags = const MULTIBOOT_HEADER_FLAGS,
        checksum = const MULTIBOOT_HEADER_CHECKSUM,
        stack_size = const BOOT_STACK_SIZE,
    );

    #[no_mangle]
    extern "C" fn kmain(magic: u32, info: u32) -> ! {
        logging::init();
        serial_println!("Booting...");

        if magic != MULTIBOOT_BOOTLOADER_MAGIC {
            log::warn!("Unexpected loader magic {:#x}, continuing", magic);
        }
        debug_print!("Debug build, ");
        debug_println!("multiboot info at {:#x}", info);

        match CpuId::new().get_vendor_info() {
            Some(vendor) => log::info!("CPU vendor: {}", vendor.as_str()),
            None => log::info!("CPU vendor unknown"),
        }

        init::init();

        serial_println!("Kernel entering idle loop");
        idle_loop();
    }

    #[panic_handler]
    fn rust_panic(info: &core::panic::PanicInfo) -> ! {
        serial_println!("Kernel panic: {}", info);
        idle_loop();
    }
}

#[cfg(not(target_os = "none"))]
fn main() {}
