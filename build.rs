use std::env;

fn main() {
    let os = env::var("CARGO_CFG_TARGET_OS").unwrap();
    let manifest_dir = env::var("CARGO_MANIFEST_DIR").unwrap();

    // Only the bare-metal image needs the Multiboot layout; host test builds link normally.
    if os == "none" {
        println!("cargo:rustc-link-arg-bins=-T{manifest_dir}/linker.ld");
    }
    println!("cargo:rerun-if-changed={manifest_dir}/linker.ld");
}
