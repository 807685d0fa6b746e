use std::env;
use std::fs;
use std::path::PathBuf;

fn main() -> std::io::Result<()> {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=memory.x");

    // Host builds (library + tests) need no linker setup
    let firmware = env::var_os("CARGO_FEATURE_RP2040").is_some();
    let target = env::var("TARGET").unwrap_or_default();
    if !firmware || !target.starts_with("thumbv6m") {
        return Ok(());
    }

    // Put memory.x where cortex-m-rt's link.x can find it
    let out = PathBuf::from(env::var_os("OUT_DIR").unwrap_or_default());
    fs::write(out.join("memory.x"), include_bytes!("memory.x"))?;
    println!("cargo:rustc-link-search={}", out.display());

    println!("cargo:rustc-link-arg-bins=--nmagic");
    println!("cargo:rustc-link-arg-bins=-Tlink.x");
    Ok(())
}
