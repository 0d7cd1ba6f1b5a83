use std::env;

fn main() {
    let manifest_dir = env::var("CARGO_MANIFEST_DIR").unwrap();
    println!("cargo:rerun-if-changed=src/linker.ld");
    println!("cargo:rustc-link-arg-bins=-T{}/src/linker.ld", manifest_dir);
}
