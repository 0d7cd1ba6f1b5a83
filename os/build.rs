//! 生成 link_app.S：把 user/src/bin 下已经编译好的用户程序链接进内核数据段

use std::env;
use std::fs::{read_dir, File};
use std::io::{Result, Write};
use std::path::{Path, PathBuf};

static USER_SRC_PATH: &str = "../user/src/bin/";
static TARGET_PATH: &str = "../target/riscv64gc-unknown-none-elf/release/";

fn main() {
    let manifest_dir = env::var("CARGO_MANIFEST_DIR").unwrap();
    println!("cargo:rerun-if-changed={}", USER_SRC_PATH);
    println!("cargo:rerun-if-changed={}", TARGET_PATH);
    println!("cargo:rerun-if-changed=src/linker-qemu.ld");
    println!("cargo:rustc-link-arg-bins=-T{}/src/linker-qemu.ld", manifest_dir);
    insert_app_data(Path::new(&manifest_dir)).unwrap();
}

/// 收集已经编译出ELF的用户程序名，按名字排序
fn collect_apps(manifest_dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    let target_dir = manifest_dir.join(TARGET_PATH);
    let mut apps: Vec<(String, PathBuf)> = read_dir(manifest_dir.join(USER_SRC_PATH))?
        .filter_map(|dir_entry| dir_entry.ok())
        .filter_map(|dir_entry| {
            let name = dir_entry.file_name().into_string().ok()?;
            let name = name.strip_suffix(".rs")?.to_string();
            let elf = target_dir.join(&name);
            if elf.is_file() {
                Some((name, elf))
            } else {
                println!("cargo:warning=user app `{}` is not built, skipped", name);
                None
            }
        })
        .collect();
    apps.sort();
    Ok(apps)
}

fn insert_app_data(manifest_dir: &Path) -> Result<()> {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    let mut f = File::create(out_dir.join("link_app.S"))?;
    let apps = collect_apps(manifest_dir)?;

    writeln!(
        f,
        r#"
    .align 3
    .section .data
    .global _num_app
_num_app:
    .quad {}"#,
        apps.len()
    )?;
    for i in 0..apps.len() {
        writeln!(f, r#"    .quad app_{}_start"#, i)?;
    }
    if !apps.is_empty() {
        writeln!(f, r#"    .quad app_{}_end"#, apps.len() - 1)?;
    }

    writeln!(
        f,
        r#"
    .global _app_names
_app_names:"#
    )?;
    for (name, _) in apps.iter() {
        writeln!(f, r#"    .string "{}""#, name)?;
    }

    for (idx, (name, elf)) in apps.iter().enumerate() {
        println!("cargo:rerun-if-changed={}", elf.display());
        println!("app_{}: {}", idx, name);
        writeln!(
            f,
            r#"
    .section .data
    .global app_{0}_start
    .global app_{0}_end
    .align 3
app_{0}_start:
    .incbin "{1}"
app_{0}_end:"#,
            idx,
            elf.display()
        )?;
    }
    Ok(())
}
