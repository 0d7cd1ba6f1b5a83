//! 非法访存和非法指令只会杀死出错的进程

#![no_std]
#![no_main]

#[macro_use]
extern crate user_lib;

use core::arch::asm;
use user_lib::{exit, fork, waitpid, write};

const EXIT_CODE_PAGE_FAULT: i32 = -2;
const EXIT_CODE_ILLEGAL_INSTRUCTION: i32 = -3;

fn run_child(f: fn()) -> i32 {
    let pid = fork();
    if pid == 0 {
        f();
        exit(0);
    }
    let mut exit_code: i32 = 0;
    assert_eq!(waitpid(pid, &mut exit_code), pid);
    exit_code
}

fn write_null() {
    unsafe {
        core::ptr::null_mut::<u8>().write_volatile(0);
    }
}

fn write_kernel_page() {
    // 跳板页所在的高地址在用户态不可访问
    unsafe {
        (usize::MAX as *mut u8).write_volatile(0);
    }
}

fn illegal_instruction() {
    unsafe {
        asm!("sret");
    }
}

#[no_mangle]
fn main() -> i32 {
    assert_eq!(run_child(write_null), EXIT_CODE_PAGE_FAULT);
    assert_eq!(run_child(write_kernel_page), EXIT_CODE_PAGE_FAULT);
    assert_eq!(run_child(illegal_instruction), EXIT_CODE_ILLEGAL_INSTRUCTION);
    // 系统调用拿到非法指针时返回错误而不是杀死进程
    let bad = unsafe { core::slice::from_raw_parts(0x8000_0000 as *const u8, 16) };
    assert_eq!(write(1, bad), -1);
    println!("bad_address pass.");
    0
}
