//! exec一个不存在的程序失败后，进程照常运行

#![no_std]
#![no_main]

#[macro_use]
extern crate user_lib;

use user_lib::{exec, getpid, spawn};

#[no_mangle]
fn main() -> i32 {
    let pid = getpid();
    let on_stack = 0x1234_5678usize;
    assert_eq!(exec("no_such_program\0"), -1);
    assert_eq!(spawn("no_such_program\0"), -1);
    assert_eq!(getpid(), pid);
    assert_eq!(on_stack, 0x1234_5678);
    println!("exec_fail pass.");
    0
}
