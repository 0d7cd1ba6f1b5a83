//! 退出码写不回去时，waitpid失败且子进程保留，之后还能正常回收

#![no_std]
#![no_main]

#[macro_use]
extern crate user_lib;

use user_lib::{exit, fork, sleep, try_waitpid, waitpid};

#[no_mangle]
fn main() -> i32 {
    let pid = fork();
    if pid == 0 {
        exit(5);
    }
    // 让子进程先退出
    sleep(20);
    // 代码段不可写
    let read_only = main as usize as *mut i32;
    assert_eq!(try_waitpid(pid, read_only), -1);
    assert_eq!(try_waitpid(pid, usize::MAX as *mut i32), -1);
    let mut exit_code = 0;
    assert_eq!(waitpid(pid, &mut exit_code), pid);
    assert_eq!(exit_code, 5);
    assert_eq!(waitpid(pid, &mut exit_code), -1);
    println!("waitpid_fault pass.");
    0
}
