//! 初始进程：启动usertests，回收所有僵尸进程，没有子进程后退出

#![no_std]
#![no_main]

#[macro_use]
extern crate user_lib;

use user_lib::{spawn, wait};

#[no_mangle]
fn main() -> i32 {
    let usertests = spawn("usertests\0");
    if usertests < 0 {
        println!("[initproc] failed to spawn usertests");
        return -1;
    }
    let mut result = 0;
    loop {
        let mut exit_code: i32 = 0;
        let pid = wait(&mut exit_code);
        if pid < 0 {
            break;
        }
        if pid == usertests {
            result = exit_code;
        } else {
            println!(
                "[initproc] released a zombie process, pid={}, exit_code={}",
                pid, exit_code,
            );
        }
    }
    result
}
