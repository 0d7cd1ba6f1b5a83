//! 两次fork：一个子进程exec成exit7并以7退出，另一个子进程以3退出，
//! 父进程分别回收它们，再查询一个不存在的子进程

#![no_std]
#![no_main]

#[macro_use]
extern crate user_lib;

use user_lib::{exec, exit, fork, waitpid};

#[no_mangle]
fn main() -> i32 {
    let child_a = fork();
    if child_a == 0 {
        exec("exit7\0");
        // exec成功时不会回到这里
        exit(100);
    }
    assert!(child_a > 0);
    let child_b = fork();
    if child_b == 0 {
        exit(3);
    }
    assert!(child_b > 0);

    let mut exit_code: i32 = 0;
    assert_eq!(waitpid(child_a, &mut exit_code), child_a);
    assert_eq!(exit_code, 7);
    assert_eq!(waitpid(child_b, &mut exit_code), child_b);
    assert_eq!(exit_code, 3);
    // 已经回收过的和从未存在的子进程都是“没有这个子进程”
    assert_eq!(waitpid(child_a, &mut exit_code), -1);
    assert_eq!(waitpid(child_a + child_b + 1000, &mut exit_code), -1);
    println!("forktree_exit pass.");
    0
}
