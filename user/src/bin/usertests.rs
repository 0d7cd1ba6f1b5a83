//! 依次运行每个测试程序，检查它们的退出码

#![no_std]
#![no_main]

#[macro_use]
extern crate user_lib;

use user_lib::{spawn, waitpid};

/// (程序名, 期望的退出码)
static TESTS: &[(&str, i32)] = &[
    ("exit7\0", 7),
    ("forktree_exit\0", 0),
    ("forktest\0", 0),
    ("fork_copy\0", 0),
    ("yield_rr\0", 0),
    ("sbrk_test\0", 0),
    ("mmap_test\0", 0),
    ("pipetest\0", 0),
    ("exec_fail\0", 0),
    ("bad_address\0", 0),
    ("power_7\0", 0),
    ("sleep\0", 0),
    ("waitpid_fault\0", 0),
    ("task_info\0", 0),
];

#[no_mangle]
fn main() -> i32 {
    let mut passed = 0;
    for &(name, expected) in TESTS.iter() {
        let name_str = name.trim_end_matches('\0');
        println!("Usertests: Running {}", name_str);
        let pid = spawn(name);
        if pid < 0 {
            println!("Usertests: failed to spawn {}", name_str);
            continue;
        }
        let mut exit_code: i32 = 0;
        let wait_pid = waitpid(pid, &mut exit_code);
        if wait_pid == pid && exit_code == expected {
            passed += 1;
            println!("\x1b[32mUsertests: Test {} passed.\x1b[0m", name_str);
        } else {
            println!(
                "\x1b[31mUsertests: Test {} failed, exit code = {}, expected {}.\x1b[0m",
                name_str, exit_code, expected
            );
        }
    }
    println!("Usertests: {}/{} passed.", passed, TESTS.len());
    if passed == TESTS.len() {
        println!("Usertests passed!");
        0
    } else {
        -1
    }
}
