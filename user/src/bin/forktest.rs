#![no_std]
#![no_main]

#[macro_use]
extern crate user_lib;

use user_lib::{exit, fork, getpid, wait};

const MAX_CHILD: usize = 30;

#[no_mangle]
fn main() -> i32 {
    let mut pids = [0isize; MAX_CHILD];
    for i in 0..MAX_CHILD {
        let pid = fork();
        if pid == 0 {
            exit(i as i32 + 1);
        }
        assert!(pid > 0 && pid != getpid());
        pids[i] = pid;
    }
    let mut exit_code_sum = 0;
    for _ in 0..MAX_CHILD {
        let mut exit_code: i32 = 0;
        let pid = wait(&mut exit_code);
        assert!(pids.contains(&pid), "wait returned an unknown pid {}", pid);
        exit_code_sum += exit_code;
    }
    assert_eq!(exit_code_sum as usize, MAX_CHILD * (MAX_CHILD + 1) / 2);
    let mut exit_code: i32 = 0;
    assert_eq!(wait(&mut exit_code), -1, "no child should be left");
    println!("forktest pass.");
    0
}
