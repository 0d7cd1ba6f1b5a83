//! fork后父子进程的内存相互独立

#![no_std]
#![no_main]

#[macro_use]
extern crate user_lib;

use user_lib::{exit, fork, sbrk, waitpid};

static mut GLOBAL: [u8; 8192] = [0; 8192];

#[no_mangle]
fn main() -> i32 {
    let heap = sbrk(4096) as usize;
    assert!(heap as isize > 0);
    let heap_ptr = heap as *mut u8;
    let mut local = [1u32; 256];
    unsafe {
        GLOBAL[4096] = 42;
        heap_ptr.write_volatile(0x5a);
    }
    let pid = fork();
    if pid == 0 {
        unsafe {
            assert_eq!(GLOBAL[4096], 42);
            assert_eq!(heap_ptr.read_volatile(), 0x5a);
            GLOBAL[4096] = 0;
            heap_ptr.write_volatile(0);
        }
        assert_eq!(local[255], 1);
        local[255] = 2;
        exit(local[255] as i32);
    }
    let mut exit_code: i32 = 0;
    assert_eq!(waitpid(pid, &mut exit_code), pid);
    assert_eq!(exit_code, 2);
    // 子进程的修改不影响父进程
    unsafe {
        assert_eq!(GLOBAL[4096], 42);
        assert_eq!(heap_ptr.read_volatile(), 0x5a);
    }
    assert_eq!(local[255], 1);
    println!("fork_copy pass.");
    0
}
