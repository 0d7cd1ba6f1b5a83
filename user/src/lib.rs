//! 用户库：程序入口、用户堆以及系统调用的封装

#![no_std]
#![feature(linkage)]

extern crate alloc;

#[macro_use]
pub mod console;
mod lang_items;
mod syscall;

use buddy_system_allocator::LockedHeap;
use core::ptr::addr_of_mut;
use syscall::*;

pub use syscall::{TaskInfo, TaskStatus, TimeVal, MAX_SYSCALL_NUM};

const USER_HEAP_SIZE: usize = 16384;

static mut HEAP_SPACE: [u8; USER_HEAP_SIZE] = [0; USER_HEAP_SIZE];

#[global_allocator]
static HEAP: LockedHeap = LockedHeap::empty();

#[no_mangle]
#[link_section = ".text.entry"]
pub extern "C" fn _start() -> ! {
    clear_bss();
    unsafe {
        HEAP.lock()
            .init(addr_of_mut!(HEAP_SPACE) as usize, USER_HEAP_SIZE);
    }
    exit(main());
}

#[linkage = "weak"]
#[no_mangle]
fn main() -> i32 {
    panic!("Cannot find main!");
}

fn clear_bss() {
    extern "C" {
        fn start_bss();
        fn end_bss();
    }
    (start_bss as usize..end_bss as usize).for_each(|addr| unsafe {
        (addr as *mut u8).write_volatile(0);
    });
}

pub fn dup(fd: usize) -> isize {
    sys_dup(fd)
}
pub fn close(fd: usize) -> isize {
    sys_close(fd)
}
/// 创建管道，`pipe_fd[0]` 为读端，`pipe_fd[1]` 为写端
pub fn pipe(pipe_fd: &mut [usize; 2]) -> isize {
    sys_pipe(pipe_fd)
}
pub fn read(fd: usize, buf: &mut [u8]) -> isize {
    sys_read(fd, buf)
}
pub fn write(fd: usize, buf: &[u8]) -> isize {
    sys_write(fd, buf)
}
pub fn exit(exit_code: i32) -> ! {
    sys_exit(exit_code)
}
pub fn yield_() -> isize {
    sys_yield()
}
/// 当前时间（毫秒）
pub fn get_time() -> isize {
    let mut time = TimeVal::default();
    match sys_get_time(&mut time) {
        0 => (time.sec * 1000 + time.usec / 1000) as isize,
        _ => -1,
    }
}
pub fn getpid() -> isize {
    sys_getpid()
}
/// 移动program break，返回旧的program break
pub fn sbrk(size: i32) -> isize {
    sys_sbrk(size)
}
/// `prot` 的第0~2位依次为读、写、执行权限
pub fn mmap(start: usize, len: usize, prot: usize) -> isize {
    sys_mmap(start, len, prot)
}
pub fn munmap(start: usize, len: usize) -> isize {
    sys_munmap(start, len)
}
pub fn fork() -> isize {
    sys_fork()
}
/// `path` 需要以 `\0` 结尾
pub fn exec(path: &str) -> isize {
    sys_exec(path)
}
/// `path` 需要以 `\0` 结尾
pub fn spawn(path: &str) -> isize {
    sys_spawn(path)
}
/// 等待任意一个子进程退出；没有子进程时返回-1
pub fn wait(exit_code: &mut i32) -> isize {
    waitpid(-1, exit_code)
}
/// 等待指定的子进程退出；它不是自己的子进程时返回-1
pub fn waitpid(pid: isize, exit_code: &mut i32) -> isize {
    loop {
        match sys_waitpid(pid, exit_code as *mut _) {
            -2 => {
                yield_();
            }
            exit_pid => return exit_pid,
        }
    }
}
/// 只查询一次，不等待：子进程还在运行时返回-2
pub fn try_waitpid(pid: isize, exit_code: *mut i32) -> isize {
    sys_waitpid(pid, exit_code)
}
pub fn set_priority(prio: isize) -> isize {
    sys_set_priority(prio)
}
pub fn task_info(info: &mut TaskInfo) -> isize {
    sys_task_info(info as *mut _)
}
/// 让出处理器直到经过 `period_ms` 毫秒
pub fn sleep(period_ms: usize) {
    let start = get_time();
    while get_time() < start + period_ms as isize {
        yield_();
    }
}
