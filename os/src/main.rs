//! 内核入口
//!
//! 启动顺序：清空bss、初始化日志、建立并启用内核地址空间、执行内核自检、
//! 设置Trap入口、把初始进程放入就绪队列，最后进入idle控制流开始调度。

#![no_std]
#![no_main]

extern crate alloc;

use core::arch::global_asm;
use log::*;

#[macro_use]
mod console;
mod config;
mod fs;
mod lang_items;
mod loader;
mod logging;
mod mm;
mod sbi;
mod stack_trace;
mod sync;
mod syscall;
mod task;
mod timer;
mod trap;

#[path = "board/qemu.rs"]
mod board;

global_asm!(include_str!("entry.asm"));
global_asm!(include_str!(concat!(env!("OUT_DIR"), "/link_app.S")));

/// bss段清零
fn clear_bss() {
    extern "C" {
        fn sbss();
        fn ebss();
    }
    (sbss as usize..ebss as usize).for_each(|a| unsafe { (a as *mut u8).write_volatile(0) });
}

#[no_mangle]
/// 内核主函数
pub fn rust_main() -> ! {
    clear_bss();
    logging::init();
    println!("[kernel] Hello, world!");
    mm::init();
    info!("[kernel] kernel space activated");
    mm::self_test();
    trap::init();
    task::add_initproc();
    info!("[kernel] init process added to the ready queue");
    fs::pipe_test();
    task::self_test();
    trap::enable_timer_interrupt();
    timer::set_next_trigger();
    loader::list_apps();
    task::run_tasks();
}
