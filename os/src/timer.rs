//! 时钟寄存器操作接口

use crate::config::CLOCK_FREQ;
use crate::sbi::set_timer;
use riscv::register::time;

const TICKS_PER_SEC: usize = 100;
const USEC_PER_SEC: usize = 1_000_000;

/// 获取当前时间,读取mtime寄存器
pub fn get_time() -> usize {
    time::read()
}

/// 获取当前时间到微秒数
pub fn get_time_us() -> usize {
    time::read() * USEC_PER_SEC / CLOCK_FREQ
}

/// 设置下一次时钟中断触发时间，即mtimecmp寄存器的值
pub fn set_next_trigger() {
    /* 时间片轮转
     * 仅仅只是设置下一次中断的时间
     * 每次在trap_handler中处理一次时钟中断时，就调用一次set_next_trigger()来设置周期性时间片*/
    set_timer(get_time() + CLOCK_FREQ / TICKS_PER_SEC);
}
