//! `__switch` 的Rust接口

use super::TaskContext;
use core::arch::global_asm;

global_asm!(include_str!("switch.S"));

extern "C" {
    /// 把当前的 `ra`、`sp` 和 `s0~s11` 保存到 `current_task_cx_ptr`，
    /// 再从 `next_task_cx_ptr` 恢复，返回时已经在另一个控制流上
    pub fn __switch(current_task_cx_ptr: *mut TaskContext, next_task_cx_ptr: *const TaskContext);
}
