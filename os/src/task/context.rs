//! 任务上下文：`__switch` 保存和恢复的寄存器

use crate::trap::trap_return;

/// 任务上下文
///
/// 只需要保存返回地址、栈指针和被调用者保存的 `s0~s11`，
/// 其余寄存器在调用 `__switch` 时已经由编译器按调用约定保存。
#[derive(Clone, Copy)]
#[repr(C)]
pub struct TaskContext {
    ra: usize,
    sp: usize,
    s: [usize; 12],
}

impl TaskContext {
    /// 全零的任务上下文，用于idle控制流和退出的进程
    pub fn zero_init() -> Self {
        TaskContext {
            ra: 0,
            sp: 0,
            s: [0; 12],
        }
    }
    /// 新进程第一次被调度时从 `trap_return` 开始执行，进而返回用户态
    pub fn goto_trap_return(kstack_ptr: usize) -> Self {
        Self {
            ra: trap_return as usize,
            sp: kstack_ptr,
            s: [0; 12],
        }
    }
}
