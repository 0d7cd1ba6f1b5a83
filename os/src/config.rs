//! 设置全局使用的常量

pub const USER_STACK_SIZE: usize = 4096 * 2;
pub const KERNEL_STACK_SIZE: usize = 4096 * 2;
pub const KERNEL_HEAP_SIZE: usize = 0x30_0000;
pub const PAGE_SIZE: usize = 0x1000;
pub const PAGE_SIZE_BITS: usize = 0xc;

/// 跳板页位于虚拟地址空间的最高页，所有地址空间共享
pub const TRAMPOLINE: usize = usize::MAX - PAGE_SIZE + 1;
/// Trap上下文位于跳板页之下，仅内核可读写
pub const TRAP_CONTEXT: usize = TRAMPOLINE - PAGE_SIZE;

/// 用户程序只能使用SV39的低半空间，高半空间留给跳板页、Trap上下文和内核栈
pub const USER_SPACE_END: usize = 1 << 38;

/// 进程号上限，同时也限制了内核栈在内核地址空间中能够占用的槽位数
pub const MAX_PID: usize = 4096;
/// 参与统计的系统调用号上限
pub const MAX_SYSCALL_NUM: usize = 500;
/// 管道环形缓冲区大小
pub const PIPE_BUFFER_SIZE: usize = 32;

/// 返回内核空间中pid对应的内核栈的栈底地址和栈顶地址
/// 相邻两个内核栈之间留有一个保护页
pub fn kernel_stack_position(pid: usize) -> (usize, usize) {
    let top = TRAMPOLINE - pid * (KERNEL_STACK_SIZE + PAGE_SIZE);
    let bottom = top - KERNEL_STACK_SIZE;
    (bottom, top)
}

// 本操作系统采用qemu模拟器运行，此处记录qemu的时钟频率
pub use crate::board::{CLOCK_FREQ, MEMORY_END, MMIO};
