//! 实现系统调用
//!
//! 用户态执行 `ecall` 后处理器产生“来自U态的环境调用”异常，
//! [`crate::trap::trap_handler`] 把它交给这里的 [`syscall`] 分发。
//!
//! 每个系统调用都实现为一个 `sys_` 开头的函数，按类别放在子模块中。
//! 系统调用号与RISC-V Linux保持一致。

const SYSCALL_DUP: usize = 24;
const SYSCALL_CLOSE: usize = 57;
const SYSCALL_PIPE: usize = 59;
const SYSCALL_READ: usize = 63;
const SYSCALL_WRITE: usize = 64;
const SYSCALL_EXIT: usize = 93;
const SYSCALL_YIELD: usize = 124;
const SYSCALL_SET_PRIORITY: usize = 140;
const SYSCALL_GET_TIME: usize = 169;
const SYSCALL_GETPID: usize = 172;
const SYSCALL_SBRK: usize = 214;
const SYSCALL_MUNMAP: usize = 215;
const SYSCALL_FORK: usize = 220;
const SYSCALL_EXEC: usize = 221;
const SYSCALL_MMAP: usize = 222;
const SYSCALL_WAITPID: usize = 260;
const SYSCALL_SPAWN: usize = 400;
const SYSCALL_TASK_INFO: usize = 410;

mod fs;
mod process;

use self::fs::*;
use self::process::*;
use crate::task::current_task;

/// 处理通用的所有系统调用，这里是所有系统调用的最高抽象入口
pub fn syscall(syscall_id: usize, args: [usize; 3]) -> isize {
    if let Some(task) = current_task() {
        task.inner_exclusive_access()
            .statistics
            .record_syscall(syscall_id);
    }
    match syscall_id {
        SYSCALL_DUP => sys_dup(args[0]),
        SYSCALL_CLOSE => sys_close(args[0]),
        SYSCALL_PIPE => sys_pipe(args[0] as *mut usize),
        SYSCALL_READ => sys_read(args[0], args[1] as *mut u8, args[2]),
        SYSCALL_WRITE => sys_write(args[0], args[1] as *const u8, args[2]),
        SYSCALL_EXIT => sys_exit(args[0] as i32),
        SYSCALL_YIELD => sys_yield(),
        SYSCALL_GET_TIME => sys_get_time(args[0] as *mut TimeVal, args[1]),
        SYSCALL_GETPID => sys_getpid(),
        SYSCALL_SBRK => sys_sbrk(args[0] as i32),
        SYSCALL_MUNMAP => sys_munmap(args[0], args[1]),
        SYSCALL_FORK => sys_fork(),
        SYSCALL_EXEC => sys_exec(args[0] as *const u8),
        SYSCALL_MMAP => sys_mmap(args[0], args[1], args[2]),
        SYSCALL_WAITPID => sys_waitpid(args[0] as isize, args[1] as *mut i32),
        SYSCALL_SPAWN => sys_spawn(args[0] as *const u8),
        SYSCALL_SET_PRIORITY => sys_set_priority(args[0] as isize),
        SYSCALL_TASK_INFO => sys_task_info(args[0] as *mut TaskInfo),
        _ => {
            log::warn!("[kernel] unsupported syscall_id: {}", syscall_id);
            -1
        }
    }
}
