//! 进程管理相关的系统调用

use crate::loader::get_app_data_by_name;
use crate::mm::{copy_to_user, translated_str, translated_writable_buffer, MapPermission};
use core::mem::size_of;
use crate::config::MAX_SYSCALL_NUM;
use crate::task::{
    add_task, current_task, current_user_token, exit_current_and_run_next,
    suspend_current_and_run_next, TaskStatus, WaitResult,
};
use crate::timer::get_time_us;

/// 秒与微秒表示的时间
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct TimeVal {
    pub sec: usize,
    pub usec: usize,
}

/// 当前进程的运行信息
#[repr(C)]
#[derive(Clone, Copy)]
pub struct TaskInfo {
    pub status: TaskStatus,
    /// 各系统调用被调用的次数，下标为系统调用号
    pub syscall_times: [u32; MAX_SYSCALL_NUM],
    /// 从第一次被调度到现在经过的毫秒数
    pub time: usize,
}

/// 退出当前进程
pub fn sys_exit(exit_code: i32) -> ! {
    exit_current_and_run_next(exit_code);
    panic!("Unreachable in sys_exit!");
}

/// 主动让出处理器
pub fn sys_yield() -> isize {
    suspend_current_and_run_next();
    0
}

/// 把当前时间写入 `ts`
pub fn sys_get_time(ts: *mut TimeVal, _tz: usize) -> isize {
    let us = get_time_us();
    let time_val = TimeVal {
        sec: us / 1_000_000,
        usec: us % 1_000_000,
    };
    match copy_to_user(current_user_token(), ts, &time_val) {
        Some(()) => 0,
        None => -1,
    }
}

pub fn sys_getpid() -> isize {
    current_task().expect("no running task").getpid() as isize
}

/// 移动program break，返回旧的program break
pub fn sys_sbrk(size: i32) -> isize {
    let task = current_task().expect("no running task");
    match task.change_program_brk(size) {
        Some(old_brk) => old_brk as isize,
        None => -1,
    }
}

/// 复制当前进程，父进程返回子进程号，子进程返回0
pub fn sys_fork() -> isize {
    let current_task = current_task().expect("no running task");
    let new_task = match current_task.fork() {
        Ok(task) => task,
        Err(err) => {
            log::warn!("[kernel] pid {} fork failed: {}", current_task.getpid(), err);
            return -1;
        }
    };
    let new_pid = new_task.getpid();
    let trap_cx = new_task.inner_exclusive_access().get_trap_cx();
    // 子进程中fork的返回值为0
    trap_cx.x[10] = 0;
    add_task(new_task);
    new_pid as isize
}

/// 用名为 `path` 的程序替换当前进程，失败时返回-1且进程不受影响
pub fn sys_exec(path: *const u8) -> isize {
    let token = current_user_token();
    let Some(path) = translated_str(token, path) else {
        return -1;
    };
    let Some(data) = get_app_data_by_name(path.as_str()) else {
        log::warn!("[kernel] exec: no program named {:?}", path);
        return -1;
    };
    let task = current_task().expect("no running task");
    match task.exec(data) {
        // 返回值会被写入新的Trap上下文的a0
        Ok(()) => 0,
        Err(err) => {
            log::warn!("[kernel] exec {:?} failed: {}", path, err);
            -1
        }
    }
}

/// 直接从名为 `path` 的程序创建子进程，返回子进程号
pub fn sys_spawn(path: *const u8) -> isize {
    let token = current_user_token();
    let Some(path) = translated_str(token, path) else {
        return -1;
    };
    let Some(data) = get_app_data_by_name(path.as_str()) else {
        log::warn!("[kernel] spawn: no program named {:?}", path);
        return -1;
    };
    let task = current_task().expect("no running task");
    match task.spawn(data) {
        Ok(child) => {
            let pid = child.getpid();
            add_task(child);
            pid as isize
        }
        Err(err) => {
            log::warn!("[kernel] spawn {:?} failed: {}", path, err);
            -1
        }
    }
}

/// 回收已退出的子进程
///
/// 没有符合条件的子进程时返回-1，子进程还在运行时返回-2，
/// 否则返回子进程号并把退出码写入 `exit_code_ptr`（为空指针时不写）。
pub fn sys_waitpid(pid: isize, exit_code_ptr: *mut i32) -> isize {
    let task = current_task().expect("no running task");
    let token = task.inner_exclusive_access().get_user_token();
    // 先检查退出码能否写回，写不进去时子进程保持僵尸状态等待下一次回收
    if !exit_code_ptr.is_null()
        && translated_writable_buffer(token, exit_code_ptr as *mut u8, size_of::<i32>()).is_none()
    {
        return -1;
    }
    match task.waitpid(pid) {
        WaitResult::Exited { pid, exit_code } => {
            if !exit_code_ptr.is_null() {
                copy_to_user(token, exit_code_ptr, &exit_code)
                    .expect("exit code pointer was checked before reaping");
            }
            pid as isize
        }
        WaitResult::Running => -2,
        WaitResult::NoSuchChild => -1,
    }
}

/// 在 `[start, start + len)` 建立匿名映射，`port` 的第0~2位依次为读、写、执行权限
pub fn sys_mmap(start: usize, len: usize, port: usize) -> isize {
    if port & !0x7 != 0 || port & 0x7 == 0 {
        return -1;
    }
    let perm = MapPermission::from_bits_truncate((port << 1) as u8);
    let task = current_task().expect("no running task");
    let mut inner = task.inner_exclusive_access();
    match inner.memory_set.mmap(start, len, perm) {
        Ok(()) => 0,
        Err(err) => {
            log::debug!("[kernel] mmap({:#x}, {:#x}) failed: {}", start, len, err);
            -1
        }
    }
}

/// 解除 `[start, start + len)` 的映射，该范围必须恰好是一次mmap建立的
pub fn sys_munmap(start: usize, len: usize) -> isize {
    let task = current_task().expect("no running task");
    let mut inner = task.inner_exclusive_access();
    match inner.memory_set.munmap(start, len) {
        Ok(()) => 0,
        Err(err) => {
            log::debug!("[kernel] munmap({:#x}, {:#x}) failed: {}", start, len, err);
            -1
        }
    }
}

/// 进程优先级不参与调度，总是失败
pub fn sys_set_priority(_prio: isize) -> isize {
    -1
}

/// 把当前进程的系统调用次数和运行时间写入 `ti`，本次调用也计入
pub fn sys_task_info(ti: *mut TaskInfo) -> isize {
    let task = current_task().expect("no running task");
    let inner = task.inner_exclusive_access();
    let token = inner.get_user_token();
    let task_info = TaskInfo {
        status: TaskStatus::Running,
        syscall_times: inner.statistics.syscall_times,
        time: inner.statistics.running_time_ms(get_time_us()),
    };
    drop(inner);
    match copy_to_user(token, ti, &task_info) {
        Some(()) => 0,
        None => -1,
    }
}
