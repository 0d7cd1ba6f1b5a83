//! 进程管理
//!
//! 进程的创建、切换、退出与回收都在这里实现：
//! - [`TaskControlBlock`] 记录一个进程的全部资源
//! - [`manager`] 是全局的就绪队列
//! - [`processor`] 记录当前运行的进程，并运行idle控制流
//!
//! 进程之间只通过 `__switch` 切换，它是内核中唯一的挂起点。

mod context;
mod manager;
mod pid;
mod processor;
mod switch;

#[allow(clippy::module_inception)]
mod task;

use crate::loader::get_app_data_by_name;
use crate::sbi::shutdown;
use alloc::sync::Arc;
use lazy_static::*;
use self::switch::__switch;

pub use self::context::TaskContext;
pub use self::manager::{add_task, fetch_task};
pub use self::processor::{current_task, current_trap_cx, current_user_token, run_tasks, schedule};
pub use self::task::{TaskControlBlock, TaskStatistics, TaskStatus, WaitResult};

/// 挂起当前进程，切换到下一个就绪进程
pub fn suspend_current_and_run_next() {
    let task = current_task().expect("no running task to suspend");
    let mut task_inner = task.inner_exclusive_access();
    let task_cx_ptr = &mut task_inner.task_cx as *mut TaskContext;
    task_inner.task_status = TaskStatus::Ready;
    drop(task_inner);
    // idle控制流取回当前进程后把它放回就绪队列末尾
    drop(task);
    schedule(task_cx_ptr);
}

/// 退出当前进程并切换到下一个就绪进程
///
/// 当前进程变为僵尸进程，它的子进程交给初始进程，用户空间的数据页立即释放；
/// 进程号和内核栈等到父进程回收时释放。初始进程退出时关机。
pub fn exit_current_and_run_next(exit_code: i32) {
    let task = current_task().expect("no running task to exit");
    let pid = task.getpid();
    if Arc::ptr_eq(&task, &INITPROC) {
        log::info!(
            "[kernel] init process exit with exit_code {}, shutting down",
            exit_code
        );
        shutdown(exit_code != 0);
    }
    let mut inner = task.inner_exclusive_access();
    inner.task_status = TaskStatus::Zombie;
    inner.exit_code = exit_code;
    {
        let mut initproc_inner = INITPROC.inner_exclusive_access();
        for child in inner.children.iter() {
            child.inner_exclusive_access().parent = Some(Arc::downgrade(&INITPROC));
            initproc_inner.children.push(child.clone());
        }
    }
    inner.children.clear();
    inner.fd_table.clear();
    inner.memory_set.recycle_data_pages();
    drop(inner);
    drop(task);
    log::debug!("[kernel] pid {} exited with code {}", pid, exit_code);
    // 僵尸进程不会再被调度，它的上下文不需要保存
    let mut _unused = TaskContext::zero_init();
    schedule(&mut _unused as *mut _);
}

lazy_static! {
    /// 初始进程，进程号为1
    pub static ref INITPROC: Arc<TaskControlBlock> = Arc::new(
        get_app_data_by_name("initproc")
            .ok_or(crate::mm::MmError::BadElf("initproc not found"))
            .and_then(TaskControlBlock::new)
            .expect("failed to create the init process")
    );
}

/// 把初始进程加入就绪队列
pub fn add_initproc() {
    add_task(INITPROC.clone());
}

#[allow(unused)]
/// exec失败时进程保持原样，成功时进程号和父子关系不变
fn exec_failure_test() {
    let Some(elf_data) = get_app_data_by_name("exit7") else {
        log::warn!("exec_failure_test skipped: exit7 is not linked");
        return;
    };
    let parent = Arc::new(TaskControlBlock::new(elf_data).unwrap());
    let child = parent.fork().unwrap();
    let pid = child.getpid();
    assert_ne!(pid, parent.getpid());
    let (token, sepc, sp) = {
        let inner = child.inner_exclusive_access();
        let trap_cx = inner.get_trap_cx();
        (inner.get_user_token(), trap_cx.sepc, trap_cx.x[2])
    };
    // exec前后子进程自己的子进程链接都不变
    let grandchild = child.fork().unwrap();
    let keeps_grandchild = || {
        let inner = child.inner_exclusive_access();
        assert!(inner.children.iter().any(|c| Arc::ptr_eq(c, &grandchild)));
        let linked = grandchild
            .inner_exclusive_access()
            .parent
            .as_ref()
            .and_then(|p| p.upgrade())
            .unwrap();
        assert!(Arc::ptr_eq(&linked, &child));
    };

    assert!(child.exec(&[0u8; 64]).is_err());
    keeps_grandchild();
    {
        let inner = child.inner_exclusive_access();
        assert_eq!(inner.get_user_token(), token);
        assert_eq!(inner.get_trap_cx().sepc, sepc);
        assert_eq!(inner.get_trap_cx().x[2], sp);
        let linked = inner.parent.as_ref().and_then(|p| p.upgrade()).unwrap();
        assert!(Arc::ptr_eq(&linked, &parent));
    }
    assert_eq!(child.getpid(), pid);

    child.exec(elf_data).unwrap();
    assert_eq!(child.getpid(), pid);
    keeps_grandchild();
    assert_ne!(child.inner_exclusive_access().get_user_token(), token);
    assert_eq!(
        child.inner_exclusive_access().get_trap_cx().kernel_sp,
        child.kernel_stack.get_top()
    );
    assert!(parent
        .inner_exclusive_access()
        .children
        .iter()
        .any(|c| Arc::ptr_eq(c, &child)));

    // 子进程未退出、不存在的子进程、已退出三种情况
    assert_eq!(parent.waitpid(pid as isize), WaitResult::Running);
    assert_eq!(parent.waitpid(pid as isize + 1000), WaitResult::NoSuchChild);
    {
        let mut inner = child.inner_exclusive_access();
        inner.task_status = TaskStatus::Zombie;
        inner.exit_code = 7;
    }
    drop(child);
    assert_eq!(
        parent.waitpid(-1),
        WaitResult::Exited { pid, exit_code: 7 }
    );
    assert_eq!(parent.waitpid(-1), WaitResult::NoSuchChild);

    let spawned = parent.spawn(elf_data).unwrap();
    let spawned_parent = spawned
        .inner_exclusive_access()
        .parent
        .as_ref()
        .and_then(|p| p.upgrade())
        .unwrap();
    assert!(Arc::ptr_eq(&spawned_parent, &parent));
    log::info!("exec_failure_test passed!");
}

#[allow(unused)]
/// 系统调用计数与运行时间的测试函数
fn task_statistics_test() {
    let mut statistics = TaskStatistics::zero_init();
    assert_eq!(statistics.running_time_ms(5_000), 0);
    statistics.record_syscall(64);
    statistics.record_syscall(64);
    statistics.record_syscall(410);
    // 超出统计范围的调用号被忽略
    statistics.record_syscall(usize::MAX);
    assert_eq!(statistics.syscall_times[64], 2);
    assert_eq!(statistics.syscall_times[410], 1);
    assert_eq!(statistics.syscall_times.iter().sum::<u32>(), 3);
    statistics.first_run_time = Some(1_000);
    assert_eq!(statistics.running_time_ms(26_999), 25);
    log::info!("task_statistics_test passed!");
}

/// 进程管理的自检，在初始进程加入就绪队列之后执行
pub fn self_test() {
    manager::task_manager_test();
    task_statistics_test();
    exec_failure_test();
}
