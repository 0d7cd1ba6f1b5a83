//! 处理器状态与调度循环
//!
//! 每个处理器有一个idle控制流，它运行 [`run_tasks`]：不断从就绪队列中取出进程并切换过去。
//! 进程通过 [`schedule`] 切回idle控制流，idle控制流再根据进程状态决定它的去向。

use super::__switch;
use super::{add_task, fetch_task, TaskStatus};
use super::{TaskContext, TaskControlBlock};
use crate::sync::UPSafeCell;
use crate::timer::get_time_us;
use crate::trap::TrapContext;
use alloc::sync::Arc;
use core::arch::asm;
use lazy_static::*;

/// 处理器管理结构
pub struct Processor {
    /// 当前处理器上正在执行的进程
    current: Option<Arc<TaskControlBlock>>,
    /// idle控制流的任务上下文
    idle_task_cx: TaskContext,
}

impl Processor {
    pub fn new() -> Self {
        Self {
            current: None,
            idle_task_cx: TaskContext::zero_init(),
        }
    }
    fn get_idle_task_cx_ptr(&mut self) -> *mut TaskContext {
        &mut self.idle_task_cx as *mut _
    }
    pub fn take_current(&mut self) -> Option<Arc<TaskControlBlock>> {
        self.current.take()
    }
    pub fn current(&self) -> Option<Arc<TaskControlBlock>> {
        self.current.as_ref().map(Arc::clone)
    }
}

lazy_static! {
    pub static ref PROCESSOR: UPSafeCell<Processor> = unsafe { UPSafeCell::new(Processor::new()) };
}

/// idle控制流：取出就绪进程并切换过去，进程切回时按状态处理它
pub fn run_tasks() -> ! {
    loop {
        let Some(task) = fetch_task() else {
            // 就绪队列为空，等待中断
            unsafe { asm!("wfi") };
            continue;
        };
        let mut processor = PROCESSOR.exclusive_access();
        let idle_task_cx_ptr = processor.get_idle_task_cx_ptr();
        let mut task_inner = task.inner_exclusive_access();
        let next_task_cx_ptr = &task_inner.task_cx as *const TaskContext;
        task_inner.task_status = TaskStatus::Running;
        if task_inner.statistics.first_run_time.is_none() {
            task_inner.statistics.first_run_time = Some(get_time_us());
        }
        drop(task_inner);
        processor.current = Some(task);
        // 切换前必须归还所有独占借用
        drop(processor);
        unsafe {
            __switch(idle_task_cx_ptr, next_task_cx_ptr);
        }
        // 进程让出或退出后回到这里
        let Some(task) = PROCESSOR.exclusive_access().take_current() else {
            continue;
        };
        let status = task.inner_exclusive_access().task_status;
        match status {
            TaskStatus::Ready => add_task(task),
            TaskStatus::Zombie => {
                // 父进程的子进程列表持有最后一个引用，回收时释放
                drop(task);
            }
            TaskStatus::Running => {
                panic!("pid {} switched out while running", task.getpid())
            }
        }
    }
}

/// 当前进程的一份引用
pub fn current_task() -> Option<Arc<TaskControlBlock>> {
    PROCESSOR.exclusive_access().current()
}

/// 当前进程地址空间的token
pub fn current_user_token() -> usize {
    let task = current_task().expect("no running task");
    let token = task.inner_exclusive_access().get_user_token();
    token
}

/// 当前进程的Trap上下文
pub fn current_trap_cx() -> &'static mut TrapContext {
    current_task()
        .expect("no running task")
        .inner_exclusive_access()
        .get_trap_cx()
}

/// 保存当前进程的上下文到 `switched_task_cx_ptr`，切换回idle控制流
pub fn schedule(switched_task_cx_ptr: *mut TaskContext) {
    let mut processor = PROCESSOR.exclusive_access();
    let idle_task_cx_ptr = processor.get_idle_task_cx_ptr();
    drop(processor);
    unsafe {
        __switch(switched_task_cx_ptr, idle_task_cx_ptr);
    }
}
