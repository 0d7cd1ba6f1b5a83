//! 就绪队列

use super::TaskControlBlock;
use crate::sync::UPSafeCell;
use alloc::collections::VecDeque;
use alloc::sync::Arc;
use lazy_static::*;

/// 先进先出的就绪队列，没有优先级
pub struct TaskManager<T> {
    ready_queue: VecDeque<T>,
}

impl<T> TaskManager<T> {
    pub fn new() -> Self {
        Self {
            ready_queue: VecDeque::new(),
        }
    }
    /// 加入队尾
    pub fn add(&mut self, task: T) {
        self.ready_queue.push_back(task);
    }
    /// 从队头取出
    pub fn fetch(&mut self) -> Option<T> {
        self.ready_queue.pop_front()
    }
    pub fn len(&self) -> usize {
        self.ready_queue.len()
    }
}

lazy_static! {
    pub static ref TASK_MANAGER: UPSafeCell<TaskManager<Arc<TaskControlBlock>>> =
        unsafe { UPSafeCell::new(TaskManager::new()) };
}

/// 把进程放入就绪队列
pub fn add_task(task: Arc<TaskControlBlock>) {
    TASK_MANAGER.exclusive_access().add(task);
}

/// 取出下一个就绪进程
pub fn fetch_task() -> Option<Arc<TaskControlBlock>> {
    TASK_MANAGER.exclusive_access().fetch()
}

#[allow(unused)]
/// 就绪队列的测试函数：先进先出，重新入队的任务排到队尾
pub fn task_manager_test() {
    let mut manager: TaskManager<usize> = TaskManager::new();
    assert!(manager.fetch().is_none());
    manager.add(1);
    manager.add(2);
    // 两个任务轮流被时钟打断：每次取出队头，运行后放回队尾
    let mut order = [0usize; 6];
    for slot in order.iter_mut() {
        let task = manager.fetch().unwrap();
        *slot = task;
        manager.add(task);
    }
    assert_eq!(order, [1, 2, 1, 2, 1, 2]);
    manager.add(3);
    assert_eq!(manager.len(), 3);
    assert_eq!(manager.fetch(), Some(1));
    assert_eq!(manager.fetch(), Some(2));
    assert_eq!(manager.fetch(), Some(3));
    assert!(manager.fetch().is_none());
    log::info!("task_manager_test passed!");
}
