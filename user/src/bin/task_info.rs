//! 系统调用计数、运行时间，以及不支持的优先级设置

#![no_std]
#![no_main]

#[macro_use]
extern crate user_lib;

use user_lib::{
    exit, fork, get_time, set_priority, sleep, task_info, waitpid, yield_, TaskInfo, TaskStatus,
};

const SYSCALL_WRITE: usize = 64;
const SYSCALL_YIELD: usize = 124;
const SYSCALL_SET_PRIORITY: usize = 140;
const SYSCALL_GET_TIME: usize = 169;
const SYSCALL_FORK: usize = 220;
const SYSCALL_TASK_INFO: usize = 410;

#[no_mangle]
fn main() -> i32 {
    assert_eq!(set_priority(16), -1);
    get_time();
    let mut info = TaskInfo::new();
    assert_eq!(task_info(&mut info), 0);
    // 查询本身也计入
    assert_eq!(info.status, TaskStatus::Running);
    assert_eq!(info.syscall_times[SYSCALL_SET_PRIORITY], 1);
    assert_eq!(info.syscall_times[SYSCALL_GET_TIME], 1);
    assert_eq!(info.syscall_times[SYSCALL_TASK_INFO], 1);
    assert_eq!(info.syscall_times[SYSCALL_WRITE], 0);
    assert_eq!(info.syscall_times[SYSCALL_YIELD], 0);

    println!("task_info: first query done");
    yield_();
    yield_();
    sleep(30);
    let mut later = TaskInfo::new();
    assert_eq!(task_info(&mut later), 0);
    assert!(later.syscall_times[SYSCALL_WRITE] >= 1);
    assert!(later.syscall_times[SYSCALL_YIELD] >= 2);
    assert!(later.syscall_times[SYSCALL_GET_TIME] >= 3);
    assert_eq!(later.syscall_times[SYSCALL_TASK_INFO], 2);
    assert!(later.time >= 20, "running time {}ms", later.time);

    // 子进程的统计从零开始
    let pid = fork();
    if pid == 0 {
        let mut child = TaskInfo::new();
        assert_eq!(task_info(&mut child), 0);
        assert_eq!(child.syscall_times[SYSCALL_FORK], 0);
        assert_eq!(child.syscall_times[SYSCALL_TASK_INFO], 1);
        exit(0);
    }
    let mut exit_code = -1;
    assert_eq!(waitpid(pid, &mut exit_code), pid);
    assert_eq!(exit_code, 0);
    println!("task_info pass.");
    0
}
