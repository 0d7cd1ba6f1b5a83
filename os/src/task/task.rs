//! 进程控制块

use super::pid::{pid_alloc, KernelStack, PidHandle};
use super::TaskContext;
use crate::config::{MAX_SYSCALL_NUM, TRAP_CONTEXT};
use crate::fs::{File, Stdin, Stdout};
use crate::mm::{kernel_token, MemorySet, MmError, MmResult, PhysPageNum, VirtAddr};
use crate::sync::{UPRefMut, UPSafeCell};
use crate::trap::{trap_handler, TrapContext};
use alloc::sync::{Arc, Weak};
use alloc::vec;
use alloc::vec::Vec;

/// 进程控制块
///
/// 进程号和内核栈在整个生命周期内不变，其余可变状态都放在 `inner` 里。
pub struct TaskControlBlock {
    pub pid: PidHandle,
    pub kernel_stack: KernelStack,
    inner: UPSafeCell<TaskControlBlockInner>,
}

/// 文件描述符表
pub type FdTable = Vec<Option<Arc<dyn File + Send + Sync>>>;

pub struct TaskControlBlockInner {
    /// Trap上下文所在的物理页号
    pub trap_cx_ppn: PhysPageNum,
    pub task_cx: TaskContext,
    pub task_status: TaskStatus,
    pub memory_set: MemorySet,
    /// 父进程只以弱引用保存，生命周期由父进程的 `children` 决定
    pub parent: Option<Weak<TaskControlBlock>>,
    pub children: Vec<Arc<TaskControlBlock>>,
    pub exit_code: i32,
    pub fd_table: FdTable,
    /// 堆底地址
    pub heap_bottom: usize,
    pub program_brk: usize,
    pub statistics: TaskStatistics,
}

/// 进程的运行统计：各系统调用的次数以及第一次被调度的时刻
#[derive(Clone, Copy)]
pub struct TaskStatistics {
    pub syscall_times: [u32; MAX_SYSCALL_NUM],
    /// 第一次被调度时的时间（微秒），还没运行过时为None
    pub first_run_time: Option<usize>,
}

impl TaskStatistics {
    pub fn zero_init() -> Self {
        Self {
            syscall_times: [0; MAX_SYSCALL_NUM],
            first_run_time: None,
        }
    }
    /// 记录一次系统调用，超出范围的调用号不计数
    pub fn record_syscall(&mut self, syscall_id: usize) {
        if let Some(times) = self.syscall_times.get_mut(syscall_id) {
            *times += 1;
        }
    }
    /// 从第一次被调度到现在经过的毫秒数
    pub fn running_time_ms(&self, now_us: usize) -> usize {
        self.first_run_time
            .map_or(0, |first| now_us.saturating_sub(first) / 1000)
    }
}

impl TaskControlBlockInner {
    pub fn get_trap_cx(&self) -> &'static mut TrapContext {
        self.trap_cx_ppn.get_mut()
    }
    pub fn get_user_token(&self) -> usize {
        self.memory_set.token()
    }
    fn get_status(&self) -> TaskStatus {
        self.task_status
    }
    pub fn is_zombie(&self) -> bool {
        self.get_status() == TaskStatus::Zombie
    }
    /// 分配最小的空闲文件描述符
    pub fn alloc_fd(&mut self) -> usize {
        if let Some(fd) = (0..self.fd_table.len()).find(|fd| self.fd_table[*fd].is_none()) {
            fd
        } else {
            self.fd_table.push(None);
            self.fd_table.len() - 1
        }
    }
}

/// [`TaskControlBlock::waitpid`] 的结果
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WaitResult {
    /// 子进程已退出并被回收
    Exited { pid: usize, exit_code: i32 },
    /// 符合条件的子进程存在但还没有退出
    Running,
    /// 没有符合条件的子进程
    NoSuchChild,
}

/// 从 `memory_set` 中找到Trap上下文所在的物理页
fn trap_cx_ppn_of(memory_set: &MemorySet) -> MmResult<PhysPageNum> {
    let trap_cx_vpn = VirtAddr::from(TRAP_CONTEXT).floor();
    memory_set
        .translate(trap_cx_vpn)
        .map(|pte| pte.ppn())
        .ok_or(MmError::NotMapped(trap_cx_vpn))
}

fn standard_fd_table() -> FdTable {
    vec![
        // 0 -> stdin
        Some(Arc::new(Stdin)),
        // 1 -> stdout
        Some(Arc::new(Stdout)),
        // 2 -> stderr
        Some(Arc::new(Stdout)),
    ]
}

impl TaskControlBlock {
    pub fn inner_exclusive_access(&self) -> UPRefMut<'_, TaskControlBlockInner> {
        self.inner.exclusive_access()
    }
    pub fn getpid(&self) -> usize {
        self.pid.0
    }
    /// 从程序镜像创建一个没有父进程的新进程
    pub fn new(elf_data: &[u8]) -> MmResult<Self> {
        let (memory_set, user_sp, entry_point) = MemorySet::from_elf(elf_data)?;
        let trap_cx_ppn = trap_cx_ppn_of(&memory_set)?;
        let pid_handle = pid_alloc()?;
        let kernel_stack = KernelStack::new(&pid_handle)?;
        let kernel_stack_top = kernel_stack.get_top();
        let task_control_block = Self {
            pid: pid_handle,
            kernel_stack,
            inner: unsafe {
                UPSafeCell::new(TaskControlBlockInner {
                    trap_cx_ppn,
                    task_cx: TaskContext::goto_trap_return(kernel_stack_top),
                    task_status: TaskStatus::Ready,
                    memory_set,
                    parent: None,
                    children: Vec::new(),
                    exit_code: 0,
                    fd_table: standard_fd_table(),
                    heap_bottom: user_sp,
                    program_brk: user_sp,
                    statistics: TaskStatistics::zero_init(),
                })
            },
        };
        let trap_cx = task_control_block.inner_exclusive_access().get_trap_cx();
        *trap_cx = TrapContext::app_init_context(
            entry_point,
            user_sp,
            kernel_token(),
            kernel_stack_top,
            trap_handler as usize,
        );
        Ok(task_control_block)
    }
    /// 用新的程序镜像替换当前进程的地址空间
    ///
    /// 进程号、内核栈、父子关系和文件描述符表保持不变。镜像解析失败时进程保持原样。
    pub fn exec(&self, elf_data: &[u8]) -> MmResult<()> {
        let (memory_set, user_sp, entry_point) = MemorySet::from_elf(elf_data)?;
        let trap_cx_ppn = trap_cx_ppn_of(&memory_set)?;
        let mut inner = self.inner_exclusive_access();
        // 旧地址空间在这里被释放
        inner.memory_set = memory_set;
        inner.trap_cx_ppn = trap_cx_ppn;
        inner.heap_bottom = user_sp;
        inner.program_brk = user_sp;
        let trap_cx = inner.get_trap_cx();
        *trap_cx = TrapContext::app_init_context(
            entry_point,
            user_sp,
            kernel_token(),
            self.kernel_stack.get_top(),
            trap_handler as usize,
        );
        log::debug!("[kernel] pid {} exec, entry = {:#x}", self.getpid(), entry_point);
        Ok(())
    }
    /// 复制当前进程，新进程作为当前进程的子进程
    ///
    /// 返回的子进程Trap上下文与父进程相同，调用者负责修改子进程的返回值。
    pub fn fork(self: &Arc<Self>) -> MmResult<Arc<Self>> {
        let mut parent_inner = self.inner_exclusive_access();
        let memory_set = MemorySet::from_existing_user(&parent_inner.memory_set)?;
        let trap_cx_ppn = trap_cx_ppn_of(&memory_set)?;
        let pid_handle = pid_alloc()?;
        let kernel_stack = KernelStack::new(&pid_handle)?;
        let kernel_stack_top = kernel_stack.get_top();
        // 共享打开的文件，描述符槽位相互独立
        let fd_table = parent_inner.fd_table.clone();
        let task_control_block = Arc::new(TaskControlBlock {
            pid: pid_handle,
            kernel_stack,
            inner: unsafe {
                UPSafeCell::new(TaskControlBlockInner {
                    trap_cx_ppn,
                    task_cx: TaskContext::goto_trap_return(kernel_stack_top),
                    task_status: TaskStatus::Ready,
                    memory_set,
                    parent: Some(Arc::downgrade(self)),
                    children: Vec::new(),
                    exit_code: 0,
                    fd_table,
                    heap_bottom: parent_inner.heap_bottom,
                    program_brk: parent_inner.program_brk,
                    statistics: TaskStatistics::zero_init(),
                })
            },
        });
        parent_inner.children.push(task_control_block.clone());
        // 子进程陷入内核时要使用自己的内核栈
        let trap_cx = task_control_block.inner_exclusive_access().get_trap_cx();
        trap_cx.kernel_sp = kernel_stack_top;
        log::debug!(
            "[kernel] pid {} forked pid {}",
            self.getpid(),
            task_control_block.getpid()
        );
        Ok(task_control_block)
    }
    /// 直接从程序镜像创建当前进程的子进程，不复制当前地址空间
    pub fn spawn(self: &Arc<Self>, elf_data: &[u8]) -> MmResult<Arc<Self>> {
        let child = Arc::new(Self::new(elf_data)?);
        child.inner_exclusive_access().parent = Some(Arc::downgrade(self));
        self.inner_exclusive_access().children.push(child.clone());
        log::debug!("[kernel] pid {} spawned pid {}", self.getpid(), child.getpid());
        Ok(child)
    }
    /// 回收一个已退出的子进程；`pid` 为 -1 时匹配任意子进程
    pub fn waitpid(&self, pid: isize) -> WaitResult {
        let mut inner = self.inner_exclusive_access();
        let matches = |child: &Arc<TaskControlBlock>| pid == -1 || pid as usize == child.getpid();
        if !inner.children.iter().any(matches) {
            return WaitResult::NoSuchChild;
        }
        let zombie = inner
            .children
            .iter()
            .position(|child| child.inner_exclusive_access().is_zombie() && matches(child));
        match zombie {
            Some(idx) => {
                let child = inner.children.remove(idx);
                // 从子进程列表移除后这里是最后一个引用
                assert_eq!(Arc::strong_count(&child), 1);
                let found_pid = child.getpid();
                let exit_code = child.inner_exclusive_access().exit_code;
                log::debug!(
                    "[kernel] pid {} reaped pid {} (exit code {})",
                    self.getpid(),
                    found_pid,
                    exit_code
                );
                WaitResult::Exited {
                    pid: found_pid,
                    exit_code,
                }
            }
            None => WaitResult::Running,
        }
    }
    /// 移动program break，返回旧的program break；越过堆底或映射失败时返回None
    pub fn change_program_brk(&self, size: i32) -> Option<usize> {
        let mut inner = self.inner_exclusive_access();
        let heap_bottom = inner.heap_bottom;
        let old_break = inner.program_brk;
        let new_brk = old_break as isize + size as isize;
        if new_brk < heap_bottom as isize {
            return None;
        }
        let result = if size < 0 {
            inner
                .memory_set
                .shrink_to(VirtAddr(heap_bottom), VirtAddr(new_brk as usize))
        } else {
            inner
                .memory_set
                .append_to(VirtAddr(heap_bottom), VirtAddr(new_brk as usize))
        };
        match result {
            Ok(()) => {
                inner.program_brk = new_brk as usize;
                Some(old_break)
            }
            Err(err) => {
                log::debug!("[kernel] pid {} sbrk({}) failed: {}", self.getpid(), size, err);
                None
            }
        }
    }
}

#[derive(Copy, Clone, PartialEq, Debug)]
#[repr(usize)]
/// task status: Ready, Running, Zombie
pub enum TaskStatus {
    /// 就绪态
    Ready,
    /// 运行态
    Running,
    /// 已退出、等待父进程回收
    Zombie,
}
