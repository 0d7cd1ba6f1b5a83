//! 进程号分配与按进程号放置的内核栈

use crate::config::{kernel_stack_position, MAX_PID};
use crate::mm::{MapPermission, MmError, MmResult, VirtAddr, KERNEL_SPACE};
use crate::sync::UPSafeCell;
use alloc::vec::Vec;
use lazy_static::*;

/// 栈式进程号分配器，回收的进程号优先复用
pub struct PidAllocator {
    current: usize,
    recycled: Vec<usize>,
}

impl PidAllocator {
    /// 进程号从1开始，1号进程是初始进程
    pub fn new() -> Self {
        PidAllocator {
            current: 1,
            recycled: Vec::new(),
        }
    }
    pub fn alloc(&mut self) -> Option<PidHandle> {
        if let Some(pid) = self.recycled.pop() {
            Some(PidHandle(pid))
        } else if self.current >= MAX_PID {
            None
        } else {
            self.current += 1;
            Some(PidHandle(self.current - 1))
        }
    }
    pub fn dealloc(&mut self, pid: usize) {
        assert!(pid < self.current);
        assert!(
            !self.recycled.iter().any(|ppid| *ppid == pid),
            "pid {} has been deallocated!",
            pid
        );
        self.recycled.push(pid);
    }
}

lazy_static! {
    pub static ref PID_ALLOCATOR: UPSafeCell<PidAllocator> =
        unsafe { UPSafeCell::new(PidAllocator::new()) };
}

/// 进程号句柄，drop时归还进程号
pub struct PidHandle(pub usize);

impl Drop for PidHandle {
    fn drop(&mut self) {
        PID_ALLOCATOR.exclusive_access().dealloc(self.0);
    }
}

/// 分配一个进程号，进程号用尽时返回 [`MmError::PidExhausted`]
pub fn pid_alloc() -> MmResult<PidHandle> {
    PID_ALLOCATOR
        .exclusive_session(|allocator| allocator.alloc())
        .ok_or(MmError::PidExhausted)
}

/// 进程的内核栈，位于内核地址空间的高处，由进程号决定位置
pub struct KernelStack {
    pid: usize,
}

impl KernelStack {
    /// 在内核地址空间中插入该进程的内核栈逻辑段
    pub fn new(pid_handle: &PidHandle) -> MmResult<Self> {
        let pid = pid_handle.0;
        let (kernel_stack_bottom, kernel_stack_top) = kernel_stack_position(pid);
        KERNEL_SPACE.exclusive_access().insert_framed_area(
            kernel_stack_bottom.into(),
            kernel_stack_top.into(),
            MapPermission::R | MapPermission::W,
        )?;
        Ok(KernelStack { pid })
    }
    /// 内核栈栈顶
    pub fn get_top(&self) -> usize {
        let (_, kernel_stack_top) = kernel_stack_position(self.pid);
        kernel_stack_top
    }
}

impl Drop for KernelStack {
    fn drop(&mut self) {
        let (kernel_stack_bottom, _) = kernel_stack_position(self.pid);
        let kernel_stack_bottom_va: VirtAddr = kernel_stack_bottom.into();
        if let Err(err) = KERNEL_SPACE
            .exclusive_access()
            .remove_area_with_start_vpn(kernel_stack_bottom_va.into())
        {
            panic!("kernel stack of pid {} is missing: {}", self.pid, err);
        }
    }
}
