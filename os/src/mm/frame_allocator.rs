//! 实现FrameAllocator
//! 控制操作系统中的所有物理帧

use super::{PhysAddr, PhysPageNum};
use crate::config::MEMORY_END;
use crate::sync::UPSafeCell;
use alloc::vec;
use alloc::vec::Vec;
use core::fmt::{self, Debug, Formatter};
use lazy_static::*;

/// (RAII)将物理页的生命周期绑定到Tracker上，Tracker被drop时物理页归还给分配器
pub struct FrameTracker {
    pub ppn: PhysPageNum,
}

impl FrameTracker {
    /// 构造Tracker，将物理页清零
    pub fn new(ppn: PhysPageNum) -> Self {
        ppn.get_bytes_array().fill(0);
        Self { ppn }
    }
}

impl Debug for FrameTracker {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_fmt(format_args!("FrameTracker:PPN={:#x}", self.ppn.0))
    }
}

impl Drop for FrameTracker {
    fn drop(&mut self) {
        frame_dealloc(self.ppn);
    }
}

trait FrameAllocator {
    fn new() -> Self;
    fn alloc(&mut self) -> Option<PhysPageNum>;
    fn dealloc(&mut self, ppn: PhysPageNum);
}

/// 栈式物理页帧分配器
/// `[current, end)` 是从未分配过的物理页号，`recycled` 是回收站，
/// `in_recycled` 按位记录每个物理页是否在回收站中
pub struct StackFrameAllocator {
    start: usize,
    current: usize,
    end: usize,
    recycled: Vec<usize>,
    in_recycled: Vec<u64>,
}

impl StackFrameAllocator {
    pub fn init(&mut self, l: PhysPageNum, r: PhysPageNum) {
        self.start = l.0;
        self.current = l.0;
        self.end = r.0;
        self.in_recycled = vec![0; (r.0 - l.0 + 63) / 64];
        log::info!(
            "[kernel] frame allocator: [{:?}, {:?}), {} frames",
            l,
            r,
            r.0 - l.0
        );
    }
    /// 还能分配出去的物理页帧数
    pub fn free_frames(&self) -> usize {
        self.end - self.current + self.recycled.len()
    }
    /// 物理页是否在回收站中
    pub fn is_recycled(&self, ppn: PhysPageNum) -> bool {
        let offset = ppn.0 - self.start;
        self.in_recycled[offset / 64] & (1 << (offset % 64)) != 0
    }
    fn set_recycled(&mut self, ppn: usize, recycled: bool) {
        let offset = ppn - self.start;
        if recycled {
            self.in_recycled[offset / 64] |= 1 << (offset % 64);
        } else {
            self.in_recycled[offset / 64] &= !(1 << (offset % 64));
        }
    }
}

impl FrameAllocator for StackFrameAllocator {
    fn new() -> Self {
        Self {
            start: 0,
            current: 0,
            end: 0,
            recycled: Vec::new(),
            in_recycled: Vec::new(),
        }
    }
    fn alloc(&mut self) -> Option<PhysPageNum> {
        // 优先弹出回收站的帧以供分配（后进先出）
        if let Some(ppn) = self.recycled.pop() {
            self.set_recycled(ppn, false);
            Some(ppn.into())
        } else if self.current == self.end {
            None
        } else {
            self.current += 1;
            Some((self.current - 1).into())
        }
    }
    fn dealloc(&mut self, ppn: PhysPageNum) {
        let ppn = ppn.0;
        // 从未分配过或者已经在回收站中的帧都说明出现了重复释放
        if ppn < self.start || ppn >= self.current || self.is_recycled(ppn.into()) {
            panic!("Frame ppn={:#x} has not been allocated!", ppn);
        }
        self.set_recycled(ppn, true);
        self.recycled.push(ppn);
    }
}

type FrameAllocatorImpl = StackFrameAllocator;

lazy_static! {
    /// frame allocator instance through lazy_static!
    pub static ref FRAME_ALLOCATOR: UPSafeCell<FrameAllocatorImpl> =
        unsafe { UPSafeCell::new(FrameAllocatorImpl::new()) };
}

/// 使用`ekernel`和`MEMORY_END`初始化帧分配器
pub fn init_frame_allocator() {
    extern "C" {
        fn ekernel();
    }
    FRAME_ALLOCATOR.exclusive_access().init(
        PhysAddr::from(ekernel as usize).ceil(),
        PhysAddr::from(MEMORY_END).floor(),
    );
}

/// 分配一个物理页帧，物理内存耗尽时返回None
pub fn frame_alloc() -> Option<FrameTracker> {
    FRAME_ALLOCATOR
        .exclusive_session(|allocator| allocator.alloc())
        .map(FrameTracker::new)
}

/// 释放一个物理页帧
fn frame_dealloc(ppn: PhysPageNum) {
    FRAME_ALLOCATOR.exclusive_session(|allocator| allocator.dealloc(ppn));
}

/// 剩余可分配的物理页帧数
pub fn free_frame_count() -> usize {
    FRAME_ALLOCATOR.exclusive_access().free_frames()
}

#[allow(unused)]
/// 物理页帧分配器的测试函数
pub fn frame_allocator_test() {
    let free_before = free_frame_count();
    let mut v: Vec<FrameTracker> = Vec::new();
    for _ in 0..5 {
        let frame = frame_alloc().unwrap();
        log::trace!("{:?}", frame);
        // 存活的Tracker之间不能共享同一个物理页
        assert!(v.iter().all(|f| f.ppn != frame.ppn));
        v.push(frame);
    }
    let first_round: Vec<PhysPageNum> = v.iter().map(|f| f.ppn).collect();
    // 按顺序drop，回收站的栈顶是最后一个
    v.clear();
    FRAME_ALLOCATOR.exclusive_session(|allocator| {
        assert!(first_round.iter().all(|ppn| allocator.is_recycled(*ppn)));
    });
    for expected in first_round.iter().rev() {
        let frame = frame_alloc().unwrap();
        assert_eq!(frame.ppn, *expected, "recycled frames must be reused LIFO");
        v.push(frame);
    }
    // 回收站用空后才会推进未分配边界
    FRAME_ALLOCATOR.exclusive_session(|allocator| {
        assert!(first_round.iter().all(|ppn| !allocator.is_recycled(*ppn)));
    });
    let fresh = frame_alloc().unwrap();
    assert!(first_round.iter().all(|ppn| *ppn != fresh.ppn));
    assert!(fresh.ppn.get_bytes_array().iter().all(|b| *b == 0));
    drop(fresh);
    drop(v);
    assert_eq!(free_frame_count(), free_before);
    log::info!("frame_allocator_test passed!");
}
