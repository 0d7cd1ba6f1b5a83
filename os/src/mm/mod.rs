//! Memory management implementation
//!
//! SV39 page-based virtual-memory architecture for RV64 systems, and
//! everything about memory management, like frame allocator, page table,
//! map area and memory set, is implemented here.
//!
//! Every task or process has a memory_set to control its virtual memory.

mod address;
mod frame_allocator;
mod heap_allocator;
mod memory_set;
mod page_table;

use core::fmt::{self, Display, Formatter};

pub use self::address::{PhysAddr, PhysPageNum, VirtAddr, VirtPageNum, PAGE_TABLE_LEVELS};
pub use self::address::{StepByOne, VPNRange};
pub use self::frame_allocator::{frame_alloc, free_frame_count, FrameTracker};
pub use self::memory_set::{kernel_token, MapPermission, MemorySet, KERNEL_SPACE};
pub use self::page_table::{
    copy_to_user, translated_byte_buffer, translated_str, translated_writable_buffer,
    PageTableEntry, UserBuffer,
};
use self::page_table::{PTEFlags, PageTable};

/// 内存管理中可以恢复的错误，由系统调用层转换为负数返回值
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MmError {
    /// 物理页帧耗尽
    OutOfMemory,
    /// 新逻辑段与已有逻辑段重叠
    AreaOverlap { start: VirtPageNum, end: VirtPageNum },
    /// 程序镜像格式错误
    BadElf(&'static str),
    /// 没有以该虚拟页号开头的逻辑段
    NotMapped(VirtPageNum),
    /// 地址未对齐、越界或者权限不合法
    InvalidRange,
    /// 进程号（以及对应的内核栈槽位）用尽
    PidExhausted,
}

impl Display for MmError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            MmError::OutOfMemory => write!(f, "out of physical frames"),
            MmError::AreaOverlap { start, end } => {
                write!(f, "area [{:?}, {:?}) overlaps an existing area", start, end)
            }
            MmError::BadElf(reason) => write!(f, "malformed program image: {}", reason),
            MmError::NotMapped(vpn) => write!(f, "no area starts at {:?}", vpn),
            MmError::InvalidRange => write!(f, "invalid address range"),
            MmError::PidExhausted => write!(f, "no free pid"),
        }
    }
}

pub type MmResult<T> = Result<T, MmError>;

/// initiate heap allocator, frame allocator and kernel space
pub fn init() {
    heap_allocator::init_heap();
    frame_allocator::init_frame_allocator();
    KERNEL_SPACE.exclusive_access().activate();
}

/// 内存管理子系统的自检，在第一个进程运行前执行
pub fn self_test() {
    heap_allocator::heap_test();
    address::address_test();
    frame_allocator::frame_allocator_test();
    page_table::page_table_test();
    memory_set::remap_test();
    memory_set::memory_set_test();
}
