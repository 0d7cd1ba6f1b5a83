//! Implementation of [`PageTableEntry`] and [`PageTable`].

use super::{
    frame_alloc, FrameTracker, MmError, MmResult, PhysAddr, PhysPageNum, StepByOne, VirtAddr,
    VirtPageNum, PAGE_TABLE_LEVELS,
};
use crate::config::{PAGE_SIZE, USER_SPACE_END};
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;
use bitflags::*;

bitflags! {
    /// 定义页表项中的8位权限位
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct PTEFlags: u8 {
        const V = 1 << 0;
        const R = 1 << 1;
        const W = 1 << 2;
        const X = 1 << 3;
        const U = 1 << 4;
        const G = 1 << 5;
        const A = 1 << 6;
        const D = 1 << 7;
    }
}

/// SV39页表项中物理页号的位宽与偏移
const PTE_PPN_WIDTH: usize = 44;
const PTE_PPN_SHIFT: usize = 10;
/// satp中的MODE字段，8表示SV39
const SATP_MODE_SV39: usize = 8;

#[derive(Copy, Clone)]
#[repr(C)]
/// page table entry structure
pub struct PageTableEntry {
    pub bits: usize,
}

impl PageTableEntry {
    pub fn new(ppn: PhysPageNum, flags: PTEFlags) -> Self {
        PageTableEntry {
            bits: ppn.0 << PTE_PPN_SHIFT | flags.bits() as usize,
        }
    }
    /// 清空页表项
    pub fn empty() -> Self {
        PageTableEntry { bits: 0 }
    }
    /// 获取页表项中的物理页号
    pub fn ppn(&self) -> PhysPageNum {
        (self.bits >> PTE_PPN_SHIFT & ((1usize << PTE_PPN_WIDTH) - 1)).into()
    }
    /// 直接获取页表项中低8位（权限位）
    pub fn flags(&self) -> PTEFlags {
        PTEFlags::from_bits_truncate(self.bits as u8)
    }
    pub fn is_valid(&self) -> bool {
        self.flags().contains(PTEFlags::V)
    }
    pub fn readable(&self) -> bool {
        self.flags().contains(PTEFlags::R)
    }
    pub fn writable(&self) -> bool {
        self.flags().contains(PTEFlags::W)
    }
    pub fn executable(&self) -> bool {
        self.flags().contains(PTEFlags::X)
    }
    /// U态是否可以访问该页
    pub fn is_user(&self) -> bool {
        self.flags().contains(PTEFlags::U)
    }
}

/// 页表结构
pub struct PageTable {
    /// 根页表的物理页号
    root_ppn: PhysPageNum,
    /// 根页表以及所有中间级页表所在的物理页帧
    frames: Vec<FrameTracker>,
}

impl PageTable {
    /// 分配根页表所在的物理页帧
    pub fn new() -> MmResult<Self> {
        let frame = frame_alloc().ok_or(MmError::OutOfMemory)?;
        Ok(PageTable {
            root_ppn: frame.ppn,
            frames: vec![frame],
        })
    }
    /// 为了模拟MMU检查页表的功能
    /// 使用satp作为token创建一个临时的pagetable，其frames数组为空，不负责回收任何物理页
    pub fn from_token(satp: usize) -> Self {
        Self {
            root_ppn: PhysPageNum::from(satp & ((1usize << PTE_PPN_WIDTH) - 1)),
            frames: Vec::new(),
        }
    }
    /// 查询最后一级页表项，途中遇到不合法的中间级页表项时分配新的页表页
    fn find_pte_create(&mut self, vpn: VirtPageNum) -> MmResult<&mut PageTableEntry> {
        let idxs = vpn.indexes();
        let mut ppn = self.root_ppn;
        for (level, idx) in idxs.iter().enumerate() {
            let pte = &mut ppn.get_pte_array()[*idx];
            if level == PAGE_TABLE_LEVELS - 1 {
                return Ok(pte);
            }
            if !pte.is_valid() {
                let frame = frame_alloc().ok_or(MmError::OutOfMemory)?;
                *pte = PageTableEntry::new(frame.ppn, PTEFlags::V);
                self.frames.push(frame);
            }
            ppn = pte.ppn();
        }
        unreachable!()
    }
    /// 查询最后一级页表项，中途的无效页表项直接返回None
    fn find_pte(&self, vpn: VirtPageNum) -> Option<&mut PageTableEntry> {
        let idxs = vpn.indexes();
        let mut ppn = self.root_ppn;
        for (level, idx) in idxs.iter().enumerate() {
            let pte = &mut ppn.get_pte_array()[*idx];
            if level == PAGE_TABLE_LEVELS - 1 {
                return Some(pte);
            }
            if !pte.is_valid() {
                return None;
            }
            ppn = pte.ppn();
        }
        None
    }
    /// 建立虚拟页到物理页的映射；重复映射一个有效页是内核bug
    pub fn map(&mut self, vpn: VirtPageNum, ppn: PhysPageNum, flags: PTEFlags) -> MmResult<()> {
        let pte = self.find_pte_create(vpn)?;
        assert!(!pte.is_valid(), "vpn {:?} is mapped before mapping", vpn);
        *pte = PageTableEntry::new(ppn, flags | PTEFlags::V);
        Ok(())
    }
    /// 解除一个虚拟页的映射；解除不存在的映射是内核bug
    pub fn unmap(&mut self, vpn: VirtPageNum) {
        let pte = self
            .find_pte(vpn)
            .filter(|pte| pte.is_valid())
            .unwrap_or_else(|| panic!("vpn {:?} is invalid before unmapping", vpn));
        *pte = PageTableEntry::empty();
    }
    /// 获取有效的最后一级页表项的副本
    pub fn translate(&self, vpn: VirtPageNum) -> Option<PageTableEntry> {
        self.find_pte(vpn).map(|pte| *pte).filter(|pte| pte.is_valid())
    }
    /// 将虚拟地址翻译为物理地址
    pub fn translate_va(&self, va: VirtAddr) -> Option<PhysAddr> {
        self.translate(va.floor()).map(|pte| {
            let aligned_pa: PhysAddr = pte.ppn().into();
            PhysAddr(aligned_pa.0 + va.page_offset())
        })
    }
    /// MODE为SV39，ASID为0，低位为根页表的PPN
    pub fn token(&self) -> usize {
        SATP_MODE_SV39 << 60 | self.root_ppn.0
    }
    /// 页表自身占用的物理页帧数
    pub fn table_frames(&self) -> usize {
        self.frames.len()
    }
}

/// 查找用户可访问的页，`write` 为真时还要求可写
fn user_page(page_table: &PageTable, vpn: VirtPageNum, write: bool) -> Option<PhysPageNum> {
    page_table
        .translate(vpn)
        .filter(|pte| pte.is_user() && (!write || pte.writable()))
        .map(|pte| pte.ppn())
}

/// 把用户地址空间中 `[ptr, ptr + len)` 翻译成若干段内核可直接访问的字节切片
/// 范围超出用户空间、任何一页未映射或者U态不可访问（`write` 为真时还要求可写）时返回None
fn translate_user_range(
    token: usize,
    ptr: *const u8,
    len: usize,
    write: bool,
) -> Option<Vec<&'static mut [u8]>> {
    let page_table = PageTable::from_token(token);
    let mut start = ptr as usize;
    let end = start.checked_add(len).filter(|end| *end <= USER_SPACE_END)?;
    let mut v = Vec::new();
    while start < end {
        let start_va = VirtAddr::from(start);
        let mut vpn = start_va.floor();
        let ppn = user_page(&page_table, vpn, write)?;
        vpn.step();
        let mut end_va: VirtAddr = vpn.into();
        end_va = end_va.min(VirtAddr::from(end));
        if end_va.page_offset() == 0 {
            v.push(&mut ppn.get_bytes_array()[start_va.page_offset()..]);
        } else {
            v.push(&mut ppn.get_bytes_array()[start_va.page_offset()..end_va.page_offset()]);
        }
        start = end_va.into();
    }
    Some(v)
}

/// 翻译一段内核将要读取的用户缓冲区
pub fn translated_byte_buffer(
    token: usize,
    ptr: *const u8,
    len: usize,
) -> Option<Vec<&'static mut [u8]>> {
    translate_user_range(token, ptr, len, false)
}

/// 翻译一段内核将要写入的用户缓冲区，每一页都必须可写
pub fn translated_writable_buffer(
    token: usize,
    ptr: *mut u8,
    len: usize,
) -> Option<Vec<&'static mut [u8]>> {
    translate_user_range(token, ptr, len, true)
}

/// 从用户地址空间读取以'\0'结尾的字符串，最长一页
pub fn translated_str(token: usize, ptr: *const u8) -> Option<String> {
    let page_table = PageTable::from_token(token);
    let mut string = String::new();
    let mut va = ptr as usize;
    for _ in 0..PAGE_SIZE {
        if va >= USER_SPACE_END {
            return None;
        }
        let user_va = VirtAddr::from(va);
        let ppn = user_page(&page_table, user_va.floor(), false)?;
        let ch = ppn.get_bytes_array()[user_va.page_offset()];
        if ch == 0 {
            return Some(string);
        }
        string.push(ch as char);
        va += 1;
    }
    None
}

/// 把内核中的值按字节写入用户地址空间，可以跨页
pub fn copy_to_user<T: Copy>(token: usize, ptr: *mut T, value: &T) -> Option<()> {
    let len = core::mem::size_of::<T>();
    // 先确认每一页都可写，再开始拷贝
    let buffers = translated_writable_buffer(token, ptr as *mut u8, len)?;
    let src = unsafe { core::slice::from_raw_parts(value as *const T as *const u8, len) };
    let mut copied = 0;
    for dst in buffers {
        dst.copy_from_slice(&src[copied..copied + dst.len()]);
        copied += dst.len();
    }
    Some(())
}

/// 一组翻译好的用户缓冲区
pub struct UserBuffer {
    pub buffers: Vec<&'static mut [u8]>,
}

impl UserBuffer {
    pub fn new(buffers: Vec<&'static mut [u8]>) -> Self {
        Self { buffers }
    }
    pub fn len(&self) -> usize {
        self.buffers.iter().map(|b| b.len()).sum()
    }
}

impl IntoIterator for UserBuffer {
    type Item = *mut u8;
    type IntoIter = UserBufferIterator;
    fn into_iter(self) -> Self::IntoIter {
        UserBufferIterator {
            buffers: self.buffers,
            current_buffer: 0,
            current_idx: 0,
        }
    }
}

/// 按字节遍历 [`UserBuffer`]
pub struct UserBufferIterator {
    buffers: Vec<&'static mut [u8]>,
    current_buffer: usize,
    current_idx: usize,
}

impl Iterator for UserBufferIterator {
    type Item = *mut u8;
    fn next(&mut self) -> Option<Self::Item> {
        while self.current_buffer < self.buffers.len() {
            if self.current_idx < self.buffers[self.current_buffer].len() {
                let r = &mut self.buffers[self.current_buffer][self.current_idx] as *mut _;
                self.current_idx += 1;
                return Some(r);
            }
            self.current_idx = 0;
            self.current_buffer += 1;
        }
        None
    }
}

#[allow(unused)]
/// 页表映射、翻译与解除映射的测试函数
pub fn page_table_test() {
    let free_before = super::free_frame_count();
    let mut page_table = PageTable::new().unwrap();
    let frame = frame_alloc().unwrap();
    let vpn = VirtPageNum(0x12345);
    page_table
        .map(vpn, frame.ppn, PTEFlags::R | PTEFlags::W | PTEFlags::U)
        .unwrap();
    // 根页表加上两级中间页表
    assert_eq!(page_table.table_frames(), PAGE_TABLE_LEVELS);
    let pte = page_table.translate(vpn).unwrap();
    assert_eq!(pte.ppn(), frame.ppn);
    assert!(pte.readable() && pte.writable() && pte.is_user() && !pte.executable());
    // 同一张最后一级页表里的相邻页不再分配中间页表
    let neighbor = VirtPageNum(vpn.0 + 1);
    page_table.map(neighbor, frame.ppn, PTEFlags::R).unwrap();
    assert_eq!(page_table.table_frames(), PAGE_TABLE_LEVELS);
    let va = VirtAddr(VirtAddr::from(vpn).0 + 0x10);
    let pa: PhysAddr = frame.ppn.into();
    assert_eq!(page_table.translate_va(va), Some(PhysAddr(pa.0 + 0x10)));
    page_table.unmap(vpn);
    assert!(page_table.translate(vpn).is_none());
    assert!(page_table.translate(neighbor).is_some());
    assert!(page_table.translate(VirtPageNum(0x54321)).is_none());
    // 临时页表只读不写，不回收任何物理页
    let borrowed = PageTable::from_token(page_table.token());
    assert!(borrowed.translate(neighbor).is_some());
    drop(borrowed);
    drop(page_table);
    drop(frame);
    assert_eq!(super::free_frame_count(), free_before);
    log::info!("page_table_test passed!");
}
