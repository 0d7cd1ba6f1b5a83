//! Implementation of [`MapArea`] and [`MemorySet`].
//!
//! 地址空间 = 一张页表 + 一组互不重叠的逻辑段。
//! 内核地址空间全局唯一，采用恒等映射；每个用户进程各有一个地址空间，
//! 所有地址空间的最高页都是同一个跳板页。

use super::{frame_alloc, FrameTracker, MmError, MmResult};
use super::{PTEFlags, PageTable, PageTableEntry};
use super::{PhysAddr, PhysPageNum, VirtAddr, VirtPageNum};
use super::{StepByOne, VPNRange};
use crate::config::{
    MEMORY_END, MMIO, PAGE_SIZE, TRAMPOLINE, TRAP_CONTEXT, USER_SPACE_END, USER_STACK_SIZE,
};
use crate::sync::UPSafeCell;
use alloc::collections::BTreeMap;
use alloc::sync::Arc;
use alloc::vec::Vec;
use bitflags::bitflags;
use core::arch::asm;
use lazy_static::*;
use riscv::register::satp;
use xmas_elf::{
    header::{self, Class, Machine},
    program::Type,
    ElfFile,
};

extern "C" {
    fn stext();
    fn etext();
    fn srodata();
    fn erodata();
    fn sdata();
    fn edata();
    fn sbss_with_stack();
    fn ebss();
    fn ekernel();
    fn strampoline();
}

const ELF_MAGIC: [u8; 4] = [0x7f, b'E', b'L', b'F'];
const ELF64_PH_ENTRY_SIZE: usize = 56;

lazy_static! {
    /// 内核地址空间
    pub static ref KERNEL_SPACE: Arc<UPSafeCell<MemorySet>> = Arc::new(unsafe {
        UPSafeCell::new(MemorySet::new_kernel().expect("failed to build kernel space"))
    });
}

/// 内核地址空间的token
pub fn kernel_token() -> usize {
    KERNEL_SPACE.exclusive_access().token()
}

/// memory set structure, controls virtual-memory space
pub struct MemorySet {
    page_table: PageTable,
    areas: Vec<MapArea>,
}

impl MemorySet {
    /// 只有根页表、没有任何逻辑段的地址空间
    pub fn new_bare() -> MmResult<Self> {
        Ok(Self {
            page_table: PageTable::new()?,
            areas: Vec::new(),
        })
    }
    /// 获得页表对应的satp值
    pub fn token(&self) -> usize {
        self.page_table.token()
    }
    /// 插入一个按需分配物理页帧的逻辑段
    pub fn insert_framed_area(
        &mut self,
        start_va: VirtAddr,
        end_va: VirtAddr,
        permission: MapPermission,
    ) -> MmResult<()> {
        self.push(
            MapArea::new(start_va, end_va, MapType::Framed, permission),
            None,
        )
    }
    /// 删除以 `start_vpn` 开头的非空逻辑段，并回收其物理页帧
    ///
    /// 空逻辑段（初始的堆）不占任何页，可能与其他逻辑段同一起始页号，这里不会选中它。
    pub fn remove_area_with_start_vpn(&mut self, start_vpn: VirtPageNum) -> MmResult<()> {
        let idx = self
            .areas
            .iter()
            .position(|area| {
                !area.vpn_range.is_empty() && area.vpn_range.get_start() == start_vpn
            })
            .ok_or(MmError::NotMapped(start_vpn))?;
        self.remove_area_at(idx);
        Ok(())
    }
    fn remove_area_at(&mut self, idx: usize) {
        let mut area = self.areas.remove(idx);
        area.unmap(&mut self.page_table);
        log::trace!("[kernel] removed area {:?}", area.vpn_range);
    }
    /// 找出与给定范围相交的逻辑段
    fn find_overlap(&self, range: &VPNRange) -> Option<&MapArea> {
        self.areas.iter().find(|area| area.vpn_range.intersects(range))
    }
    /// 检查不重叠后建立映射，可选地把 `data` 拷贝进逻辑段开头
    /// `data` 从逻辑段第一页的页内偏移 `offset` 处开始存放
    fn push_with_offset(
        &mut self,
        mut map_area: MapArea,
        data: Option<&[u8]>,
        offset: usize,
    ) -> MmResult<()> {
        if self.find_overlap(&map_area.vpn_range).is_some() {
            return Err(MmError::AreaOverlap {
                start: map_area.vpn_range.get_start(),
                end: map_area.vpn_range.get_end(),
            });
        }
        map_area.map(&mut self.page_table)?;
        if let Some(data) = data {
            map_area.copy_data(data, offset);
        }
        log::trace!("[kernel] pushed area {:?}", map_area.vpn_range);
        self.areas.push(map_area);
        Ok(())
    }
    /// 插入一个逻辑段，与已有逻辑段重叠时拒绝
    pub fn push(&mut self, map_area: MapArea, data: Option<&[u8]>) -> MmResult<()> {
        self.push_with_offset(map_area, data, 0)
    }
    /// 跳板页不属于任何逻辑段，不会被回收
    fn map_trampoline(&mut self) -> MmResult<()> {
        self.page_table.map(
            VirtAddr::from(TRAMPOLINE).into(),
            PhysAddr::from(strampoline as usize).into(),
            PTEFlags::R | PTEFlags::X,
        )
    }
    /// 内核地址空间：跳板页以及恒等映射的内核各段、剩余物理内存和MMIO
    /// 内核栈在进程创建时再插入
    pub fn new_kernel() -> MmResult<Self> {
        let mut memory_set = Self::new_bare()?;
        memory_set.map_trampoline()?;
        log::info!(".text [{:#x}, {:#x})", stext as usize, etext as usize);
        log::info!(".rodata [{:#x}, {:#x})", srodata as usize, erodata as usize);
        log::info!(".data [{:#x}, {:#x})", sdata as usize, edata as usize);
        log::info!(".bss [{:#x}, {:#x})", sbss_with_stack as usize, ebss as usize);
        let sections: [(usize, usize, MapPermission); 5] = [
            (stext as usize, etext as usize, MapPermission::R | MapPermission::X),
            (srodata as usize, erodata as usize, MapPermission::R),
            (sdata as usize, edata as usize, MapPermission::R | MapPermission::W),
            (sbss_with_stack as usize, ebss as usize, MapPermission::R | MapPermission::W),
            (ekernel as usize, MEMORY_END, MapPermission::R | MapPermission::W),
        ];
        for (start, end, perm) in sections {
            memory_set.push(
                MapArea::new(start.into(), end.into(), MapType::Identical, perm),
                None,
            )?;
        }
        log::info!("mapping memory-mapped registers");
        for &(start, len) in MMIO {
            memory_set.push(
                MapArea::new(
                    start.into(),
                    (start + len).into(),
                    MapType::Identical,
                    MapPermission::R | MapPermission::W,
                ),
                None,
            )?;
        }
        Ok(memory_set)
    }
    /// 解析ELF，为每个LOAD段建立一个逻辑段，之后依次是保护页、用户栈、
    /// 初始为空的堆以及Trap上下文页
    /// 返回地址空间、用户栈顶以及入口地址
    pub fn from_elf(elf_data: &[u8]) -> MmResult<(Self, usize, usize)> {
        let elf = ElfFile::new(elf_data).map_err(MmError::BadElf)?;
        let elf_header = elf.header;
        if elf_header.pt1.magic != ELF_MAGIC {
            return Err(MmError::BadElf("invalid magic"));
        }
        if elf_header.pt1.class() != Class::SixtyFour {
            return Err(MmError::BadElf("not a 64-bit image"));
        }
        if elf_header.pt2.machine().as_machine() != Machine::RISC_V {
            return Err(MmError::BadElf("not a RISC-V image"));
        }
        if elf_header.pt2.type_().as_type() != header::Type::Executable {
            return Err(MmError::BadElf("not an executable"));
        }
        let ph_count = elf_header.pt2.ph_count() as usize;
        let ph_table_end = (ph_count * ELF64_PH_ENTRY_SIZE)
            .checked_add(elf_header.pt2.ph_offset() as usize)
            .ok_or(MmError::BadElf("program header table overflows"))?;
        if elf_header.pt2.ph_entry_size() as usize != ELF64_PH_ENTRY_SIZE
            || ph_table_end > elf_data.len()
        {
            return Err(MmError::BadElf("program header table out of bounds"));
        }

        let mut memory_set = Self::new_bare()?;
        memory_set.map_trampoline()?;
        let mut max_end_vpn = VirtPageNum(0);
        for i in 0..ph_count {
            let ph = elf.program_header(i as u16).map_err(MmError::BadElf)?;
            if ph.get_type().map_err(MmError::BadElf)? != Type::Load {
                continue;
            }
            let start = ph.virtual_addr() as usize;
            let end = start
                .checked_add(ph.mem_size() as usize)
                .filter(|end| *end <= USER_SPACE_END)
                .ok_or(MmError::BadElf("segment outside user space"))?;
            let file_start = ph.offset() as usize;
            let file_end = file_start
                .checked_add(ph.file_size() as usize)
                .filter(|file_end| *file_end <= elf_data.len())
                .ok_or(MmError::BadElf("segment data out of bounds"))?;
            if ph.file_size() > ph.mem_size() {
                return Err(MmError::BadElf("file size exceeds memory size"));
            }
            let mut map_perm = MapPermission::U;
            let ph_flags = ph.flags();
            if ph_flags.is_read() {
                map_perm |= MapPermission::R;
            }
            if ph_flags.is_write() {
                map_perm |= MapPermission::W;
            }
            if ph_flags.is_execute() {
                map_perm |= MapPermission::X;
            }
            let start_va: VirtAddr = start.into();
            let map_area = MapArea::new(start_va, end.into(), MapType::Framed, map_perm);
            max_end_vpn = max_end_vpn.max(map_area.vpn_range.get_end());
            memory_set.push_with_offset(
                map_area,
                Some(&elf_data[file_start..file_end]),
                start_va.page_offset(),
            )?;
        }
        if max_end_vpn.0 == 0 {
            return Err(MmError::BadElf("no loadable segment"));
        }
        // 用户栈与程序之间留一个保护页
        let max_end_va: VirtAddr = max_end_vpn.into();
        let user_stack_bottom = usize::from(max_end_va) + PAGE_SIZE;
        let user_stack_top = user_stack_bottom + USER_STACK_SIZE;
        if user_stack_top > USER_SPACE_END {
            return Err(MmError::BadElf("no room for the user stack"));
        }
        memory_set.push(
            MapArea::new(
                user_stack_bottom.into(),
                user_stack_top.into(),
                MapType::Framed,
                MapPermission::R | MapPermission::W | MapPermission::U,
            ),
            None,
        )?;
        // 堆从用户栈顶开始，初始为空，由sbrk伸缩
        memory_set.push(
            MapArea::new(
                user_stack_top.into(),
                user_stack_top.into(),
                MapType::Framed,
                MapPermission::R | MapPermission::W | MapPermission::U,
            ),
            None,
        )?;
        // Trap上下文页只有内核可以访问，内容由调用者初始化
        memory_set.push(
            MapArea::new(
                TRAP_CONTEXT.into(),
                TRAMPOLINE.into(),
                MapType::Framed,
                MapPermission::R | MapPermission::W,
            ),
            None,
        )?;
        Ok((
            memory_set,
            user_stack_top,
            elf.header.pt2.entry_point() as usize,
        ))
    }
    /// fork时复制用户地址空间：逻辑段布局相同，每个物理页帧都重新分配并拷贝内容
    pub fn from_existing_user(user_space: &Self) -> MmResult<Self> {
        let mut memory_set = Self::new_bare()?;
        memory_set.map_trampoline()?;
        for area in user_space.areas.iter() {
            let mut new_area = MapArea::from_another(area);
            new_area.map(&mut memory_set.page_table)?;
            new_area.copy_frames_from(area);
            memory_set.areas.push(new_area);
        }
        Ok(memory_set)
    }
    /// 写satp切换到该地址空间，并刷新TLB
    pub fn activate(&self) {
        let satp = self.page_table.token();
        unsafe {
            satp::write(satp);
            asm!("sfence.vma");
        }
    }
    /// 查询虚拟页号对应的页表项
    pub fn translate(&self, vpn: VirtPageNum) -> Option<PageTableEntry> {
        self.page_table.translate(vpn)
    }
    /// 进程退出时提前回收所有数据页，页表本身等到进程控制块释放时回收
    pub fn recycle_data_pages(&mut self) {
        for mut area in self.areas.drain(..) {
            area.unmap(&mut self.page_table);
        }
    }
    /// 逻辑段个数
    pub fn area_count(&self) -> usize {
        self.areas.len()
    }
    /// 收缩以 `start` 开头的逻辑段（堆），使其结束于 `new_end`
    pub fn shrink_to(&mut self, start: VirtAddr, new_end: VirtAddr) -> MmResult<()> {
        let start_vpn = start.floor();
        let area = self
            .areas
            .iter_mut()
            .find(|area| area.vpn_range.get_start() == start_vpn)
            .ok_or(MmError::NotMapped(start_vpn))?;
        if new_end.ceil() < start_vpn {
            return Err(MmError::InvalidRange);
        }
        area.shrink_to(&mut self.page_table, new_end.ceil());
        Ok(())
    }
    /// 扩展以 `start` 开头的逻辑段（堆），使其结束于 `new_end`
    pub fn append_to(&mut self, start: VirtAddr, new_end: VirtAddr) -> MmResult<()> {
        let start_vpn = start.floor();
        let idx = self
            .areas
            .iter()
            .position(|area| area.vpn_range.get_start() == start_vpn)
            .ok_or(MmError::NotMapped(start_vpn))?;
        let old_end = self.areas[idx].vpn_range.get_end();
        let new_end_vpn = new_end.ceil();
        if new_end_vpn <= old_end {
            return Ok(());
        }
        if usize::from(new_end) > USER_SPACE_END {
            return Err(MmError::InvalidRange);
        }
        let grown = VPNRange::new(old_end, new_end_vpn);
        if let Some(other) = self.find_overlap(&grown) {
            return Err(MmError::AreaOverlap {
                start: other.vpn_range.get_start(),
                end: other.vpn_range.get_end(),
            });
        }
        self.areas[idx].append_to(&mut self.page_table, new_end_vpn)
    }
    /// 在 `[start, start + len)` 插入一段用户可访问的匿名映射
    pub fn mmap(&mut self, start: usize, len: usize, perm: MapPermission) -> MmResult<()> {
        let start_va = VirtAddr::from(start);
        if start_va.0 != start || !start_va.aligned() {
            return Err(MmError::InvalidRange);
        }
        if perm.is_empty() || perm.contains(MapPermission::U) {
            return Err(MmError::InvalidRange);
        }
        if len == 0 {
            return Ok(());
        }
        let end = start
            .checked_add(len)
            .filter(|end| *end <= USER_SPACE_END)
            .ok_or(MmError::InvalidRange)?;
        self.insert_framed_area(start_va, end.into(), perm | MapPermission::U)
    }
    /// 解除 `[start, start + len)` 的映射，该范围必须恰好是一个用户逻辑段
    pub fn munmap(&mut self, start: usize, len: usize) -> MmResult<()> {
        let start_va = VirtAddr::from(start);
        if start_va.0 != start || !start_va.aligned() || len == 0 {
            return Err(MmError::InvalidRange);
        }
        let end = start
            .checked_add(len)
            .filter(|end| *end <= USER_SPACE_END)
            .ok_or(MmError::InvalidRange)?;
        let range = VPNRange::new(start_va.floor(), VirtAddr::from(end).ceil());
        let idx = self
            .areas
            .iter()
            .position(|area| {
                area.vpn_range.get_start() == range.get_start()
                    && area.vpn_range.get_end() == range.get_end()
                    && area.map_perm.contains(MapPermission::U)
            })
            .ok_or(MmError::NotMapped(range.get_start()))?;
        self.remove_area_at(idx);
        Ok(())
    }
}

/// map area structure, controls a contiguous piece of virtual memory
pub struct MapArea {
    vpn_range: VPNRange,
    data_frames: BTreeMap<VirtPageNum, FrameTracker>,
    map_type: MapType,
    map_perm: MapPermission,
}

impl MapArea {
    pub fn new(
        start_va: VirtAddr,
        end_va: VirtAddr,
        map_type: MapType,
        map_perm: MapPermission,
    ) -> Self {
        let start_vpn: VirtPageNum = start_va.floor();
        let end_vpn: VirtPageNum = end_va.ceil();
        Self {
            vpn_range: VPNRange::new(start_vpn, end_vpn),
            data_frames: BTreeMap::new(),
            map_type,
            map_perm,
        }
    }
    /// 复制另一个逻辑段的布局，不复制物理页帧
    pub fn from_another(another: &Self) -> Self {
        Self {
            vpn_range: VPNRange::new(another.vpn_range.get_start(), another.vpn_range.get_end()),
            data_frames: BTreeMap::new(),
            map_type: another.map_type,
            map_perm: another.map_perm,
        }
    }
    fn pte_flags(&self) -> PTEFlags {
        PTEFlags::from_bits_truncate(self.map_perm.bits())
    }
    /// 恒等映射的页直接使用同号物理页；Framed的页向分配器申请一个新页帧
    pub fn map_one(&mut self, page_table: &mut PageTable, vpn: VirtPageNum) -> MmResult<()> {
        let flags = self.pte_flags();
        match self.map_type {
            MapType::Identical => page_table.map(vpn, PhysPageNum(vpn.0), flags),
            MapType::Framed => {
                let frame = frame_alloc().ok_or(MmError::OutOfMemory)?;
                page_table.map(vpn, frame.ppn, flags)?;
                self.data_frames.insert(vpn, frame);
                Ok(())
            }
        }
    }
    pub fn unmap_one(&mut self, page_table: &mut PageTable, vpn: VirtPageNum) {
        if self.map_type == MapType::Framed {
            self.data_frames.remove(&vpn);
        }
        page_table.unmap(vpn);
    }
    /// 映射 `[from, to)` 中的每一页，中途失败时撤销这一轮已经建立的映射
    fn map_range(
        &mut self,
        page_table: &mut PageTable,
        from: VirtPageNum,
        to: VirtPageNum,
    ) -> MmResult<()> {
        for vpn in VPNRange::new(from, to) {
            if let Err(err) = self.map_one(page_table, vpn) {
                for mapped in VPNRange::new(from, vpn) {
                    self.unmap_one(page_table, mapped);
                }
                return Err(err);
            }
        }
        Ok(())
    }
    pub fn map(&mut self, page_table: &mut PageTable) -> MmResult<()> {
        self.map_range(page_table, self.vpn_range.get_start(), self.vpn_range.get_end())
    }
    pub fn unmap(&mut self, page_table: &mut PageTable) {
        for vpn in self.vpn_range {
            self.unmap_one(page_table, vpn);
        }
    }
    pub fn shrink_to(&mut self, page_table: &mut PageTable, new_end: VirtPageNum) {
        for vpn in VPNRange::new(new_end, self.vpn_range.get_end()) {
            self.unmap_one(page_table, vpn);
        }
        self.vpn_range = VPNRange::new(self.vpn_range.get_start(), new_end);
    }
    pub fn append_to(&mut self, page_table: &mut PageTable, new_end: VirtPageNum) -> MmResult<()> {
        self.map_range(page_table, self.vpn_range.get_end(), new_end)?;
        self.vpn_range = VPNRange::new(self.vpn_range.get_start(), new_end);
        Ok(())
    }
    /// 把 `data` 拷贝到逻辑段开头（第一页的页内偏移 `offset` 处），其余部分保持为0
    pub fn copy_data(&mut self, data: &[u8], offset: usize) {
        assert_eq!(self.map_type, MapType::Framed);
        let mut copied = 0;
        let mut page_offset = offset;
        let mut current_vpn = self.vpn_range.get_start();
        while copied < data.len() {
            let chunk = (PAGE_SIZE - page_offset).min(data.len() - copied);
            let dst = &mut self.data_frames[&current_vpn].ppn.get_bytes_array()
                [page_offset..page_offset + chunk];
            dst.copy_from_slice(&data[copied..copied + chunk]);
            copied += chunk;
            page_offset = 0;
            current_vpn.step();
        }
    }
    /// 逐页拷贝另一个同布局逻辑段的内容
    fn copy_frames_from(&mut self, another: &Self) {
        for (vpn, src) in another.data_frames.iter() {
            let dst = &self.data_frames[vpn];
            dst.ppn
                .get_bytes_array()
                .copy_from_slice(src.ppn.get_bytes_array());
        }
    }
}

#[derive(Copy, Clone, PartialEq, Debug)]
/// map type for memory set: identical or framed
pub enum MapType {
    Identical,
    Framed,
}

bitflags! {
    /// map permission corresponding to that in pte: `R W X U`
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct MapPermission: u8 {
        const R = 1 << 1;
        const W = 1 << 2;
        const X = 1 << 3;
        const U = 1 << 4;
    }
}

#[allow(unused)]
/// 检查内核各段的权限
pub fn remap_test() {
    let kernel_space = KERNEL_SPACE.exclusive_access();
    let mid_text: VirtAddr = ((stext as usize + etext as usize) / 2).into();
    let mid_rodata: VirtAddr = ((srodata as usize + erodata as usize) / 2).into();
    let mid_data: VirtAddr = ((sdata as usize + edata as usize) / 2).into();
    assert!(!kernel_space
        .page_table
        .translate(mid_text.floor())
        .unwrap()
        .writable());
    assert!(!kernel_space
        .page_table
        .translate(mid_rodata.floor())
        .unwrap()
        .writable());
    assert!(!kernel_space
        .page_table
        .translate(mid_data.floor())
        .unwrap()
        .executable());
    let trampoline = kernel_space
        .page_table
        .translate(VirtAddr::from(TRAMPOLINE).floor())
        .unwrap();
    assert!(trampoline.executable() && !trampoline.is_user());
    log::info!("remap_test passed!");
}

#[allow(unused)]
/// 逻辑段重叠检查、堆伸缩、fork深拷贝与ELF校验的测试函数
pub fn memory_set_test() {
    let free_before = super::free_frame_count();
    let rw_u = MapPermission::R | MapPermission::W | MapPermission::U;
    let va = |page: usize| VirtAddr::from(page * PAGE_SIZE);

    // 逻辑段两两不相交
    let mut parent = MemorySet::new_bare().unwrap();
    parent.map_trampoline().unwrap();
    parent.insert_framed_area(va(1), va(3), rw_u).unwrap();
    assert!(matches!(
        parent.insert_framed_area(va(2), va(4), rw_u),
        Err(MmError::AreaOverlap { .. })
    ));
    assert!(parent.translate(VirtPageNum(3)).is_none());
    parent.insert_framed_area(va(3), va(4), rw_u).unwrap();
    assert_eq!(parent.area_count(), 2);

    // 堆：空逻辑段向上扩展，碰到其他逻辑段时拒绝
    parent.insert_framed_area(va(8), va(8), rw_u).unwrap();
    parent.insert_framed_area(va(12), va(13), rw_u).unwrap();
    parent.append_to(va(8), VirtAddr(va(10).0 - 1)).unwrap();
    assert!(parent.translate(VirtPageNum(9)).is_some());
    assert!(matches!(
        parent.append_to(va(8), va(14)),
        Err(MmError::AreaOverlap { .. })
    ));
    assert!(parent.translate(VirtPageNum(10)).is_none());
    parent.shrink_to(va(8), va(9)).unwrap();
    assert!(parent.translate(VirtPageNum(9)).is_none());
    assert!(parent.translate(VirtPageNum(8)).is_some());

    // mmap/munmap
    assert_eq!(
        parent.mmap(va(20).0 + 1, PAGE_SIZE, MapPermission::R),
        Err(MmError::InvalidRange)
    );
    assert_eq!(
        parent.mmap(va(20).0, PAGE_SIZE, MapPermission::empty()),
        Err(MmError::InvalidRange)
    );
    parent.mmap(va(20).0, 2 * PAGE_SIZE, MapPermission::R | MapPermission::W).unwrap();
    assert!(parent.translate(VirtPageNum(21)).unwrap().is_user());
    assert!(parent.munmap(va(20).0, PAGE_SIZE).is_err());
    parent.munmap(va(20).0, 2 * PAGE_SIZE).unwrap();
    assert!(parent.translate(VirtPageNum(20)).is_none());

    // fork：内容相同、物理页不同、互不影响
    for (i, vpn) in [1usize, 2, 3, 8].iter().enumerate() {
        let ppn = parent.translate(VirtPageNum(*vpn)).unwrap().ppn();
        ppn.get_bytes_array().fill(0x5a + i as u8);
    }
    let child = MemorySet::from_existing_user(&parent).unwrap();
    assert_eq!(child.area_count(), parent.area_count());
    for vpn in [1usize, 2, 3, 8] {
        let parent_ppn = parent.translate(VirtPageNum(vpn)).unwrap().ppn();
        let child_ppn = child.translate(VirtPageNum(vpn)).unwrap().ppn();
        assert!(parent_ppn != child_ppn);
        assert_eq!(parent_ppn.get_bytes_array(), child_ppn.get_bytes_array());
    }
    let child_heap = child.translate(VirtPageNum(8)).unwrap().ppn();
    child_heap.get_bytes_array()[0] = 0;
    let parent_heap = parent.translate(VirtPageNum(8)).unwrap().ppn();
    assert_eq!(parent_heap.get_bytes_array()[0], 0x5a + 3);
    assert!(child.translate(VirtAddr::from(TRAMPOLINE).floor()).is_some());
    drop(child);

    // 畸形程序镜像
    assert!(MemorySet::from_elf(&[0u8; 64]).is_err());
    let mut bogus = [0u8; 128];
    bogus[..4].copy_from_slice(&ELF_MAGIC);
    assert!(MemorySet::from_elf(&bogus).is_err());
    if let Some(elf_data) = crate::loader::get_app_data_by_name("exit7") {
        let (memory_set, user_sp, entry) = MemorySet::from_elf(elf_data).unwrap();
        assert!(memory_set.translate(VirtAddr::from(entry).floor()).is_some());
        assert!(memory_set
            .translate(VirtAddr::from(user_sp - 1).floor())
            .unwrap()
            .writable());
        assert!(!memory_set
            .translate(VirtAddr::from(TRAP_CONTEXT).floor())
            .unwrap()
            .is_user());
        // 截断在程序头表之前
        assert!(MemorySet::from_elf(&elf_data[..64]).is_err());

        // 空堆与紧贴用户栈顶的mmap共用起始页号，munmap只能移除后者
        let mut memory_set = memory_set;
        let heap_start = VirtAddr::from(user_sp);
        let heap_vpn = heap_start.floor();
        assert_eq!(memory_set.munmap(user_sp, 0), Err(MmError::InvalidRange));
        memory_set
            .mmap(user_sp, PAGE_SIZE, MapPermission::R | MapPermission::W)
            .unwrap();
        assert!(memory_set.translate(heap_vpn).is_some());
        memory_set.munmap(user_sp, PAGE_SIZE).unwrap();
        assert!(memory_set.translate(heap_vpn).is_none());
        memory_set
            .mmap(user_sp, PAGE_SIZE, MapPermission::R)
            .unwrap();
        memory_set.munmap(user_sp, PAGE_SIZE).unwrap();
        // 堆仍在，可以继续增长
        memory_set
            .append_to(heap_start, VirtAddr::from(user_sp + PAGE_SIZE))
            .unwrap();
        assert!(memory_set.translate(heap_vpn).unwrap().writable());

        // 提前回收后不再留下指向已释放页帧的页表项
        memory_set.recycle_data_pages();
        assert_eq!(memory_set.area_count(), 0);
        assert!(memory_set.translate(VirtAddr::from(entry).floor()).is_none());
        assert!(memory_set.translate(heap_vpn).is_none());
        assert!(memory_set
            .translate(VirtAddr::from(TRAP_CONTEXT).floor())
            .is_none());
    }

    drop(parent);
    assert_eq!(super::free_frame_count(), free_before);
    log::info!("memory_set_test passed!");
}
