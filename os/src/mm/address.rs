//! 物理/虚拟地址与页号的值类型（SV39）

use super::PageTableEntry;
use crate::config::{PAGE_SIZE, PAGE_SIZE_BITS};
use core::fmt::{self, Debug, Formatter};

/// 地址位宽
const PA_WIDTH_SV39: usize = 56;
const VA_WIDTH_SV39: usize = 39;
const PPN_WIDTH_SV39: usize = PA_WIDTH_SV39 - PAGE_SIZE_BITS;
const VPN_WIDTH_SV39: usize = VA_WIDTH_SV39 - PAGE_SIZE_BITS;

/// 每级页表索引的位宽，以及页表级数
const INDEX_BITS: usize = 9;
pub const PAGE_TABLE_LEVELS: usize = 3;

/// 物理地址
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq)]
pub struct PhysAddr(pub usize);

/// 虚拟地址
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq)]
pub struct VirtAddr(pub usize);

/// 物理页号
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq)]
pub struct PhysPageNum(pub usize);

/// 虚拟页号
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq)]
pub struct VirtPageNum(pub usize);

macro_rules! impl_debug {
    ($($ty:ident => $tag:literal),+ $(,)?) => {
        $(
            impl Debug for $ty {
                fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
                    f.write_fmt(format_args!(concat!($tag, ":{:#x}"), self.0))
                }
            }
        )+
    };
}

impl_debug!(VirtAddr => "VA", VirtPageNum => "VPN", PhysAddr => "PA", PhysPageNum => "PPN");

/// usize -> T：截断到SV39规定的有效位宽
macro_rules! impl_from_usize {
    ($($ty:ident => $width:expr),+ $(,)?) => {
        $(
            impl From<usize> for $ty {
                fn from(v: usize) -> Self {
                    Self(v & ((1 << $width) - 1))
                }
            }
        )+
    };
}

impl_from_usize!(
    PhysAddr => PA_WIDTH_SV39,
    PhysPageNum => PPN_WIDTH_SV39,
    VirtAddr => VA_WIDTH_SV39,
    VirtPageNum => VPN_WIDTH_SV39,
);

impl From<PhysAddr> for usize {
    fn from(v: PhysAddr) -> Self {
        v.0
    }
}
impl From<PhysPageNum> for usize {
    fn from(v: PhysPageNum) -> Self {
        v.0
    }
}
impl From<VirtAddr> for usize {
    fn from(v: VirtAddr) -> Self {
        // SV39要求第38位之上的位与第38位相同，高半空间需要符号扩展
        if v.0 >= (1 << (VA_WIDTH_SV39 - 1)) {
            v.0 | (!((1 << VA_WIDTH_SV39) - 1))
        } else {
            v.0
        }
    }
}
impl From<VirtPageNum> for usize {
    fn from(v: VirtPageNum) -> Self {
        v.0
    }
}

impl VirtAddr {
    /// 向下取整获取虚拟页号
    pub fn floor(&self) -> VirtPageNum {
        VirtPageNum(self.0 / PAGE_SIZE)
    }
    /// 向上取整获取虚拟页号
    pub fn ceil(&self) -> VirtPageNum {
        if self.0 == 0 {
            VirtPageNum(0)
        } else {
            VirtPageNum((self.0 - 1 + PAGE_SIZE) / PAGE_SIZE)
        }
    }
    /// 获取页内偏移
    pub fn page_offset(&self) -> usize {
        self.0 & (PAGE_SIZE - 1)
    }
    /// 判断虚拟地址是否按页对齐
    pub fn aligned(&self) -> bool {
        self.page_offset() == 0
    }
}
impl From<VirtAddr> for VirtPageNum {
    fn from(v: VirtAddr) -> Self {
        assert_eq!(v.page_offset(), 0);
        v.floor()
    }
}
impl From<VirtPageNum> for VirtAddr {
    fn from(v: VirtPageNum) -> Self {
        Self(v.0 << PAGE_SIZE_BITS)
    }
}

impl PhysAddr {
    /// 向下取整获取物理页号
    pub fn floor(&self) -> PhysPageNum {
        PhysPageNum(self.0 / PAGE_SIZE)
    }
    /// 向上取整获取物理页号
    pub fn ceil(&self) -> PhysPageNum {
        if self.0 == 0 {
            PhysPageNum(0)
        } else {
            PhysPageNum((self.0 - 1 + PAGE_SIZE) / PAGE_SIZE)
        }
    }
    /// 获取页内偏移
    pub fn page_offset(&self) -> usize {
        self.0 & (PAGE_SIZE - 1)
    }
    /// 内核空间恒等映射，物理地址可以直接当作指针使用
    pub fn get_mut<T>(&self) -> &'static mut T {
        unsafe { &mut *(self.0 as *mut T) }
    }
}
impl From<PhysAddr> for PhysPageNum {
    fn from(v: PhysAddr) -> Self {
        assert_eq!(v.page_offset(), 0);
        v.floor()
    }
}
impl From<PhysPageNum> for PhysAddr {
    fn from(v: PhysPageNum) -> Self {
        Self(v.0 << PAGE_SIZE_BITS)
    }
}

impl VirtPageNum {
    /// 获取虚拟页号三个等级的索引，返回结果中虚拟索引的级别从高到低
    pub fn indexes(&self) -> [usize; PAGE_TABLE_LEVELS] {
        let mut vpn = self.0;
        let mut idx = [0usize; PAGE_TABLE_LEVELS];
        for i in (0..PAGE_TABLE_LEVELS).rev() {
            idx[i] = vpn & ((1 << INDEX_BITS) - 1);
            vpn >>= INDEX_BITS;
        }
        idx
    }
}

impl PhysPageNum {
    /// 把物理页帧视为512个页表项
    pub fn get_pte_array(&self) -> &'static mut [PageTableEntry] {
        let pa: PhysAddr = (*self).into();
        unsafe {
            core::slice::from_raw_parts_mut(pa.0 as *mut PageTableEntry, PAGE_SIZE / 8)
        }
    }
    /// 根据物理页号返回整页的字节数组数据
    pub fn get_bytes_array(&self) -> &'static mut [u8] {
        let pa: PhysAddr = (*self).into();
        unsafe { core::slice::from_raw_parts_mut(pa.0 as *mut u8, PAGE_SIZE) }
    }
    /// 获取一个放在物理页帧开头对应类型为T的可变引用
    pub fn get_mut<T>(&self) -> &'static mut T {
        let pa: PhysAddr = (*self).into();
        pa.get_mut()
    }
}

/// 递增特征
pub trait StepByOne {
    fn step(&mut self);
}
impl StepByOne for VirtPageNum {
    fn step(&mut self) {
        self.0 += 1;
    }
}
impl StepByOne for PhysPageNum {
    fn step(&mut self) {
        self.0 += 1;
    }
}

#[derive(Copy, Clone)]
/// 左闭右开的简单范围 `[l, r)`
pub struct SimpleRange<T>
where
    T: StepByOne + Copy + PartialEq + PartialOrd + Debug,
{
    l: T,
    r: T,
}
impl<T> SimpleRange<T>
where
    T: StepByOne + Copy + PartialEq + PartialOrd + Debug,
{
    pub fn new(start: T, end: T) -> Self {
        assert!(start <= end, "start {:?} > end {:?}!", start, end);
        Self { l: start, r: end }
    }
    pub fn get_start(&self) -> T {
        self.l
    }
    pub fn get_end(&self) -> T {
        self.r
    }
    pub fn is_empty(&self) -> bool {
        self.l == self.r
    }
    /// 两个范围是否有公共元素，空范围与任何范围都不相交
    pub fn intersects(&self, other: &Self) -> bool {
        !self.is_empty() && !other.is_empty() && self.l < other.r && other.l < self.r
    }
}

impl<T> Debug for SimpleRange<T>
where
    T: StepByOne + Copy + PartialEq + PartialOrd + Debug,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_fmt(format_args!("[{:?}, {:?})", self.l, self.r))
    }
}

impl<T> IntoIterator for SimpleRange<T>
where
    T: StepByOne + Copy + PartialEq + PartialOrd + Debug,
{
    type Item = T;
    type IntoIter = SimpleRangeIterator<T>;
    fn into_iter(self) -> Self::IntoIter {
        SimpleRangeIterator::new(self.l, self.r)
    }
}
/// 简单范围结构的迭代器
pub struct SimpleRangeIterator<T>
where
    T: StepByOne + Copy + PartialEq + PartialOrd + Debug,
{
    current: T,
    end: T,
}
impl<T> SimpleRangeIterator<T>
where
    T: StepByOne + Copy + PartialEq + PartialOrd + Debug,
{
    pub fn new(l: T, r: T) -> Self {
        Self { current: l, end: r }
    }
}
impl<T> Iterator for SimpleRangeIterator<T>
where
    T: StepByOne + Copy + PartialEq + PartialOrd + Debug,
{
    type Item = T;
    fn next(&mut self) -> Option<Self::Item> {
        if self.current == self.end {
            None
        } else {
            let t = self.current;
            self.current.step();
            Some(t)
        }
    }
}

/// a simple range structure for virtual page number
pub type VPNRange = SimpleRange<VirtPageNum>;

#[allow(unused)]
/// 地址与页号换算的测试函数
pub fn address_test() {
    for &a in [0usize, 1, 0xfff, 0x1000, 0x1234_5678, 0x3f_ffff_ffff].iter() {
        let va = VirtAddr::from(a);
        let page_aligned = VirtAddr::from(va.floor());
        assert_eq!(page_aligned.0, a & !(PAGE_SIZE - 1));
        assert_eq!(va.floor().0 * PAGE_SIZE + va.page_offset(), va.0);
        assert!(va.ceil().0 - va.floor().0 <= 1);
        assert_eq!(va.aligned(), va.floor() == va.ceil());
    }
    // 高半空间的跳板页地址经过截断再扩展后必须还原
    let trampoline = VirtAddr::from(crate::config::TRAMPOLINE);
    assert_eq!(usize::from(trampoline), crate::config::TRAMPOLINE);
    // 27位虚拟页号依次拆成三级索引
    let vpn = VirtPageNum((1 << 18) | (2 << 9) | 3);
    assert_eq!(vpn.indexes(), [1, 2, 3]);
    let range = VPNRange::new(VirtPageNum(4), VirtPageNum(8));
    assert!(range.intersects(&VPNRange::new(VirtPageNum(7), VirtPageNum(9))));
    assert!(!range.intersects(&VPNRange::new(VirtPageNum(8), VirtPageNum(9))));
    assert!(!range.intersects(&VPNRange::new(VirtPageNum(5), VirtPageNum(5))));
    assert_eq!(range.into_iter().count(), 4);
    log::info!("address_test passed!");
}
