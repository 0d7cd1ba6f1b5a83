//! 实现UPSafeCell<T>结构体，用于实现单处理器上的安全的互斥访问
//!
//! 内核只运行在一个硬件线程上，不存在真正的并行，因此这里不使用自旋锁，
//! 而是用 `RefCell` 做借用检查：同一个单例在已被可变借用时再次借用会直接panic。
//! 借用期间屏蔽S态中断，保证中断处理不会在临界区内重入这些单例。

use core::cell::{RefCell, RefMut, UnsafeCell};
use core::ops::{Deref, DerefMut};
use lazy_static::*;
use riscv::register::sstatus;

/// 不做任何检查的内部可变容器，只用于记录中断屏蔽的嵌套层数
struct UPSafeCellRaw<T> {
    inner: UnsafeCell<T>,
}

unsafe impl<T> Sync for UPSafeCellRaw<T> {}

impl<T> UPSafeCellRaw<T> {
    unsafe fn new(value: T) -> Self {
        Self {
            inner: UnsafeCell::new(value),
        }
    }
    #[allow(clippy::mut_from_ref)]
    fn get_mut(&self) -> &mut T {
        unsafe { &mut (*self.inner.get()) }
    }
}

/// 中断屏蔽状态：嵌套层数以及最外层屏蔽之前的 `sstatus.SIE`
struct IntrMaskingInfo {
    nested_level: usize,
    sie_before_masking: bool,
}

lazy_static! {
    static ref INTR_MASKING_INFO: UPSafeCellRaw<IntrMaskingInfo> =
        unsafe { UPSafeCellRaw::new(IntrMaskingInfo::new()) };
}

impl IntrMaskingInfo {
    fn new() -> Self {
        Self {
            nested_level: 0,
            sie_before_masking: false,
        }
    }

    fn enter(&mut self) {
        let sie = sstatus::read().sie();
        unsafe {
            sstatus::clear_sie();
        }
        if self.nested_level == 0 {
            self.sie_before_masking = sie;
        }
        self.nested_level += 1;
    }

    fn exit(&mut self) {
        self.nested_level -= 1;
        if self.nested_level == 0 && self.sie_before_masking {
            unsafe {
                sstatus::set_sie();
            }
        }
    }
}

pub struct UPSafeCell<T> {
    inner: RefCell<T>,
}

/* sync解释
 * sync是一种标记特质（marker trait），表示这个类型是线程安全的（thread-safe）
 * 内核的全局单例都要声明为static，所以需要保证它们是Sync的
 * 因此在这里实现空的sync<T>特征来避开编译器线程安全检查
 * */
unsafe impl<T> Sync for UPSafeCell<T> {}

/// `UPSafeCell` 的独占借用，存活期间中断保持屏蔽
pub struct UPRefMut<'a, T>(Option<RefMut<'a, T>>);

impl<T> UPSafeCell<T> {
    /// UPSafeCell构造器，用户需要自己确定内部结构体运行在单处理器上，否则会出现数据竞争
    pub unsafe fn new(value: T) -> Self {
        Self {
            inner: RefCell::new(value),
        }
    }
    /// 互斥获取内部数据的可变借用；重复借用会panic
    pub fn exclusive_access(&self) -> UPRefMut<'_, T> {
        INTR_MASKING_INFO.get_mut().enter();
        UPRefMut(Some(self.inner.borrow_mut()))
    }
    /// 在独占借用下执行闭包
    pub fn exclusive_session<F, V>(&self, f: F) -> V
    where
        F: FnOnce(&mut T) -> V,
    {
        let mut inner = self.exclusive_access();
        f(inner.deref_mut())
    }
}

impl<'a, T> Drop for UPRefMut<'a, T> {
    fn drop(&mut self) {
        // 先归还借用，再恢复中断
        self.0 = None;
        INTR_MASKING_INFO.get_mut().exit();
    }
}

impl<'a, T> Deref for UPRefMut<'a, T> {
    type Target = T;
    fn deref(&self) -> &Self::Target {
        self.0.as_ref().unwrap().deref()
    }
}

impl<'a, T> DerefMut for UPRefMut<'a, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.0.as_mut().unwrap().deref_mut()
    }
}
