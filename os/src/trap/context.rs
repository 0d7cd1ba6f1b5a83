//! 实现TrapContext数据结构

use riscv::register::sstatus::{self, Sstatus, SPP};

/// Trap上下文，放在每个用户地址空间的 `TRAP_CONTEXT` 页
///
/// 字段顺序与 `trap.S` 中的偏移一一对应：`kernel_satp`、`kernel_sp`、
/// `trap_handler` 分别位于 34、35、36 号槽位，进程创建后不再改变。
#[repr(C)]
pub struct TrapContext {
    /// 通用寄存器 [0..31]
    pub x: [usize; 32],
    /// CSR sstatus
    pub sstatus: Sstatus,
    /// CSR sepc
    pub sepc: usize,
    /// 内核地址空间的token
    pub kernel_satp: usize,
    /// 该进程内核栈的栈顶
    pub kernel_sp: usize,
    /// trap处理函数地址
    pub trap_handler: usize,
}

impl TrapContext {
    /// 设置当前上下文的栈指针
    pub fn set_sp(&mut self, sp: usize) {
        self.x[2] = sp;
    }
    /// 进程第一次进入用户态时的上下文：从 `entry` 开始执行，栈指针为 `sp`
    pub fn app_init_context(
        entry: usize,
        sp: usize,
        kernel_satp: usize,
        kernel_sp: usize,
        trap_handler: usize,
    ) -> Self {
        let mut sstatus = sstatus::read();
        // sret之后回到U态
        sstatus.set_spp(SPP::User);
        let mut cx = Self {
            x: [0; 32],
            sstatus,
            sepc: entry,
            kernel_satp,
            kernel_sp,
            trap_handler,
        };
        cx.set_sp(sp);
        cx
    }
}
