//! Trap处理模块
//!
//! 用户态只有唯一的Trap入口 `__alltraps`，它位于跳板页，在 [`trap_return`] 中
//! 将 `stvec` 设为跳板页地址。`__alltraps` 保存Trap上下文、切换到内核地址空间后
//! 跳转到 [`trap_handler`]，后者根据 `scause` 分发处理。
//!
//! 内核态不开中断，进入内核后 `stvec` 指向 [`trap_from_kernel`]。

mod context;

use crate::config::{TRAMPOLINE, TRAP_CONTEXT};
use crate::syscall::syscall;
use crate::task::{
    current_trap_cx, current_user_token, exit_current_and_run_next, suspend_current_and_run_next,
};
use crate::timer::set_next_trigger;
use core::arch::{asm, global_asm};
use riscv::register::{
    mtvec::TrapMode,
    scause::{self, Exception, Interrupt, Trap},
    sie, stval, stvec,
};

global_asm!(include_str!("trap.S"));

/// 被访存异常杀死的进程的退出码
const EXIT_CODE_PAGE_FAULT: i32 = -2;
/// 被非法指令杀死的进程的退出码
const EXIT_CODE_ILLEGAL_INSTRUCTION: i32 = -3;

/// 初始化 CSR `stvec` 为内核态Trap入口
pub fn init() {
    set_kernel_trap_entry();
}

fn set_kernel_trap_entry() {
    unsafe {
        stvec::write(trap_from_kernel as usize, TrapMode::Direct);
    }
}

fn set_user_trap_entry() {
    unsafe {
        stvec::write(TRAMPOLINE, TrapMode::Direct);
    }
}

/// 使能时钟中断
pub fn enable_timer_interrupt() {
    unsafe {
        sie::set_stimer();
    }
}

#[no_mangle]
/// 处理中断、异常、系统调用
pub fn trap_handler() -> ! {
    set_kernel_trap_entry();
    let scause = scause::read();
    let stval = stval::read();
    match scause.cause() {
        Trap::Exception(Exception::UserEnvCall) => {
            let mut cx = current_trap_cx();
            cx.sepc += 4;
            let result = syscall(cx.x[17], [cx.x[10], cx.x[11], cx.x[12]]);
            // exec会替换Trap上下文所在的物理页，需要重新获取
            cx = current_trap_cx();
            cx.x[10] = result as usize;
        }
        Trap::Exception(Exception::StoreFault)
        | Trap::Exception(Exception::StorePageFault)
        | Trap::Exception(Exception::InstructionFault)
        | Trap::Exception(Exception::InstructionPageFault)
        | Trap::Exception(Exception::LoadFault)
        | Trap::Exception(Exception::LoadPageFault) => {
            log::warn!(
                "[kernel] {:?} in application, bad addr = {:#x}, bad instruction = {:#x}, kernel killed it.",
                scause.cause(),
                stval,
                current_trap_cx().sepc,
            );
            exit_current_and_run_next(EXIT_CODE_PAGE_FAULT);
        }
        Trap::Exception(Exception::IllegalInstruction) => {
            log::warn!("[kernel] IllegalInstruction in application, kernel killed it.");
            exit_current_and_run_next(EXIT_CODE_ILLEGAL_INSTRUCTION);
        }
        Trap::Interrupt(Interrupt::SupervisorTimer) => {
            set_next_trigger();
            suspend_current_and_run_next();
        }
        _ => {
            panic!(
                "Unsupported trap {:?}, stval = {:#x}!",
                scause.cause(),
                stval
            );
        }
    }
    trap_return();
}

#[no_mangle]
/// 返回用户态：a0 = Trap上下文的虚拟地址，a1 = 用户地址空间的token，
/// 然后跳转到跳板页中的 `__restore`
pub fn trap_return() -> ! {
    set_user_trap_entry();
    let trap_cx_ptr = TRAP_CONTEXT;
    let user_satp = current_user_token();
    extern "C" {
        fn __alltraps();
        fn __restore();
    }
    let restore_va = __restore as usize - __alltraps as usize + TRAMPOLINE;
    unsafe {
        asm!(
            "fence.i",
            "jr {restore_va}",
            restore_va = in(reg) restore_va,
            in("a0") trap_cx_ptr,
            in("a1") user_satp,
            options(noreturn)
        );
    }
}

#[no_mangle]
/// 内核态不处理Trap
pub fn trap_from_kernel() -> ! {
    let scause = scause::read();
    panic!(
        "a trap {:?} from kernel, stval = {:#x}!",
        scause.cause(),
        stval::read()
    );
}

pub use self::context::TrapContext;
