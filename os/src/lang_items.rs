//! 程序panic处理，崩溃时打印文件名、行号、错误信息、栈回溯信息，并关机

use crate::sbi::shutdown;
use crate::stack_trace::print_stack_trace;
use core::panic::PanicInfo;
use log::*;

#[panic_handler]
/// 内核panic处理函数
fn panic(info: &PanicInfo) -> ! {
    if let Some(location) = info.location() {
        error!(
            "[kernel] Panicked at {}:{} {}",
            location.file(),
            location.line(),
            info.message()
        );
    } else {
        error!("[kernel] Panicked: {}", info.message());
    }
    unsafe {
        print_stack_trace();
    }
    shutdown(true)
}
