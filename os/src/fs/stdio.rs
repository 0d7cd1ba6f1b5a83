//! 标准输入输出

use super::File;
use crate::mm::UserBuffer;
use crate::sbi::{console_getchar, console_putchar};
use crate::task::suspend_current_and_run_next;

/// 标准输入，每次最多读一个字符
pub struct Stdin;

/// 标准输出
pub struct Stdout;

impl File for Stdin {
    fn readable(&self) -> bool {
        true
    }
    fn writable(&self) -> bool {
        false
    }
    fn read(&self, mut user_buf: UserBuffer) -> usize {
        if user_buf.len() == 0 {
            return 0;
        }
        let c = loop {
            let c = console_getchar();
            if c == 0 || c == usize::MAX {
                // 没有输入时让出处理器
                suspend_current_and_run_next();
                continue;
            }
            break c;
        };
        user_buf.buffers[0][0] = c as u8;
        1
    }
    fn write(&self, _user_buf: UserBuffer) -> usize {
        panic!("Cannot write to stdin!");
    }
}

impl File for Stdout {
    fn readable(&self) -> bool {
        false
    }
    fn writable(&self) -> bool {
        true
    }
    fn read(&self, _user_buf: UserBuffer) -> usize {
        panic!("Cannot read from stdout!");
    }
    fn write(&self, user_buf: UserBuffer) -> usize {
        // 多字节字符可能跨页，逐字节输出
        for buffer in user_buf.buffers.iter() {
            buffer.iter().for_each(|c| console_putchar(*c as usize));
        }
        user_buf.len()
    }
}
