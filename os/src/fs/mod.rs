//! 文件抽象
//!
//! 进程通过文件描述符表访问实现了 [`File`] 的对象，目前只有标准输入输出和管道。

mod pipe;
mod stdio;

use crate::mm::UserBuffer;

/// 可以按字节读写的内核对象
pub trait File: Send + Sync {
    fn readable(&self) -> bool;
    fn writable(&self) -> bool;
    /// 读到 `buf` 中，返回实际读到的字节数
    fn read(&self, buf: UserBuffer) -> usize;
    /// 把 `buf` 写出，返回实际写出的字节数
    fn write(&self, buf: UserBuffer) -> usize;
}

pub use pipe::{make_pipe, pipe_test, Pipe};
pub use stdio::{Stdin, Stdout};
