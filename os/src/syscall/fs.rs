//! 文件相关的系统调用

use crate::fs::make_pipe;
use crate::mm::{copy_to_user, translated_byte_buffer, translated_writable_buffer, UserBuffer};
use crate::task::{current_task, current_user_token};

/// 把 `buf` 开始的 `len` 个字节写到文件 `fd`，返回写出的字节数
pub fn sys_write(fd: usize, buf: *const u8, len: usize) -> isize {
    let token = current_user_token();
    let task = current_task().expect("no running task");
    let inner = task.inner_exclusive_access();
    let Some(Some(file)) = inner.fd_table.get(fd) else {
        return -1;
    };
    if !file.writable() {
        return -1;
    }
    let file = file.clone();
    // 写管道时可能让出处理器，先归还独占借用
    drop(inner);
    match translated_byte_buffer(token, buf, len) {
        Some(buffers) => file.write(UserBuffer::new(buffers)) as isize,
        None => -1,
    }
}

/// 从文件 `fd` 读取最多 `len` 个字节到 `buf`，返回读到的字节数
pub fn sys_read(fd: usize, buf: *mut u8, len: usize) -> isize {
    let token = current_user_token();
    let task = current_task().expect("no running task");
    let inner = task.inner_exclusive_access();
    let Some(Some(file)) = inner.fd_table.get(fd) else {
        return -1;
    };
    if !file.readable() {
        return -1;
    }
    let file = file.clone();
    drop(inner);
    match translated_writable_buffer(token, buf, len) {
        Some(buffers) => file.read(UserBuffer::new(buffers)) as isize,
        None => -1,
    }
}

/// 关闭文件描述符
pub fn sys_close(fd: usize) -> isize {
    let task = current_task().expect("no running task");
    let mut inner = task.inner_exclusive_access();
    match inner.fd_table.get_mut(fd) {
        Some(slot) if slot.is_some() => {
            *slot = None;
            0
        }
        _ => -1,
    }
}

/// 创建管道，把读端和写端的文件描述符依次写入 `pipe`
pub fn sys_pipe(pipe: *mut usize) -> isize {
    let task = current_task().expect("no running task");
    let token = current_user_token();
    let mut inner = task.inner_exclusive_access();
    let (pipe_read, pipe_write) = make_pipe();
    let read_fd = inner.alloc_fd();
    inner.fd_table[read_fd] = Some(pipe_read);
    let write_fd = inner.alloc_fd();
    inner.fd_table[write_fd] = Some(pipe_write);
    if copy_to_user(token, pipe as *mut [usize; 2], &[read_fd, write_fd]).is_none() {
        inner.fd_table[read_fd] = None;
        inner.fd_table[write_fd] = None;
        return -1;
    }
    0
}

/// 复制文件描述符，新描述符是最小的空闲描述符
pub fn sys_dup(fd: usize) -> isize {
    let task = current_task().expect("no running task");
    let mut inner = task.inner_exclusive_access();
    let Some(Some(file)) = inner.fd_table.get(fd) else {
        return -1;
    };
    let file = file.clone();
    let new_fd = inner.alloc_fd();
    inner.fd_table[new_fd] = Some(file);
    new_fd as isize
}
