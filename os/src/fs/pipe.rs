//! 管道：一个环形缓冲区加上读端和写端两个文件

use super::File;
use crate::config::PIPE_BUFFER_SIZE;
use crate::mm::UserBuffer;
use crate::sync::UPSafeCell;
use crate::task::suspend_current_and_run_next;
use alloc::sync::{Arc, Weak};

/// 管道的一端
pub struct Pipe {
    readable: bool,
    writable: bool,
    buffer: Arc<UPSafeCell<PipeRingBuffer>>,
}

impl Pipe {
    pub fn read_end_with_buffer(buffer: Arc<UPSafeCell<PipeRingBuffer>>) -> Self {
        Self {
            readable: true,
            writable: false,
            buffer,
        }
    }
    pub fn write_end_with_buffer(buffer: Arc<UPSafeCell<PipeRingBuffer>>) -> Self {
        Self {
            readable: false,
            writable: true,
            buffer,
        }
    }
}

#[derive(Copy, Clone, PartialEq)]
enum RingBufferStatus {
    Full,
    Empty,
    Normal,
}

pub struct PipeRingBuffer {
    arr: [u8; PIPE_BUFFER_SIZE],
    head: usize,
    tail: usize,
    status: RingBufferStatus,
    /// 缓冲区只持有两端的弱引用，一端全部关闭后另一端据此返回
    read_end: Option<Weak<Pipe>>,
    write_end: Option<Weak<Pipe>>,
}

impl PipeRingBuffer {
    pub fn new() -> Self {
        Self {
            arr: [0; PIPE_BUFFER_SIZE],
            head: 0,
            tail: 0,
            status: RingBufferStatus::Empty,
            read_end: None,
            write_end: None,
        }
    }
    pub fn set_read_end(&mut self, read_end: &Arc<Pipe>) {
        self.read_end = Some(Arc::downgrade(read_end));
    }
    pub fn set_write_end(&mut self, write_end: &Arc<Pipe>) {
        self.write_end = Some(Arc::downgrade(write_end));
    }
    pub fn write_byte(&mut self, byte: u8) {
        self.status = RingBufferStatus::Normal;
        self.arr[self.tail] = byte;
        self.tail = (self.tail + 1) % PIPE_BUFFER_SIZE;
        if self.tail == self.head {
            self.status = RingBufferStatus::Full;
        }
    }
    pub fn read_byte(&mut self) -> u8 {
        self.status = RingBufferStatus::Normal;
        let c = self.arr[self.head];
        self.head = (self.head + 1) % PIPE_BUFFER_SIZE;
        if self.head == self.tail {
            self.status = RingBufferStatus::Empty;
        }
        c
    }
    pub fn available_read(&self) -> usize {
        if self.status == RingBufferStatus::Empty {
            0
        } else if self.tail > self.head {
            self.tail - self.head
        } else {
            self.tail + PIPE_BUFFER_SIZE - self.head
        }
    }
    pub fn available_write(&self) -> usize {
        if self.status == RingBufferStatus::Full {
            0
        } else {
            PIPE_BUFFER_SIZE - self.available_read()
        }
    }
    pub fn all_write_ends_closed(&self) -> bool {
        self.write_end
            .as_ref()
            .map_or(true, |write_end| write_end.upgrade().is_none())
    }
    pub fn all_read_ends_closed(&self) -> bool {
        self.read_end
            .as_ref()
            .map_or(true, |read_end| read_end.upgrade().is_none())
    }
}

/// 创建一个管道，返回 (读端, 写端)
pub fn make_pipe() -> (Arc<Pipe>, Arc<Pipe>) {
    let buffer = Arc::new(unsafe { UPSafeCell::new(PipeRingBuffer::new()) });
    let read_end = Arc::new(Pipe::read_end_with_buffer(buffer.clone()));
    let write_end = Arc::new(Pipe::write_end_with_buffer(buffer.clone()));
    let mut ring_buffer = buffer.exclusive_access();
    ring_buffer.set_read_end(&read_end);
    ring_buffer.set_write_end(&write_end);
    drop(ring_buffer);
    (read_end, write_end)
}

impl File for Pipe {
    fn readable(&self) -> bool {
        self.readable
    }
    fn writable(&self) -> bool {
        self.writable
    }
    fn read(&self, buf: UserBuffer) -> usize {
        assert!(self.readable());
        let want_to_read = buf.len();
        let mut buf_iter = buf.into_iter();
        let mut already_read = 0usize;
        loop {
            let mut ring_buffer = self.buffer.exclusive_access();
            let loop_read = ring_buffer.available_read();
            if loop_read == 0 {
                if ring_buffer.all_write_ends_closed() {
                    return already_read;
                }
                drop(ring_buffer);
                suspend_current_and_run_next();
                continue;
            }
            for _ in 0..loop_read {
                if let Some(byte_ref) = buf_iter.next() {
                    unsafe {
                        *byte_ref = ring_buffer.read_byte();
                    }
                    already_read += 1;
                    if already_read == want_to_read {
                        return want_to_read;
                    }
                } else {
                    return already_read;
                }
            }
        }
    }
    fn write(&self, buf: UserBuffer) -> usize {
        assert!(self.writable());
        let want_to_write = buf.len();
        let mut buf_iter = buf.into_iter();
        let mut already_write = 0usize;
        loop {
            let mut ring_buffer = self.buffer.exclusive_access();
            // 没有读者时写入的数据再也不会被读走
            if ring_buffer.all_read_ends_closed() {
                return already_write;
            }
            let loop_write = ring_buffer.available_write();
            if loop_write == 0 {
                drop(ring_buffer);
                suspend_current_and_run_next();
                continue;
            }
            for _ in 0..loop_write {
                if let Some(byte_ref) = buf_iter.next() {
                    ring_buffer.write_byte(unsafe { *byte_ref });
                    already_write += 1;
                    if already_write == want_to_write {
                        return want_to_write;
                    }
                } else {
                    return already_write;
                }
            }
        }
    }
}

#[allow(unused)]
/// 环形缓冲区的测试函数
pub fn pipe_test() {
    let (read_end, write_end) = make_pipe();
    let buffer = read_end.buffer.clone();
    {
        let mut ring = buffer.exclusive_access();
        assert_eq!(ring.available_read(), 0);
        assert_eq!(ring.available_write(), PIPE_BUFFER_SIZE);
        for i in 0..PIPE_BUFFER_SIZE {
            ring.write_byte(i as u8);
        }
        assert_eq!(ring.available_write(), 0);
        assert_eq!(ring.available_read(), PIPE_BUFFER_SIZE);
        for i in 0..PIPE_BUFFER_SIZE / 2 {
            assert_eq!(ring.read_byte(), i as u8);
        }
        // 写指针绕回数组开头
        for i in 0..PIPE_BUFFER_SIZE / 2 {
            ring.write_byte(0x80 + i as u8);
        }
        assert_eq!(ring.available_write(), 0);
        for i in PIPE_BUFFER_SIZE / 2..PIPE_BUFFER_SIZE {
            assert_eq!(ring.read_byte(), i as u8);
        }
        for i in 0..PIPE_BUFFER_SIZE / 2 {
            assert_eq!(ring.read_byte(), 0x80 + i as u8);
        }
        assert_eq!(ring.available_read(), 0);
        assert!(!ring.all_write_ends_closed());
    }
    assert!(read_end.readable() && !read_end.writable());
    assert!(write_end.writable() && !write_end.readable());
    drop(write_end);
    assert!(buffer.exclusive_access().all_write_ends_closed());
    assert!(!buffer.exclusive_access().all_read_ends_closed());
    drop(read_end);
    assert!(buffer.exclusive_access().all_read_ends_closed());
    log::info!("pipe_test passed!");
}
