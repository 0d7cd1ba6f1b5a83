#![no_std]
#![no_main]

#[macro_use]
extern crate user_lib;

use user_lib::{mmap, munmap};

const PAGE_SIZE: usize = 4096;
const PROT_READ: usize = 1;
const PROT_WRITE: usize = 2;

#[no_mangle]
fn main() -> i32 {
    let start: usize = 0x1000_0000;
    let len: usize = 2 * PAGE_SIZE;
    assert_eq!(mmap(start, len, PROT_READ | PROT_WRITE), 0);
    let area = unsafe { core::slice::from_raw_parts_mut(start as *mut u8, len) };
    for (i, byte) in area.iter_mut().enumerate() {
        *byte = (i % 251) as u8;
    }
    for (i, byte) in area.iter().enumerate() {
        assert_eq!(*byte, (i % 251) as u8);
    }
    // 未对齐、与已有映射重叠、权限非法都会失败
    assert_eq!(mmap(start + 1, PAGE_SIZE, PROT_READ), -1);
    assert_eq!(mmap(start + PAGE_SIZE, PAGE_SIZE, PROT_READ), -1);
    assert_eq!(mmap(start + len, PAGE_SIZE, 0), -1);
    assert_eq!(mmap(start + len, PAGE_SIZE, 0x8 | PROT_READ), -1);
    // 只解除一部分映射会失败
    assert_eq!(munmap(start, PAGE_SIZE), -1);
    assert_eq!(munmap(start, len), 0);
    assert_eq!(munmap(start, len), -1);
    // 解除后可以重新映射同一段地址，内容为0
    assert_eq!(mmap(start, PAGE_SIZE, PROT_READ), 0);
    let page = unsafe { core::slice::from_raw_parts(start as *const u8, PAGE_SIZE) };
    assert!(page.iter().all(|byte| *byte == 0));
    assert_eq!(munmap(start, PAGE_SIZE), 0);
    println!("mmap_test pass.");
    0
}
