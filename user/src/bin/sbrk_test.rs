#![no_std]
#![no_main]

#[macro_use]
extern crate user_lib;

use user_lib::sbrk;

const PAGE_SIZE: usize = 4096;

#[no_mangle]
fn main() -> i32 {
    let origin_brk = sbrk(0);
    assert!(origin_brk > 0);
    println!("origin break point = {:#x}", origin_brk);
    assert_eq!(sbrk(PAGE_SIZE as i32 * 2), origin_brk);
    let brk = sbrk(0);
    assert_eq!(brk as usize, origin_brk as usize + 2 * PAGE_SIZE);
    let heap = unsafe {
        core::slice::from_raw_parts_mut(origin_brk as usize as *mut u8, 2 * PAGE_SIZE)
    };
    for (i, byte) in heap.iter_mut().enumerate() {
        *byte = i as u8;
    }
    assert_eq!(heap[PAGE_SIZE + 1], 1);
    // 收缩一页
    assert_eq!(sbrk(-(PAGE_SIZE as i32)), brk);
    assert_eq!(sbrk(0) as usize, origin_brk as usize + PAGE_SIZE);
    assert_eq!(heap[PAGE_SIZE - 1], (PAGE_SIZE - 1) as u8);
    // 不能收缩到堆底以下
    assert_eq!(sbrk(-(4 * PAGE_SIZE as i32)), -1);
    assert_eq!(sbrk(-(PAGE_SIZE as i32)), origin_brk + PAGE_SIZE as isize);
    assert_eq!(sbrk(0), origin_brk);
    println!("sbrk_test pass.");
    0
}
