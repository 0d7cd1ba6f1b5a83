#![no_std]
#![no_main]

#[macro_use]
extern crate user_lib;

use user_lib::{get_time, sleep};

#[no_mangle]
fn main() -> i32 {
    let start = get_time();
    sleep(30);
    let elapsed = get_time() - start;
    println!("slept {}ms", elapsed);
    assert!(elapsed >= 30);
    println!("Test sleep OK!");
    0
}
