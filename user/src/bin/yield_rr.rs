//! 父子进程轮流让出处理器，各自把自己的标记写进同一个管道

#![no_std]
#![no_main]

#[macro_use]
extern crate user_lib;

use user_lib::{close, exit, fork, pipe, read, waitpid, write, yield_};

const ROUNDS: usize = 5;

#[no_mangle]
fn main() -> i32 {
    let mut pipe_fd = [0usize; 2];
    assert_eq!(pipe(&mut pipe_fd), 0);
    let pid = fork();
    if pid == 0 {
        close(pipe_fd[0]);
        for _ in 0..ROUNDS {
            write(pipe_fd[1], b"c");
            yield_();
        }
        close(pipe_fd[1]);
        exit(0);
    }
    for _ in 0..ROUNDS {
        write(pipe_fd[1], b"p");
        yield_();
    }
    close(pipe_fd[1]);
    let mut exit_code: i32 = 0;
    assert_eq!(waitpid(pid, &mut exit_code), pid);
    let mut buffer = [0u8; 2 * ROUNDS];
    let mut total = 0;
    while total < buffer.len() {
        let n = read(pipe_fd[0], &mut buffer[total..]);
        if n <= 0 {
            break;
        }
        total += n as usize;
    }
    assert_eq!(total, 2 * ROUNDS);
    let order = core::str::from_utf8(&buffer).unwrap();
    println!("yield_rr order: {}", order);
    assert_eq!(buffer.iter().filter(|c| **c == b'p').count(), ROUNDS);
    assert_eq!(buffer.iter().filter(|c| **c == b'c').count(), ROUNDS);
    println!("yield_rr pass.");
    0
}
