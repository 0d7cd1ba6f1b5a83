#![no_std]
#![no_main]

#[macro_use]
extern crate user_lib;

use user_lib::{close, exit, fork, pipe, read, waitpid, write};

static STR: &str = "Hello, world! This message is longer than the pipe buffer.";

#[no_mangle]
fn main() -> i32 {
    let mut pipe_fd = [0usize; 2];
    assert_eq!(pipe(&mut pipe_fd), 0);
    let pid = fork();
    if pid == 0 {
        // 子进程只读
        close(pipe_fd[1]);
        let mut buffer = [0u8; 128];
        let mut total = 0usize;
        loop {
            let n = read(pipe_fd[0], &mut buffer[total..]);
            assert!(n >= 0);
            if n == 0 {
                break;
            }
            total += n as usize;
        }
        close(pipe_fd[0]);
        assert_eq!(core::str::from_utf8(&buffer[..total]).unwrap(), STR);
        println!("Read OK, child process exited!");
        exit(0);
    }
    // 父进程只写
    close(pipe_fd[0]);
    assert_eq!(write(pipe_fd[1], STR.as_bytes()), STR.len() as isize);
    close(pipe_fd[1]);
    let mut exit_code: i32 = 0;
    assert_eq!(waitpid(pid, &mut exit_code), pid);
    assert_eq!(exit_code, 0);
    // 已关闭和不存在的文件描述符
    assert_eq!(write(pipe_fd[1], b"x"), -1);
    assert_eq!(close(pipe_fd[0]), -1);
    // 读端全部关闭后写入立即返回0
    assert_eq!(pipe(&mut pipe_fd), 0);
    close(pipe_fd[0]);
    assert_eq!(write(pipe_fd[1], STR.as_bytes()), 0);
    close(pipe_fd[1]);
    println!("pipetest passed!");
    0
}
