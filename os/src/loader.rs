//! 链接进内核数据段的用户程序
//!
//! `link_app.S` 由构建脚本生成：`_num_app` 依次存放程序个数、每个程序的起始地址
//! 以及最后一个程序的结束地址，`_app_names` 依次存放以 `\0` 结尾的程序名。

use alloc::vec::Vec;
use lazy_static::*;

extern "C" {
    fn _num_app();
    fn _app_names();
}

/// 获得用户程序总数
pub fn get_num_app() -> usize {
    unsafe { (_num_app as usize as *const usize).read_volatile() }
}

/// 第 `app_id` 个用户程序的ELF数据
pub fn get_app_data(app_id: usize) -> &'static [u8] {
    let num_app_ptr = _num_app as usize as *const usize;
    let num_app = get_num_app();
    assert!(app_id < num_app, "app {} does not exist", app_id);
    let app_start = unsafe { core::slice::from_raw_parts(num_app_ptr.add(1), num_app + 1) };
    unsafe {
        core::slice::from_raw_parts(
            app_start[app_id] as *const u8,
            app_start[app_id + 1] - app_start[app_id],
        )
    }
}

lazy_static! {
    /// 程序名，与程序编号一一对应
    static ref APP_NAMES: Vec<&'static str> = {
        let num_app = get_num_app();
        let mut start = _app_names as usize as *const u8;
        let mut v = Vec::new();
        unsafe {
            for _ in 0..num_app {
                let mut end = start;
                while end.read_volatile() != b'\0' {
                    end = end.add(1);
                }
                let slice = core::slice::from_raw_parts(start, end as usize - start as usize);
                v.push(core::str::from_utf8(slice).unwrap_or("<invalid name>"));
                start = end.add(1);
            }
        }
        v
    };
}

/// 按名字查找用户程序
pub fn get_app_data_by_name(name: &str) -> Option<&'static [u8]> {
    APP_NAMES
        .iter()
        .position(|app_name| *app_name == name)
        .map(get_app_data)
}

/// 打印所有用户程序的名字
pub fn list_apps() {
    println!("/**** APPS ****");
    for app in APP_NAMES.iter() {
        println!("{}", app);
    }
    println!("**************/");
}
