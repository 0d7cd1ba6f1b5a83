//! 单处理器上的同步原语

mod up;

pub use up::{UPRefMut, UPSafeCell};
