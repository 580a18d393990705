#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unsafe_op_in_unsafe_fn)]

//! `spark-fifo` 提供定长、按字节存取的环形队列，用于两个可能并发的执行上下文之间的
//! 生产者/消费者交接（典型如中断服务程序与前台任务）。
//!
//! # 模块定位（Why）
//! - 资源受限目标上的串口收发、日志通道等场景只需要一条固定容量的字节管道，
//!   不需要动态扩容，也不应绑定某一种锁；
//! - 互斥机制被抽象为可注入的“进入 / 离开”能力，同一份算法可以运行在关中断、自旋锁
//!   或完全无锁（单线程）的环境中。
//!
//! # 设计概要（How）
//! - `ring` 模块实现 [`RingStore`]：无锁核心，借用调用方存储，显式维护占用计数以区分满与空；
//! - `fifo` 模块实现 [`FifoBuffer`]：每个操作包在一次临界区内，并保留不加锁的内部入口，
//!   供已经持有临界区的代码使用；
//! - `exclusion` 模块定义 [`CriticalSection`] 能力与若干现成实现；
//! - `config` 模块提供 [`FifoConfig`] 与 [`FifoBuilder`]。
//!
//! # 示例
//!
//! ```
//! use spark_fifo::{FifoBuffer, FifoError, SpinCriticalSection};
//!
//! let mut storage = [0u8; 4];
//! let fifo = FifoBuffer::with_critical_section(&mut storage, SpinCriticalSection::new());
//!
//! assert_eq!(fifo.write(b"hello"), 4);
//! assert_eq!(fifo.put(b'!'), Err(FifoError::Full));
//! assert_eq!(fifo.get(), Ok(b'h'));
//! ```
//!
//! # 特性开关
//! - `std`（默认）：`thiserror` 错误派生、`Backoff::Yield`；
//! - `alloc`：`Arc` 形式的能力共享与 `read_vec`；
//! - `critical-section`：基于 `critical-section` crate 的 `InterruptFree` 能力；
//! - `loom-model`：配合 `--cfg loom` 进行模型检查。

#[cfg(feature = "alloc")]
extern crate alloc;

mod cell;
mod config;
mod error;
mod exclusion;
mod fifo;
mod ring;

pub use config::{Backoff, FifoBuilder, FifoConfig};
pub use error::FifoError;
#[cfg(feature = "critical-section")]
pub use exclusion::InterruptFree;
pub use exclusion::{
    AssumeExclusive, CriticalSection, CsGuard, MutualExclusion, NoopCriticalSection,
    RawCriticalSection, SpinCriticalSection,
};
pub use fifo::FifoBuffer;
pub use ring::RingStore;
