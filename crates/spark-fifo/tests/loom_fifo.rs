#![cfg(any(loom, spark_loom))]

//! 基于 Loom 的受保护入口并发模型。
//!
//! - **Why**：队列自身不含任何原子操作，跨上下文的可见性完全依赖注入的临界区能力；
//!   需要确认“进入 → 一次核心原语 → 离开”的包装在所有交错下都不会产生数据竞争或乱序。
//! - **How**：`LoomSection` 以 Loom 原子实现自旋互斥；启用 `--cfg loom` 后环形存储改用
//!   `loom::cell::UnsafeCell`，一旦互斥失效 Loom 会直接报告竞争。
//! - **What**：容量 1 上的逐字节交接必须保序；批量写与批量读之间不存在“读到一半”的中间态。

use loom::{
    model,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
};
use spark_fifo::{CriticalSection, FifoBuffer, MutualExclusion};

struct LoomSection {
    locked: AtomicBool,
}

impl LoomSection {
    fn new() -> Self {
        Self {
            locked: AtomicBool::new(false),
        }
    }
}

impl CriticalSection for LoomSection {
    fn enter(&self) {
        while self
            .locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            thread::yield_now();
        }
    }

    fn leave(&self) {
        self.locked.store(false, Ordering::Release);
    }
}

// SAFETY: Acquire 获取 / Release 释放的自旋锁，同一时刻至多一个持有者。
unsafe impl MutualExclusion for LoomSection {}

fn shared_fifo(capacity: usize) -> Arc<FifoBuffer<'static, LoomSection>> {
    let storage: &'static mut [u8] = Box::leak(vec![0u8; capacity].into_boxed_slice());
    Arc::new(FifoBuffer::with_critical_section(storage, LoomSection::new()))
}

#[test]
fn handoff_through_single_slot_preserves_order() {
    model(|| {
        let fifo = shared_fifo(1);

        let producer = {
            let fifo = Arc::clone(&fifo);
            thread::spawn(move || {
                for byte in [1u8, 2] {
                    while fifo.put(byte).is_err() {
                        thread::yield_now();
                    }
                }
            })
        };

        let mut received = Vec::new();
        while received.len() < 2 {
            match fifo.get() {
                Ok(byte) => received.push(byte),
                Err(_) => thread::yield_now(),
            }
        }

        producer.join().expect("生产者线程不应 panic");
        assert_eq!(received, [1, 2]);
        assert!(fifo.is_empty());
    });
}

#[test]
fn concurrent_bulk_read_sees_a_prefix() {
    model(|| {
        let fifo = shared_fifo(2);

        let writer = {
            let fifo = Arc::clone(&fifo);
            thread::spawn(move || fifo.write(&[7, 8, 9]))
        };

        let mut out = [0u8; 2];
        let read = fifo.read(&mut out);
        let written = writer.join().expect("写线程不应 panic");

        assert_eq!(written, 2, "批量写入在一次临界区内完成，空队列上总能写入两个字节");
        assert!(
            read == 0 || (read == 2 && out == [7, 8]),
            "读者要么先于写入看到空队列，要么完整看到写入的前缀"
        );
        assert_eq!(fifo.len(), 2 - read);
    });
}
