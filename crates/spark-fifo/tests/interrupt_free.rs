//! `InterruptFree` 能力的集成测试。
//!
//! 宿主机上 `critical-section` 的 `std` 实现以全局互斥模拟“关中断”，
//! 足以验证进入/离开配对与跨线程交接；真实 MCU 上同一份代码会改为屏蔽中断。

use std::{thread, time::Duration};

use spark_fifo::{FifoBuffer, InterruptFree};

#[test]
fn interrupt_free_section_serialises_threads() {
    let mut storage = [0u8; 4];
    let fifo = FifoBuffer::with_critical_section(&mut storage, InterruptFree::new());
    let payload: Vec<u8> = (1..=200u8).collect();

    let received = thread::scope(|scope| {
        scope.spawn(|| fifo.puts(&payload));
        let mut received = Vec::new();
        while received.len() < payload.len() {
            match fifo.get() {
                Ok(byte) => received.push(byte),
                Err(_) => thread::yield_now(),
            }
        }
        received
    });

    assert_eq!(received, payload);
}

#[test]
fn global_section_can_be_nested_around_unguarded_access() {
    let mut storage = [0u8; 2];
    let fifo = FifoBuffer::with_critical_section(&mut storage, InterruptFree::new());
    let written = critical_section::with(|_| {
        // SAFETY: 闭包运行在全局临界区内，与 `InterruptFree` 的受保护调用互斥。
        unsafe { fifo.with_unguarded(|store| store.write(b"ok")) }
    });
    assert_eq!(written, 2);
    assert_eq!(fifo.get(), Ok(b'o'));
}

#[test]
fn shared_section_nested_across_buffers_is_released() {
    let section = InterruptFree::new();
    let mut rx = [0u8; 2];
    let mut tx = [0u8; 2];
    let rx = FifoBuffer::with_critical_section(&mut rx, &section);
    let tx = FifoBuffer::with_critical_section(&mut tx, &section);

    rx.locked(|store| {
        store.try_put(1).expect("rx 未满");
        tx.put(2).expect("tx 未满");
    });

    let (done_tx, done_rx) = std::sync::mpsc::channel();
    thread::spawn(move || {
        critical_section::with(|_| ());
        let _ = done_tx.send(());
    });
    assert!(
        done_rx.recv_timeout(Duration::from_secs(2)).is_ok(),
        "最外层离开后全局临界区必须被释放"
    );
    assert_eq!((rx.get(), tx.get()), (Ok(1), Ok(2)));
}
