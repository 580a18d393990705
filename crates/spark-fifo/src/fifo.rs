#[cfg(feature = "alloc")]
use alloc::vec::Vec;
use core::fmt;

use tracing::{debug, trace, warn};

use crate::{
    cell::StoreCell,
    config::{FifoBuilder, FifoConfig},
    error::FifoError,
    exclusion::{CriticalSection, MutualExclusion, NoopCriticalSection},
    ring::RingStore,
};

/// `FifoBuffer` 是环形队列的受保护入口：每个操作都包在一次临界区进入/离开之间。
///
/// # 模块角色（Why）
/// - 供可能并发的多个执行上下文（线程、中断、协程）直接调用；
/// - 已经处于临界区内的代码（例如中断服务程序本身就运行在关中断区间）改走
///   [`with_unguarded`](Self::with_unguarded)，避免重复进入导致死锁。
///
/// # 核心机制（How）
/// - 内部以 [`RingStore`] 承载全部算法，`FifoBuffer` 只负责“进入 → 调用一次核心原语 → 离开”；
/// - 进入与离开由 [`CsGuard`](crate::CsGuard) 的作用域保证配对，`Full`/`Empty` 结果与展开路径同样会离开；
/// - 容量在构造后不变，缓存在外层，读取无需进入临界区。
///
/// # 契约说明（What）
/// - 一次受保护调用只覆盖一个逻辑操作，两次调用之间不保证原子性；需要组合操作时使用
///   [`locked`](Self::locked)；
/// - 只有当 `C: MutualExclusion` 时队列才是 `Sync`，默认的无操作能力只能在单一上下文中使用；
/// - 跨上下文的可见性完全来自注入的能力，队列本身只保证字节之间的先进先出顺序。
///
/// # 设计权衡（Trade-offs）
/// - [`puts`](Self::puts) 在队列满时无限重试，没有消费者时会永远自旋；需要上限时使用
///   [`try_puts`](Self::try_puts)。
pub struct FifoBuffer<'a, C = NoopCriticalSection> {
    store: StoreCell<RingStore<'a>>,
    capacity: usize,
    section: C,
    config: FifoConfig,
}

// SAFETY: 所有对 `store` 的共享访问都发生在 `section` 建立的互斥区间内，
// `MutualExclusion` 同时保证了区间之间的内存可见性。
unsafe impl<C: MutualExclusion> Sync for FifoBuffer<'_, C> {}

impl<'a> FifoBuffer<'a, NoopCriticalSection> {
    /// 以整块存储和无操作临界区构造队列，适用于单上下文使用。
    pub fn new(storage: &'a mut [u8]) -> Self {
        Self::from_parts(
            RingStore::new(storage),
            NoopCriticalSection,
            FifoConfig::default(),
        )
    }

    /// 进入构建器，按需声明容量、标签、等待策略与临界区能力。
    pub fn builder(storage: &'a mut [u8]) -> FifoBuilder<'a, NoopCriticalSection> {
        FifoBuilder::new(storage)
    }
}

impl<'a, C: CriticalSection> FifoBuffer<'a, C> {
    /// 以整块存储和指定临界区能力构造队列。
    pub fn with_critical_section(storage: &'a mut [u8], section: C) -> Self {
        Self::from_parts(RingStore::new(storage), section, FifoConfig::default())
    }

    /// 由已经构造好的核心、能力与配置组装队列。
    pub fn from_parts(store: RingStore<'a>, section: C, config: FifoConfig) -> Self {
        let capacity = store.capacity();
        debug!(label = config.label, capacity, "fifo initialised");
        Self {
            store: StoreCell::new(store),
            capacity,
            section,
            config,
        }
    }

    /// 总槽位数，构造后恒定。
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn config(&self) -> &FifoConfig {
        &self.config
    }

    /// 注入的临界区能力。
    pub fn critical_section(&self) -> &C {
        &self.section
    }

    /// 当前占用的槽位数（受保护读取，保证与并发修改一致）。
    pub fn len(&self) -> usize {
        self.locked(|store| store.len())
    }

    pub fn is_empty(&self) -> bool {
        self.locked(|store| store.is_empty())
    }

    pub fn is_full(&self) -> bool {
        self.locked(|store| store.is_full())
    }

    /// 剩余可写入的槽位数。
    pub fn free(&self) -> usize {
        self.locked(|store| store.free())
    }

    /// 清零游标与占用计数，存储内容保持原样。
    pub fn dispose(&self) {
        self.locked(RingStore::reset);
        debug!(label = self.config.label, "fifo disposed");
    }

    /// 入队单个字节；队列已满时返回 [`FifoError::Full`]。
    pub fn put(&self, byte: u8) -> Result<u8, FifoError> {
        let result = self.locked(|store| store.try_put(byte));
        if result.is_err() {
            trace!(label = self.config.label, "put rejected: fifo full");
        }
        result
    }

    /// 出队单个字节；队列为空时返回 [`FifoError::Empty`]。
    pub fn get(&self) -> Result<u8, FifoError> {
        let result = self.locked(|store| store.try_get());
        if result.is_err() {
            trace!(label = self.config.label, "get rejected: fifo empty");
        }
        result
    }

    /// 查看下一个将被出队的字节。
    pub fn peek(&self) -> Result<u8, FifoError> {
        self.locked(|store| store.peek())
    }

    /// 批量入队，返回实际写入的字节数。
    pub fn write(&self, bytes: &[u8]) -> usize {
        self.locked(|store| store.write(bytes))
    }

    /// 批量出队到 `out`，返回实际读出的字节数。
    pub fn read(&self, out: &mut [u8]) -> usize {
        self.locked(|store| store.read(out))
    }

    /// 出队至多 `max` 个字节并返回序列。
    #[cfg(feature = "alloc")]
    pub fn read_vec(&self, max: usize) -> Vec<u8> {
        self.locked(|store| store.read_vec(max))
    }

    /// 阻塞写入以 `0` 结尾的字节串（`0` 本身不写入；无 `0` 时写完整个切片）。
    ///
    /// 队列满时对同一字节按 [`Backoff`](crate::Backoff) 等待后重试，绝不丢弃字节。
    /// 每个字节单独进入一次临界区，因此并发生产者的字节可能交错。
    ///
    /// # 阻塞风险
    /// 如果没有并发的消费者排空队列，该方法会**永远自旋**；在中断上下文或单线程中
    /// 对一条可能写满的队列调用它就是死锁。需要上限时使用 [`try_puts`](Self::try_puts)。
    ///
    /// 返回写入的字节数。
    pub fn puts(&self, text: &[u8]) -> usize {
        self.put_all_blocking(terminated(text))
    }

    /// [`puts`](Self::puts) 的有界版本：单个字节连续失败 `max_retries` 次后放弃。
    ///
    /// 放弃时返回 [`FifoError::Stalled`]，其中 `written` 为已经入队的字节数。
    pub fn try_puts(&self, text: &[u8], max_retries: usize) -> Result<usize, FifoError> {
        let text = terminated(text);
        for (written, &byte) in text.iter().enumerate() {
            let mut retries = 0;
            while self.locked(|store| store.try_put(byte)).is_err() {
                if retries == max_retries {
                    warn!(
                        label = self.config.label,
                        written, max_retries, "try_puts gave up: fifo stayed full"
                    );
                    return Err(FifoError::Stalled { written });
                }
                retries += 1;
                self.config.backoff.wait();
            }
        }
        Ok(text.len())
    }

    /// 在一次临界区内对核心执行任意组合操作。
    ///
    /// 闭包返回前始终持有临界区。
    ///
    /// # Panics
    /// 闭包内再次访问本队列（`put`、`len`、嵌套的 `locked` 等）会 panic，
    /// 核心存储在任意时刻只借出一个 `&mut`。
    pub fn locked<R>(&self, f: impl FnOnce(&mut RingStore<'a>) -> R) -> R {
        let _guard = self.section.guard();
        // SAFETY: 守卫存活期间本上下文独占 `store`。
        unsafe { self.store.with_mut(f) }
    }

    /// 不进入临界区直接访问核心原语。
    ///
    /// 与 [`locked`](Self::locked) 相同，在闭包内重入本队列会 panic。
    ///
    /// # Safety
    /// 调用方必须已经持有本队列的临界区（例如运行在能力所关闭的中断之内），
    /// 或在静态上保证此刻没有其他上下文访问本队列。
    pub unsafe fn with_unguarded<R>(&self, f: impl FnOnce(&mut RingStore<'a>) -> R) -> R {
        // SAFETY: 唯一访问由调用方担保。
        unsafe { self.store.with_mut(f) }
    }

    /// 独占借用时直接取得核心，无需临界区。
    pub fn get_mut(&mut self) -> &mut RingStore<'a> {
        self.store.get_mut()
    }

    /// 拆出核心，归还存储借用。
    pub fn into_store(self) -> RingStore<'a> {
        self.store.into_inner()
    }

    fn put_all_blocking(&self, bytes: &[u8]) -> usize {
        let mut announced = false;
        for &byte in bytes {
            while self.locked(|store| store.try_put(byte)).is_err() {
                if !announced {
                    debug!(
                        label = self.config.label,
                        "fifo full, blocking writer until a consumer drains it"
                    );
                    announced = true;
                }
                self.config.backoff.wait();
            }
        }
        bytes.len()
    }
}

/// 截取到首个 `0` 字节之前。
fn terminated(text: &[u8]) -> &[u8] {
    match text.iter().position(|&byte| byte == 0) {
        Some(end) => &text[..end],
        None => text,
    }
}

/// 以阻塞方式写入全部字节，适合作为控制台输出的 `write!` 目标。
impl<C: CriticalSection> fmt::Write for FifoBuffer<'_, C> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.put_all_blocking(s.as_bytes());
        Ok(())
    }
}

impl<C: fmt::Debug> fmt::Debug for FifoBuffer<'_, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FifoBuffer")
            .field("label", &self.config.label)
            .field("capacity", &self.capacity)
            .field("section", &self.section)
            .finish_non_exhaustive()
    }
}
