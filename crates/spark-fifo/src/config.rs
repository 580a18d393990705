//! 队列配置与构建器。
//!
//! # 模块定位（Why）
//! - 阻塞式写入在队列满时如何等待、日志中如何称呼这条队列，都属于部署期决策，
//!   不应散落在调用点；
//! - 构建器在 `build` 时集中完成容量校验，让 `FifoBuffer` 的其余构造路径保持不失败。

use crate::{
    FifoBuffer,
    error::FifoError,
    exclusion::{CriticalSection, NoopCriticalSection},
    ring::RingStore,
};

/// `puts` 在队列满时两次重试之间的等待策略。
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Backoff {
    /// 发出 `core::hint::spin_loop` 提示后立即重试，适用于 `no_std` 与中断场景。
    #[default]
    Spin,
    /// 让出当前线程时间片后重试，需要 `std`。
    #[cfg(feature = "std")]
    Yield,
}

impl Backoff {
    /// 执行一次等待。
    pub fn wait(&self) {
        match self {
            Backoff::Spin => core::hint::spin_loop(),
            #[cfg(all(feature = "std", not(any(loom, spark_loom))))]
            Backoff::Yield => std::thread::yield_now(),
            #[cfg(all(feature = "std", any(loom, spark_loom)))]
            Backoff::Yield => loom::thread::yield_now(),
        }
    }
}

/// 单条队列的静态配置。
///
/// - `label`：出现在每条日志事件中的队列名称，例如 `"uart0.rx"`；
/// - `backoff`：阻塞写入的等待策略。
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FifoConfig {
    pub label: &'static str,
    pub backoff: Backoff,
}

impl FifoConfig {
    pub const DEFAULT_LABEL: &'static str = "fifo";

    pub const fn new() -> Self {
        Self {
            label: Self::DEFAULT_LABEL,
            backoff: Backoff::Spin,
        }
    }

    pub const fn with_label(mut self, label: &'static str) -> Self {
        self.label = label;
        self
    }

    pub const fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }
}

impl Default for FifoConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// `FifoBuffer` 构建器，确保在创建时完成参数验证。
pub struct FifoBuilder<'a, C = NoopCriticalSection> {
    storage: &'a mut [u8],
    capacity: Option<usize>,
    config: FifoConfig,
    section: C,
}

impl<'a> FifoBuilder<'a, NoopCriticalSection> {
    pub fn new(storage: &'a mut [u8]) -> Self {
        Self {
            storage,
            capacity: None,
            config: FifoConfig::default(),
            section: NoopCriticalSection,
        }
    }
}

impl<'a, C: CriticalSection> FifoBuilder<'a, C> {
    /// 声明容量；未设置时使用整块存储。
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    /// 设置日志标签。
    pub fn with_label(mut self, label: &'static str) -> Self {
        self.config.label = label;
        self
    }

    /// 设置阻塞写入的等待策略。
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.config.backoff = backoff;
        self
    }

    /// 整体替换配置。
    pub fn with_config(mut self, config: FifoConfig) -> Self {
        self.config = config;
        self
    }

    /// 注入临界区能力。
    pub fn with_critical_section<S: CriticalSection>(self, section: S) -> FifoBuilder<'a, S> {
        FifoBuilder {
            storage: self.storage,
            capacity: self.capacity,
            config: self.config,
            section,
        }
    }

    /// 构建队列；声明容量超过存储长度时返回 [`FifoError::StorageTooSmall`]。
    pub fn build(self) -> Result<FifoBuffer<'a, C>, FifoError> {
        let store = match self.capacity {
            Some(capacity) => RingStore::with_capacity(capacity, self.storage)?,
            None => RingStore::new(self.storage),
        };
        Ok(FifoBuffer::from_parts(store, self.section, self.config))
    }
}
