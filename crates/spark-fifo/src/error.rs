//! # error 模块说明
//!
//! ## 角色定位（Why）
//! - 集中定义环形队列对外可观察的全部失败结果；
//! - `Full` / `Empty` 是例行的“哨兵”结果，调用方应当检查而非视为异常；
//! - 构造期的前置条件违背与有界重试放弃同样收敛到本枚举，避免调用方面对多套错误类型。
//!
//! ## 设计要求（What）
//! - 启用 `std` 时派生 `thiserror::Error`，以兼容 `std::error::Error`；
//! - `no_std` 下手写 `core::fmt::Display`，保持同一套文案。

#[cfg(not(feature = "std"))]
use core::fmt;

#[cfg(feature = "std")]
use thiserror::Error;

/// 环形队列错误域。
///
/// # 教案式说明
/// - **意图 (Why)**：以带外的 `Err` 分支表达“满/空”，成功出队的字节永远落在 `Ok(u8)` 中，
///   因此有效负载与哨兵不可能混淆。
/// - **契约 (What)**：
///   - 入队类操作只会返回 [`FifoError::Full`]；
///   - 出队与窥视只会返回 [`FifoError::Empty`]；
///   - [`FifoError::StorageTooSmall`] 仅出现在构造阶段；
///   - [`FifoError::Stalled`] 仅由有界的 `try_puts` 返回。
/// - **设计权衡 (Trade-offs)**：所有变体均为 `Copy`，可在中断上下文中零成本传递。
#[cfg_attr(feature = "std", derive(Error))]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FifoError {
    /// 队列已满，本次入队未产生任何副作用。
    #[cfg_attr(feature = "std", error("fifo is full"))]
    Full,

    /// 队列为空，本次出队/窥视未产生任何副作用。
    #[cfg_attr(feature = "std", error("fifo is empty"))]
    Empty,

    /// 调用方提供的存储短于声明容量。
    ///
    /// - `capacity`：声明的槽位数量；
    /// - `available`：实际提供的字节数。
    #[cfg_attr(
        feature = "std",
        error("backing storage holds {available} bytes but capacity {capacity} was requested")
    )]
    StorageTooSmall { capacity: usize, available: usize },

    /// 有界阻塞写在重试上限内仍未能写入下一个字节。
    ///
    /// `written` 为放弃前已经成功入队的字节数，调用方可据此续写剩余部分。
    #[cfg_attr(
        feature = "std",
        error("fifo stayed full after {written} bytes were written; retry budget exhausted")
    )]
    Stalled { written: usize },
}

impl FifoError {
    /// 是否为“队列已满”哨兵。
    pub fn is_full(&self) -> bool {
        matches!(self, FifoError::Full)
    }

    /// 是否为“队列为空”哨兵。
    pub fn is_empty(&self) -> bool {
        matches!(self, FifoError::Empty)
    }
}

#[cfg(not(feature = "std"))]
impl fmt::Display for FifoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FifoError::Full => f.write_str("fifo is full"),
            FifoError::Empty => f.write_str("fifo is empty"),
            FifoError::StorageTooSmall {
                capacity,
                available,
            } => write!(
                f,
                "backing storage holds {available} bytes but capacity {capacity} was requested"
            ),
            FifoError::Stalled { written } => write!(
                f,
                "fifo stayed full after {written} bytes were written; retry budget exhausted"
            ),
        }
    }
}
