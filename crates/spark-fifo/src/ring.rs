#[cfg(feature = "alloc")]
use alloc::vec::Vec;

use crate::error::FifoError;

/// `RingStore` 是环形队列的无锁核心：借用调用方的存储，维护读写游标与占用计数。
///
/// # 模块角色（Why）
/// - 承担全部入队/出队/窥视/批量搬运算法，但**从不**进入或离开临界区；
/// - 通过 `&mut self` 证明独占访问：调用方要么已经持有临界区（见
///   [`FifoBuffer::locked`](crate::FifoBuffer::locked)），要么在静态上就是唯一访问者。
///
/// # 核心机制（How）
/// - 显式保存 `length`，满与空由计数区分，而不依赖游标是否相等；
/// - 游标到达容量时回绕到 0；批量搬运最多拆成两段连续拷贝。
///
/// # 契约说明（What）
/// - `0 <= len() <= capacity()`；
/// - 容量大于 0 时两个游标都落在 `[0, capacity)`，容量为 0 时两者恒为 0；
/// - 自读游标起、按回绕顺序的 `len()` 个字节，恰为尚未出队的字节，且保持入队顺序。
///
/// # 设计权衡（Trade-offs）
/// - 存储的分配与释放始终归调用方所有，`reset` 只清元数据，不抹除字节内容。
#[derive(Debug)]
pub struct RingStore<'a> {
    storage: &'a mut [u8],
    length: usize,
    read: usize,
    write: usize,
}

impl<'a> RingStore<'a> {
    /// 以整块存储作为槽位构造空队列，容量等于 `storage.len()`。
    pub fn new(storage: &'a mut [u8]) -> Self {
        Self {
            storage,
            length: 0,
            read: 0,
            write: 0,
        }
    }

    /// 以声明容量构造空队列。
    ///
    /// # 参数与契约
    /// - `capacity`：槽位数量，允许为 0；
    /// - `storage`：至少 `capacity` 字节；多出的部分不会被使用；
    /// - **异常处理**：存储不足时返回 [`FifoError::StorageTooSmall`]，而不是越界访问。
    pub fn with_capacity(capacity: usize, storage: &'a mut [u8]) -> Result<Self, FifoError> {
        let available = storage.len();
        if available < capacity {
            return Err(FifoError::StorageTooSmall {
                capacity,
                available,
            });
        }
        Ok(Self::new(&mut storage[..capacity]))
    }

    /// 清零游标与占用计数；已写入的字节在逻辑上消失，但物理内容保持原样。
    pub fn reset(&mut self) {
        self.length = 0;
        self.read = 0;
        self.write = 0;
    }

    /// 总槽位数。
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// 当前占用的槽位数。
    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn is_full(&self) -> bool {
        self.length == self.capacity()
    }

    /// 剩余可写入的槽位数。
    pub fn free(&self) -> usize {
        self.capacity() - self.length
    }

    /// 尝试入队单个字节。
    ///
    /// - 队列已满时返回 [`FifoError::Full`]，状态保持不变；
    /// - 成功时返回写入的字节本身作为确认。
    pub fn try_put(&mut self, byte: u8) -> Result<u8, FifoError> {
        if self.is_full() {
            return Err(FifoError::Full);
        }
        self.storage[self.write] = byte;
        self.write = self.advance(self.write, 1);
        self.length += 1;
        Ok(byte)
    }

    /// 尝试出队单个字节；队列为空时返回 [`FifoError::Empty`] 且不修改状态。
    pub fn try_get(&mut self) -> Result<u8, FifoError> {
        if self.is_empty() {
            return Err(FifoError::Empty);
        }
        let byte = self.storage[self.read];
        self.read = self.advance(self.read, 1);
        self.length -= 1;
        Ok(byte)
    }

    /// 查看下一个将被出队的字节，不移动游标。
    pub fn peek(&self) -> Result<u8, FifoError> {
        if self.is_empty() {
            return Err(FifoError::Empty);
        }
        Ok(self.storage[self.read])
    }

    /// 批量入队，直到输入耗尽或队列写满。
    ///
    /// 返回实际入队的字节数；部分成功是正常结果而非错误。
    pub fn write(&mut self, bytes: &[u8]) -> usize {
        let count = bytes.len().min(self.free());
        if count == 0 {
            return 0;
        }
        let head = count.min(self.capacity() - self.write);
        self.storage[self.write..self.write + head].copy_from_slice(&bytes[..head]);
        self.storage[..count - head].copy_from_slice(&bytes[head..count]);
        self.write = self.advance(self.write, count);
        self.length += count;
        count
    }

    /// 批量出队到 `out`，最多 `out.len()` 个字节，遇空即停。
    ///
    /// 返回实际出队的字节数，`out[..n]` 按入队顺序排列。
    pub fn read(&mut self, out: &mut [u8]) -> usize {
        let count = out.len().min(self.length);
        if count == 0 {
            return 0;
        }
        let head = count.min(self.capacity() - self.read);
        out[..head].copy_from_slice(&self.storage[self.read..self.read + head]);
        out[head..count].copy_from_slice(&self.storage[..count - head]);
        self.read = self.advance(self.read, count);
        self.length -= count;
        count
    }

    /// 出队至多 `max` 个字节并直接返回序列，可能短于 `max`，也可能为空。
    #[cfg(feature = "alloc")]
    pub fn read_vec(&mut self, max: usize) -> Vec<u8> {
        let mut out = alloc::vec![0u8; max.min(self.length)];
        let count = self.read(&mut out);
        out.truncate(count);
        out
    }

    /// 将游标前移 `step` 个槽位并回绕；`step` 不超过容量，结果必然落回 `[0, capacity)`。
    fn advance(&self, cursor: usize, step: usize) -> usize {
        let next = cursor + step;
        if next >= self.capacity() {
            next - self.capacity()
        } else {
            next
        }
    }
}
