//
// 教案级说明：为了让 Loom 在模型检查阶段捕获对环形存储的竞争访问，
// 启用 `--cfg loom` 时换用 `loom::cell::UnsafeCell`；两种实现都只暴露闭包式访问，
// 确保可变借用不会逃逸出临界区。
//
// `busy` 标记闭包是否仍在执行：同一上下文在闭包内再次访问（例如在 `locked` 里调用
// 同一队列的 `get`）会直接 panic，而不是得到第二个指向同一存储的 `&mut`。
// 标记只在互斥区间内读写，因此普通 `Cell` 即可，不依赖目标平台的原子指令。
use core::cell::Cell;
#[cfg(not(any(loom, spark_loom)))]
use core::cell::UnsafeCell;
#[cfg(any(loom, spark_loom))]
use loom::cell::UnsafeCell;

pub(crate) struct StoreCell<T> {
    inner: UnsafeCell<T>,
    busy: Cell<bool>,
}

/// 闭包结束（含展开）时清除 `busy`。
struct BusyReset<'c>(&'c Cell<bool>);

impl Drop for BusyReset<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl<T> StoreCell<T> {
    pub(crate) fn new(value: T) -> Self {
        Self {
            inner: UnsafeCell::new(value),
            busy: Cell::new(false),
        }
    }

    fn claim(&self) -> BusyReset<'_> {
        if self.busy.get() {
            panic!("环形存储被重入：访问闭包内不得再次调用同一队列的方法");
        }
        self.busy.set(true);
        BusyReset(&self.busy)
    }

    /// # Safety
    /// 闭包执行期间不得有其他执行上下文访问内部值；同一上下文内的重入由 `busy` 拦截。
    #[cfg(not(any(loom, spark_loom)))]
    pub(crate) unsafe fn with_mut<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let _busy = self.claim();
        // SAFETY: 跨上下文的唯一访问由调用方担保，重入已被 `claim` 拒绝。
        f(unsafe { &mut *self.inner.get() })
    }

    /// # Safety
    /// 闭包执行期间不得有其他执行上下文访问内部值；同一上下文内的重入由 `busy` 拦截。
    #[cfg(any(loom, spark_loom))]
    pub(crate) unsafe fn with_mut<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let _busy = self.claim();
        // SAFETY: 唯一访问由调用方担保；Loom 会在违背时报告竞争。
        self.inner.with_mut(|ptr| f(unsafe { &mut *ptr }))
    }

    #[cfg(not(any(loom, spark_loom)))]
    pub(crate) fn get_mut(&mut self) -> &mut T {
        self.inner.get_mut()
    }

    #[cfg(any(loom, spark_loom))]
    pub(crate) fn get_mut(&mut self) -> &mut T {
        // SAFETY: `&mut self` 已证明独占。
        self.inner.with_mut(|ptr| unsafe { &mut *ptr })
    }

    pub(crate) fn into_inner(self) -> T {
        self.inner.into_inner()
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;

    #[test]
    fn nested_access_panics_instead_of_aliasing() {
        let cell = StoreCell::new(0u8);
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            // SAFETY: 单线程测试，无其他上下文。
            unsafe { cell.with_mut(|_| cell.with_mut(|inner| *inner = 1)) }
        }));
        assert!(outcome.is_err(), "重入必须被拒绝");
        assert!(!cell.busy.get(), "展开后标记应被清除");
        // SAFETY: 同上。
        assert_eq!(unsafe { cell.with_mut(|inner| *inner) }, 0);
    }
}
