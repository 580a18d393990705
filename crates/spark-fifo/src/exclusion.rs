//! 临界区能力：队列只认识“进入 / 离开”两个动作，具体机制由调用方注入。
//!
//! # 设计初衷（Why）
//! - 同一份环形队列既可能运行在“关中断”保护的 MCU 上，也可能运行在普通线程之间，
//!   甚至完全单线程；把互斥机制抽象为能力对象，核心算法就无需为任何一种机制硬编码。
//!
//! # 使用方式（How）
//! - 实现 [`CriticalSection`] 即可被 [`FifoBuffer`](crate::FifoBuffer) 使用；
//! - 只有同时实现 [`MutualExclusion`] 的能力才会让队列成为 `Sync`，
//!   因此默认的 [`NoopCriticalSection`] 无法在安全代码中被跨线程共享。
//!
//! # 契约定义（What）
//! - `enter` 返回前必须对同一实例上的其他 `enter` 建立互斥，`leave` 解除之；
//! - 两者按严格配对调用，队列内部从不嵌套进入同一实例。

#[cfg(feature = "alloc")]
use alloc::sync::Arc;
use core::fmt;

use spin::Mutex;

/// 进入/离开临界区的能力对象。
pub trait CriticalSection {
    /// 进入临界区；返回时调用方独占受保护的资源。
    fn enter(&self);

    /// 离开临界区，必须与之前的一次 [`enter`](Self::enter) 配对。
    fn leave(&self);

    /// 进入临界区并返回作用域守卫，守卫析构时自动离开。
    fn guard(&self) -> CsGuard<'_, Self>
    where
        Self: Sized,
    {
        CsGuard::new(self)
    }
}

/// 标记“确实建立互斥”的能力。
///
/// # Safety
/// 实现者保证：对同一实例，任意时刻至多一个执行上下文处于 `enter` 与 `leave` 之间，
/// 并且 `leave` 之前的写入对随后成功 `enter` 的上下文可见。
pub unsafe trait MutualExclusion: CriticalSection + Sync {}

/// 临界区作用域守卫，在所有退出路径（包括提前返回与展开）上调用 `leave`。
#[must_use = "守卫一旦被丢弃就会立即离开临界区"]
pub struct CsGuard<'c, C: CriticalSection + ?Sized> {
    section: &'c C,
}

impl<'c, C: CriticalSection + ?Sized> CsGuard<'c, C> {
    /// 进入 `section` 并构造守卫。
    pub fn new(section: &'c C) -> Self {
        section.enter();
        Self { section }
    }
}

impl<C: CriticalSection + ?Sized> Drop for CsGuard<'_, C> {
    fn drop(&mut self) {
        self.section.leave();
    }
}

impl<C: CriticalSection + ?Sized> CriticalSection for &C {
    fn enter(&self) {
        (**self).enter();
    }

    fn leave(&self) {
        (**self).leave();
    }
}

// SAFETY: 借用指向同一实例，互斥性完全继承自被借用的能力。
unsafe impl<C: MutualExclusion + ?Sized> MutualExclusion for &C {}

#[cfg(feature = "alloc")]
impl<C: CriticalSection + ?Sized> CriticalSection for Arc<C> {
    fn enter(&self) {
        (**self).enter();
    }

    fn leave(&self) {
        (**self).leave();
    }
}

// SAFETY: 所有克隆共享同一实例，互斥性继承自内部能力。
#[cfg(feature = "alloc")]
unsafe impl<C: MutualExclusion + ?Sized + Send> MutualExclusion for Arc<C> {}

/// 不做任何事情的默认能力，适用于单线程或已由外部串行化的场景。
///
/// 零尺寸、无状态，可随处构造，不存在需要拆除的全局单例。
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct NoopCriticalSection;

impl NoopCriticalSection {
    pub const fn new() -> Self {
        Self
    }
}

impl CriticalSection for NoopCriticalSection {
    #[inline]
    fn enter(&self) {}

    #[inline]
    fn leave(&self) {}
}

/// 基于 `spin::Mutex` 的自旋互斥，适合线程间或多核之间共享队列。
///
/// # 设计权衡（Trade-offs）
/// - 选择自旋锁而非操作系统互斥量，保证 `no_std` 下同样可用；
/// - 不可在“持锁上下文会被同一锁的等待者抢占”的场景（如中断抢占前台）使用，否则会自锁，
///   那类场景应改用 `InterruptFree`（`critical-section` 特性）或自定义的关中断能力。
#[derive(Default)]
pub struct SpinCriticalSection {
    lock: Mutex<()>,
}

impl SpinCriticalSection {
    pub const fn new() -> Self {
        Self {
            lock: Mutex::new(()),
        }
    }

    /// 是否有上下文正处于临界区内，仅用于诊断。
    pub fn is_held(&self) -> bool {
        self.lock.is_locked()
    }
}

impl CriticalSection for SpinCriticalSection {
    fn enter(&self) {
        core::mem::forget(self.lock.lock());
    }

    fn leave(&self) {
        // SAFETY: `leave` 只与本实例之前的一次 `enter` 配对，锁此刻由调用方持有。
        unsafe { self.lock.force_unlock() };
    }
}

// SAFETY: `spin::Mutex` 保证同一时刻仅一个持有者，其 Acquire/Release 顺序提供可见性。
unsafe impl MutualExclusion for SpinCriticalSection {}

impl fmt::Debug for SpinCriticalSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpinCriticalSection")
            .field("held", &self.is_held())
            .finish()
    }
}

/// 函数对 + 不透明句柄形式的能力，直接对应“enter(handle) / leave(handle)”记录。
///
/// 句柄原样传给两个函数，不被检查；无句柄时使用 `()` 或 `Option<_>`。
/// 该类型本身不承诺互斥，需要时以 [`AssumeExclusive`] 包装声明。
pub struct RawCriticalSection<H> {
    handle: H,
    enter: fn(&H),
    leave: fn(&H),
}

impl<H> RawCriticalSection<H> {
    pub const fn new(handle: H, enter: fn(&H), leave: fn(&H)) -> Self {
        Self {
            handle,
            enter,
            leave,
        }
    }

    /// 访问不透明句柄。
    pub fn handle(&self) -> &H {
        &self.handle
    }
}

impl<H> CriticalSection for RawCriticalSection<H> {
    fn enter(&self) {
        (self.enter)(&self.handle);
    }

    fn leave(&self) {
        (self.leave)(&self.handle);
    }
}

impl<H: fmt::Debug> fmt::Debug for RawCriticalSection<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawCriticalSection")
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}

/// 由调用方担保互斥性的包装，常用于把“关中断”函数对声明为 [`MutualExclusion`]。
#[derive(Debug)]
pub struct AssumeExclusive<C>(C);

impl<C> AssumeExclusive<C> {
    /// # Safety
    /// `inner` 必须满足 [`MutualExclusion`] 的全部要求。
    pub const unsafe fn new(inner: C) -> Self {
        Self(inner)
    }

    pub fn get_ref(&self) -> &C {
        &self.0
    }

    pub fn into_inner(self) -> C {
        self.0
    }
}

impl<C: CriticalSection> CriticalSection for AssumeExclusive<C> {
    fn enter(&self) {
        self.0.enter();
    }

    fn leave(&self) {
        self.0.leave();
    }
}

// SAFETY: 构造函数为 `unsafe`，互斥性由调用方担保；`Sync` 由约束直接要求。
unsafe impl<C: CriticalSection + Sync> MutualExclusion for AssumeExclusive<C> {}

#[cfg(feature = "critical-section")]
pub use self::interrupt_free::InterruptFree;

#[cfg(feature = "critical-section")]
mod interrupt_free {
    use core::cell::UnsafeCell;

    use critical_section::RestoreState;

    use super::{CriticalSection, MutualExclusion};

    struct Nesting {
        depth: usize,
        outermost: RestoreState,
    }

    /// 借助 `critical-section` crate 的全局临界区（嵌入式目标上即“关中断”）。
    ///
    /// 同一实例可以被多条队列共享并嵌套进入（例如在一条队列的 `locked` 内操作另一条）。
    /// 实例只保存最外层的恢复状态：内层 `enter` 取得的状态立即按后进先出顺序交还，
    /// 只有深度回到零的 `leave` 才真正释放全局临界区。
    pub struct InterruptFree {
        nesting: UnsafeCell<Nesting>,
    }

    impl InterruptFree {
        pub const fn new() -> Self {
            Self {
                nesting: UnsafeCell::new(Nesting {
                    depth: 0,
                    outermost: RestoreState::invalid(),
                }),
            }
        }
    }

    impl Default for InterruptFree {
        fn default() -> Self {
            Self::new()
        }
    }

    impl CriticalSection for InterruptFree {
        fn enter(&self) {
            // SAFETY: `acquire` 返回后本上下文持有全局临界区，`nesting` 只在其中被访问；
            // 深度非零说明持有者正是本上下文，内层状态可立即配对交还。
            unsafe {
                let state = critical_section::acquire();
                let nesting = &mut *self.nesting.get();
                if nesting.depth == 0 {
                    nesting.outermost = state;
                } else {
                    critical_section::release(state);
                }
                nesting.depth += 1;
            }
        }

        fn leave(&self) {
            // SAFETY: 仍处于最外层 `enter` 建立的全局临界区内。
            unsafe {
                let nesting = &mut *self.nesting.get();
                nesting.depth -= 1;
                if nesting.depth == 0 {
                    let state = nesting.outermost;
                    nesting.outermost = RestoreState::invalid();
                    critical_section::release(state);
                }
            }
        }
    }

    // SAFETY: `nesting` 只在全局临界区内被访问。
    unsafe impl Sync for InterruptFree {}

    // SAFETY: 全局临界区在任意时刻只允许一个持有者。
    unsafe impl MutualExclusion for InterruptFree {}

}
