//! Multi-producer stable reference registry for GC root tracking.
//!
//! A managed-memory runtime needs to know which of its objects are
//! referenced from outside the managed heap. This crate provides that root
//! set as two layers:
//!
//! - [`MultiSourceQueue`] — the generic engine: every thread appends to its
//!   own unsynchronized local sequence through a [`Producer`], and merges it
//!   into one mutex-protected published sequence at a caller-chosen point.
//!   Entries are named by stable, move-only [`Handle`]s and removed in O(1)
//!   wherever they reside.
//! - [`StableRefRegistry`] — the specialization: registration of stable
//!   references on the hot path without shared-lock contention, a
//!   per-thread [`process_thread`](StableRefRegistry::process_thread)
//!   safepoint rendezvous, and a lock-scoped
//!   [`iter`](StableRefRegistry::iter) snapshot the collector walks as its
//!   root set.
//!
//! **Typical usage**:
//! ```
//! use stable_refs::{ObjRef, StableRefRegistry};
//!
//! let registry = StableRefRegistry::new();
//!
//! // Mutator thread: attach once, then register on the fast path.
//! let mut thread = registry.attach_thread();
//! let stable_ref = registry.register_stable_ref(&mut thread, ObjRef::from_raw(0x10 as *mut ()));
//!
//! // Safepoint: the thread merges its pending references.
//! registry.process_thread(&mut thread);
//!
//! // Collector: scan the complete root set under the lock.
//! for root in &registry.iter() {
//!     let _ = root.as_raw();
//! }
//!
//! // Native side releases the reference.
//! registry.unregister_stable_ref(&mut thread, stable_ref);
//! ```
//!
//! 用于 GC 根追踪的多生产者稳定引用注册表。
//!
//! 托管内存运行时需要知道哪些对象被托管堆之外引用。本 crate 以两层提供
//! 这个根集：
//!
//! - [`MultiSourceQueue`] — 通用引擎：每个线程通过 [`Producer`] 向自己的
//!   无同步本地序列追加，并在调用者选择的时点将其合并进唯一的、由互斥锁
//!   保护的已发布序列。条目由稳定的、仅可移动的 [`Handle`] 指名，无论
//!   位于哪个序列都可 O(1) 移除。
//! - [`StableRefRegistry`] — 特化层：热路径上无共享锁竞争的稳定引用注册、
//!   每线程的 [`process_thread`](StableRefRegistry::process_thread) 安全点
//!   会合，以及收集器作为根集遍历的持锁
//!   [`iter`](StableRefRegistry::iter) 快照。

mod list;
mod queue;
mod registry;
mod sync;

pub use queue::{Handle, Iter, Iterable, MultiSourceQueue, Producer};
pub use registry::{ObjRef, Roots, StableRef, StableRefRegistry, ThreadQueue};

#[cfg(test)]
mod tests;
