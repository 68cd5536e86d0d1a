use crate::list::{List, ListIter, Node, PUBLISHED_OWNER};
use crate::sync::{Arc, AtomicUsize, Mutex, MutexGuard, Ordering};
use std::ptr::NonNull;

/// Shared state of one multi-source queue.
/// 一个多源队列的共享状态。
struct Shared<T> {
    /// The published sequence. Structurally mutated (splice, unlink) only
    /// while holding this mutex.
    /// 已发布序列。只有持有此互斥锁时才会进行结构性修改（拼接、摘除）。
    published: Mutex<List<T>>,
    /// Source of nonzero producer ids. Id 0 is [`PUBLISHED_OWNER`].
    /// 非零生产者 id 的来源。Id 0 是 [`PUBLISHED_OWNER`]。
    next_producer_id: AtomicUsize,
}

/// A multi-producer queue where each producing thread appends to its own
/// unsynchronized local sequence and later merges it into one shared,
/// mutex-protected published sequence.
///
/// The append path never touches the shared lock; the lock is taken once per
/// producer per merge ([`Producer::publish`]) and for the duration of a
/// consumer snapshot ([`MultiSourceQueue::iter`]). Entries are identified by
/// stable, move-only [`Handle`]s and can be removed in O(1) wherever they
/// currently reside.
///
/// `MultiSourceQueue` is `Clone` and can be shared across threads; clone it
/// into each thread that needs to create a [`Producer`].
///
/// **Typical usage**:
/// ```
/// use stable_refs::MultiSourceQueue;
///
/// let queue = MultiSourceQueue::new();
/// let mut producer = queue.producer();
///
/// let handle = producer.push(42i32);
/// producer.publish();
///
/// let snapshot = queue.iter();
/// assert_eq!(snapshot.len(), 1);
/// drop(snapshot);
///
/// producer.remove(handle);
/// ```
///
/// 一个多生产者队列：每个生产线程向自己的无同步本地序列追加，之后再将其
/// 合并进一个由互斥锁保护的共享已发布序列。
///
/// 追加路径从不触碰共享锁；每个生产者每次合并（[`Producer::publish`]）
/// 取一次锁，消费者快照（[`MultiSourceQueue::iter`]）持锁至快照结束。
/// 条目由稳定的、仅可移动的 [`Handle`] 标识，无论当前位于哪个序列都可以
/// O(1) 移除。
///
/// `MultiSourceQueue` 是 `Clone` 的，可以跨线程共享；将它克隆到每个需要
/// 创建 [`Producer`] 的线程。
pub struct MultiSourceQueue<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for MultiSourceQueue<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Send> MultiSourceQueue<T> {
    /// Create a new, empty queue.
    /// 创建一个新的空队列。
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                published: Mutex::new(List::new()),
                next_producer_id: AtomicUsize::new(PUBLISHED_OWNER + 1),
            }),
        }
    }

    /// Create the calling thread's producer.
    ///
    /// The caller is responsible for storing the producer per-thread and for
    /// ensuring that each `Producer` is used by only one thread at a time.
    ///
    /// 创建调用线程的生产者。
    /// 调用者负责按线程存储生产者，并确保每个 `Producer` 同一时刻只被一个
    /// 线程使用。
    pub fn producer(&self) -> Producer<T> {
        let id = self.shared.next_producer_id.fetch_add(1, Ordering::Relaxed);
        Producer {
            shared: Arc::clone(&self.shared),
            id,
            local: List::new(),
        }
    }

    /// Lock the published sequence and return a snapshot view over it.
    ///
    /// The lock is held for the lifetime of the returned [`Iterable`] and
    /// released when it drops, on every exit path. While the lock is held,
    /// [`Producer::publish`] and removal of already-published entries block;
    /// appends and removals still local to other producers are unaffected.
    ///
    /// 锁定已发布序列并返回其快照视图。
    /// 锁在返回的 [`Iterable`] 的生命周期内被持有，并在其 drop 时释放，
    /// 任何退出路径都是如此。持锁期间，[`Producer::publish`] 和对已发布
    /// 条目的移除会阻塞；其他生产者仍处于本地的追加与移除不受影响。
    pub fn iter(&self) -> Iterable<'_, T> {
        Iterable {
            guard: self.shared.published.lock(),
        }
    }

    pub(crate) fn owns(&self, producer: &Producer<T>) -> bool {
        Arc::ptr_eq(&self.shared, &producer.shared)
    }
}

impl<T: Send> Default for MultiSourceQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// A stable, move-only token for one entry of a [`MultiSourceQueue`].
///
/// The token names the entry's heap node, whose address is fixed from
/// [`Producer::push`] until [`Producer::remove`]. It is deliberately neither
/// `Clone` nor `Copy`: removal consumes it, so the token itself cannot be
/// used after release.
///
/// [`MultiSourceQueue`] 中一个条目的稳定的、仅可移动的令牌。
///
/// 令牌指名条目的堆节点，其地址从 [`Producer::push`] 到
/// [`Producer::remove`] 为止固定不变。它刻意既不 `Clone` 也不 `Copy`：
/// 移除会消耗它，因此令牌本身在释放后无法再被使用。
pub struct Handle<T> {
    node: NonNull<Node<T>>,
}

// The token may travel to another thread (a published entry may be removed
// from any producer of the same queue). `get` hands out `&T`, hence `Sync`.
unsafe impl<T: Send + Sync> Send for Handle<T> {}

impl<T> Handle<T> {
    /// Borrow the entry's value.
    ///
    /// # Safety
    ///
    /// The entry must still be registered: the handle must not have been
    /// removed through another token obtained via [`Handle::from_raw`], and
    /// the owning queue must still be alive.
    ///
    /// 借用条目的值。
    #[inline]
    pub unsafe fn get(&self) -> &T {
        // SAFETY: per the contract above, the node is still linked and owned
        // by the queue, and entry values are never mutated after creation.
        unsafe { &self.node.as_ref().value }
    }

    /// The raw address of the entry, for passing the token across an FFI
    /// boundary. Rebuild the token with [`Handle::from_raw`].
    ///
    /// 条目的原始地址，用于将令牌传过 FFI 边界。用 [`Handle::from_raw`]
    /// 重建令牌。
    #[inline]
    pub fn into_raw(self) -> *mut () {
        self.node.as_ptr().cast()
    }

    /// Rebuild a token previously dismantled with [`Handle::into_raw`].
    ///
    /// # Safety
    ///
    /// `raw` must come from `into_raw` on a handle of the same queue whose
    /// entry has not been removed, and must be rebuilt at most once.
    ///
    /// 重建先前用 [`Handle::into_raw`] 拆解的令牌。
    #[inline]
    pub unsafe fn from_raw(raw: *mut ()) -> Self {
        // SAFETY: per the contract, `raw` is the address of a live node.
        Self {
            node: unsafe { NonNull::new_unchecked(raw.cast()) },
        }
    }
}

/// One thread's unsynchronized append side of a [`MultiSourceQueue`].
///
/// A producer owns a local sequence of entries not yet visible to
/// [`MultiSourceQueue::iter`]. Appending and removing local entries is
/// lock-free and O(1); [`Producer::publish`] merges the whole local sequence
/// into the shared published sequence in one O(1) splice under the lock.
///
/// `Producer` is `Send` but not `Sync`: it may migrate between threads, but
/// only one thread may use it at a time, and `publish` must be called by
/// that owning thread.
///
/// Dropping a producer with pending entries publishes them first, so entries
/// appended by a dying thread remain reachable through the queue.
///
/// [`MultiSourceQueue`] 中一个线程的无同步追加端。
///
/// 生产者拥有一个对 [`MultiSourceQueue::iter`] 尚不可见的本地条目序列。
/// 追加和移除本地条目是无锁的且为 O(1)；[`Producer::publish`] 在锁下用
/// 一次 O(1) 拼接将整个本地序列合并进共享已发布序列。
///
/// `Producer` 是 `Send` 而非 `Sync`：它可以在线程间迁移，但同一时刻只能
/// 被一个线程使用，且 `publish` 必须由该拥有线程调用。
///
/// 带着待发布条目 drop 生产者会先将它们发布，因此临死线程追加的条目仍可
/// 通过队列访问。
pub struct Producer<T> {
    shared: Arc<Shared<T>>,
    id: usize,
    local: List<T>,
}

impl<T: Send> Producer<T> {
    /// Append `value` to this producer's local sequence.
    ///
    /// Unsynchronized O(1); never touches the shared lock. The entry stays
    /// invisible to [`MultiSourceQueue::iter`] until the next
    /// [`Producer::publish`].
    ///
    /// 将 `value` 追加到该生产者的本地序列。
    /// 无同步 O(1)；从不触碰共享锁。条目在下一次 [`Producer::publish`]
    /// 之前对 [`MultiSourceQueue::iter`] 不可见。
    #[inline]
    pub fn push(&mut self, value: T) -> Handle<T> {
        Handle {
            node: self.local.push_back(value, self.id),
        }
    }

    /// Remove the entry named by `handle` from wherever it currently
    /// resides, consuming the token and freeing the entry.
    ///
    /// If the entry is still local to this producer the removal is
    /// unsynchronized O(1). If it has already been published, the shared
    /// lock is taken; if a snapshot is open the call blocks until the
    /// snapshot is released. Callers never need to know which case applies.
    ///
    /// An entry still local to a *different* producer cannot be removed
    /// here; that is a caller bug and aborts.
    ///
    /// 将 `handle` 指名的条目从其当前所在之处移除，消耗令牌并释放条目。
    ///
    /// 若条目仍在该生产者本地，移除是无同步的 O(1)。若已发布，则会取
    /// 共享锁；若有快照打开，调用会阻塞到快照释放为止。调用者无需知道
    /// 属于哪种情况。
    ///
    /// 仍在*其他*生产者本地的条目不能在此移除；那是调用方的 bug，会
    /// 中止进程。
    pub fn remove(&mut self, handle: Handle<T>) {
        // SAFETY: the handle is move-only, so the node it names is still
        // linked; the owner tag tells us into which sequence.
        let owner = unsafe { handle.node.as_ref().owner.load(Ordering::Acquire) };

        if owner == PUBLISHED_OWNER {
            let mut published = self.shared.published.lock();
            // SAFETY: tag says the node is linked into the published
            // sequence, which we now hold the lock for.
            unsafe {
                drop(published.unlink(handle.node));
            }
        } else {
            assert_eq!(
                owner, self.id,
                "BUG: removing an entry still local to another producer. \
                 Publish it from its owning thread first, or remove it there."
            );
            // SAFETY: tag says the node is linked into our own local
            // sequence, which only this thread mutates.
            unsafe {
                drop(self.local.unlink(handle.node));
            }
        }
    }

    /// Merge this producer's local sequence into the shared published
    /// sequence.
    ///
    /// Under the shared lock, every pending entry is re-tagged as published
    /// and the whole local sequence is spliced onto the published tail in
    /// O(1); entry addresses are unchanged and per-producer FIFO order is
    /// preserved. Afterwards the producer is empty.
    ///
    /// Must be called by the thread currently owning this producer; `&mut
    /// self` enforces exclusive access while the local links are rewired.
    ///
    /// 将该生产者的本地序列合并进共享已发布序列。
    ///
    /// 在共享锁下，每个待发布条目被重新标记为已发布，整个本地序列以
    /// O(1) 拼接到已发布序列尾部；条目地址不变，且保留每生产者的 FIFO
    /// 顺序。之后生产者为空。
    ///
    /// 必须由当前拥有该生产者的线程调用；`&mut self` 在本地链接被改写
    /// 期间强制独占访问。
    pub fn publish(&mut self) {
        // Nothing pending: skip the lock. Only this thread appends locally,
        // so emptiness cannot change underneath us.
        if self.local.is_empty() {
            return;
        }

        let mut published = self.shared.published.lock();
        self.local.retag_all(PUBLISHED_OWNER);
        published.splice_back(&mut self.local);
    }

    /// Number of entries appended but not yet published or removed.
    /// 已追加但尚未发布或移除的条目数量。
    #[inline]
    pub fn pending(&self) -> usize {
        self.local.len()
    }
}

impl<T> Drop for Producer<T> {
    fn drop(&mut self) {
        if self.local.is_empty() {
            return;
        }
        let mut published = self.shared.published.lock();
        self.local.retag_all(PUBLISHED_OWNER);
        published.splice_back(&mut self.local);
    }
}

/// A lock-scoped snapshot of a queue's published sequence.
///
/// Holds the shared mutex for its whole lifetime; obtain it, walk it, drop
/// it. Entries appear in splice order: per-producer FIFO, producers in the
/// order they published.
///
/// 队列已发布序列的一个持锁快照。
/// 在整个生命周期内持有共享互斥锁；获取、遍历、丢弃。条目按拼接顺序出现:
/// 每生产者 FIFO，生产者按发布顺序排列。
#[must_use]
pub struct Iterable<'a, T> {
    guard: MutexGuard<'a, List<T>>,
}

impl<'a, T> Iterable<'a, T> {
    /// Iterate over the published values, oldest first.
    /// 遍历已发布的值，最旧的在前。
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            inner: self.guard.iter(),
        }
    }

    /// Number of published entries.
    /// 已发布条目的数量。
    #[inline]
    pub fn len(&self) -> usize {
        self.guard.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.guard.is_empty()
    }
}

impl<'a, 'it, T> IntoIterator for &'it Iterable<'a, T> {
    type Item = &'it T;
    type IntoIter = Iter<'it, T>;

    fn into_iter(self) -> Iter<'it, T> {
        self.iter()
    }
}

/// Iterator over a locked [`Iterable`] snapshot.
/// 对持锁 [`Iterable`] 快照的迭代器。
pub struct Iter<'a, T> {
    inner: ListIter<'a, T>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    #[inline]
    fn next(&mut self) -> Option<&'a T> {
        self.inner.next()
    }
}
