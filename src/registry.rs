use crate::queue::{Handle, Iterable, MultiSourceQueue, Producer};

/// Opaque identity of one managed object.
///
/// The registry stores and yields these without ever dereferencing or
/// interpreting them; only identity matters. Construct one from whatever
/// address or id the managed heap uses to name the object.
///
/// 一个托管对象的不透明标识。
///
/// 注册表只存储和产出它们，从不解引用或解释其内容；只有同一性有意义。
/// 用托管堆为对象命名所用的任意地址或 id 构造它。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct ObjRef(*mut ());

// Pure identity: the registry never dereferences the pointer.
unsafe impl Send for ObjRef {}
unsafe impl Sync for ObjRef {}

impl ObjRef {
    #[inline]
    pub fn from_raw(raw: *mut ()) -> Self {
        Self(raw)
    }

    #[inline]
    pub fn as_raw(self) -> *mut () {
        self.0
    }
}

/// A registered stable reference: a move-only token proving one external
/// strong root over a managed object.
///
/// Returned by [`StableRefRegistry::register_stable_ref`]; the referenced
/// object is treated as a GC root until the token is passed back to
/// [`StableRefRegistry::unregister_stable_ref`]. Unregistering consumes the
/// token. Every registration must be paired with exactly one later
/// unregistration, or the reference stays rooted for the registry's
/// lifetime.
///
/// 一个已注册的稳定引用：证明对某个托管对象持有一个外部强根的仅可移动
/// 令牌。
///
/// 由 [`StableRefRegistry::register_stable_ref`] 返回；在令牌被交回
/// [`StableRefRegistry::unregister_stable_ref`] 之前，被引用对象都被视为
/// GC 根。注销会消耗令牌。每次注册必须与之后恰好一次注销配对，否则该
/// 引用会在注册表的整个生命周期内保持为根。
pub struct StableRef {
    handle: Handle<ObjRef>,
}

impl StableRef {
    /// The object this stable reference roots.
    ///
    /// # Safety
    ///
    /// The reference must still be registered (not unregistered through a
    /// token rebuilt with [`StableRef::from_raw`]) and the registry must
    /// still be alive.
    ///
    /// 该稳定引用所固定为根的对象。
    #[inline]
    pub unsafe fn external_ref(&self) -> ObjRef {
        // SAFETY: forwarded contract.
        *unsafe { self.handle.get() }
    }

    /// Dismantle the token into a raw address for the native interop
    /// boundary. Rebuild it with [`StableRef::from_raw`].
    ///
    /// 将令牌拆解为原始地址以跨越本地互操作边界。用
    /// [`StableRef::from_raw`] 重建。
    #[inline]
    pub fn into_raw(self) -> *mut () {
        self.handle.into_raw()
    }

    /// Rebuild a token previously dismantled with [`StableRef::into_raw`].
    ///
    /// # Safety
    ///
    /// `raw` must come from [`StableRef::into_raw`] on a reference of the
    /// same registry that has not been unregistered since, and must be
    /// rebuilt at most once.
    ///
    /// 重建先前用 [`StableRef::into_raw`] 拆解的令牌。
    #[inline]
    pub unsafe fn from_raw(raw: *mut ()) -> Self {
        Self {
            // SAFETY: forwarded contract.
            handle: unsafe { Handle::from_raw(raw) },
        }
    }
}

/// One thread's append side of the registry.
///
/// Created when the thread attaches to the runtime
/// ([`StableRefRegistry::attach_thread`]) and stored in that thread's
/// context. All registrations made by the thread land here first, invisible
/// to the collector until [`StableRefRegistry::process_thread`] merges them.
///
/// Dropping the queue (thread detach) publishes any still-pending
/// references, so a dying thread's stable references stay rooted.
///
/// 注册表中一个线程的追加端。
///
/// 在线程附着到运行时（[`StableRefRegistry::attach_thread`]）时创建，
/// 存放在该线程的上下文中。该线程的所有注册都先落在这里，在
/// [`StableRefRegistry::process_thread`] 合并之前对收集器不可见。
///
/// drop 队列（线程脱离）会发布所有仍待发布的引用，因此临死线程的稳定
/// 引用仍保持为根。
pub struct ThreadQueue {
    pub(crate) producer: Producer<ObjRef>,
}

impl ThreadQueue {
    /// Number of references registered by this thread and not yet merged
    /// into the global root set (nor unregistered).
    ///
    /// 该线程已注册但尚未合并进全局根集（也未注销）的引用数量。
    #[inline]
    pub fn pending(&self) -> usize {
        self.producer.pending()
    }
}

/// A lock-scoped view of the global root set, yielding [`ObjRef`]s.
/// 全局根集的持锁视图，产出 [`ObjRef`]。
pub type Roots<'a> = Iterable<'a, ObjRef>;

/// Registry for all managed objects that have references outside of the
/// managed heap.
///
/// Native code that wants to keep a managed object alive across calls
/// registers it here and gets back an opaque [`StableRef`]; the object is a
/// GC root for exactly as long as the token exists. Registration goes
/// through the calling thread's own [`ThreadQueue`] and never contends on a
/// shared lock; during a collection cycle every stopped thread merges its
/// queue via [`process_thread`](Self::process_thread), after which the
/// collector reads the complete root set with [`iter`](Self::iter).
///
/// The runtime owns exactly one registry instance; its lifecycle (and the
/// stop-the-world handshake ordering `process_thread` before `iter`) is
/// sequenced by the surrounding runtime, not here.
///
/// 所有在托管堆之外被引用的托管对象的注册表。
///
/// 想让托管对象跨调用存活的本地代码在此注册并得到一个不透明的
/// [`StableRef`]；只要令牌存在，对象就是 GC 根。注册经由调用线程自己的
/// [`ThreadQueue`]，从不竞争共享锁；收集周期中，每个已停止的线程通过
/// [`process_thread`](Self::process_thread) 合并其队列，之后收集器用
/// [`iter`](Self::iter) 读取完整的根集。
///
/// 运行时恰好拥有一个注册表实例；其生命周期（以及 `process_thread` 先于
/// `iter` 的 stop-the-world 握手顺序）由外围运行时编排，不在此处处理。
pub struct StableRefRegistry {
    stable_refs: MultiSourceQueue<ObjRef>,
}

impl StableRefRegistry {
    pub fn new() -> Self {
        Self {
            stable_refs: MultiSourceQueue::new(),
        }
    }

    /// Create the calling thread's [`ThreadQueue`].
    ///
    /// Called once per thread when it attaches to the runtime; the queue
    /// must only ever be used by the thread that owns it.
    ///
    /// 创建调用线程的 [`ThreadQueue`]。
    /// 线程附着到运行时时调用一次；队列只能由拥有它的线程使用。
    pub fn attach_thread(&self) -> ThreadQueue {
        ThreadQueue {
            producer: self.stable_refs.producer(),
        }
    }

    /// Register `object` as externally referenced, on behalf of the calling
    /// thread.
    ///
    /// Unsynchronized O(1) against `thread`'s own queue. The returned token
    /// is stable: its address never changes, before or after the reference
    /// is merged into the global root set. Allocation failure aborts; the
    /// runtime cannot proceed without root-tracking capacity.
    ///
    /// 代表调用线程将 `object` 注册为被外部引用。
    /// 对 `thread` 自己的队列进行无同步 O(1) 操作。返回的令牌是稳定的:
    /// 无论引用合并进全局根集之前还是之后，其地址都不变。分配失败会中止
    /// 进程；没有根追踪能力，运行时无法继续。
    pub fn register_stable_ref(&self, thread: &mut ThreadQueue, object: ObjRef) -> StableRef {
        debug_assert!(
            self.stable_refs.owns(&thread.producer),
            "BUG: thread queue belongs to a different registry"
        );
        StableRef {
            handle: thread.producer.push(object),
        }
    }

    /// Release the external reference named by `stable_ref`.
    ///
    /// Consumes the token; the object stops being a root the instant this
    /// returns. O(1) and unsynchronized while the reference is still local
    /// to `thread`; takes the global lock if it has already been merged,
    /// blocking until any open root-set snapshot is released.
    ///
    /// `stable_ref` must have been returned by a prior
    /// [`register_stable_ref`](Self::register_stable_ref) on this registry.
    /// References still local to a different, unstopped thread cannot be
    /// released here.
    ///
    /// 释放 `stable_ref` 指名的外部引用。
    /// 消耗令牌；此调用返回的那一刻对象即不再是根。引用仍在 `thread`
    /// 本地时为无同步 O(1)；若已被合并则取全局锁，并阻塞到任何打开的
    /// 根集快照被释放为止。
    pub fn unregister_stable_ref(&self, thread: &mut ThreadQueue, stable_ref: StableRef) {
        debug_assert!(
            self.stable_refs.owns(&thread.producer),
            "BUG: thread queue belongs to a different registry"
        );
        thread.producer.remove(stable_ref.handle);
    }

    /// Merge `thread`'s pending references into the global root set.
    ///
    /// The safepoint rendezvous between a mutator thread and the collector:
    /// must be called by the owning thread itself, in direct response to a
    /// collector stop request, before the collector scans roots. Afterwards
    /// every reference the thread registered up to this point (and not yet
    /// unregistered) is visible to [`iter`](Self::iter), in registration
    /// order.
    ///
    /// 将 `thread` 的待发布引用合并进全局根集。
    ///
    /// 这是 mutator 线程与收集器之间的安全点会合：必须由拥有线程自己、
    /// 在直接响应收集器的停止请求时、在收集器扫描根之前调用。此后该线程
    /// 至此注册（且尚未注销）的每个引用都按注册顺序对
    /// [`iter`](Self::iter) 可见。
    pub fn process_thread(&self, thread: &mut ThreadQueue) {
        debug_assert!(
            self.stable_refs.owns(&thread.producer),
            "BUG: thread queue belongs to a different registry"
        );
        thread.producer.publish();
    }

    /// Lock the registry and return the global root set for scanning.
    ///
    /// Intended caller is the collector, once the stop-the-world handshake
    /// has ensured every live thread ran
    /// [`process_thread`](Self::process_thread). The lock is held until the
    /// returned view drops; the collector must not retain the view or any
    /// yielded reference beyond that.
    ///
    /// 锁定注册表并返回用于扫描的全局根集。
    ///
    /// 预期调用者是收集器，且 stop-the-world 握手已确保每个存活线程都
    /// 执行了 [`process_thread`](Self::process_thread)。锁会持有到返回的
    /// 视图 drop 为止；收集器不得在此之后保留视图或任何产出的引用。
    pub fn iter(&self) -> Roots<'_> {
        self.stable_refs.iter()
    }
}

impl Default for StableRefRegistry {
    fn default() -> Self {
        Self::new()
    }
}
