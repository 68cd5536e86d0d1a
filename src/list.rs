use crate::sync::{AtomicUsize, Ordering};
use std::marker::PhantomData;
use std::ptr::{self, NonNull};

/// Owner tag of the shared published sequence.
/// 共享已发布序列的所有者标签。
pub(crate) const PUBLISHED_OWNER: usize = 0;

/// One heap-allocated node of an intrusive doubly-linked sequence.
///
/// The node's address is fixed from creation until it is unlinked and freed;
/// moving a node between sequences relinks it, never copies it. The `owner`
/// tag records which sequence the node currently belongs to: a producer's
/// nonzero id, or [`PUBLISHED_OWNER`] once it has been spliced into the
/// shared sequence.
///
/// 侵入式双向链表序列的一个堆分配节点。
///
/// 节点的地址从创建到被摘除并释放为止都是固定的；在序列之间移动节点只会
/// 重新链接，绝不会复制。`owner` 标签记录节点当前属于哪个序列：某个生产者
/// 的非零 id，或在被拼接进共享序列后变为 [`PUBLISHED_OWNER`]。
pub(crate) struct Node<T> {
    pub(crate) value: T,
    prev: *mut Node<T>,
    next: *mut Node<T>,
    /// Written by the owning thread on append and drain; read with `Acquire`
    /// on removal so a published node may be released from another thread.
    /// 由拥有线程在追加和排空时写入；移除时以 `Acquire` 读取，因此已发布的
    /// 节点可以从另一个线程释放。
    pub(crate) owner: AtomicUsize,
}

/// A doubly-linked sequence of [`Node`]s with O(1) append, O(1)
/// unlink-by-node and O(1) splice.
///
/// The list owns its nodes: dropping it frees every node still linked.
/// All structural operations take `&mut self`; callers provide the
/// synchronization (a producer's single-owner discipline, or the shared
/// mutex for the published sequence).
///
/// 一个由 [`Node`] 组成的双向链表序列，支持 O(1) 追加、O(1) 按节点摘除和
/// O(1) 拼接。
///
/// 链表拥有其节点：drop 时会释放所有仍链接的节点。所有结构性操作都接受
/// `&mut self`；同步由调用者提供（生产者的单一所有者约定，或已发布序列的
/// 共享互斥锁）。
pub(crate) struct List<T> {
    head: *mut Node<T>,
    tail: *mut Node<T>,
    len: usize,
}

// The raw links only ever reference nodes owned by this list; sending the
// list sends its nodes with it.
unsafe impl<T: Send> Send for List<T> {}

impl<T> List<T> {
    pub(crate) const fn new() -> Self {
        Self {
            head: ptr::null_mut(),
            tail: ptr::null_mut(),
            len: 0,
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Append a new node to the tail and return its stable address.
    /// 向尾部追加一个新节点并返回其稳定地址。
    pub(crate) fn push_back(&mut self, value: T, owner: usize) -> NonNull<Node<T>> {
        let node = Box::into_raw(Box::new(Node {
            value,
            prev: self.tail,
            next: ptr::null_mut(),
            owner: AtomicUsize::new(owner),
        }));

        if self.tail.is_null() {
            self.head = node;
        } else {
            // SAFETY: a non-null tail is a live node owned by this list.
            unsafe {
                (*self.tail).next = node;
            }
        }
        self.tail = node;
        self.len += 1;

        // SAFETY: Box::into_raw never returns null.
        unsafe { NonNull::new_unchecked(node) }
    }

    /// Unlink `node` from this list and reclaim its box.
    ///
    /// O(1): only the node's own links are touched, no search.
    ///
    /// 从链表中摘除 `node` 并收回其 box。
    /// O(1)：只触碰节点自身的链接，不做查找。
    ///
    /// # Safety
    ///
    /// `node` must currently be linked into `self` and must not be used
    /// again after this call.
    pub(crate) unsafe fn unlink(&mut self, node: NonNull<Node<T>>) -> Box<Node<T>> {
        let node = node.as_ptr();
        // SAFETY: per the contract the node is live and linked into `self`,
        // so its neighbors (when non-null) are live nodes of this list.
        unsafe {
            let prev = (*node).prev;
            let next = (*node).next;

            if prev.is_null() {
                self.head = next;
            } else {
                (*prev).next = next;
            }
            if next.is_null() {
                self.tail = prev;
            } else {
                (*next).prev = prev;
            }

            self.len -= 1;
            Box::from_raw(node)
        }
    }

    /// Move the entire contents of `other` onto the tail of `self` in O(1),
    /// leaving `other` empty. Node addresses are unchanged.
    ///
    /// 以 O(1) 将 `other` 的全部内容移动到 `self` 的尾部，并将 `other`
    /// 置空。节点地址保持不变。
    pub(crate) fn splice_back(&mut self, other: &mut List<T>) {
        if other.is_empty() {
            return;
        }

        if self.tail.is_null() {
            self.head = other.head;
        } else {
            // SAFETY: both ends are live nodes owned by the respective lists.
            unsafe {
                (*self.tail).next = other.head;
                (*other.head).prev = self.tail;
            }
        }
        self.tail = other.tail;
        self.len += other.len;

        other.head = ptr::null_mut();
        other.tail = ptr::null_mut();
        other.len = 0;
    }

    /// Re-tag every node in this list with `owner`.
    ///
    /// O(len); runs on the owning thread, under the shared lock when the
    /// destination is the published sequence.
    ///
    /// 用 `owner` 重新标记链表中的每个节点。
    /// O(len)；在拥有线程上运行，目标为已发布序列时在共享锁下进行。
    pub(crate) fn retag_all(&mut self, owner: usize) {
        let mut cur = self.head;
        while !cur.is_null() {
            // SAFETY: `cur` walks only nodes linked into (and owned by) `self`.
            unsafe {
                (*cur).owner.store(owner, Ordering::Release);
                cur = (*cur).next;
            }
        }
    }

    /// Borrowing iterator over the values, head to tail.
    /// 从头到尾借用遍历各个值。
    pub(crate) fn iter(&self) -> ListIter<'_, T> {
        ListIter {
            next: self.head,
            _marker: PhantomData,
        }
    }
}

impl<T> Drop for List<T> {
    fn drop(&mut self) {
        let mut cur = self.head;
        while !cur.is_null() {
            // SAFETY: every node reachable from `head` is owned by this list
            // and freed exactly once here.
            unsafe {
                let next = (*cur).next;
                drop(Box::from_raw(cur));
                cur = next;
            }
        }
        self.head = ptr::null_mut();
        self.tail = ptr::null_mut();
        self.len = 0;
    }
}

pub(crate) struct ListIter<'a, T> {
    next: *mut Node<T>,
    _marker: PhantomData<&'a Node<T>>,
}

impl<'a, T> Iterator for ListIter<'a, T> {
    type Item = &'a T;

    #[inline]
    fn next(&mut self) -> Option<&'a T> {
        if self.next.is_null() {
            return None;
        }
        // SAFETY: the iterator borrows the list, so the node it points at
        // stays linked and alive for 'a.
        unsafe {
            let node = &*self.next;
            self.next = node.next;
            Some(&node.value)
        }
    }
}
