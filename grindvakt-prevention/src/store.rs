//! ## grindvakt-prevention::store
//! **Append/flush rule list with epoch-based reclamation**
//!
//! Readers pin the current epoch and walk the list without taking any lock.
//! Writers of one store are serialized by a mutex that readers never touch.
//!
//! - A node is fully written before the release store that links it at the
//!   tail, and it is never modified after that.
//! - Flush detaches the whole list with a single swap of the head, then hands
//!   every detached node to the epoch collector. A node is freed only after
//!   every reader pinned before the swap has unpinned, so a traversal that
//!   started before the flush keeps walking the old, intact list.
//!
//! ### Expectations:
//! - Traversal is lock-free and allocation-free
//! - Append and flush never wait for readers
//! - Append is constant time: writers keep the tail under their lock

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam::epoch::{self, Atomic, Owned, Shared};
use parking_lot::Mutex;

use crate::error::FirewallError;
use crate::rule::{ChainId, Rule};

struct Node {
    rule: Rule,
    next: Atomic<Node>,
}

/// Ordered rule sequence of one chain.
pub struct RuleStore {
    chain: ChainId,
    head: Atomic<Node>,
    // Last linked node, null while the list is empty. Owned by writers.
    writer: Mutex<Atomic<Node>>,
    // Only written with `writer` held.
    len: AtomicUsize,
    capacity: usize,
}

impl RuleStore {
    pub fn new(chain: ChainId, capacity: usize) -> Self {
        Self {
            chain,
            head: Atomic::null(),
            writer: Mutex::new(Atomic::null()),
            len: AtomicUsize::new(0),
            capacity,
        }
    }

    /// Appends `rule` at the tail and returns the new length.
    ///
    /// Fails with [`FirewallError::OutOfMemory`] once the store holds
    /// `capacity` rules; the list is left untouched in that case.
    pub fn rule_append(&self, rule: Rule) -> Result<usize, FirewallError> {
        let tail = self.writer.lock();

        let len = self.len.load(Ordering::Relaxed);
        if len >= self.capacity {
            return Err(FirewallError::OutOfMemory {
                chain: self.chain,
                limit: self.capacity,
            });
        }

        let guard = &epoch::pin();
        let node = Owned::new(Node {
            rule,
            next: Atomic::null(),
        })
        .into_shared(guard);

        let last = tail.load(Ordering::Relaxed, guard);
        // SAFETY: the tail node is reachable from `head`, and only `flush`
        // unlinks nodes, which needs the writer lock held here.
        let link = match unsafe { last.as_ref() } {
            Some(last) => &last.next,
            None => &self.head,
        };
        // Release publishes the node's fields together with the link.
        link.store(node, Ordering::Release);
        tail.store(node, Ordering::Relaxed);
        self.len.store(len + 1, Ordering::Relaxed);
        Ok(len + 1)
    }

    /// Unlinks every rule and schedules them for reclamation.
    /// Returns how many rules were removed.
    pub fn flush(&self) -> usize {
        let tail = self.writer.lock();

        let guard = &epoch::pin();
        let mut current = self.head.swap(Shared::null(), Ordering::AcqRel, guard);
        tail.store(Shared::null(), Ordering::Relaxed);
        let mut removed = 0;

        // SAFETY: the detached nodes stay allocated at least until `guard`
        // is dropped, and nothing writes to them anymore.
        while let Some(node) = unsafe { current.as_ref() } {
            let next = node.next.load(Ordering::Acquire, guard);
            // SAFETY: the node is no longer reachable from `head`, so no
            // traversal starting from now can find it, and it is destroyed
            // exactly once since each node is visited once.
            unsafe { guard.defer_destroy(current) };
            current = next;
            removed += 1;
        }

        self.len.store(0, Ordering::Relaxed);
        guard.flush();
        removed
    }

    /// Walks the rules in append order and returns the first `Some` that `f`
    /// produces.
    #[inline]
    pub fn find_map<T, F>(&self, mut f: F) -> Option<T>
    where
        F: FnMut(&Rule) -> Option<T>,
    {
        let guard = &epoch::pin();
        let mut current = self.head.load(Ordering::Acquire, guard);

        // SAFETY: a node loaded while pinned is reclaimed no earlier than
        // when `guard` is dropped, at the end of this call.
        while let Some(node) = unsafe { current.as_ref() } {
            if let Some(found) = f(&node.rule) {
                return Some(found);
            }
            current = node.next.load(Ordering::Acquire, guard);
        }
        None
    }

    /// Copies the rules currently linked, in order.
    pub fn snapshot(&self) -> Vec<Rule> {
        let mut rules = Vec::with_capacity(self.len());
        self.find_map(|rule| {
            rules.push(*rule);
            None::<()>
        });
        rules
    }

    pub fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Drop for RuleStore {
    fn drop(&mut self) {
        // SAFETY: `&mut self` proves no reader or writer is left, so the
        // remaining nodes can be freed right away.
        unsafe {
            let guard = epoch::unprotected();
            let mut current = self.head.load(Ordering::Relaxed, guard);
            while !current.is_null() {
                let next = current.deref().next.load(Ordering::Relaxed, guard);
                drop(current.into_owned());
                current = next;
            }
        }
    }
}

impl fmt::Debug for RuleStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleStore")
            .field("chain", &self.chain)
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}
