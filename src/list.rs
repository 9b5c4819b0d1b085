//! Intrusive circular doubly-linked lists of page blocks.
//!
//! A thread's blocks of one size class are threaded through the first two
//! words of their headers: partial blocks at the front, full blocks pushed
//! to the back. Only the owning thread touches a given list, so nothing here
//! is atomic.

use crate::block::BlockHeader;
use core::ptr;

/// A circular doubly-linked list over [`BlockHeader`] nodes.
pub struct BlockList {
    head: *mut BlockHeader,
    tail: *mut BlockHeader,
    len: usize,
}

impl Default for BlockList {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockList {
    pub const fn new() -> Self {
        Self {
            head: ptr::null_mut(),
            tail: ptr::null_mut(),
            len: 0,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// First block, or null if the list is empty.
    #[inline]
    pub fn front(&self) -> *mut BlockHeader {
        self.head
    }

    /// Last block, or null if the list is empty.
    #[inline]
    pub fn back(&self) -> *mut BlockHeader {
        self.tail
    }

    /// Prepend `node`.
    ///
    /// # Safety
    /// `node` must be a valid block header not currently in any list.
    pub unsafe fn push_front(&mut self, node: *mut BlockHeader) {
        unsafe {
            if self.len == 0 {
                (*node).next = node;
                (*node).prev = node;
                self.head = node;
                self.tail = node;
            } else {
                (*node).next = self.head;
                (*node).prev = self.tail;
                (*self.tail).next = node;
                (*self.head).prev = node;
                self.head = node;
            }
        }
        self.len += 1;
    }

    /// Append `node`.
    ///
    /// # Safety
    /// `node` must be a valid block header not currently in any list.
    pub unsafe fn push_back(&mut self, node: *mut BlockHeader) {
        unsafe {
            if self.len == 0 {
                (*node).next = node;
                (*node).prev = node;
                self.head = node;
                self.tail = node;
            } else {
                (*node).next = self.head;
                (*node).prev = self.tail;
                (*self.tail).next = node;
                (*self.head).prev = node;
                self.tail = node;
            }
        }
        self.len += 1;
    }

    /// Detach and return the first block, or null if empty.
    ///
    /// # Safety
    /// List links must be consistent (maintained by this type only).
    pub unsafe fn pop_front(&mut self) -> *mut BlockHeader {
        if self.len == 0 {
            return ptr::null_mut();
        }
        let node = self.head;
        unsafe {
            if self.len == 1 {
                self.head = ptr::null_mut();
                self.tail = ptr::null_mut();
            } else {
                self.head = (*node).next;
                (*self.tail).next = self.head;
                (*self.head).prev = self.tail;
            }
            (*node).next = ptr::null_mut();
            (*node).prev = ptr::null_mut();
        }
        self.len -= 1;
        node
    }

    /// Detach and return the last block, or null if empty.
    ///
    /// # Safety
    /// List links must be consistent (maintained by this type only).
    pub unsafe fn pop_back(&mut self) -> *mut BlockHeader {
        if self.len == 0 {
            return ptr::null_mut();
        }
        let node = self.tail;
        unsafe {
            if self.len == 1 {
                self.head = ptr::null_mut();
                self.tail = ptr::null_mut();
            } else {
                self.tail = (*node).prev;
                (*self.tail).next = self.head;
                (*self.head).prev = self.tail;
            }
            (*node).next = ptr::null_mut();
            (*node).prev = ptr::null_mut();
        }
        self.len -= 1;
        node
    }

    /// Remove `node` if it is a member; walking from the head validates
    /// membership, and a miss is a no-op.
    ///
    /// # Safety
    /// `node` must be a valid block header (in this list or not).
    pub unsafe fn remove(&mut self, node: *mut BlockHeader) {
        if self.len == 0 {
            return;
        }
        unsafe {
            let mut cur = self.head;
            while cur != node {
                if cur == self.tail {
                    return;
                }
                cur = (*cur).next;
            }

            if self.len == 1 {
                self.head = ptr::null_mut();
                self.tail = ptr::null_mut();
            } else {
                let prev = (*node).prev;
                let next = (*node).next;
                if node == self.head {
                    self.head = next;
                }
                if node == self.tail {
                    self.tail = prev;
                }
                (*prev).next = next;
                (*next).prev = prev;
            }
            (*node).next = ptr::null_mut();
            (*node).prev = ptr::null_mut();
        }
        self.len -= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::boxed::Box;
    use alloc::vec::Vec;

    fn nodes(n: usize) -> Vec<*mut BlockHeader> {
        (0..n)
            .map(|_| Box::into_raw(Box::new(BlockHeader::dummy())))
            .collect()
    }

    fn free_nodes(nodes: Vec<*mut BlockHeader>) {
        for node in nodes {
            unsafe { drop(Box::from_raw(node)) };
        }
    }

    #[test]
    fn test_push_front_orders() {
        let ns = nodes(3);
        let mut list = BlockList::new();
        assert!(list.is_empty());
        unsafe {
            list.push_front(ns[0]);
            list.push_front(ns[1]);
            list.push_front(ns[2]);
            assert_eq!(list.len(), 3);
            assert_eq!(list.front(), ns[2]);
            assert_eq!(list.back(), ns[0]);
            // circular links
            assert_eq!((*ns[0]).next, ns[2]);
            assert_eq!((*ns[2]).prev, ns[0]);
        }
        free_nodes(ns);
    }

    #[test]
    fn test_push_back_orders() {
        let ns = nodes(3);
        let mut list = BlockList::new();
        unsafe {
            list.push_back(ns[0]);
            list.push_back(ns[1]);
            list.push_back(ns[2]);
            assert_eq!(list.front(), ns[0]);
            assert_eq!(list.back(), ns[2]);
        }
        free_nodes(ns);
    }

    #[test]
    fn test_pop_front_and_back() {
        let ns = nodes(3);
        let mut list = BlockList::new();
        unsafe {
            for &n in &ns {
                list.push_back(n);
            }
            assert_eq!(list.pop_front(), ns[0]);
            assert_eq!(list.pop_back(), ns[2]);
            assert_eq!(list.pop_front(), ns[1]);
            assert!(list.pop_front().is_null());
            assert!(list.pop_back().is_null());
            assert!(list.is_empty());
        }
        free_nodes(ns);
    }

    #[test]
    fn test_remove_middle_head_tail() {
        let ns = nodes(3);
        let mut list = BlockList::new();
        unsafe {
            for &n in &ns {
                list.push_back(n);
            }
            list.remove(ns[1]);
            assert_eq!(list.len(), 2);
            assert_eq!((*ns[0]).next, ns[2]);
            assert_eq!((*ns[2]).prev, ns[0]);

            list.remove(ns[0]);
            assert_eq!(list.front(), ns[2]);
            assert_eq!(list.back(), ns[2]);

            list.remove(ns[2]);
            assert!(list.is_empty());
        }
        free_nodes(ns);
    }

    #[test]
    fn test_remove_non_member_is_noop() {
        let ns = nodes(3);
        let mut list = BlockList::new();
        unsafe {
            list.push_back(ns[0]);
            list.push_back(ns[1]);
            // ns[2] was never inserted
            list.remove(ns[2]);
            assert_eq!(list.len(), 2);
            assert_eq!(list.front(), ns[0]);
            assert_eq!(list.back(), ns[1]);
        }
        free_nodes(ns);
    }

    #[test]
    fn test_move_to_back_pattern() {
        // the allocator rotates a just-filled block to the back
        let ns = nodes(3);
        let mut list = BlockList::new();
        unsafe {
            for &n in &ns {
                list.push_back(n);
            }
            list.remove(ns[0]);
            list.push_back(ns[0]);
            assert_eq!(list.front(), ns[1]);
            assert_eq!(list.back(), ns[0]);
            assert_eq!(list.len(), 3);
        }
        free_nodes(ns);
    }
}
