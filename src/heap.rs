//! Per-thread heaps: size-classed block lists, the one-slot local cache of
//! empty blocks, and the thread-exit reconciler.
//!
//! A heap is single-writer: only its thread calls into it. Its own address
//! doubles as the thread's owner identity in block headers, so the owner
//! check in `free` is one comparison. Cross-thread traffic happens solely
//! through the blocks' remote-free LIFOs and the global cache.

use crate::block::BlockHeader;
use crate::cache::GLOBAL_CACHE;
use crate::config::CLASS_COUNT;
use crate::lifo;
use crate::list::BlockList;
use crate::platform;
use crate::size_class::{self, CACHE_CLASS_COUNT};
use crate::stat_inc;
use core::ptr;

pub struct Heap {
    /// One block list per size class: partial blocks in front, full in back.
    lists: [BlockList; CLASS_COUNT],
    /// One empty block at most per cache class.
    cache: [*mut BlockHeader; CACHE_CLASS_COUNT],
}

impl Heap {
    pub const fn new() -> Self {
        Self {
            lists: [const { BlockList::new() }; CLASS_COUNT],
            cache: [ptr::null_mut(); CACHE_CLASS_COUNT],
        }
    }

    /// The owner identity this heap stamps into its blocks: its own address.
    #[inline]
    pub fn owner_id(&self) -> usize {
        self as *const Heap as usize
    }

    /// Allocate one object of `class`.
    ///
    /// # Safety
    /// Must only be called from the heap's own thread.
    pub unsafe fn alloc_small(&mut self, class: usize) -> *mut u8 {
        let block = unsafe { self.acquire_block(class) };
        let obj = unsafe { (*block).carve() };
        debug_assert!(!obj.is_null());
        if unsafe { (*block).is_full() } {
            // took the last object: rotate to the back so partial blocks
            // stay in front
            let list = &mut self.lists[class];
            unsafe {
                list.remove(block);
                list.push_back(block);
            }
        }
        obj
    }

    /// Get a non-full block of `class` at the head of its list.
    unsafe fn acquire_block(&mut self, class: usize) -> *mut BlockHeader {
        loop {
            let head = self.lists[class].front();
            if !head.is_null() && !unsafe { (*head).is_full() } {
                return head;
            }
            // the head can only be full here if it came in through adoption
            let block = unsafe { self.fresh_block(class) };
            unsafe { self.lists[class].push_front(block) };
        }
    }

    /// Produce an empty block laid out for `class`: local cache slot, then
    /// global cache, then a fresh OS mapping. Fatal if the OS refuses.
    unsafe fn fresh_block(&mut self, class: usize) -> *mut BlockHeader {
        let info = size_class::class_info(class);
        let cc = info.cache_class;

        let base = if !self.cache[cc].is_null() {
            let cached = self.cache[cc];
            self.cache[cc] = ptr::null_mut();
            stat_inc!(local_cache_hits);
            unsafe { (*cached).base() }
        } else {
            let claimed = GLOBAL_CACHE.claim(cc);
            if !claimed.is_null() {
                stat_inc!(global_cache_hits);
                unsafe { (*claimed).base() }
            } else {
                let mapped = unsafe { platform::map(info.block_bytes) };
                assert!(
                    !mapped.is_null(),
                    "out of memory: OS refused a {}-byte block",
                    info.block_bytes
                );
                stat_inc!(block_maps);
                mapped
            }
        };

        let block = unsafe { BlockHeader::init(base, class) };
        unsafe { (*block).set_owner(self.owner_id()) };
        block
    }

    /// Free an object of a block this heap owns.
    ///
    /// # Safety
    /// `block` must be owned by this heap and `obj` must be one of its live
    /// objects; own-thread only.
    pub unsafe fn free_local(&mut self, block: *mut BlockHeader, obj: *mut u8) {
        unsafe { (*block).push_local(obj) };
        let class = unsafe { (*block).class() };
        if unsafe { (*block).is_empty() } {
            unsafe {
                self.lists[class].remove(block);
                self.release_block(block, true);
            }
        } else if self.lists[class].front() != block {
            // keep the most recently touched partial block in front
            unsafe {
                self.lists[class].remove(block);
                self.lists[class].push_front(block);
            }
        }
    }

    /// Take over an orphaned block after winning the claim on its sentinel.
    ///
    /// # Safety
    /// The caller must have just won `lifo::claim_orphan` on this block.
    pub unsafe fn adopt_block(&mut self, block: *mut BlockHeader) {
        unsafe { (*block).set_owner(self.owner_id()) };
        let class = unsafe { (*block).class() };
        unsafe { self.lists[class].push_front(block) };
        stat_inc!(adopted_blocks);
    }

    /// Dispose of an empty block: local cache slot, then global cache slot,
    /// then back to the OS.
    unsafe fn release_block(&mut self, block: *mut BlockHeader, use_local_cache: bool) {
        debug_assert!(unsafe { (*block).is_empty() });
        let info = unsafe { (*block).info() };
        let cc = info.cache_class;

        if use_local_cache && self.cache[cc].is_null() {
            self.cache[cc] = block;
            return;
        }
        unsafe { (*block).clear_owner() };
        if GLOBAL_CACHE.offer(cc, block) {
            return;
        }
        unsafe { platform::unmap((*block).base(), info.block_bytes) };
        stat_inc!(block_unmaps);
    }

    /// Thread-exit reconciler: empty the local cache, release every block
    /// that has no live objects, and abandon the rest in place behind the
    /// orphan sentinel for adoption by a later remote freer.
    ///
    /// # Safety
    /// Must be the last use of this heap; own-thread only.
    pub unsafe fn reconcile(&mut self) {
        for cc in 0..CACHE_CLASS_COUNT {
            let cached = self.cache[cc];
            if cached.is_null() {
                continue;
            }
            self.cache[cc] = ptr::null_mut();
            unsafe { (*cached).clear_owner() };
            if !GLOBAL_CACHE.offer(cc, cached) {
                unsafe {
                    let bytes = (*cached).info().block_bytes;
                    platform::unmap((*cached).base(), bytes);
                }
                stat_inc!(block_unmaps);
            }
        }

        for class in 0..CLASS_COUNT {
            loop {
                let block = unsafe { self.lists[class].pop_front() };
                if block.is_null() {
                    break;
                }
                loop {
                    unsafe { (*block).drain_remote() };
                    if unsafe { (*block).is_empty() } {
                        unsafe { self.release_block(block, false) };
                        break;
                    }
                    unsafe { (*block).clear_owner() };
                    if lifo::mark_orphan(unsafe { (*block).remote_free() }) {
                        stat_inc!(orphaned_blocks);
                        break;
                    }
                    // a remote free landed between the drain and the mark;
                    // go around and drain again
                }
            }
        }
    }

    /// Walk this heap's lists for the diagnostic dump.
    #[cfg(feature = "debug")]
    pub fn for_each_block(&self, mut f: impl FnMut(usize, *mut BlockHeader)) {
        for class in 0..CLASS_COUNT {
            let list = &self.lists[class];
            let mut cur = list.front();
            for _ in 0..list.len() {
                f(class, cur);
                cur = unsafe { (*cur).next };
            }
        }
    }

    /// Local cache contents for the diagnostic dump.
    #[cfg(feature = "debug")]
    pub fn cached_block(&self, cache_class: usize) -> *mut BlockHeader {
        self.cache[cache_class]
    }
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::size_class::class_info;
    use alloc::vec::Vec;

    #[test]
    fn test_alloc_free_round_trip_reuses_cell() {
        let mut heap = Heap::new();
        unsafe {
            let class = size_class::class_of(1024);
            let p = heap.alloc_small(class);
            assert!(!p.is_null());
            let block = BlockHeader::resolve(p);
            assert_eq!((*block).owner(), heap.owner_id());

            heap.free_local(block, p);
            // block went empty -> local cache; the next alloc reuses it and
            // carves the same first cell
            let q = heap.alloc_small(class);
            assert_eq!(p, q);

            heap.free_local(BlockHeader::resolve(q), q);
            heap.reconcile();
        }
    }

    #[test]
    fn test_second_block_after_fill() {
        let mut heap = Heap::new();
        let class = 9;
        let info = class_info(class);
        unsafe {
            let mut objs = Vec::new();
            for _ in 0..info.usable_objects {
                objs.push(heap.alloc_small(class));
            }
            let first_block = BlockHeader::resolve(objs[0]);
            for &p in &objs {
                assert_eq!(BlockHeader::resolve(p), first_block);
            }
            assert!((*first_block).is_full());

            // one more forces a second block
            let extra = heap.alloc_small(class);
            let second_block = BlockHeader::resolve(extra);
            assert_ne!(second_block, first_block);

            heap.free_local(second_block, extra);
            for p in objs {
                heap.free_local(BlockHeader::resolve(p), p);
            }
            heap.reconcile();
        }
    }

    #[test]
    fn test_full_block_rotates_to_back() {
        let mut heap = Heap::new();
        let class = 9;
        let info = class_info(class);
        unsafe {
            for _ in 0..info.usable_objects {
                heap.alloc_small(class);
            }
            let full = heap.lists[class].back();
            assert!((*full).is_full());
            let extra = heap.alloc_small(class);
            // the fresh block sits in front of the full one
            assert_eq!(heap.lists[class].front(), BlockHeader::resolve(extra));
            assert_eq!(heap.lists[class].back(), full);
            heap.reconcile(); // abandons both; nothing was freed
        }
    }

    #[test]
    fn test_carve_picks_up_remote_frees() {
        let mut heap = Heap::new();
        let class = 1;
        let info = class_info(class);
        unsafe {
            let mut objs = Vec::new();
            for _ in 0..info.usable_objects {
                objs.push(heap.alloc_small(class));
            }
            let block = BlockHeader::resolve(objs[0]);
            assert!((*block).is_full());

            // simulate a foreign thread freeing a handful of objects
            for &p in objs.iter().take(5) {
                assert!(crate::lifo::try_push(
                    (*block).remote_free(),
                    p,
                    info.object_size
                ));
            }

            // the next alloc must drain the remote LIFO, not map a block
            let p = heap.alloc_small(class);
            assert_eq!(BlockHeader::resolve(p), block);

            heap.free_local(block, p);
            for &p in objs.iter().skip(5) {
                heap.free_local(block, p);
            }
            // every cell is back (the drained ones count as local), so the
            // block went empty and moved to the local cache slot
            assert!(heap.lists[class].is_empty());
            assert!(!heap.cache[info.cache_class].is_null());
            heap.reconcile();
        }
    }

    #[test]
    fn test_release_cascade_local_then_global() {
        let mut heap = Heap::new();
        let class = 9;
        let info = class_info(class);
        let cc = info.cache_class;
        unsafe {
            // two full blocks plus one object in a third
            let count = 2 * info.usable_objects + 1;
            let mut objs = Vec::new();
            for _ in 0..count {
                objs.push(heap.alloc_small(class));
            }
            // free everything; three blocks go empty one after another
            for p in objs.into_iter().rev() {
                heap.free_local(BlockHeader::resolve(p), p);
            }
            assert!(
                !heap.cache[cc].is_null(),
                "first empty block should land in the local cache slot"
            );
            assert!(heap.lists[class].is_empty());
            heap.reconcile();
            assert!(heap.cache[cc].is_null());
        }
    }

    #[test]
    fn test_reconcile_orphans_populated_block() {
        use alloc::boxed::Box;

        let mut heap = Box::new(Heap::new());
        let class = 1;
        unsafe {
            let p = heap.alloc_small(class);
            let q = heap.alloc_small(class);
            let block = BlockHeader::resolve(p);

            heap.reconcile();
            assert_eq!((*block).owner(), 0);
            assert_eq!(
                (*block).remote_free().load(core::sync::atomic::Ordering::Acquire),
                crate::lifo::ORPHAN
            );

            // an adopter claims the sentinel and takes the block over
            let mut adopter = Box::new(Heap::new());
            assert!(crate::lifo::claim_orphan((*block).remote_free()));
            adopter.adopt_block(block);
            assert_eq!((*block).owner(), adopter.owner_id());
            adopter.free_local(block, p);
            adopter.free_local(block, q);
            adopter.reconcile();
        }
    }
}
