//! Process-wide cache of empty blocks: one atomic slot per cache class.
//!
//! Classes sharing a block byte size share one slot, so a block cached by
//! any of them can be re-initialized for any other. A slot holds at most one
//! block; overflow goes back to the OS.

use crate::block::BlockHeader;
use crate::size_class::CACHE_CLASS_COUNT;
use core::ptr;
use core::sync::atomic::{AtomicPtr, Ordering};

pub struct GlobalCache {
    slots: [AtomicPtr<BlockHeader>; CACHE_CLASS_COUNT],
}

impl GlobalCache {
    pub const fn new() -> Self {
        Self {
            slots: [const { AtomicPtr::new(ptr::null_mut()) }; CACHE_CLASS_COUNT],
        }
    }

    /// Offer an empty block to the slot for `cache_class`.
    /// Returns false (caller keeps the block) if the slot is occupied.
    pub fn offer(&self, cache_class: usize, block: *mut BlockHeader) -> bool {
        self.slots[cache_class]
            .compare_exchange(ptr::null_mut(), block, Ordering::AcqRel, Ordering::Relaxed)
            .is_ok()
    }

    /// Claim the cached block for `cache_class`, or null if the slot is
    /// empty. Exactly one contender wins a given block.
    pub fn claim(&self, cache_class: usize) -> *mut BlockHeader {
        let slot = &self.slots[cache_class];
        let mut cur = slot.load(Ordering::Acquire);
        loop {
            if cur.is_null() {
                return ptr::null_mut();
            }
            match slot.compare_exchange_weak(
                cur,
                ptr::null_mut(),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return cur,
                Err(observed) => cur = observed,
            }
        }
    }

    /// Current slot contents, for diagnostics only.
    #[cfg(feature = "debug")]
    pub fn peek(&self, cache_class: usize) -> *mut BlockHeader {
        self.slots[cache_class].load(Ordering::Relaxed)
    }
}

impl Default for GlobalCache {
    fn default() -> Self {
        Self::new()
    }
}

/// The process-wide cache instance.
pub static GLOBAL_CACHE: GlobalCache = GlobalCache::new();

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::BlockHeader;
    use alloc::boxed::Box;
    use alloc::vec::Vec;

    #[test]
    fn test_offer_then_claim() {
        let cache = GlobalCache::new();
        let block = Box::into_raw(Box::new(BlockHeader::dummy()));
        assert!(cache.claim(0).is_null());
        assert!(cache.offer(0, block));
        assert_eq!(cache.claim(0), block);
        assert!(cache.claim(0).is_null());
        unsafe { drop(Box::from_raw(block)) };
    }

    #[test]
    fn test_slot_holds_at_most_one() {
        let cache = GlobalCache::new();
        let a = Box::into_raw(Box::new(BlockHeader::dummy()));
        let b = Box::into_raw(Box::new(BlockHeader::dummy()));
        assert!(cache.offer(1, a));
        assert!(!cache.offer(1, b), "occupied slot accepted a second block");
        assert_eq!(cache.claim(1), a);
        assert!(cache.offer(1, b));
        assert_eq!(cache.claim(1), b);
        unsafe {
            drop(Box::from_raw(a));
            drop(Box::from_raw(b));
        }
    }

    #[test]
    fn test_slots_are_independent() {
        let cache = GlobalCache::new();
        let a = Box::into_raw(Box::new(BlockHeader::dummy()));
        assert!(cache.offer(0, a));
        for cc in 1..CACHE_CLASS_COUNT {
            assert!(cache.claim(cc).is_null());
        }
        assert_eq!(cache.claim(0), a);
        unsafe { drop(Box::from_raw(a)) };
    }

    #[test]
    fn test_contended_claim_has_one_winner() {
        use std::sync::Arc;
        use std::sync::atomic::{AtomicUsize, Ordering};

        let cache = Arc::new(GlobalCache::new());
        let block = Box::into_raw(Box::new(BlockHeader::dummy()));
        assert!(cache.offer(0, block));

        let winners = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let winners = Arc::clone(&winners);
                let expected = block as usize;
                std::thread::spawn(move || {
                    let got = cache.claim(0);
                    if !got.is_null() {
                        assert_eq!(got as usize, expected);
                        winners.fetch_add(1, Ordering::Relaxed);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(winners.load(Ordering::Relaxed), 1);
        unsafe { drop(Box::from_raw(block)) };
    }
}
