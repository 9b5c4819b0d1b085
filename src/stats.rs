//! Allocation statistics counters.
//!
//! All counters use `Relaxed` ordering — they are observational only and not
//! used as synchronization. The allocator's own atomics provide the ordering
//! guarantees for correctness; these exist for monitoring and tests.
//!
//! Obtain a [`Snapshot`] with [`snapshot()`]. Individual counter loads are
//! atomic but the snapshot as a whole is not globally consistent.

use core::sync::atomic::{AtomicU64, Ordering};

pub(crate) struct Stats {
    // ---- Front door ----
    /// Calls to `alloc` with a valid size.
    pub alloc_count: AtomicU64,
    /// Calls to `free` (both small and large paths).
    pub free_count: AtomicU64,
    /// Calls to `resize` with a valid size.
    pub resize_count: AtomicU64,
    /// Sum of requested byte sizes passed to `alloc`.
    pub alloc_bytes: AtomicU64,

    // ---- Block lifecycle ----
    /// Page blocks mapped from the OS.
    pub block_maps: AtomicU64,
    /// Page blocks returned to the OS.
    pub block_unmaps: AtomicU64,
    /// Empty blocks reused out of a thread-local cache slot.
    pub local_cache_hits: AtomicU64,
    /// Empty blocks claimed out of the global cache.
    pub global_cache_hits: AtomicU64,

    // ---- Cross-thread traffic ----
    /// Objects pushed onto a remote-free LIFO by a non-owner.
    pub remote_frees: AtomicU64,
    /// Remote-free chains drained back into a local LIFO.
    pub remote_drains: AtomicU64,
    /// Blocks abandoned with the orphan sentinel at thread exit.
    pub orphaned_blocks: AtomicU64,
    /// Orphaned blocks adopted by a remote freer.
    pub adopted_blocks: AtomicU64,

    // ---- Large objects ----
    /// Allocations above the small-object ceiling.
    pub large_allocs: AtomicU64,
    /// Frees of large objects.
    pub large_frees: AtomicU64,
}

impl Stats {
    const fn new() -> Self {
        Self {
            alloc_count: AtomicU64::new(0),
            free_count: AtomicU64::new(0),
            resize_count: AtomicU64::new(0),
            alloc_bytes: AtomicU64::new(0),
            block_maps: AtomicU64::new(0),
            block_unmaps: AtomicU64::new(0),
            local_cache_hits: AtomicU64::new(0),
            global_cache_hits: AtomicU64::new(0),
            remote_frees: AtomicU64::new(0),
            remote_drains: AtomicU64::new(0),
            orphaned_blocks: AtomicU64::new(0),
            adopted_blocks: AtomicU64::new(0),
            large_allocs: AtomicU64::new(0),
            large_frees: AtomicU64::new(0),
        }
    }
}

pub(crate) static STATS: Stats = Stats::new();

/// A point-in-time snapshot of all allocation statistics.
#[derive(Clone, Copy, Debug, Default)]
pub struct Snapshot {
    pub alloc_count: u64,
    pub free_count: u64,
    pub resize_count: u64,
    pub alloc_bytes: u64,
    pub block_maps: u64,
    pub block_unmaps: u64,
    pub local_cache_hits: u64,
    pub global_cache_hits: u64,
    pub remote_frees: u64,
    pub remote_drains: u64,
    pub orphaned_blocks: u64,
    pub adopted_blocks: u64,
    pub large_allocs: u64,
    pub large_frees: u64,
}

/// Load all counters with `Relaxed` ordering and return a [`Snapshot`].
pub fn snapshot() -> Snapshot {
    let s = &STATS;
    Snapshot {
        alloc_count: s.alloc_count.load(Ordering::Relaxed),
        free_count: s.free_count.load(Ordering::Relaxed),
        resize_count: s.resize_count.load(Ordering::Relaxed),
        alloc_bytes: s.alloc_bytes.load(Ordering::Relaxed),
        block_maps: s.block_maps.load(Ordering::Relaxed),
        block_unmaps: s.block_unmaps.load(Ordering::Relaxed),
        local_cache_hits: s.local_cache_hits.load(Ordering::Relaxed),
        global_cache_hits: s.global_cache_hits.load(Ordering::Relaxed),
        remote_frees: s.remote_frees.load(Ordering::Relaxed),
        remote_drains: s.remote_drains.load(Ordering::Relaxed),
        orphaned_blocks: s.orphaned_blocks.load(Ordering::Relaxed),
        adopted_blocks: s.adopted_blocks.load(Ordering::Relaxed),
        large_allocs: s.large_allocs.load(Ordering::Relaxed),
        large_frees: s.large_frees.load(Ordering::Relaxed),
    }
}
