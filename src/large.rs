//! Large-object fallback for requests above the small-object ceiling.
//!
//! Each large object is its own OS mapping: a 16-byte header holding the
//! requested size, then the user bytes (so the returned pointer is 16-byte
//! aligned). A fixed process-wide table records the live pointers; `free`
//! finds its slot by linear scan, which is also how the small-object path
//! rejects large pointers cheaply. The table's bump cursor and free-slot
//! LIFO are maintained with CAS only; the LIFO head packs a generation tag
//! next to the slot index so a pop can't be fooled by slot reuse.
//!
//! Cell states are distinguished by encoding: 0 = never used, an even value
//! = a live (16-aligned) user pointer, an odd value = a free-list link
//! `(next + 1) << 1 | 1` where `next + 1` is the successor slot + 1 (0 for
//! the end of the list).

use crate::config::{LARGE_TABLE_CAPACITY, MAX_SMALL, PAGE_SIZE};
use crate::platform;
use crate::stat_inc;
use core::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Bytes in front of every large object, holding the requested size.
pub const LARGE_HEADER: usize = 16;

const SLOT_MASK: u64 = 0xFFFF_FFFF;

struct LargeTable {
    cells: [AtomicUsize; LARGE_TABLE_CAPACITY],
    /// Next never-used cell.
    cursor: AtomicUsize,
    /// Free-slot LIFO head: `[generation:32 | slot + 1:32]`, 0 slot bits =
    /// empty.
    free_head: AtomicU64,
}

static TABLE: LargeTable = LargeTable {
    cells: [const { AtomicUsize::new(0) }; LARGE_TABLE_CAPACITY],
    cursor: AtomicUsize::new(0),
    free_head: AtomicU64::new(0),
};

/// Mapping length backing a large object of `size` user bytes.
#[inline]
fn mapped_bytes(size: usize) -> usize {
    (size + LARGE_HEADER).next_multiple_of(PAGE_SIZE)
}

fn record(ptr: *mut u8) {
    // recycle a freed slot if there is one
    loop {
        let head = TABLE.free_head.load(Ordering::Acquire);
        let enc = (head & SLOT_MASK) as usize;
        if enc == 0 {
            break;
        }
        let idx = enc - 1;
        // free cells hold (next + 1) << 1 | 1; a stale read just makes the
        // CAS below fail via the generation bump
        let link = TABLE.cells[idx].load(Ordering::Acquire);
        let next = (link as u64 >> 1) & SLOT_MASK;
        let generation = head >> 32;
        let new_head = (generation.wrapping_add(1) << 32) | next;
        if TABLE
            .free_head
            .compare_exchange_weak(head, new_head, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            TABLE.cells[idx].store(ptr as usize, Ordering::Release);
            return;
        }
    }

    let idx = TABLE.cursor.fetch_add(1, Ordering::Relaxed);
    assert!(idx < LARGE_TABLE_CAPACITY, "large-object table exhausted");
    TABLE.cells[idx].store(ptr as usize, Ordering::Release);
}

fn retire(idx: usize) {
    loop {
        let head = TABLE.free_head.load(Ordering::Acquire);
        let next = head & SLOT_MASK;
        TABLE.cells[idx].store(((next as usize) << 1) | 1, Ordering::Release);
        let generation = head >> 32;
        let new_head = (generation.wrapping_add(1) << 32) | (idx as u64 + 1);
        if TABLE
            .free_head
            .compare_exchange_weak(head, new_head, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            return;
        }
    }
}

/// Find the table slot holding `ptr`.
fn slot_of(ptr: *const u8) -> Option<usize> {
    let limit = TABLE.cursor.load(Ordering::Acquire).min(LARGE_TABLE_CAPACITY);
    (0..limit).find(|&i| TABLE.cells[i].load(Ordering::Acquire) == ptr as usize)
}

/// The stored request size, if `ptr` is a live large object.
pub fn lookup_size(ptr: *const u8) -> Option<usize> {
    slot_of(ptr).map(|_| unsafe { (ptr.sub(LARGE_HEADER) as *const usize).read() })
}

/// Whether an in-place resize from `old_size` to `new_size` stays within the
/// same mapping.
#[inline]
pub fn same_mapping(old_size: usize, new_size: usize) -> bool {
    mapped_bytes(old_size) == mapped_bytes(new_size)
}

/// Rewrite the stored request size after an in-place resize.
///
/// # Safety
/// `ptr` must be a live large object and `new_size` must satisfy
/// [`same_mapping`] with its current size.
pub unsafe fn store_size(ptr: *mut u8, new_size: usize) {
    unsafe { (ptr.sub(LARGE_HEADER) as *mut usize).write(new_size) };
}

/// Allocate a large object of `size` bytes (16-byte aligned). Fatal if the
/// OS refuses memory or the table is full.
pub fn alloc_large(size: usize) -> *mut u8 {
    debug_assert!(size > MAX_SMALL);
    let bytes = mapped_bytes(size);
    let base = unsafe { platform::map(bytes) };
    assert!(!base.is_null(), "out of memory: OS refused {bytes} bytes");
    unsafe { (base as *mut usize).write(size) };
    let ptr = unsafe { base.add(LARGE_HEADER) };
    record(ptr);
    stat_inc!(large_allocs);
    ptr
}

/// Free `ptr` if it is a live large object; false means it belongs to the
/// slab core.
///
/// # Safety
/// If `ptr` is large it must not have been freed already.
pub unsafe fn free_large(ptr: *mut u8) -> bool {
    let Some(idx) = slot_of(ptr) else {
        return false;
    };
    // retire the slot first so scans stop matching this pointer
    retire(idx);
    let base = unsafe { ptr.sub(LARGE_HEADER) };
    let size = unsafe { (base as *const usize).read() };
    unsafe { platform::unmap(base, mapped_bytes(size)) };
    stat_inc!(large_frees);
    true
}

/// Walk the live entries for the diagnostic dump.
#[cfg(feature = "debug")]
pub fn for_each_live(mut f: impl FnMut(usize, *mut u8)) {
    let limit = TABLE.cursor.load(Ordering::Acquire).min(LARGE_TABLE_CAPACITY);
    for idx in 0..limit {
        let cell = TABLE.cells[idx].load(Ordering::Acquire);
        if cell != 0 && cell & 1 == 0 {
            f(idx, cell as *mut u8);
        }
    }
}
