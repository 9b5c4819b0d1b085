//! Size class table and lookup functions.
//!
//! Requests are bucketed by power-of-two ceiling into [`CLASS_COUNT`] classes
//! covering 1..=[`MAX_SMALL`] bytes; class `c` serves objects of
//! `4 << c` bytes. The table is computed at compile time from the build
//! configuration and is immutable.

use crate::config::{
    CLASS_COUNT, HEADER_BYTES, MAX_BLOCK, MAX_SMALL, MIN_BLOCK, MIN_OBJECT_SIZE,
    OBJECTS_PER_BLOCK_HINT, PAGE_SIZE, WORD,
};

/// Layout facts for one size class.
#[derive(Clone, Copy, Debug)]
pub struct ClassInfo {
    /// Object size for this class (bytes). Allocations are rounded up to it.
    pub object_size: usize,
    /// Bytes in one page block of this class.
    pub block_bytes: usize,
    /// Pages per block (`block_bytes / PAGE_SIZE`).
    pub pages: usize,
    /// Object cells at the start of page 0 consumed by the block header
    /// (including the page back-pointer word).
    pub header_slots: usize,
    /// Object cells consumed by the back-pointer word on each page after
    /// the first.
    pub per_page_slots: usize,
    /// Objects actually available to callers in one block.
    pub usable_objects: usize,
    /// Classes with equal `block_bytes` share one cache slot; this is the
    /// index of that slot.
    pub cache_class: usize,
}

const fn build_table() -> [ClassInfo; CLASS_COUNT] {
    let mut table = [ClassInfo {
        object_size: 0,
        block_bytes: 0,
        pages: 0,
        header_slots: 0,
        per_page_slots: 0,
        usable_objects: 0,
        cache_class: 0,
    }; CLASS_COUNT];

    let mut c = 0;
    let mut cache_class = 0;
    while c < CLASS_COUNT {
        let object_size = MIN_OBJECT_SIZE << c;

        let mut block_bytes = OBJECTS_PER_BLOCK_HINT * object_size;
        if block_bytes < MIN_BLOCK {
            block_bytes = MIN_BLOCK;
        } else if block_bytes > MAX_BLOCK {
            block_bytes = MAX_BLOCK;
        }
        let pages = block_bytes / PAGE_SIZE;

        let mut header_slots = HEADER_BYTES.div_ceil(object_size);
        if header_slots == 0 {
            header_slots = 1;
        }
        let mut per_page_slots = WORD.div_ceil(object_size);
        if per_page_slots == 0 {
            per_page_slots = 1;
        }

        let usable_objects =
            block_bytes / object_size - header_slots - per_page_slots * (pages - 1);

        if c > 0 && table[c - 1].block_bytes != block_bytes {
            cache_class += 1;
        }

        table[c] = ClassInfo {
            object_size,
            block_bytes,
            pages,
            header_slots,
            per_page_slots,
            usable_objects,
            cache_class,
        };
        c += 1;
    }
    table
}

const CLASS_TABLE: [ClassInfo; CLASS_COUNT] = build_table();

/// The class table, one entry per size class.
pub static CLASSES: [ClassInfo; CLASS_COUNT] = CLASS_TABLE;

/// Number of distinct cache classes (block-size groups).
pub const CACHE_CLASS_COUNT: usize = CLASS_TABLE[CLASS_COUNT - 1].cache_class + 1;

/// Map a request size to its size class index.
/// `size` must be in `1..=MAX_SMALL`.
#[inline]
pub fn class_of(size: usize) -> usize {
    debug_assert!(size > 0 && size <= MAX_SMALL);
    let rounded = if size <= MIN_OBJECT_SIZE {
        MIN_OBJECT_SIZE
    } else {
        size.next_power_of_two()
    };
    rounded.trailing_zeros() as usize - MIN_OBJECT_SIZE.trailing_zeros() as usize
}

/// Map a class object size (an exact power of two) back to its class index.
#[inline]
pub fn class_of_object_size(object_size: usize) -> usize {
    debug_assert!(object_size.is_power_of_two() && object_size >= MIN_OBJECT_SIZE);
    object_size.trailing_zeros() as usize - MIN_OBJECT_SIZE.trailing_zeros() as usize
}

/// Get the table entry for a class index.
#[inline]
pub fn class_info(class: usize) -> &'static ClassInfo {
    &CLASSES[class]
}
