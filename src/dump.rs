//! Diagnostic printers for tests and debugging. Output format is not part
//! of any contract.

use crate::allocator::with_heap;
use crate::cache::GLOBAL_CACHE;
use crate::config::CLASS_COUNT;
use crate::large;
use crate::size_class::{self, CACHE_CLASS_COUNT};
use std::println;

/// Print the class table.
pub fn class_table() {
    println!("---------- class table ----------");
    for class in 0..CLASS_COUNT {
        let info = size_class::class_info(class);
        println!(
            "class {:2}: object_size {:5}  block_bytes {:7}  pages {:3}  \
             header_slots {:3}  per_page_slots {}  usable {:5}  cache_class {}",
            class,
            info.object_size,
            info.block_bytes,
            info.pages,
            info.header_slots,
            info.per_page_slots,
            info.usable_objects,
            info.cache_class,
        );
    }
}

/// Print the calling thread's heap: every block list and the local cache.
pub fn heap() {
    let printed = with_heap(|heap| {
        println!("---------- thread heap {:#x} ----------", heap.owner_id());
        heap.for_each_block(|class, block| unsafe {
            println!(
                "class {:2}: block {:p}  owner {:#x}  unalloc {:5}  local_free {:5}  remote {:#x}",
                class,
                block,
                (*block).owner(),
                (*block).unalloc_count(),
                (*block).local_free_count(),
                (*block).remote_free().load(core::sync::atomic::Ordering::Relaxed),
            );
        });
        for cc in 0..CACHE_CLASS_COUNT {
            let cached = heap.cached_block(cc);
            if !cached.is_null() {
                println!("local cache {cc}: {cached:p}");
            }
        }
    });
    if printed.is_none() {
        println!("---------- thread heap (destroyed) ----------");
    }
}

/// Print global cache occupancy.
pub fn global_cache() {
    println!("---------- global cache ----------");
    for cc in 0..CACHE_CLASS_COUNT {
        let block = GLOBAL_CACHE.peek(cc);
        if block.is_null() {
            println!("slot {cc}: empty");
        } else {
            println!("slot {cc}: {block:p}");
        }
    }
}

/// Print the live entries of the large-object table.
pub fn large_table() {
    println!("---------- large objects ----------");
    large::for_each_live(|slot, ptr| {
        let size = large::lookup_size(ptr).unwrap_or(0);
        println!("slot {slot:4}: {ptr:p}  size {size}");
    });
}
