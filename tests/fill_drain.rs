//! Capacity semantics of a single block: with the default configuration an
//! 8-byte-class block holds exactly 2029 objects, and the next allocation
//! must open a second block.

use tsmalloc::block::BlockHeader;
use tsmalloc::{alloc, free};

const USABLE: usize = 2029;

#[test]
fn one_block_holds_exactly_its_usable_objects() {
    let first = alloc(8);
    assert!(!first.is_null());
    let (base, len) = unsafe {
        let block = BlockHeader::resolve(first);
        ((*block).base() as usize, (*block).info().block_bytes)
    };

    let mut ptrs = vec![first as usize];
    for i in 1..USABLE {
        let p = alloc(8) as usize;
        assert!(
            p >= base && p < base + len,
            "object {i} left the first block early"
        );
        ptrs.push(p);
    }

    // one more must come from a second block
    let extra = alloc(8) as usize;
    assert!(
        extra < base || extra >= base + len,
        "allocation past capacity stayed in the full block"
    );

    // all cells distinct and non-overlapping
    let mut sorted = ptrs.clone();
    sorted.sort_unstable();
    for pair in sorted.windows(2) {
        assert!(pair[1] - pair[0] >= 8, "cells overlap");
    }

    unsafe {
        free(extra as *mut u8);
        for p in ptrs {
            free(p as *mut u8);
        }
    }
}
