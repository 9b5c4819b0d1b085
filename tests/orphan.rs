//! Orphan handoff: a thread exits while its block still holds live objects;
//! the block is abandoned behind the orphan sentinel, adopted by one of the
//! threads that later free into it, and fully reclaimed once every object
//! comes back.

use std::sync::Arc;
use std::thread;
use tsmalloc::block::BlockHeader;
use tsmalloc::{alloc, free};

const OBJECTS: usize = 2000;
const FREERS: usize = 20;
const PER_FREER: usize = OBJECTS / FREERS;

#[test]
fn orphaned_block_is_adopted_and_reclaimed() {
    let ptrs: Vec<usize> = thread::spawn(|| {
        (0..OBJECTS)
            .map(|_| {
                let p = alloc(8);
                assert!(!p.is_null());
                p as usize
            })
            .collect()
    })
    .join()
    .unwrap();

    // the allocating thread is gone; the reconciler must have disowned the
    // block on its way out
    let block = unsafe { BlockHeader::resolve(ptrs[0] as *const u8) };
    assert_eq!(
        unsafe { (*block).owner() },
        0,
        "exited thread still owns its block"
    );

    // twenty threads free everything; exactly one of them wins each
    // adoption, the rest keep pushing to the remote LIFO
    let shared = Arc::new(ptrs);
    let handles: Vec<_> = (0..FREERS)
        .map(|i| {
            let shared = Arc::clone(&shared);
            thread::spawn(move || {
                for &addr in &shared[i * PER_FREER..(i + 1) * PER_FREER] {
                    unsafe { free(addr as *mut u8) };
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    // every object came back and every adopter reconciled at exit; the
    // allocator is still in a working state
    for _ in 0..8 {
        let p = alloc(8);
        assert!(!p.is_null());
        unsafe { free(p) };
    }
}
