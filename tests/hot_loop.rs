//! A tight alloc/free loop on one thread must keep hitting the same cell of
//! the same block: the empty block parks in the thread-local cache slot and
//! comes straight back.

use tsmalloc::{alloc, free};

#[test]
fn hot_loop_returns_identical_pointer() {
    let first = alloc(1024);
    assert!(!first.is_null());
    unsafe { free(first) };

    for i in 0..1000 {
        let p = alloc(1024);
        assert_eq!(p, first, "iteration {i} left the cached block");
        unsafe { free(p) };
    }
}
