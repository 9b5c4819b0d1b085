//! Miri-compatible shim using std::alloc as backing store.
//!
//! Miri can't execute real OS syscalls, so page-aligned zeroed memory comes
//! from the system allocator instead. This keeps the allocator's unsafe
//! pointer logic checkable under Miri.

extern crate alloc;

use core::alloc::Layout;

pub unsafe fn map(size: usize) -> *mut u8 {
    let layout = Layout::from_size_align(size, crate::config::PAGE_SIZE).unwrap();
    unsafe { alloc::alloc::alloc_zeroed(layout) }
}

pub unsafe fn unmap(ptr: *mut u8, size: usize) {
    let layout = Layout::from_size_align(size, crate::config::PAGE_SIZE).unwrap();
    unsafe { alloc::alloc::dealloc(ptr, layout) };
}
