//! Allocator front door: size dispatch and per-thread heap plumbing.
//!
//! The heap lives in thread-local storage and is constructed on the thread's
//! first call. Its destructor runs the reconciler, which is what makes
//! orphan handoff work. Two TLS strategies:
//! - `nightly`: `#[thread_local]` slot with an explicit state machine
//!   (single TLS read, no lazy-init branch on the hot path), cleaned up by a
//!   `std` thread-local guard when available.
//! - `std`: `std::thread_local!` with const init; the cell's `Drop` runs the
//!   reconciler.
//!
//! After the heap is destroyed (frees that race thread teardown), `free`
//! falls back to the remote-push path, and `alloc` returns null.

use crate::block::BlockHeader;
use crate::config::MAX_SMALL;
use crate::heap::Heap;
use crate::large;
use crate::lifo;
use crate::size_class;
use crate::{stat_add, stat_inc};
use core::ptr;

cfg_if::cfg_if! {
    if #[cfg(feature = "nightly")] {
        #[derive(Clone, Copy, PartialEq)]
        #[repr(u8)]
        enum TlsState {
            Uninitialized = 0,
            Active = 1,
            Destroyed = 2,
        }

        struct TlsSlot {
            state: TlsState,
            heap: Heap,
        }

        #[thread_local]
        static mut HEAP: TlsSlot = TlsSlot {
            state: TlsState::Uninitialized,
            heap: Heap::new(),
        };

        #[inline(always)]
        unsafe fn heap_ptr() -> *mut Heap {
            unsafe { &raw mut HEAP.heap }
        }

        /// Run the reconciler and mark the slot Destroyed (reentrancy-safe).
        #[cold]
        #[allow(dead_code)] // only reachable from the std cleanup guard
        unsafe fn heap_destroy() {
            unsafe {
                if HEAP.state == TlsState::Active {
                    HEAP.state = TlsState::Destroyed;
                    (*heap_ptr()).reconcile();
                }
            }
        }

        #[cold]
        #[inline(never)]
        unsafe fn heap_init() {
            // Set BEFORE cleanup registration — if register() allocates, the
            // reentrant call sees the heap as Active and uses it normally.
            unsafe { HEAP.state = TlsState::Active };
            heap_cleanup::register();
        }

        pub(crate) fn with_heap<R>(f: impl FnOnce(&mut Heap) -> R) -> Option<R> {
            unsafe {
                match HEAP.state {
                    TlsState::Active => Some(f(&mut *heap_ptr())),
                    TlsState::Uninitialized => {
                        heap_init();
                        Some(f(&mut *heap_ptr()))
                    }
                    TlsState::Destroyed => None,
                }
            }
        }

        // -- Cleanup: nightly + std --
        #[cfg(feature = "std")]
        mod heap_cleanup {
            struct Guard;

            impl Drop for Guard {
                fn drop(&mut self) {
                    unsafe { super::heap_destroy() };
                }
            }

            std::thread_local! {
                static GUARD: Guard = const { Guard };
            }

            pub(super) fn register() {
                // try_with: if std's TLS is already shutting down, skip —
                // the heap leaks instead of orphaning its blocks.
                let _ = GUARD.try_with(|_| {});
            }
        }

        // -- Cleanup: nightly, no std --
        #[cfg(not(feature = "std"))]
        mod heap_cleanup {
            pub(super) fn register() {}
        }
    } else {
        use core::cell::UnsafeCell;

        struct HeapCell(UnsafeCell<Heap>);

        impl Drop for HeapCell {
            fn drop(&mut self) {
                unsafe { (*self.0.get()).reconcile() };
            }
        }

        std::thread_local! {
            static HEAP: HeapCell = const { HeapCell(UnsafeCell::new(Heap::new())) };
        }

        pub(crate) fn with_heap<R>(f: impl FnOnce(&mut Heap) -> R) -> Option<R> {
            HEAP.try_with(|cell| f(unsafe { &mut *cell.0.get() })).ok()
        }
    }
}

/// Allocate at least `size` bytes.
///
/// Small requests are aligned to their class object size; large requests
/// (above [`MAX_SMALL`]) to 16 bytes. Returns null for `size == 0` and
/// panics if the OS refuses memory.
pub fn alloc(size: usize) -> *mut u8 {
    if size == 0 {
        return ptr::null_mut();
    }
    stat_inc!(alloc_count);
    stat_add!(alloc_bytes, size);

    if size > MAX_SMALL {
        return large::alloc_large(size);
    }

    let class = size_class::class_of(size);
    with_heap(|heap| unsafe { heap.alloc_small(class) }).unwrap_or(ptr::null_mut())
}

/// Free an allocation.
///
/// # Safety
/// `ptr` must have come from [`alloc`] or [`resize`] in this process and must
/// not have been freed already. Null is a no-op.
pub unsafe fn free(ptr: *mut u8) {
    if ptr.is_null() {
        return;
    }
    stat_inc!(free_count);

    if unsafe { large::free_large(ptr) } {
        return;
    }

    let block = unsafe { BlockHeader::resolve(ptr) };
    let handled = with_heap(|heap| {
        if unsafe { (*block).owner() } == heap.owner_id() {
            unsafe { heap.free_local(block, ptr) };
        } else {
            unsafe { free_remote(Some(heap), block, ptr) };
        }
    });
    if handled.is_none() {
        // TLS already torn down: this thread can no longer own blocks, so
        // the owner comparison is moot and the remote path covers everything
        unsafe { free_remote(None, block, ptr) };
    }
}

/// Free into a block some other thread owns (or nobody owns).
unsafe fn free_remote(heap: Option<&mut Heap>, block: *mut BlockHeader, obj: *mut u8) {
    let object_size = unsafe { (*block).object_size() };
    let mut heap = heap;
    loop {
        if unsafe { lifo::try_push((*block).remote_free(), obj, object_size) } {
            stat_inc!(remote_frees);
            return;
        }
        // the owner exited and left the block orphaned; try to take it over
        if lifo::claim_orphan(unsafe { (*block).remote_free() }) {
            match heap.take() {
                Some(heap) => unsafe {
                    heap.adopt_block(block);
                    heap.free_local(block, obj);
                },
                None => unsafe { orphan_free_detached(block, obj) },
            }
            return;
        }
        // lost the claim; the new owner's remote LIFO takes the push
    }
}

/// Free into an orphaned block when this thread has no heap left: run the
/// reconciler protocol on just this block, then abandon or release it.
unsafe fn orphan_free_detached(block: *mut BlockHeader, obj: *mut u8) {
    unsafe { (*block).push_local(obj) };
    loop {
        unsafe { (*block).drain_remote() };
        if unsafe { (*block).is_empty() } {
            let info = unsafe { (*block).info() };
            if !crate::cache::GLOBAL_CACHE.offer(info.cache_class, block) {
                unsafe { crate::platform::unmap((*block).base(), info.block_bytes) };
                stat_inc!(block_unmaps);
            }
            return;
        }
        if lifo::mark_orphan(unsafe { (*block).remote_free() }) {
            return;
        }
    }
}

/// Resize an allocation, preserving its contents up to the smaller of the
/// old and new sizes.
///
/// Returns the same pointer when the size class (or large mapping) does not
/// grow; otherwise allocates, copies, and frees the old pointer. A null
/// `ptr` behaves like [`alloc`]; `new_size == 0` returns null and leaves
/// `ptr` alive.
///
/// # Safety
/// `ptr` must be null or a live allocation from this allocator; if a new
/// pointer is returned the old one is invalid.
pub unsafe fn resize(ptr: *mut u8, new_size: usize) -> *mut u8 {
    if ptr.is_null() {
        return alloc(new_size);
    }
    if new_size == 0 {
        return ptr::null_mut();
    }
    stat_inc!(resize_count);

    if let Some(old_size) = large::lookup_size(ptr) {
        if new_size > MAX_SMALL && large::same_mapping(old_size, new_size) {
            unsafe { large::store_size(ptr, new_size) };
            return ptr;
        }
        let new_ptr = alloc(new_size);
        if !new_ptr.is_null() {
            unsafe {
                ptr::copy_nonoverlapping(ptr, new_ptr, old_size.min(new_size));
                free(ptr);
            }
        }
        return new_ptr;
    }

    let block = unsafe { BlockHeader::resolve(ptr) };
    let old_object = unsafe { (*block).object_size() };
    if new_size <= MAX_SMALL
        && size_class::class_of(new_size) <= size_class::class_of_object_size(old_object)
    {
        // the new class fits in the existing cell
        return ptr;
    }

    let new_ptr = alloc(new_size);
    if !new_ptr.is_null() {
        unsafe {
            // the cell is old_object bytes and the new one is at least that
            ptr::copy_nonoverlapping(ptr, new_ptr, old_object);
            free(ptr);
        }
    }
    new_ptr
}
