//! Lock-free LIFO primitives for freed objects.
//!
//! A freed object's first word holds the link to the next freed object; the
//! list head is an `AtomicUsize` in the block header. Pushes come from any
//! thread, drains only from the block's owner. Head transitions are
//! value → different-value or value → 0, and no object address is reused
//! while its block is live, so the plain CAS loop is ABA-free.
//!
//! Two link encodings coexist. Objects of at least a word use a full pointer.
//! The 4-byte class stores only the low 32 bits; the high bits are recovered
//! from the link word's own address. That is sound as long as a block never
//! straddles a 4 GiB boundary, which the block span (at most
//! [`crate::config::MAX_BLOCK`]) makes a precondition rather than a check.

use crate::config::WORD;
use core::ptr;
use core::sync::atomic::{AtomicUsize, Ordering};

/// Head sentinel marking a block abandoned by its exited owner.
/// Never a valid object address: every class is at least 4-byte aligned.
pub const ORPHAN: usize = 1;

const COMPRESSED_MASK: usize = 0xFFFF_FFFF;

/// Read the link word stored in `slot`.
///
/// # Safety
/// `slot` must point to a freed object cell of `object_size` bytes that
/// holds a link written by [`write_link`].
#[inline]
pub unsafe fn read_link(slot: *const u8, object_size: usize) -> *mut u8 {
    if object_size < WORD {
        let low = unsafe { (slot as *const u32).read() } as usize;
        if low == 0 {
            ptr::null_mut()
        } else {
            ((slot as usize & !COMPRESSED_MASK) | low) as *mut u8
        }
    } else {
        unsafe { (slot as *const *mut u8).read() }
    }
}

/// Store a link to `next` in `slot`.
///
/// # Safety
/// `slot` must point to a dead object cell of `object_size` bytes; `next`
/// must be null or an object in the same block.
#[inline]
pub unsafe fn write_link(slot: *mut u8, next: *mut u8, object_size: usize) {
    if object_size < WORD {
        unsafe { (slot as *mut u32).write(next as usize as u32) };
    } else {
        unsafe { (slot as *mut *mut u8).write(next) };
    }
}

/// Push `obj` onto the LIFO. Returns false without pushing if the head holds
/// the [`ORPHAN`] sentinel (the caller then runs the adoption protocol).
///
/// # Safety
/// `obj` must be a dead object of `object_size` bytes belonging to the block
/// that owns `head`.
pub unsafe fn try_push(head: &AtomicUsize, obj: *mut u8, object_size: usize) -> bool {
    let mut cur = head.load(Ordering::Acquire);
    loop {
        if cur == ORPHAN {
            return false;
        }
        unsafe { write_link(obj, cur as *mut u8, object_size) };
        match head.compare_exchange_weak(cur, obj as usize, Ordering::Release, Ordering::Acquire) {
            Ok(_) => return true,
            Err(observed) => cur = observed,
        }
    }
}

/// Pop one object, or null if the LIFO is empty.
///
/// # Safety
/// Only the block owner may pop, and the head must not be orphaned.
pub unsafe fn pop(head: &AtomicUsize, object_size: usize) -> *mut u8 {
    let mut cur = head.load(Ordering::Acquire);
    loop {
        if cur == 0 {
            return ptr::null_mut();
        }
        debug_assert_ne!(cur, ORPHAN);
        let next = unsafe { read_link(cur as *const u8, object_size) };
        match head.compare_exchange_weak(cur, next as usize, Ordering::AcqRel, Ordering::Acquire) {
            Ok(_) => return cur as *mut u8,
            Err(observed) => cur = observed,
        }
    }
}

/// Detach the whole chain, leaving the LIFO empty. Returns the old head
/// (null if it was already empty).
///
/// # Safety
/// Only the block owner may drain, and the head must not be orphaned.
pub unsafe fn drain(head: &AtomicUsize) -> *mut u8 {
    let old = head.swap(0, Ordering::Acquire);
    debug_assert_ne!(old, ORPHAN);
    old as *mut u8
}

/// Install the [`ORPHAN`] sentinel. Succeeds only if the LIFO is empty.
pub fn mark_orphan(head: &AtomicUsize) -> bool {
    head.compare_exchange(0, ORPHAN, Ordering::AcqRel, Ordering::Acquire)
        .is_ok()
}

/// Claim an orphaned LIFO, resetting it to empty. Exactly one caller wins.
pub fn claim_orphan(head: &AtomicUsize) -> bool {
    head.compare_exchange(ORPHAN, 0, Ordering::AcqRel, Ordering::Acquire)
        .is_ok()
}
