//! Page blocks: page-aligned multi-page regions carved into fixed-size
//! objects.
//!
//! Word 0 of every page in a block points back at the block header, so any
//! object address resolves to its header with one mask and one load. The
//! header itself lives in the first [`crate::config::HEADER_BYTES`] bytes of
//! page 0, occupying whole object cells. The rest of the block is a
//! contiguous run of cells; cells that would overlap a later page's
//! back-pointer word are skipped by the carve cursor.
//!
//! Local fields (`unalloc_*`, `local_free*`, the list links) are touched only
//! by the owning thread. `remote_free` takes pushes from any thread and is
//! drained by the owner; `owner` is written with Release so an adopter's
//! Acquire load sees a consistent header.

use crate::config::{HEADER_BYTES, PAGE_SIZE, WORD};
use crate::lifo::{self, ORPHAN};
use crate::size_class::{self, ClassInfo};
use crate::stat_inc;
use core::ptr;
use core::sync::atomic::{AtomicUsize, Ordering};

/// Header embedded at the start of every page block, after the page-0
/// back-pointer word. The first two fields are the intrusive list links.
#[repr(C)]
pub struct BlockHeader {
    pub(crate) next: *mut BlockHeader,
    pub(crate) prev: *mut BlockHeader,
    /// Lock-free LIFO of remotely freed objects; 0 = empty, 1 = orphaned.
    remote_free: AtomicUsize,
    /// Address of the owning thread's heap; 0 = none.
    owner: AtomicUsize,
    object_size: u32,
    unalloc_count: u32,
    local_free_count: u32,
    /// Next never-carved cell, or null once the unallocated run is spent.
    unalloc_cursor: *mut u8,
    /// Head of the owner-only LIFO of locally freed objects.
    local_free: *mut u8,
}

// The back-pointer word plus the header must fit in the reserved cells of
// every class (the smallest reservation is HEADER_BYTES bytes).
const _: () = assert!(WORD + core::mem::size_of::<BlockHeader>() <= HEADER_BYTES);

impl BlockHeader {
    /// Lay out a fresh (or recycled) region as a block of `class` and return
    /// its header. The caller sets the owner afterwards.
    ///
    /// # Safety
    /// `base` must be a page-aligned region of at least
    /// `class_info(class).block_bytes` bytes with no live objects in it.
    pub unsafe fn init(base: *mut u8, class: usize) -> *mut BlockHeader {
        debug_assert_eq!(base as usize % PAGE_SIZE, 0);
        let info = size_class::class_info(class);
        let header = unsafe { base.add(WORD) } as *mut BlockHeader;

        // Back-pointer word at offset 0 of every page
        for page in 0..info.pages {
            unsafe {
                (base.add(page * PAGE_SIZE) as *mut *mut BlockHeader).write(header);
            }
        }

        unsafe {
            header.write(BlockHeader {
                next: ptr::null_mut(),
                prev: ptr::null_mut(),
                remote_free: AtomicUsize::new(0),
                owner: AtomicUsize::new(0),
                object_size: info.object_size as u32,
                unalloc_count: info.usable_objects as u32,
                local_free_count: 0,
                unalloc_cursor: base.add(info.header_slots * info.object_size),
                local_free: ptr::null_mut(),
            });
        }
        header
    }

    /// Resolve an object address to its block header via the page
    /// back-pointer.
    ///
    /// # Safety
    /// `ptr` must lie inside a live block of this allocator.
    #[inline]
    pub unsafe fn resolve(ptr: *const u8) -> *mut BlockHeader {
        let page = (ptr as usize) & !(PAGE_SIZE - 1);
        unsafe { (page as *const *mut BlockHeader).read() }
    }

    /// Base address of the block region this header lives in.
    #[inline]
    pub fn base(&self) -> *mut u8 {
        (self as *const BlockHeader as usize - WORD) as *mut u8
    }

    #[inline]
    pub fn object_size(&self) -> usize {
        self.object_size as usize
    }

    /// Size class index of this block.
    #[inline]
    pub fn class(&self) -> usize {
        size_class::class_of_object_size(self.object_size as usize)
    }

    #[inline]
    pub fn info(&self) -> &'static ClassInfo {
        size_class::class_info(self.class())
    }

    /// Whether `ptr` points inside this block's region.
    #[inline]
    pub fn contains(&self, ptr: *const u8) -> bool {
        let base = self.base() as usize;
        let p = ptr as usize;
        p >= base && p < base + self.info().block_bytes
    }

    #[inline]
    pub fn owner(&self) -> usize {
        self.owner.load(Ordering::Acquire)
    }

    #[inline]
    pub fn set_owner(&self, owner: usize) {
        self.owner.store(owner, Ordering::Release);
    }

    #[inline]
    pub fn clear_owner(&self) {
        self.owner.store(0, Ordering::Release);
    }

    /// The remote-free LIFO head.
    #[inline]
    pub fn remote_free(&self) -> &AtomicUsize {
        &self.remote_free
    }

    #[inline]
    pub fn unalloc_count(&self) -> usize {
        self.unalloc_count as usize
    }

    #[inline]
    pub fn local_free_count(&self) -> usize {
        self.local_free_count as usize
    }

    /// No object available: both owner-side sources are spent and the remote
    /// LIFO holds nothing drainable. O(1).
    pub fn is_full(&self) -> bool {
        if self.local_free_count != 0 || self.unalloc_count != 0 {
            return false;
        }
        let remote = self.remote_free.load(Ordering::Acquire);
        remote == 0 || remote == ORPHAN
    }

    /// No live object: every usable cell is accounted for locally and the
    /// remote LIFO is empty. O(1).
    pub fn is_empty(&self) -> bool {
        (self.local_free_count + self.unalloc_count) as usize == self.info().usable_objects
            && self.remote_free.load(Ordering::Acquire) == 0
    }

    /// Take one object out of the block, or null if it is full.
    ///
    /// Order: local free LIFO, then the unallocated run (skipping page
    /// back-pointer cells), then a drain of the remote LIFO.
    ///
    /// # Safety
    /// Only the owning thread may carve.
    pub unsafe fn carve(&mut self) -> *mut u8 {
        let object_size = self.object_size as usize;

        if !self.local_free.is_null() {
            let obj = self.local_free;
            self.local_free = unsafe { lifo::read_link(obj, object_size) };
            self.local_free_count -= 1;
            return obj;
        }

        if self.unalloc_count > 0 {
            let obj = self.unalloc_cursor;
            self.unalloc_count -= 1;
            if self.unalloc_count == 0 {
                self.unalloc_cursor = ptr::null_mut();
            } else {
                let mut next = unsafe { obj.add(object_size) };
                if next as usize % PAGE_SIZE == 0 {
                    // the next cells hold this page's back-pointer word
                    next = unsafe { next.add(self.info().per_page_slots * object_size) };
                }
                self.unalloc_cursor = next;
            }
            return obj;
        }

        let remote = self.remote_free.load(Ordering::Acquire);
        if remote != 0 && remote != ORPHAN {
            unsafe { self.drain_remote() };
            let obj = self.local_free;
            debug_assert!(!obj.is_null());
            self.local_free = unsafe { lifo::read_link(obj, object_size) };
            self.local_free_count -= 1;
            return obj;
        }

        ptr::null_mut()
    }

    /// Move the whole remote-free chain into the local LIFO, recounting as
    /// it is walked.
    ///
    /// # Safety
    /// Only the owning thread (or a reconciler/adopter holding exclusive
    /// access) may drain; the head must not be orphaned.
    pub unsafe fn drain_remote(&mut self) {
        let object_size = self.object_size as usize;
        let mut node = unsafe { lifo::drain(&self.remote_free) };
        if !node.is_null() {
            stat_inc!(remote_drains);
        }
        while !node.is_null() {
            let next = unsafe { lifo::read_link(node, object_size) };
            unsafe { lifo::write_link(node, self.local_free, object_size) };
            self.local_free = node;
            self.local_free_count += 1;
            node = next;
        }
    }

    /// Return a locally freed object to the block.
    ///
    /// # Safety
    /// Only the owning thread may push; `obj` must be a live object of this
    /// block.
    pub unsafe fn push_local(&mut self, obj: *mut u8) {
        let object_size = self.object_size as usize;
        debug_assert!(self.contains(obj));
        unsafe { lifo::write_link(obj, self.local_free, object_size) };
        self.local_free = obj;
        self.local_free_count += 1;
    }

    #[cfg(test)]
    pub(crate) fn dummy() -> BlockHeader {
        BlockHeader {
            next: ptr::null_mut(),
            prev: ptr::null_mut(),
            remote_free: AtomicUsize::new(0),
            owner: AtomicUsize::new(0),
            object_size: 8,
            unalloc_count: 0,
            local_free_count: 0,
            unalloc_cursor: ptr::null_mut(),
            local_free: ptr::null_mut(),
        }
    }
}
