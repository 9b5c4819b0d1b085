#![no_std]
#![cfg_attr(feature = "nightly", feature(thread_local))]

//! tsmalloc: a thread-caching slab allocator.
//!
//! Each thread owns a heap of size-classed page blocks. Allocation carves
//! fixed-size objects out of the owning thread's blocks without any locking;
//! objects freed by a foreign thread are pushed onto the block's lock-free
//! remote LIFO and reclaimed by the owner. Empty blocks are recycled through
//! a one-slot thread-local cache and a one-slot global cache before being
//! returned to the OS, and a thread that exits hands its still-populated
//! blocks over to whichever thread frees into them next.
//!
//! # Usage
//!
//! ```ignore
//! let p = tsmalloc::alloc(64);
//! assert!(!p.is_null());
//! unsafe { tsmalloc::free(p) };
//! ```

#[cfg(test)]
extern crate alloc;
#[cfg(any(test, feature = "std"))]
extern crate std;

#[cfg(not(any(feature = "std", feature = "nightly")))]
compile_error!("tsmalloc needs thread-local storage: enable `std` or `nightly`");

pub mod allocator;
pub mod block;
pub mod cache;
pub mod config;
#[cfg(feature = "debug")]
pub mod dump;
pub mod heap;
pub mod large;
pub mod lifo;
pub mod list;
mod macros;
pub mod platform;
pub mod size_class;
#[cfg(feature = "stats")]
pub mod stats;

pub use config::{PAGE_SHIFT, PAGE_SIZE};

// Re-export the front door at crate root for convenience
pub use allocator::{alloc, free, resize};
