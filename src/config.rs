//! Build-time configuration constants.
//!
//! The values are generated into `OUT_DIR/config_gen.rs` by `build.rs` from
//! `tsmalloc.toml` (or the file named by `TSMALLOC_CONFIG`). Everything here
//! is fixed for the lifetime of the process.

include!(concat!(env!("OUT_DIR"), "/config_gen.rs"));

/// Size of a pointer-sized word in bytes.
pub const WORD: usize = core::mem::size_of::<usize>();

/// Object size of the smallest class.
pub const MIN_OBJECT_SIZE: usize = 4;

// Cross-checks on the generated constants. build.rs validates the raw
// tunables; these catch a hand-edited config_gen.rs or a word size the
// layout cannot support.
const _: () = {
    assert!(PAGE_SIZE == 1 << PAGE_SHIFT);
    assert!(MIN_BLOCK % PAGE_SIZE == 0);
    assert!(MAX_BLOCK % PAGE_SIZE == 0);
    assert!(MAX_SMALL == MIN_OBJECT_SIZE << (CLASS_COUNT - 1));
    assert!(WORD == 8, "compressed 4-byte links assume a 64-bit target");
    assert!(HEADER_BYTES > WORD);
};
