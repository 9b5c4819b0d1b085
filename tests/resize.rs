//! Resize semantics: in-place while the class (or large mapping) does not
//! grow, move-and-copy otherwise, contents preserved up to the old cell.

use tsmalloc::{alloc, free, resize};

#[test]
fn resize_up_moves_then_shrink_stays() {
    let p = alloc(1024);
    assert!(!p.is_null());
    unsafe {
        for i in 0..1024 {
            *p.add(i) = (i % 251) as u8;
        }

        // growing a class moves the object and copies the old cell
        let q = resize(p, 2048);
        assert!(!q.is_null());
        assert_ne!(q, p, "grow across classes must move");
        for i in 0..1024 {
            assert_eq!(*q.add(i), (i % 251) as u8, "byte {i} lost in grow");
        }

        // shrinking stays in the same cell
        let r = resize(q, 8);
        assert_eq!(r, q, "shrink within the cell must not move");
        free(r);
    }
}

#[test]
fn resize_within_class_is_identity() {
    let p = alloc(100); // 128-byte class
    assert!(!p.is_null());
    unsafe {
        assert_eq!(resize(p, 128), p);
        assert_eq!(resize(p, 16), p);
        free(p);
    }
}

#[test]
fn resize_large_in_place_and_move() {
    let p = alloc(4096); // above the small ceiling
    assert!(!p.is_null());
    unsafe {
        for i in 0..64 {
            *p.add(i) = i as u8;
        }

        // still inside the same page-rounded mapping
        let q = resize(p, 5000);
        assert_eq!(q, p, "resize within the mapping must not move");

        // growing past the mapping moves
        let r = resize(q, 20000);
        assert!(!r.is_null());
        assert_ne!(r, q);
        for i in 0..64 {
            assert_eq!(*r.add(i), i as u8, "byte {i} lost in large grow");
        }

        // shrinking a large object into the slab core moves it
        let s = resize(r, 64);
        assert!(!s.is_null());
        for i in 0..64 {
            assert_eq!(*s.add(i), i as u8, "byte {i} lost going large -> small");
        }
        free(s);
    }
}
