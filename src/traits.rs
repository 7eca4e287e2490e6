use core::ops::{Range, RangeFrom, RangeTo};
#[cfg(not(debug_assertions))]
use core::slice;

/// Indexing without bounds checks
///
/// Only for header views, and only *after* `parse` (or a constructor) has checked that the buffer
/// is large enough. Debug builds keep the bounds checks.
pub trait UncheckedIndex {
    type T;

    // get_unchecked
    unsafe fn gu(&self, i: usize) -> &Self::T;
    unsafe fn r(&self, r: Range<usize>) -> &Self;
    unsafe fn rt(&self, r: RangeTo<usize>) -> &Self;
    unsafe fn rf(&self, r: RangeFrom<usize>) -> &Self;
}

impl<T> UncheckedIndex for [T] {
    type T = T;

    unsafe fn gu(&self, at: usize) -> &T {
        debug_assert!(at < self.len());

        self.get_unchecked(at)
    }

    #[cfg(debug_assertions)]
    unsafe fn r(&self, r: Range<usize>) -> &[T] {
        &self[r]
    }

    #[cfg(not(debug_assertions))]
    unsafe fn r(&self, r: Range<usize>) -> &[T] {
        let o = r.start;
        let l = r.end - o;
        slice::from_raw_parts(self.as_ptr().add(o), l)
    }

    #[cfg(debug_assertions)]
    unsafe fn rt(&self, r: RangeTo<usize>) -> &[T] {
        &self[r]
    }

    #[cfg(not(debug_assertions))]
    unsafe fn rt(&self, r: RangeTo<usize>) -> &[T] {
        slice::from_raw_parts(self.as_ptr(), r.end)
    }

    #[cfg(debug_assertions)]
    unsafe fn rf(&self, r: RangeFrom<usize>) -> &[T] {
        &self[r]
    }

    #[cfg(not(debug_assertions))]
    unsafe fn rf(&self, r: RangeFrom<usize>) -> &[T] {
        let o = r.start;
        let l = self.len() - o;
        slice::from_raw_parts(self.as_ptr().add(o), l)
    }
}
