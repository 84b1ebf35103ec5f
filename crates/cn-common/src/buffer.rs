//! Exclusively owned, fixed-length buffers.
//!
//! A [`Buffer`] is allocated once with a fixed length; its length and capacity
//! are always identical. Resizing replaces the whole allocation. Buffers are
//! deliberately not `Clone`: duplicating one requires an explicit, fallible
//! [`Buffer::copy_from_slice`]. Non-owning access goes through plain slices.

use crate::error::{Error, Result};
use std::ops::{Deref, DerefMut};

/// An owned, contiguous sequence of `T` with a length fixed at allocation.
#[derive(Debug, PartialEq, Eq)]
pub struct Buffer<T> {
    data: Box<[T]>,
}

impl<T> Buffer<T> {
    /// Create an empty (unallocated) buffer.
    pub fn new() -> Self {
        Buffer {
            data: Vec::new().into_boxed_slice(),
        }
    }

    /// Take ownership of an existing vector, shrinking it to its length.
    pub fn from_vec(vec: Vec<T>) -> Self {
        Buffer {
            data: vec.into_boxed_slice(),
        }
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True when nothing is allocated.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Size of the contents in bytes.
    pub fn size_in_bytes(&self) -> usize {
        std::mem::size_of_val(&*self.data)
    }

    /// Free the allocation, leaving an empty buffer.
    pub fn clear(&mut self) {
        self.data = Vec::new().into_boxed_slice();
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Give up ownership of the contents.
    pub fn into_vec(self) -> Vec<T> {
        self.data.into_vec()
    }
}

impl<T: Default> Buffer<T> {
    /// Allocate `len` default-initialized elements.
    ///
    /// Allocation failure is reported as [`Error::AllocationFailure`] rather
    /// than aborting the process.
    pub fn alloc(len: usize) -> Result<Self> {
        let mut vec = try_with_capacity(len)?;
        vec.resize_with(len, T::default);
        Ok(Buffer {
            data: vec.into_boxed_slice(),
        })
    }

    /// Replace the current allocation with a fresh one of `len` elements.
    ///
    /// On failure the existing contents are left untouched.
    pub fn realloc(&mut self, len: usize) -> Result<()> {
        *self = Buffer::alloc(len)?;
        Ok(())
    }
}

impl<T: Clone> Buffer<T> {
    /// Allocate a new buffer holding a copy of `src`.
    pub fn copy_from_slice(src: &[T]) -> Result<Self> {
        let mut vec = try_with_capacity(src.len())?;
        vec.extend_from_slice(src);
        Ok(Buffer {
            data: vec.into_boxed_slice(),
        })
    }
}

fn try_with_capacity<T>(len: usize) -> Result<Vec<T>> {
    let mut vec = Vec::new();
    vec.try_reserve_exact(len)
        .map_err(|_| Error::AllocationFailure { requested: len })?;
    Ok(vec)
}

impl<T> Default for Buffer<T> {
    fn default() -> Self {
        Buffer::new()
    }
}

impl<T> Deref for Buffer<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.data
    }
}

impl<T> DerefMut for Buffer<T> {
    fn deref_mut(&mut self) -> &mut [T] {
        &mut self.data
    }
}

impl<T> AsRef<[T]> for Buffer<T> {
    fn as_ref(&self) -> &[T] {
        &self.data
    }
}

impl<T> From<Vec<T>> for Buffer<T> {
    fn from(vec: Vec<T>) -> Self {
        Buffer::from_vec(vec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn new_buffer_is_empty() {
        let buf: Buffer<u8> = Buffer::new();
        assert!(buf.is_empty());
        assert_eq!(buf.len(), 0);
    }

    #[test]
    fn alloc_sets_fixed_length() {
        let buf: Buffer<u16> = Buffer::alloc(32).unwrap();
        assert_eq!(buf.len(), 32);
        assert_eq!(buf.size_in_bytes(), 64);
        assert!(buf.iter().all(|&c| c == 0));
    }

    #[test]
    fn alloc_failure_is_reported() {
        let err = Buffer::<u64>::alloc(usize::MAX).unwrap_err();
        assert!(matches!(
            err,
            Error::AllocationFailure {
                requested: usize::MAX
            }
        ));
    }

    #[test]
    fn realloc_replaces_contents() {
        let mut buf = Buffer::copy_from_slice(&[1u8, 2, 3]).unwrap();
        buf.realloc(5).unwrap();
        assert_eq!(buf.as_slice(), &[0, 0, 0, 0, 0]);
    }

    #[test]
    fn failed_realloc_keeps_old_contents() {
        let mut buf = Buffer::copy_from_slice(&[7u64, 8]).unwrap();
        assert!(buf.realloc(usize::MAX).is_err());
        assert_eq!(buf.as_slice(), &[7, 8]);
    }

    #[test]
    fn clear_frees_allocation() {
        let mut buf = Buffer::copy_from_slice(b"abc").unwrap();
        buf.clear();
        assert!(buf.is_empty());
    }

    #[test]
    fn deref_mut_writes_through() {
        let mut buf: Buffer<u8> = Buffer::alloc(2).unwrap();
        buf[1] = 0x82;
        assert_eq!(buf.into_vec(), vec![0, 0x82]);
    }

    proptest! {
        #[test]
        fn copy_from_slice_preserves_bytes(bytes in proptest::collection::vec(any::<u8>(), 0..512)) {
            let buf = Buffer::copy_from_slice(&bytes).unwrap();
            prop_assert_eq!(buf.len(), bytes.len());
            prop_assert_eq!(buf.as_slice(), bytes.as_slice());
        }
    }
}
