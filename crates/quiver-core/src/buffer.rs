//! Reference-counted buffers.
//!
//! A buffer is an `Arc`'d allocation plus an `(offset, len)` window. Slicing
//! only moves the window, so every slice of an array shares the allocation
//! that the builder produced; the last clone to drop frees it.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use crate::error::{Error, Result};

/// Contiguous, immutable run of native values.
pub struct ScalarBuffer<T> {
    data: Arc<Vec<T>>,
    offset: usize,
    len: usize,
}

impl<T> Clone for ScalarBuffer<T> {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
            offset: self.offset,
            len: self.len,
        }
    }
}

impl<T> ScalarBuffer<T> {
    pub fn from_vec(values: Vec<T>) -> Self {
        let len = values.len();
        Self {
            data: Arc::new(values),
            offset: 0,
            len,
        }
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data[self.offset..self.offset + self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Zero-copy view of `len` values starting at `offset`.
    pub fn slice(&self, offset: usize, len: usize) -> Result<Self> {
        check_window(offset, len, self.len)?;
        Ok(Self {
            data: Arc::clone(&self.data),
            offset: self.offset + offset,
            len,
        })
    }

    /// True when both buffers view the same allocation.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }

    /// Address of the first visible value, for foreign consumers.
    pub fn address(&self) -> usize {
        self.as_slice().as_ptr() as usize
    }

    /// Address of the start of the backing allocation.
    pub fn base_address(&self) -> usize {
        self.data.as_ptr() as usize
    }

    /// Bytes held by the backing allocation (shared slices report the whole
    /// allocation, as the allocator sees it).
    pub fn memory_size(&self) -> usize {
        self.data.capacity() * std::mem::size_of::<T>()
    }

    /// Number of live references to the backing allocation.
    pub fn strong_count(&self) -> usize {
        Arc::strong_count(&self.data)
    }
}

impl<T> Deref for ScalarBuffer<T> {
    type Target = [T];
    fn deref(&self) -> &Self::Target {
        self.as_slice()
    }
}

impl<T: fmt::Debug> fmt::Debug for ScalarBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.as_slice().iter()).finish()
    }
}

impl<T> From<Vec<T>> for ScalarBuffer<T> {
    fn from(values: Vec<T>) -> Self {
        Self::from_vec(values)
    }
}

/// Bit-packed, LSB-first bitmap. Used both for validity (1 = valid) and for
/// boolean values.
#[derive(Clone)]
pub struct Bitmap {
    bits: Arc<Vec<u8>>,
    offset: usize,
    len: usize,
}

impl Bitmap {
    /// Bitmap of `len` bits, all set.
    pub fn new_set(len: usize) -> Self {
        let mut builder = BitmapBuilder::with_capacity(len);
        builder.append_n(len, true);
        builder.finish()
    }

    pub fn from_bools(values: &[bool]) -> Self {
        let mut builder = BitmapBuilder::with_capacity(values.len());
        for v in values {
            builder.append(*v);
        }
        builder.finish()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Caller guarantees `i < len`.
    #[inline]
    pub fn get(&self, i: usize) -> bool {
        debug_assert!(i < self.len);
        let j = self.offset + i;
        self.bits[j >> 3] & (1 << (j & 7)) != 0
    }

    pub fn count_set_bits(&self) -> usize {
        (0..self.len).filter(|&i| self.get(i)).count()
    }

    pub fn count_unset_bits(&self) -> usize {
        self.len - self.count_set_bits()
    }

    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        (0..self.len).map(move |i| self.get(i))
    }

    /// Zero-copy view of `len` bits starting at `offset`.
    pub fn slice(&self, offset: usize, len: usize) -> Result<Self> {
        check_window(offset, len, self.len)?;
        Ok(Self {
            bits: Arc::clone(&self.bits),
            offset: self.offset + offset,
            len,
        })
    }

    /// Copy of this bitmap whose view starts at bit `offset` of a fresh
    /// allocation. Leading padding bits are unset.
    pub fn realigned(&self, offset: usize) -> Self {
        let mut builder = BitmapBuilder::with_capacity(offset + self.len);
        builder.append_n(offset, false);
        for v in self.iter() {
            builder.append(v);
        }
        let mut out = builder.finish();
        out.offset = offset;
        out.len = self.len;
        out
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.bits, &other.bits)
    }

    pub fn address(&self) -> usize {
        self.bits.as_ptr() as usize
    }

    pub fn memory_size(&self) -> usize {
        self.bits.capacity()
    }
}

impl fmt::Debug for Bitmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter().map(u8::from)).finish()
    }
}

/// Growable bitmap used by builders.
#[derive(Debug, Default)]
pub struct BitmapBuilder {
    bits: Vec<u8>,
    len: usize,
}

impl BitmapBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(bits: usize) -> Self {
        Self {
            bits: Vec::with_capacity(bits.div_ceil(8)),
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn append(&mut self, v: bool) {
        if self.len % 8 == 0 {
            self.bits.push(0);
        }
        if v {
            let last = self.bits.len() - 1;
            self.bits[last] |= 1 << (self.len % 8);
        }
        self.len += 1;
    }

    pub fn append_n(&mut self, n: usize, v: bool) {
        for _ in 0..n {
            self.append(v);
        }
    }

    /// Moves the bits out and leaves the builder empty.
    pub fn finish(&mut self) -> Bitmap {
        let bits = std::mem::take(&mut self.bits);
        let len = std::mem::take(&mut self.len);
        Bitmap {
            bits: Arc::new(bits),
            offset: 0,
            len,
        }
    }
}

fn check_window(offset: usize, len: usize, total: usize) -> Result<()> {
    match offset.checked_add(len) {
        Some(end) if end <= total => Ok(()),
        _ => Err(Error::Index(format!(
            "slice [{offset}, {offset}+{len}) out of bounds for length {total}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slices_share_the_allocation() {
        let buf = ScalarBuffer::from_vec(vec![1i64, 2, 3, 4, 5]);
        let s = buf.slice(1, 3).unwrap();
        assert_eq!(s.as_slice(), &[2, 3, 4]);
        assert!(s.ptr_eq(&buf));
        assert_eq!(buf.strong_count(), 2);
        let ss = s.slice(1, 2).unwrap();
        assert_eq!(ss.as_slice(), &[3, 4]);
        assert!(buf.slice(4, 2).is_err());
    }

    #[test]
    fn bitmap_builder_and_slicing() {
        let mut b = BitmapBuilder::new();
        for i in 0..19 {
            b.append(i % 3 != 0);
        }
        let bm = b.finish();
        assert!(b.is_empty());
        assert_eq!(bm.len(), 19);
        assert!(!bm.get(0));
        assert!(bm.get(1));
        assert_eq!(bm.count_unset_bits(), 7);

        let s = bm.slice(9, 5).unwrap();
        let got: Vec<bool> = s.iter().collect();
        assert_eq!(got, vec![false, true, true, false, true]);
        assert!(s.ptr_eq(&bm));
    }

    #[test]
    fn realigned_bitmap_keeps_bits_at_new_offset() {
        let bm = Bitmap::from_bools(&[true, false, true, true, false]);
        let s = bm.slice(1, 3).unwrap();
        let r = s.realigned(6);
        assert_eq!(r.offset(), 6);
        assert_eq!(r.len(), 3);
        assert!(!r.ptr_eq(&bm));
        assert_eq!(r.iter().collect::<Vec<_>>(), vec![false, true, true]);
        assert_eq!(s.realigned(0).iter().collect::<Vec<_>>(), vec![false, true, true]);
    }
}
