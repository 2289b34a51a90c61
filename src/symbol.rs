//! `SymbolBuffer`: contiguous, cache-aligned storage for `L` symbols of `T`
//! bytes each, backed by the crate's pooled allocator, the same way a
//! packet owns its `AlignedBox<[u8]>` data block.

use crate::field::gf256;
use crate::optimize::MemoryPool;

/// Owns `len` rows of `row_bytes` bytes each in one 64-byte-aligned
/// allocation drawn from a `MemoryPool`.
pub struct SymbolBuffer {
    pool: MemoryPool,
    data: aligned_box::AlignedBox<[u8]>,
    len: usize,
    row_bytes: usize,
}

impl SymbolBuffer {
    /// Allocates a buffer for `len` rows of `row_bytes` bytes, drawing
    /// backing storage from `pool`. `pool`'s block size must be at least
    /// `len * row_bytes`; callers size the pool accordingly (see
    /// `Encoder`/`Decoder`).
    pub fn new(pool: MemoryPool, len: usize, row_bytes: usize) -> Self {
        let data = pool.alloc();
        debug_assert!(data.len() >= len * row_bytes);
        Self {
            pool,
            data,
            len,
            row_bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn row_bytes(&self) -> usize {
        self.row_bytes
    }

    #[inline]
    fn range(&self, i: usize) -> std::ops::Range<usize> {
        debug_assert!(i < self.len);
        let start = i * self.row_bytes;
        start..start + self.row_bytes
    }

    pub fn get_const(&self, i: usize) -> &[u8] {
        let r = self.range(i);
        &self.data[r]
    }

    pub fn get(&mut self, i: usize) -> &mut [u8] {
        let r = self.range(i);
        &mut self.data[r]
    }

    /// `row[dst] ^= row[src]`.
    pub fn add_assign(&mut self, dst: usize, src: usize) {
        if dst == src {
            for b in self.get(dst) {
                *b = 0;
            }
            return;
        }
        let row_bytes = self.row_bytes;
        if dst < src {
            let (left, right) = self.data.split_at_mut(src * row_bytes);
            let dst_slice = &mut left[dst * row_bytes..dst * row_bytes + row_bytes];
            gf256::add_assign(dst_slice, &right[..row_bytes]);
        } else {
            let (left, right) = self.data.split_at_mut(dst * row_bytes);
            let src_slice = &left[src * row_bytes..src * row_bytes + row_bytes];
            gf256::add_assign(&mut right[..row_bytes], src_slice);
        }
    }

    /// `row[dst] ^= row[src] * scalar`.
    pub fn fma(&mut self, dst: usize, src: usize, scalar: u8) {
        if scalar == 0 {
            return;
        }
        let row_bytes = self.row_bytes;
        if dst < src {
            let (left, right) = self.data.split_at_mut(src * row_bytes);
            let dst_slice = &mut left[dst * row_bytes..dst * row_bytes + row_bytes];
            gf256::fma_slice(dst_slice, &right[..row_bytes], scalar);
        } else {
            let (left, right) = self.data.split_at_mut(dst * row_bytes);
            let src_slice = &left[src * row_bytes..src * row_bytes + row_bytes];
            gf256::fma_slice(&mut right[..row_bytes], src_slice, scalar);
        }
    }

    /// `row[i] *= scalar`.
    pub fn mul_assign(&mut self, i: usize, scalar: u8) {
        gf256::mul_assign_scalar(self.get(i), scalar);
    }

    /// Swaps two rows byte-wise.
    pub fn swap(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        let row_bytes = self.row_bytes;
        let (lo, hi) = if a < b { (a, b) } else { (b, a) };
        let (left, right) = self.data.split_at_mut(hi * row_bytes);
        let lo_slice = &mut left[lo * row_bytes..lo * row_bytes + row_bytes];
        let hi_slice = &mut right[..row_bytes];
        lo_slice.swap_with_slice(hi_slice);
    }

    /// Overwrites row `i` with `bytes`, zero-padding if `bytes` is shorter
    /// than the row.
    pub fn copy_from(&mut self, i: usize, bytes: &[u8]) {
        let row = self.get(i);
        let n = bytes.len().min(row.len());
        row[..n].copy_from_slice(&bytes[..n]);
        for b in &mut row[n..] {
            *b = 0;
        }
    }

    pub fn pool(&self) -> MemoryPool {
        self.pool.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make(len: usize, row_bytes: usize) -> SymbolBuffer {
        let pool = MemoryPool::new(1, len * row_bytes);
        SymbolBuffer::new(pool, len, row_bytes)
    }

    #[test]
    fn copy_and_read_back() {
        let mut buf = make(4, 8);
        buf.copy_from(1, b"hello");
        assert_eq!(&buf.get_const(1)[..5], b"hello");
        assert_eq!(&buf.get_const(1)[5..], &[0, 0, 0]);
    }

    #[test]
    fn xor_self_twice_is_identity() {
        let mut buf = make(2, 4);
        buf.copy_from(0, &[1, 2, 3, 4]);
        buf.copy_from(1, &[9, 9, 9, 9]);
        let orig = buf.get_const(0).to_vec();
        buf.add_assign(0, 1);
        buf.add_assign(0, 1);
        assert_eq!(buf.get_const(0), orig.as_slice());
    }

    #[test]
    fn swap_exchanges_rows() {
        let mut buf = make(2, 3);
        buf.copy_from(0, &[1, 2, 3]);
        buf.copy_from(1, &[4, 5, 6]);
        buf.swap(0, 1);
        assert_eq!(buf.get_const(0), &[4, 5, 6]);
        assert_eq!(buf.get_const(1), &[1, 2, 3]);
    }

    #[test]
    fn fma_matches_manual_computation() {
        let mut buf = make(2, 4);
        buf.copy_from(0, &[10, 20, 30, 40]);
        buf.copy_from(1, &[1, 2, 3, 4]);
        let scalar = 0x07;
        let mut expected = buf.get_const(0).to_vec();
        gf256::fma_slice(&mut expected, buf.get_const(1), scalar);
        buf.fma(0, 1, scalar);
        assert_eq!(buf.get_const(0), expected.as_slice());
    }
}
