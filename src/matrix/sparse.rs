//! `SparseBinaryMatrix`: hybrid per-row storage for large K′ constraint
//! matrices (§4.7). Each row keeps a sorted list of physical column indices
//! for "sparse" columns plus a right-aligned bit-packed word block for
//! "dense" columns; column AND row indirection tables make both swaps O(1)
//! pointer exchanges instead of `DenseBinaryMatrix`'s O(rows)/O(cols) bit
//! walk. Physical row identity never changes after construction, which is
//! what lets `ColumnarIndex` below stay valid (module bit clears aside)
//! across the row swaps Phase 1 performs every pivot iteration.

use super::BinaryMatrix;
use crate::field::gf2;
use std::collections::{BTreeSet, HashMap};

struct Row {
    sparse: BTreeSet<u32>,
    dense: Vec<u64>,
}

impl Row {
    fn new(dense_words: usize) -> Self {
        Self {
            sparse: BTreeSet::new(),
            dense: vec![0u64; dense_words],
        }
    }
}

pub struct SparseBinaryMatrix {
    rows: usize,
    cols: usize,
    log_to_phys: Vec<u32>,
    phys_to_log: Vec<u32>,
    log_to_phys_row: Vec<u32>,
    phys_to_log_row: Vec<u32>,
    /// Physical columns promoted to dense storage, mapped to their bit
    /// index within each row's dense word block. Membership, not physical
    /// position, decides whether a column is dense: accelerating a column
    /// is then a pure data migration with no column relocation needed.
    dense_bit_of_phys: HashMap<u32, usize>,
    data: Vec<Row>,
    columnar_index: Option<ColumnarIndex>,
}

impl SparseBinaryMatrix {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            log_to_phys: (0..cols as u32).collect(),
            phys_to_log: (0..cols as u32).collect(),
            log_to_phys_row: (0..rows as u32).collect(),
            phys_to_log_row: (0..rows as u32).collect(),
            dense_bit_of_phys: HashMap::new(),
            data: (0..rows).map(|_| Row::new(0)).collect(),
            columnar_index: None,
        }
    }

    #[inline]
    fn phys_col(&self, logical_col: usize) -> u32 {
        self.log_to_phys[logical_col]
    }

    #[inline]
    fn phys_row(&self, logical_row: usize) -> usize {
        self.log_to_phys_row[logical_row] as usize
    }

    /// Whether physical column `phys` lives in the dense region.
    #[inline]
    fn is_dense_phys(&self, phys: u32) -> bool {
        self.dense_bit_of_phys.contains_key(&phys)
    }

    #[inline]
    fn dense_bit_index(&self, phys: u32) -> usize {
        self.dense_bit_of_phys[&phys]
    }

    /// Builds a CSC-style index from current physical column -> physical
    /// rows with a set bit in that column's sparse entry, covering only the
    /// sparse (non-accelerated) columns. Built once per Phase 1 per §4.7;
    /// entries may go stale as bits are cleared afterward, so callers
    /// re-verify before acting on them. Keyed by *physical* row, which
    /// unlike logical row never moves once assigned, so the index stays
    /// valid across the row swaps Phase 1 performs afterward.
    fn build_columnar_index(&self) -> ColumnarIndex {
        let mut per_col: HashMap<u32, Vec<u32>> = HashMap::new();
        for (r, row) in self.data.iter().enumerate() {
            for &phys in &row.sparse {
                per_col.entry(phys).or_default().push(r as u32);
            }
        }
        let mut cols: Vec<u32> = per_col.keys().copied().collect();
        cols.sort_unstable();
        let mut offsets = HashMap::with_capacity(cols.len());
        let mut values = Vec::new();
        for col in cols {
            let start = values.len() as u32;
            values.extend_from_slice(&per_col[&col]);
            offsets.insert(col, (start, values.len() as u32));
        }
        ColumnarIndex { offsets, values }
    }
}

/// CSC snapshot of the sparse region's rows-per-column, built once per
/// Phase 1 (§4.7, §9).
struct ColumnarIndex {
    offsets: HashMap<u32, (u32, u32)>,
    values: Vec<u32>,
}

impl ColumnarIndex {
    /// Physical rows that had a set bit in physical column `phys_col` at
    /// build time. May contain stale entries if bits were cleared since.
    /// Returns an empty slice if the column had no sparse entries at all.
    fn rows_for_column(&self, phys_col: usize) -> &[u32] {
        match self.offsets.get(&(phys_col as u32)) {
            Some(&(start, end)) => &self.values[start as usize..end as usize],
            None => &[],
        }
    }
}

impl BinaryMatrix for SparseBinaryMatrix {
    fn rows(&self) -> usize {
        self.rows
    }

    fn cols(&self) -> usize {
        self.cols
    }

    fn get(&self, row: usize, col: usize) -> bool {
        let phys = self.phys_col(col);
        let r = &self.data[self.phys_row(row)];
        if self.is_dense_phys(phys) {
            gf2::get_bit(&r.dense, self.dense_bit_index(phys))
        } else {
            r.sparse.contains(&phys)
        }
    }

    fn set_bit(&mut self, row: usize, col: usize) {
        let phys = self.phys_col(col);
        let dense = self.is_dense_phys(phys);
        let bit_idx = if dense { self.dense_bit_index(phys) } else { 0 };
        let r = &mut self.data[self.phys_row(row)];
        if dense {
            gf2::set_bit(&mut r.dense, bit_idx);
        } else {
            r.sparse.insert(phys);
        }
    }

    fn clear_bit(&mut self, row: usize, col: usize) {
        let phys = self.phys_col(col);
        let dense = self.is_dense_phys(phys);
        let bit_idx = if dense { self.dense_bit_index(phys) } else { 0 };
        let r = &mut self.data[self.phys_row(row)];
        if dense {
            gf2::clear_bit(&mut r.dense, bit_idx);
        } else {
            r.sparse.remove(&phys);
        }
    }

    fn swap_rows(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        let pa = self.log_to_phys_row[a];
        let pb = self.log_to_phys_row[b];
        self.log_to_phys_row.swap(a, b);
        self.phys_to_log_row[pa as usize] = b as u32;
        self.phys_to_log_row[pb as usize] = a as u32;
    }

    fn swap_cols(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        let pa = self.log_to_phys[a];
        let pb = self.log_to_phys[b];
        self.log_to_phys.swap(a, b);
        self.phys_to_log[pa as usize] = b as u32;
        self.phys_to_log[pb as usize] = a as u32;
    }

    fn xor_row_range(&mut self, dst: usize, src: usize, start_col: usize) {
        if dst == src {
            return;
        }
        let dst = self.phys_row(dst);
        let src = self.phys_row(src);
        let (lo, hi) = if dst < src { (dst, src) } else { (src, dst) };
        let (left, right) = self.data.split_at_mut(hi);
        let (dst_row, src_row) = if dst < src {
            (&mut left[lo], &right[0])
        } else {
            (&mut right[0], &left[lo])
        };

        gf2::xor_slice(&mut dst_row.dense, &src_row.dense);

        if start_col == 0 {
            let merged: Vec<u32> = dst_row
                .sparse
                .symmetric_difference(&src_row.sparse)
                .copied()
                .collect();
            dst_row.sparse = merged.into_iter().collect();
        } else {
            for &phys in &src_row.sparse {
                let logical = self.phys_to_log[phys as usize] as usize;
                if logical >= start_col {
                    if dst_row.sparse.contains(&phys) {
                        dst_row.sparse.remove(&phys);
                    } else {
                        dst_row.sparse.insert(phys);
                    }
                }
            }
        }
    }

    fn count_ones_in_range(&self, row: usize, start_col: usize, end_col: usize) -> u32 {
        (start_col..end_col).filter(|&c| self.get(row, c)).count() as u32
    }

    fn nonzero_cols_in_range(&self, row: usize, start_col: usize, end_col: usize) -> Vec<usize> {
        (start_col..end_col).filter(|&c| self.get(row, c)).collect()
    }

    fn prepare_column_index(&mut self) {
        self.columnar_index = Some(self.build_columnar_index());
    }

    fn candidate_rows_for_column(&self, col: usize) -> Option<Vec<usize>> {
        let index = self.columnar_index.as_ref()?;
        let phys = self.phys_col(col);
        Some(
            index
                .rows_for_column(phys as usize)
                .iter()
                .map(|&r| self.phys_to_log_row[r as usize] as usize)
                .collect(),
        )
    }

    fn enable_column_acceleration(&mut self, col: usize) {
        let phys = self.phys_col(col);
        if self.is_dense_phys(phys) {
            return;
        }
        let bit_idx = self.dense_bit_of_phys.len();
        self.dense_bit_of_phys.insert(phys, bit_idx);
        let words = gf2::words_for(self.dense_bit_of_phys.len());
        for row in self.data.iter_mut() {
            if row.dense.len() < words {
                row.dense.resize(words, 0);
            }
            if row.sparse.remove(&phys) {
                gf2::set_bit(&mut row.dense, bit_idx);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_clear_roundtrip() {
        let mut m = SparseBinaryMatrix::new(3, 40);
        m.set_bit(1, 20);
        assert!(m.get(1, 20));
        m.clear_bit(1, 20);
        assert!(!m.get(1, 20));
    }

    #[test]
    fn swap_cols_is_pointer_exchange() {
        let mut m = SparseBinaryMatrix::new(2, 10);
        m.set_bit(0, 3);
        m.swap_cols(3, 7);
        assert!(!m.get(0, 3));
        assert!(m.get(0, 7));
    }

    #[test]
    fn swap_rows_exchanges_full_rows() {
        let mut m = SparseBinaryMatrix::new(2, 10);
        m.set_bit(0, 1);
        m.set_bit(1, 5);
        m.swap_rows(0, 1);
        assert!(!m.get(0, 1));
        assert!(m.get(0, 5));
        assert!(m.get(1, 1));
    }

    #[test]
    fn xor_row_range_respects_start_col() {
        let mut m = SparseBinaryMatrix::new(2, 20);
        m.set_bit(0, 2);
        m.set_bit(0, 15);
        m.set_bit(1, 2);
        m.set_bit(1, 15);
        m.xor_row_range(0, 1, 10);
        assert!(m.get(0, 2)); // below start_col, untouched
        assert!(!m.get(0, 15)); // at/above start_col, XORed away
    }

    #[test]
    fn enable_column_acceleration_preserves_bits() {
        let mut m = SparseBinaryMatrix::new(2, 12);
        m.set_bit(0, 4);
        m.set_bit(1, 4);
        m.enable_column_acceleration(4);
        assert!(m.get(0, 4));
        assert!(m.get(1, 4));
        m.clear_bit(0, 4);
        assert!(!m.get(0, 4));
        assert!(m.get(1, 4));
    }

    #[test]
    fn columnar_index_reports_rows_with_bit_set() {
        let mut m = SparseBinaryMatrix::new(3, 8);
        m.set_bit(0, 2);
        m.set_bit(2, 2);
        m.prepare_column_index();
        let mut rows = m.candidate_rows_for_column(2).unwrap();
        rows.sort();
        assert_eq!(rows, vec![0, 2]);
    }

    #[test]
    fn columnar_index_survives_row_swaps() {
        // The index is keyed by physical row, which row swaps never
        // relocate; logical candidates must still resolve correctly after
        // the rows that set the bit have moved.
        let mut m = SparseBinaryMatrix::new(3, 8);
        m.set_bit(0, 2);
        m.set_bit(2, 2);
        m.prepare_column_index();
        m.swap_rows(0, 1);
        let mut rows = m.candidate_rows_for_column(2).unwrap();
        rows.sort();
        assert_eq!(rows, vec![1, 2]);
        assert!(m.get(1, 2));
        assert!(!m.get(0, 2));
    }

    #[test]
    fn no_index_without_preparing_one() {
        let m = SparseBinaryMatrix::new(2, 4);
        assert!(m.candidate_rows_for_column(0).is_none());
    }
}
