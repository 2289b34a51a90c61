//! Constraint-matrix construction: LDPC+LT rows into a binary matrix, HDPC
//! rows into a GF(256) octet matrix, from a systematic-index row (§4.5).

use crate::field::tables::SystematicParams;
use crate::field::{gf256, tables};
use crate::matrix::{BinaryMatrix, DenseBinaryMatrix, OctetMatrix, SparseBinaryMatrix};
use crate::rand::{rand, tuple};

/// The constraint system for one source block's K′: a binary sub-matrix
/// (LDPC structural rows + LT rows, `L-H` rows) and an HDPC octet
/// sub-matrix (`H` rows), both `L` columns wide.
pub struct ConstraintMatrices {
    pub binary: Box<dyn BinaryMatrix>,
    pub hdpc: OctetMatrix,
    pub s: usize,
    pub h: usize,
    pub l: usize,
}

/// Dense/sparse crossover threshold, exposed via `CodecConfig` rather than
/// hard-wired (§4.5). `rows`/`cols` size the returned matrix; `k_prime` only
/// decides which representation to use.
pub fn choose_binary_matrix(
    rows: usize,
    cols: usize,
    k_prime: usize,
    sparse_crossover: usize,
) -> Box<dyn BinaryMatrix> {
    if k_prime < sparse_crossover {
        Box::new(DenseBinaryMatrix::new(rows, cols))
    } else {
        Box::new(SparseBinaryMatrix::new(rows, cols))
    }
}

fn build_ldpc_rows(binary: &mut dyn BinaryMatrix, params: &SystematicParams) {
    let s = params.s;
    let w = params.w;
    let l = params.l;
    let b = w - s;
    let p = l - w;

    for i in 0..b {
        let a = 1 + (i / s) % (s - 1);
        let bb = i % s;
        binary.set_bit(bb, i);
        binary.set_bit((bb + a) % s, i);
        binary.set_bit((bb + 2 * a) % s, i);
    }
    for i in 0..s {
        binary.set_bit(i, b + i);
    }
    for i in 0..s {
        binary.set_bit(i, w + (i % p));
        binary.set_bit(i, w + ((i + 1) % p));
    }
}

fn build_hdpc_rows(params: &SystematicParams) -> OctetMatrix {
    let h = params.h;
    let k_prime = params.k_prime;
    let s = params.s;
    let l = params.l;
    let ks = k_prime + s;

    let mut mt = OctetMatrix::new(h, ks);
    for j in 0..ks - 1 {
        let row_a = rand((j + 1) as u32, 6, h as u32) as usize;
        let row_b = (row_a + rand((j + 1) as u32, 7, (h - 1) as u32) as usize + 1) % h;
        mt.set(row_a, j, 1);
        let prev = mt.get(row_b, j);
        mt.set(row_b, j, prev ^ 1);
    }
    let mut alpha_pow = 1u8;
    for i in 0..h {
        mt.set(i, ks - 1, alpha_pow);
        alpha_pow = gf256::mul(alpha_pow, 2);
    }

    let mut hdpc = OctetMatrix::new(h, l);
    for i in 0..h {
        hdpc.set(i, ks - 1, mt.get(i, ks - 1));
    }
    let alpha = 2u8;
    for c in (0..ks - 1).rev() {
        for i in 0..h {
            let carried = gf256::mul(alpha, hdpc.get(i, c + 1));
            hdpc.set(i, c, mt.get(i, c) ^ carried);
        }
    }

    for i in 0..h {
        hdpc.set(i, ks + i, 1);
    }
    hdpc
}

fn apply_lt_row(binary: &mut dyn BinaryMatrix, row: usize, params: &SystematicParams, isi: u32) {
    let w = params.w;
    let p = params.p;
    let p1 = params.p1;
    let t = tuple(params, isi);

    let mut b = t.b as usize;
    binary.set_bit(row, b);
    for _ in 1..t.d {
        b = (b + t.a as usize) % w;
        binary.set_bit(row, b);
    }

    let mut b1 = t.b1 as usize;
    while b1 >= p {
        b1 = (b1 + t.a1 as usize) % p1;
    }
    binary.set_bit(row, w + b1);
    for _ in 1..t.d1 {
        b1 = (b1 + t.a1 as usize) % p1;
        while b1 >= p {
            b1 = (b1 + t.a1 as usize) % p1;
        }
        binary.set_bit(row, w + b1);
    }
}

/// Builds the constraint system for encoding: LT rows use ISIs `0..K′` in
/// order.
pub fn build_encoding_matrices(
    params: &SystematicParams,
    sparse_crossover: usize,
) -> ConstraintMatrices {
    build_matrices(params, sparse_crossover, &(0..params.k_prime as u32).collect::<Vec<_>>())
}

/// Builds the constraint system for decoding, one LT row per received ISI
/// (in receipt order), padded out to `K′` rows by the caller.
pub fn build_decoding_matrices(
    params: &SystematicParams,
    sparse_crossover: usize,
    isis: &[u32],
) -> ConstraintMatrices {
    build_matrices(params, sparse_crossover, isis)
}

fn build_matrices(
    params: &SystematicParams,
    sparse_crossover: usize,
    isis: &[u32],
) -> ConstraintMatrices {
    debug_assert_eq!(isis.len(), params.k_prime);
    let l = params.l;
    let h = params.h;
    let mut binary = choose_binary_matrix(l - h, l, params.k_prime, sparse_crossover);

    build_ldpc_rows(binary.as_mut(), params);
    for (row_offset, &isi) in isis.iter().enumerate() {
        apply_lt_row(binary.as_mut(), params.s + row_offset, params, isi);
    }

    let hdpc = build_hdpc_rows(params);

    ConstraintMatrices {
        binary,
        hdpc,
        s: params.s,
        h: params.h,
        l: params.l,
    }
}

/// Maps a received ESI to its ISI: identity below K, shifted past the
/// K′−K padding gap above (GLOSSARY "ISI").
pub fn esi_to_isi(esi: u32, k: u32, k_prime: u32) -> u32 {
    if esi < k {
        esi
    } else {
        k_prime + (esi - k)
    }
}

/// Looks up the systematic-index row for a source block of `k` symbols.
pub fn params_for_k(k: usize) -> Option<SystematicParams> {
    tables::lookup_k_prime(k)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ldpc_rows_have_expected_structure() {
        let params = tables::lookup_k_prime(10).unwrap();
        let mut m = DenseBinaryMatrix::new(params.s, params.l);
        build_ldpc_rows(&mut m, &params);
        for i in 0..params.s {
            assert!(m.get(i, params.w - params.s + i));
        }
    }

    #[test]
    fn hdpc_identity_block_is_set() {
        let params = tables::lookup_k_prime(10).unwrap();
        let hdpc = build_hdpc_rows(&params);
        let ks = params.k_prime + params.s;
        for i in 0..params.h {
            assert_eq!(hdpc.get(i, ks + i), 1);
        }
    }

    #[test]
    fn esi_to_isi_identity_below_k_shifted_above() {
        assert_eq!(esi_to_isi(3, 10, 12), 3);
        assert_eq!(esi_to_isi(10, 10, 12), 12);
        assert_eq!(esi_to_isi(11, 10, 12), 13);
    }

    #[test]
    fn encoding_matrices_have_l_minus_h_binary_rows() {
        let params = tables::lookup_k_prime(10).unwrap();
        let matrices = build_encoding_matrices(&params, 2000);
        assert_eq!(matrices.binary.rows(), params.l - params.h);
        assert_eq!(matrices.hdpc.rows(), params.h);
    }
}
