//! Encoder/decoder orchestration (§4.8): source-block partitioning, plan
//! caching across blocks, and the LT-combination step shared by repair
//! symbol generation and missing-source-symbol regeneration.

pub mod decoder;
pub mod encoder;
pub mod plan_cache;

pub use decoder::Decoder;
pub use encoder::Encoder;
pub use plan_cache::PlanCache;

use crate::base::PayloadId;
use crate::field::gf256;
use crate::field::tables::SystematicParams;
use crate::rand::tuple;
use crate::symbol::SymbolBuffer;

/// One transmitted encoding symbol: its `(SBN, ESI)` identity and payload.
#[derive(Debug, Clone)]
pub struct EncodingPacket {
    pub id: PayloadId,
    pub data: Vec<u8>,
}

/// `LT_encode`: combines intermediate symbols into one encoding symbol for
/// ISI `isi`, per the same `Tuple`-driven walk `apply_lt_row` uses to place
/// matrix bits (§4.5, §4.8). Shared by repair-symbol generation and by
/// decoder-side regeneration of source symbols that were never received.
pub fn lt_encode(intermediate: &SymbolBuffer, params: &SystematicParams, isi: u32, out: &mut [u8]) {
    let w = params.w;
    let p = params.p;
    let p1 = params.p1;
    let t = tuple(params, isi);

    let mut b = t.b as usize;
    out.copy_from_slice(intermediate.get_const(b));
    for _ in 1..t.d {
        b = (b + t.a as usize) % w;
        gf256::add_assign(out, intermediate.get_const(b));
    }

    let mut b1 = t.b1 as usize;
    while b1 >= p {
        b1 = (b1 + t.a1 as usize) % p1;
    }
    gf256::add_assign(out, intermediate.get_const(w + b1));
    for _ in 1..t.d1 {
        b1 = (b1 + t.a1 as usize) % p1;
        while b1 >= p {
            b1 = (b1 + t.a1 as usize) % p1;
        }
        gf256::add_assign(out, intermediate.get_const(w + b1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::build_encoding_matrices;
    use crate::field::tables;
    use crate::optimize::MemoryPool;
    use crate::solver;

    #[test]
    fn lt_encode_reproduces_source_symbol_after_solve() {
        let params = tables::lookup_k_prime(10).unwrap();
        let mut matrices = build_encoding_matrices(&params, 2000);
        let out = solver::solve(&mut matrices, params.k_prime).unwrap();

        let symbol_size = 8;
        let pool = MemoryPool::new(1, params.l * symbol_size);
        let mut buf = SymbolBuffer::new(pool, params.l, symbol_size);
        for i in 0..params.k_prime {
            buf.copy_from(params.s + i, &[(i as u8); 8]);
        }
        out.apply(&mut buf);

        let mut regenerated = vec![0u8; symbol_size];
        lt_encode(&buf, &params, 3, &mut regenerated);
        assert_eq!(regenerated, vec![3u8; 8]);
    }
}
