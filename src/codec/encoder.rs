//! Systematic RaptorQ encoder: partitions an object into source blocks,
//! solves each block's intermediate symbols once, then emits source and
//! repair symbols on demand via `LT_encode` (§4.8).
//!
//! When `N>1`, each source block is further sliced column-wise into `N`
//! sub-blocks per the sub-block partition (§4.4.1.2): every sub-block runs
//! its own solve over its own (narrower) intermediate-symbol buffer, sharing
//! the block's K' and hence its cached plan, and a packet's bytes are the
//! concatenation of every sub-block's contribution for that ESI.

use super::{lt_encode, EncodingPacket, PlanCache};
use crate::base::{partition, sub_block_partition, ObjectTransmissionInformation, PayloadId, SubBlockSlice};
use crate::config::CodecConfig;
use crate::constraint::esi_to_isi;
use crate::error::{RaptorQError, Result};
use crate::field::tables::{self, SystematicParams};
use crate::optimize::MemoryPool;
use crate::symbol::SymbolBuffer;
use rayon::prelude::*;

struct SubBlockEncoder {
    symbol_size: usize,
    intermediate: SymbolBuffer,
}

impl SubBlockEncoder {
    fn build(
        k: usize,
        block_data: &[u8],
        row_stride: usize,
        slice: SubBlockSlice,
        params: &SystematicParams,
        plan: &crate::solver::SolverOutput,
    ) -> Self {
        let symbol_size = slice.size_bytes;
        let pool = MemoryPool::new(1, params.l * symbol_size);
        let mut buf = SymbolBuffer::new(pool, params.l, symbol_size);
        for i in 0..k {
            let row_start = i * row_stride + slice.offset_bytes;
            let bytes = if row_start < block_data.len() {
                let row_end = (row_start + symbol_size).min(block_data.len());
                &block_data[row_start..row_end]
            } else {
                &[]
            };
            buf.copy_from(params.s + i, bytes);
        }
        plan.apply(&mut buf);

        Self {
            symbol_size,
            intermediate: buf,
        }
    }

    fn encode_one(&self, params: &SystematicParams, isi: u32) -> Vec<u8> {
        let mut out = vec![0u8; self.symbol_size];
        lt_encode(&self.intermediate, params, isi, &mut out);
        out
    }
}

struct SourceBlockEncoder {
    sbn: u8,
    k: usize,
    params: SystematicParams,
    sub_blocks: Vec<SubBlockEncoder>,
}

impl SourceBlockEncoder {
    fn build(
        sbn: u8,
        k: usize,
        block_data: &[u8],
        symbol_size: usize,
        slices: &[SubBlockSlice],
        config: &CodecConfig,
        plan_cache: &PlanCache,
    ) -> Result<Self> {
        let params = tables::lookup_k_prime(k).ok_or_else(|| {
            RaptorQError::invalid_config("source block exceeds maximum K'")
        })?;
        let plan = plan_cache.get_or_generate(&params, config.sparse_crossover_k_prime)?;

        let sub_blocks = slices
            .iter()
            .map(|&slice| {
                SubBlockEncoder::build(k, block_data, symbol_size, slice, &params, &plan)
            })
            .collect();

        log::debug!(
            "source block {} solved: K={} K'={} L={} sub-blocks={}",
            sbn,
            k,
            params.k_prime,
            params.l,
            slices.len()
        );

        Ok(Self {
            sbn,
            k,
            params,
            sub_blocks,
        })
    }

    fn encode_all(&self, repair_count: u32) -> Vec<EncodingPacket> {
        let total = self.k as u32 + repair_count;
        (0..total)
            .map(|esi| {
                let isi = esi_to_isi(esi, self.k as u32, self.params.k_prime as u32);
                let mut data = Vec::new();
                for sub in &self.sub_blocks {
                    data.extend_from_slice(&sub.encode_one(&self.params, isi));
                }
                EncodingPacket {
                    id: PayloadId { sbn: self.sbn, esi },
                    data,
                }
            })
            .collect()
    }
}

/// Encodes one object into source blocks, each independently solvable and
/// (optionally) solved in parallel across a `rayon` pool (§5).
pub struct Encoder {
    oti: ObjectTransmissionInformation,
    config: CodecConfig,
    plan_cache: PlanCache,
    blocks: Vec<SourceBlockEncoder>,
}

impl Encoder {
    /// Partitions `data` into source blocks of at most `MAX_K_PRIME` source
    /// symbols each, sized `symbol_size` bytes, each symbol further sliced
    /// into `num_sub_blocks` sub-symbols aligned to `symbol_alignment` bytes,
    /// and solves every (sub-)block's intermediate symbols up front.
    pub fn new(
        data: &[u8],
        symbol_size: u16,
        num_sub_blocks: u16,
        symbol_alignment: u8,
        config: CodecConfig,
    ) -> Result<Self> {
        if symbol_size == 0 {
            return Err(RaptorQError::invalid_config("symbol_size must be > 0"));
        }
        if data.is_empty() {
            return Err(RaptorQError::invalid_config("data must be non-empty"));
        }
        let slices = sub_block_partition(symbol_size, num_sub_blocks, symbol_alignment)?;

        let symbol_size = symbol_size as usize;
        let total_symbols = (data.len() + symbol_size - 1) / symbol_size;
        let max_k = tables::MAX_K_PRIME;
        let z = ((total_symbols + max_k - 1) / max_k).max(1);
        if z > u8::MAX as usize {
            return Err(RaptorQError::invalid_config(
                "object too large for this codec's source-block count",
            ));
        }
        let z = z as u8;

        let (jl, il, _js, is) = partition(total_symbols, z as usize);
        let oti = ObjectTransmissionInformation::new(
            data.len() as u64,
            symbol_size as u16,
            z,
            num_sub_blocks,
            symbol_alignment,
        )?;

        let plan_cache = PlanCache::new(config.plan_cache_capacity);
        let mut offset = 0usize;
        let mut blocks = Vec::with_capacity(z as usize);
        for sbn in 0..z as usize {
            let k = if sbn < jl { il } else { is };
            let start = offset * symbol_size;
            let end = (start + k * symbol_size).min(data.len());
            let slice = if start < data.len() { &data[start..end] } else { &[] };
            blocks.push(SourceBlockEncoder::build(
                sbn as u8,
                k,
                slice,
                symbol_size,
                &slices,
                &config,
                &plan_cache,
            )?);
            offset += k;
        }

        Ok(Self {
            oti,
            config,
            plan_cache,
            blocks,
        })
    }

    pub fn oti(&self) -> ObjectTransmissionInformation {
        self.oti
    }

    pub fn plan_cache(&self) -> &PlanCache {
        &self.plan_cache
    }

    /// Emits every source symbol plus `repair_per_block` repair symbols for
    /// each source block.
    pub fn encode(&self, repair_per_block: u32) -> Vec<EncodingPacket> {
        let produce = |block: &SourceBlockEncoder| block.encode_all(repair_per_block);
        let grouped: Vec<Vec<EncodingPacket>> = if self.config.parallel_blocks {
            self.blocks.par_iter().map(produce).collect()
        } else {
            self.blocks.iter().map(produce).collect()
        };
        grouped.into_iter().flatten().collect()
    }
}
