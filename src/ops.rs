//! `SymbolOp` and `OperationVector`: the recorded, replayable row-level
//! operations the solver emits during Phase 1-3 elimination instead of
//! mutating a caller's symbol buffer directly (§4.6, §9 "Recorded operation
//! vectors").

use crate::symbol::SymbolBuffer;

/// One row-level operation over logical (pre-solve) intermediate-symbol
/// indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolOp {
    AddAssign { src: usize, dst: usize },
    MulAssign { idx: usize, scalar: u8 },
    Fma { src: usize, dst: usize, scalar: u8 },
    Reorder { src: usize, dst: usize },
}

/// An append-only, then replay-only, list of `SymbolOp`.
#[derive(Debug, Clone, Default)]
pub struct OperationVector {
    ops: Vec<SymbolOp>,
}

impl OperationVector {
    pub fn new() -> Self {
        Self { ops: Vec::new() }
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self {
            ops: Vec::with_capacity(cap),
        }
    }

    pub fn push(&mut self, op: SymbolOp) {
        self.ops.push(op);
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn as_slice(&self) -> &[SymbolOp] {
        &self.ops
    }

    /// Replays every recorded op, in order, against `buf`.
    pub fn replay(&self, buf: &mut SymbolBuffer) {
        for op in &self.ops {
            match *op {
                SymbolOp::AddAssign { src, dst } => buf.add_assign(dst, src),
                SymbolOp::MulAssign { idx, scalar } => buf.mul_assign(idx, scalar),
                SymbolOp::Fma { src, dst, scalar } => buf.fma(dst, src, scalar),
                SymbolOp::Reorder { src, dst } => buf.swap(src, dst),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimize::MemoryPool;

    #[test]
    fn replay_add_assign_matches_direct_call() {
        let pool = MemoryPool::new(1, 2 * 4);
        let mut direct = SymbolBuffer::new(pool.clone(), 2, 4);
        direct.copy_from(0, &[1, 2, 3, 4]);
        direct.copy_from(1, &[5, 6, 7, 8]);

        let mut via_ops = SymbolBuffer::new(pool, 2, 4);
        via_ops.copy_from(0, &[1, 2, 3, 4]);
        via_ops.copy_from(1, &[5, 6, 7, 8]);

        direct.add_assign(0, 1);

        let mut ops = OperationVector::new();
        ops.push(SymbolOp::AddAssign { src: 1, dst: 0 });
        ops.replay(&mut via_ops);

        assert_eq!(direct.get_const(0), via_ops.get_const(0));
    }
}
