//! LRU-bounded cache of solver plans keyed by K′ (§4.8 "Plan caching").
//!
//! A plan is produced once per distinct K′ by solving the *canonical*
//! constraint system (LT rows for ISIs `0..K′` in order) and reused by every
//! block — encoding or decoding — whose received symbol set reduces to that
//! same canonical system. This is exactly the systematic, no-loss decode
//! case: receiving precisely the `K` source symbols plus the `K′-K`
//! zero-padding placeholders already matches the encoder's own LT ordering.

use crate::constraint::build_encoding_matrices;
use crate::error::Result;
use crate::field::tables::SystematicParams;
use crate::solver::{self, SolverOutput};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

struct Inner {
    capacity: usize,
    order: VecDeque<usize>,
    plans: HashMap<usize, Arc<SolverOutput>>,
}

/// Thread-safe, capacity-bounded cache of canonical solver plans.
pub struct PlanCache {
    inner: Mutex<Inner>,
}

impl PlanCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                capacity: capacity.max(1),
                order: VecDeque::new(),
                plans: HashMap::new(),
            }),
        }
    }

    /// Returns the cached canonical plan for `params.k_prime`, generating and
    /// inserting one if absent.
    pub fn get_or_generate(
        &self,
        params: &SystematicParams,
        sparse_crossover: usize,
    ) -> Result<Arc<SolverOutput>> {
        {
            let mut inner = self.inner.lock().unwrap();
            if let Some(plan) = inner.plans.get(&params.k_prime).cloned() {
                inner.order.retain(|&k| k != params.k_prime);
                inner.order.push_back(params.k_prime);
                return Ok(plan);
            }
        }

        let mut matrices = build_encoding_matrices(params, sparse_crossover);
        let plan = Arc::new(solver::solve(&mut matrices, params.k_prime)?);

        let mut inner = self.inner.lock().unwrap();
        if inner.plans.len() >= inner.capacity && !inner.plans.contains_key(&params.k_prime) {
            if let Some(evict) = inner.order.pop_front() {
                inner.plans.remove(&evict);
            }
        }
        inner.order.push_back(params.k_prime);
        inner.plans.insert(params.k_prime, plan.clone());
        Ok(plan)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().plans.len()
    }
}
