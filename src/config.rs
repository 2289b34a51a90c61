//! Tuning knobs the base RFC 6330 algorithm leaves as implementation
//! choices: the dense/sparse matrix crossover, solver-plan cache capacity,
//! and whether independent source blocks solve in parallel. None of these
//! change wire format or decoded output — only how fast the engine gets
//! there.

use serde::Deserialize;

/// Runtime configuration for the codec.
///
/// `CodecConfig::default()` reproduces this codec's standard fixed
/// behaviour exactly; loading one from TOML only adjusts the tuning knobs
/// below.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecConfig {
    /// K' at or above which the constraint binary matrix uses the sparse
    /// representation instead of dense bit-packed storage.
    pub sparse_crossover_k_prime: usize,
    /// Maximum number of distinct-K' solver plans kept in the cache.
    pub plan_cache_capacity: usize,
    /// Fan independent source-block solves out across a worker pool.
    pub parallel_blocks: bool,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            sparse_crossover_k_prime: 2000,
            plan_cache_capacity: 8,
            parallel_blocks: true,
        }
    }
}

impl CodecConfig {
    /// Parses a config from a TOML document under a `[raptorq]` table.
    /// Any field left out keeps its default value.
    pub fn from_toml(s: &str) -> Result<Self, Box<dyn std::error::Error>> {
        #[derive(Deserialize)]
        struct Root {
            raptorq: Section,
        }

        #[derive(Deserialize)]
        struct Section {
            sparse_crossover_k_prime: Option<usize>,
            plan_cache_capacity: Option<usize>,
            parallel_blocks: Option<bool>,
        }

        let root: Root = toml::from_str(s)?;
        let defaults = Self::default();
        Ok(Self {
            sparse_crossover_k_prime: root
                .raptorq
                .sparse_crossover_k_prime
                .unwrap_or(defaults.sparse_crossover_k_prime),
            plan_cache_capacity: root
                .raptorq
                .plan_cache_capacity
                .unwrap_or(defaults.plan_cache_capacity),
            parallel_blocks: root
                .raptorq
                .parallel_blocks
                .unwrap_or(defaults.parallel_blocks),
        })
    }

    /// Loads a config from a TOML file on disk.
    pub fn from_file(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }
}
