use thiserror::Error;

/// Typed error surface for the RaptorQ core engine.
///
/// Field arithmetic and matrix primitives are infallible; everything that can
/// fail funnels through one of these variants so callers and logs get
/// structured context instead of ad hoc strings.
#[derive(Debug, Error)]
pub enum RaptorQError {
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("singular constraint matrix for K'={k_prime} in phase {phase}")]
    SingularMatrix { k_prime: usize, phase: u8 },

    #[error("source block {sbn} has {received}/{needed} symbols")]
    InsufficientSymbols {
        sbn: u8,
        received: usize,
        needed: usize,
    },

    #[error("allocation failure: {reason}")]
    AllocationFailure { reason: String },
}

impl RaptorQError {
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        RaptorQError::InvalidConfig {
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RaptorQError>;
