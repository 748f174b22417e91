//! Error types for the crypto engine and the training pipeline.

use crate::keys::Identity;

/// Failures raised by the CKKS engine.
///
/// Every variant is fatal for the current run: the shared table has no
/// rollback, so callers propagate these with `?` up to the binary.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CryptoError {
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("{values} values do not fit into {slots} slots")]
    SlotOverflow { values: usize, slots: usize },

    #[error("Level mismatch: {left} vs {right}")]
    LevelMismatch { left: usize, right: usize },

    #[error("Scale mismatch: {left} vs {right}")]
    ScaleMismatch { left: f64, right: f64 },

    #[error("Ciphertext has no level left to multiply")]
    LevelExhausted,

    #[error("No secret key for identity {0}")]
    MissingSecretKey(Identity),

    #[error("No public key for identity {0}")]
    UnknownIdentity(Identity),

    #[error("No relinearization key for pair ({0}, {1})")]
    MissingRelinKey(Identity, Identity),

    #[error("Duplicate identity {0}")]
    DuplicateIdentity(Identity),
}

/// Crate-level error.
#[derive(thiserror::Error, Debug)]
pub enum PprlError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Malformed indicator: {0}")]
    MalformedIndicator(String),

    #[error("Dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("Crypto engine error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config serialization: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T, E = PprlError> = std::result::Result<T, E>;
