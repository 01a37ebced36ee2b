//! Error types for descriptor construction and validation

use thiserror::Error;

/// Result type for descriptor operations
pub type Result<T> = std::result::Result<T, Error>;

/// Descriptor validation errors
#[derive(Debug, Clone, Error)]
pub enum Error {
    #[error("Machine name must not be empty")]
    EmptyName,

    #[error("Machine flist must not be empty")]
    EmptyFlist,

    #[error("Machine needs at least 1 vCPU, got {0}")]
    InvalidCpu(u32),

    #[error("Machine memory must be at least {min} MB, got {got}")]
    InsufficientMemory { min: u64, got: u64 },

    #[error("Invalid hex seed: expected {expected} hex characters, got {got}", expected = .1 * 2, got = .0.len())]
    InvalidSeed(String, usize),

    #[error("Invalid metadata: {0}")]
    InvalidMetadata(String),
}
