//! Error types for reconciliation

use thiserror::Error;

/// Result type for reconciliation operations
pub type Result<T> = std::result::Result<T, Error>;

/// Reconciliation errors
#[derive(Debug, Error)]
pub enum Error {
    /// Networks are torn down through the network path, never by name.
    #[error("Network workload {0} can't be deleted, remove the machines using it instead")]
    WorkloadDelete(String),

    #[error("Deployment has no network workload named {0}")]
    NetworkNotFound(String),

    #[error(transparent)]
    Network(#[from] grid_network::Error),

    #[error(transparent)]
    Descriptor(#[from] grid_zos::Error),
}
