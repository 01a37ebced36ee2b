//! Typed zos deployment descriptors
//!
//! Models the workload tree submitted to grid nodes:
//! - `Workload` and the kind-specific payloads (machine, network, storage, gateway)
//! - `Deployment` with its canonical challenge string and MD5 challenge hash
//! - Signature requirements and the `Signer` seam for external key management
//! - `MachineSpec`, a validated configuration struct for building machine workloads

pub mod builder;
pub mod deployment;
pub mod error;
pub mod gateway;
pub mod machine;
pub mod network;
pub mod seed;
pub mod storage;
pub mod workload;

pub use builder::{DiskSpec, MachineSpec};
pub use deployment::{
    Deployment, KeypairType, Signature, SignatureRequest, SignatureRequirement, Signer,
};
pub use error::{Error, Result};
pub use gateway::{GatewayFqdnProxy, GatewayNameProxy, PublicIp, Zlogs};
pub use machine::{
    ComputeCapacity, Machine, MachineInterface, MachineKind, MachineNetwork, Mount, MyceliumIp,
};
pub use network::{Mycelium, NetworkLight};
pub use seed::{generate_hex_seed, validate_hex_seed};
pub use storage::{Qsfs, Zdb, ZdbMode, Zmount};
pub use workload::{ResultState, Workload, WorkloadData, WorkloadResult, WorkloadType};

/// Anything that contributes to a deployment's canonical challenge string.
///
/// The concatenation of every field, in declaration order, is hashed and
/// signed; the node recomputes the same string to verify integrity.
pub trait Challenge {
    fn challenge(&self) -> String;
}
