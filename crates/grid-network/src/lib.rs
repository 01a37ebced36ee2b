//! Network provisioning core
//!
//! Manages the address space and membership of logical private networks laid
//! over grid nodes:
//! - `AddressAllocator` carves per-node /24 subnets out of a /16 range and
//!   hands out host addresses inside them
//! - `MembershipTracker` derives the node list of a network from on-chain
//!   contracts, merged with a `ContractSession`'s pending and deleted sets
//! - `LogicalNetwork` ties both together and holds the deployments found for
//!   the network, behind a shared `NetworkHandle`
//!
//! The chain and the node message bus are reached through the
//! `ChainDirectory` and `NodeTransport` seams; this crate never talks to the
//! wire itself.

pub mod allocator;
pub mod client;
pub mod error;
pub mod membership;
pub mod network;
pub mod session;

pub use allocator::{next_free_ip, normalize_range, AddressAllocator, RANGE_PREFIX, SUBNET_PREFIX};
pub use client::{ChainDirectory, DeploymentData, NodeContract, NodeTransport, NETWORK_LIGHT_TYPE};
pub use error::{Error, Result};
pub use membership::MembershipTracker;
pub use network::{
    AddNodeOptions, LogicalNetwork, MyceliumSeed, NetworkHandle, NetworkKind, NodeMembership,
};
pub use session::ContractSession;
