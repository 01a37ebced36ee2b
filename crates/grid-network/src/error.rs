//! Error types for the network core

use std::net::Ipv4Addr;

use ipnet::Ipv4Net;
use thiserror::Error;

/// Result type for network operations
pub type Result<T> = std::result::Result<T, Error>;

/// Network core errors
#[derive(Debug, Clone, Error)]
pub enum Error {
    // Range and subnet validation
    #[error("Invalid CIDR: {0}")]
    InvalidCidr(String),

    #[error("Network ip_range should be a private range, got {0}")]
    NotPrivateRange(String),

    #[error("No free /24 subnets left in {0}")]
    SubnetExhausted(Ipv4Net),

    #[error("Subnet {0} is not free")]
    SubnetNotFree(Ipv4Net),

    #[error("Node subnet must be a /24, got {0}")]
    InvalidSubnetPrefix(Ipv4Net),

    #[error("Subnet {subnet} is not within network range {range}")]
    SubnetOutOfRange { subnet: Ipv4Net, range: Ipv4Net },

    // Host address allocation
    #[error("No free addresses left in subnet {0}")]
    IpExhausted(Ipv4Net),

    #[error("Selected ip {ip} is not available in node subnet {subnet}")]
    IpNotInSubnet { ip: Ipv4Addr, subnet: Ipv4Net },

    // Node membership
    #[error("node_id or subnet must be specified")]
    UnknownNode,

    #[error("Node {0} is not in the network, add it first")]
    NodeNotInNetwork(u32),

    // Mycelium overlay
    #[error("Another mycelium seed is used for network {network} on node {node_id}")]
    SeedMismatch { network: String, node_id: u32 },

    #[error(transparent)]
    Descriptor(#[from] grid_zos::Error),

    // External collaborators
    #[error("{context}: {message}")]
    Transport { context: String, message: String },

    #[error("Malformed deployment data: {0}")]
    DeploymentData(String),
}

impl Error {
    /// Wrap any error with a human-readable prefix naming the failed
    /// operation, keeping the original message.
    pub fn context(self, context: impl Into<String>) -> Self {
        match self {
            Error::Transport {
                context: inner,
                message,
            } => Error::Transport {
                context: format!("{}: {}", context.into(), inner),
                message,
            },
            other => Error::Transport {
                context: context.into(),
                message: other.to_string(),
            },
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::DeploymentData(e.to_string())
    }
}
