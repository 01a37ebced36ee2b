//! Machine workload payloads
//!
//! One payload shape covers both the standard and the light machine kind.
//! The kind-specific sub-fields (`public_ip`, `planetary`) are options that a
//! single factory populates; the light kind never carries them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::Challenge;

/// Discriminator between the standard and the light machine variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MachineKind {
    Standard,
    Light,
}

/// One attachment of a machine to a private network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineInterface {
    /// Name of the network workload this interface joins.
    pub network: String,
    /// Host address inside the node's subnet of that network.
    pub ip: String,
}

impl Challenge for MachineInterface {
    fn challenge(&self) -> String {
        format!("{}{}", self.network, self.ip)
    }
}

/// Mycelium overlay attachment for a machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MyceliumIp {
    pub network: String,
    pub hex_seed: String,
}

/// Network section of a machine payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MachineNetwork {
    /// Name of the reserved public IP workload, empty when none.
    /// Standard kind only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_ip: Option<String>,
    /// Standard kind only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub planetary: Option<bool>,
    #[serde(default)]
    pub interfaces: Vec<MachineInterface>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mycelium: Option<MyceliumIp>,
}

impl MachineNetwork {
    /// Build the kind-specific network payload.
    pub fn for_kind(
        kind: MachineKind,
        network_name: &str,
        ip: &str,
        planetary: bool,
        public_ip: &str,
        mycelium_seed: Option<String>,
    ) -> Self {
        let mycelium = mycelium_seed.map(|hex_seed| MyceliumIp {
            network: network_name.to_string(),
            hex_seed,
        });
        let interfaces = vec![MachineInterface {
            network: network_name.to_string(),
            ip: ip.to_string(),
        }];
        match kind {
            MachineKind::Standard => Self {
                public_ip: Some(public_ip.to_string()),
                planetary: Some(planetary),
                interfaces,
                mycelium,
            },
            MachineKind::Light => Self {
                public_ip: None,
                planetary: None,
                interfaces,
                mycelium,
            },
        }
    }

    /// Name of the reserved public IP workload, if any.
    pub fn public_ip_name(&self) -> Option<&str> {
        self.public_ip.as_deref().filter(|name| !name.is_empty())
    }
}

impl Challenge for MachineNetwork {
    fn challenge(&self) -> String {
        let mut out = String::new();
        if let Some(public_ip) = &self.public_ip {
            out.push_str(public_ip);
        }
        if let Some(planetary) = self.planetary {
            out.push_str(&planetary.to_string());
        }
        for iface in &self.interfaces {
            out.push_str(&iface.challenge());
        }
        if let Some(mycelium) = &self.mycelium {
            out.push_str(&mycelium.network);
            out.push_str(&mycelium.hex_seed);
        }
        out
    }
}

/// CPU and memory reservation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputeCapacity {
    pub cpu: u32,
    /// In bytes.
    pub memory: u64,
}

impl Challenge for ComputeCapacity {
    fn challenge(&self) -> String {
        format!("{}{}", self.cpu, self.memory)
    }
}

/// Attachment of a disk workload to a machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mount {
    /// Name of the zmount/volume workload.
    pub name: String,
    pub mountpoint: String,
}

impl Challenge for Mount {
    fn challenge(&self) -> String {
        format!("{}{}", self.name, self.mountpoint)
    }
}

/// Machine payload, shared by the standard and light kinds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Machine {
    pub flist: String,
    pub network: MachineNetwork,
    /// Root filesystem size in bytes.
    pub size: u64,
    pub compute_capacity: ComputeCapacity,
    #[serde(default)]
    pub mounts: Vec<Mount>,
    pub entrypoint: String,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub corex: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub gpu: Vec<String>,
}

impl Challenge for Machine {
    fn challenge(&self) -> String {
        let mut out = String::new();
        out.push_str(&self.flist);
        out.push_str(&self.network.challenge());
        out.push_str(&self.size.to_string());
        out.push_str(&self.compute_capacity.challenge());
        for mount in &self.mounts {
            out.push_str(&mount.challenge());
        }
        out.push_str(&self.entrypoint);
        // BTreeMap iterates keys in sorted order, which the node relies on.
        for (key, value) in &self.env {
            out.push_str(key);
            out.push('=');
            out.push_str(value);
        }
        for gpu in &self.gpu {
            out.push_str(gpu);
        }
        out
    }
}
