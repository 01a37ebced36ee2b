//! Machine workload builder
//!
//! A configuration struct with explicit defaults replaces the long positional
//! parameter lists of ad-hoc workload construction. Validation happens once,
//! when the configuration is turned into a workload.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::machine::{ComputeCapacity, Machine, MachineKind, MachineNetwork, Mount};
use crate::seed::{generate_hex_seed, validate_hex_seed};
use crate::workload::{Workload, WorkloadData};
use crate::{Error, Result};

/// Mycelium seeds are 32 bytes of hex.
const MYCELIUM_SEED_BYTES: usize = 32;
/// Smallest memory reservation a node accepts.
const MIN_MEMORY_MB: u64 = 250;

/// A disk to create and mount into the machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiskSpec {
    pub name: String,
    pub mountpoint: String,
    /// In GB.
    pub size_gb: u64,
}

/// Every recognized machine option with its default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineSpec {
    pub name: String,
    pub flist: String,
    pub entrypoint: String,
    pub cpu: u32,
    /// In MB.
    pub memory_mb: u64,
    /// In GB.
    pub rootfs_gb: u64,
    pub disks: Vec<DiskSpec>,
    pub env: BTreeMap<String, String>,
    /// Name of the reserved public IP workload, empty for none.
    pub public_ip: String,
    pub planetary: bool,
    pub mycelium: bool,
    /// Generated when `mycelium` is set and no seed is supplied.
    pub mycelium_seed: Option<String>,
    pub gpus: Vec<String>,
    pub corex: bool,
    pub metadata: String,
    pub description: String,
    pub version: u32,
}

impl Default for MachineSpec {
    fn default() -> Self {
        Self {
            name: String::new(),
            flist: String::new(),
            entrypoint: "/sbin/zinit init".to_string(),
            cpu: 1,
            memory_mb: 256,
            rootfs_gb: 1,
            disks: Vec::new(),
            env: BTreeMap::new(),
            public_ip: String::new(),
            planetary: false,
            mycelium: false,
            mycelium_seed: None,
            gpus: Vec::new(),
            corex: false,
            metadata: String::new(),
            description: String::new(),
            version: 0,
        }
    }
}

impl MachineSpec {
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::EmptyName);
        }
        if self.flist.is_empty() {
            return Err(Error::EmptyFlist);
        }
        if self.cpu < 1 {
            return Err(Error::InvalidCpu(self.cpu));
        }
        if self.memory_mb < MIN_MEMORY_MB {
            return Err(Error::InsufficientMemory {
                min: MIN_MEMORY_MB,
                got: self.memory_mb,
            });
        }
        if let Some(seed) = &self.mycelium_seed {
            validate_hex_seed(seed, MYCELIUM_SEED_BYTES)?;
        }
        Ok(())
    }

    /// Build the machine workload of the requested kind, attached to
    /// `network_name` at `ip`.
    pub fn into_workload(self, kind: MachineKind, network_name: &str, ip: &str) -> Result<Workload> {
        self.validate()?;

        let mycelium_seed = if self.mycelium {
            Some(
                self.mycelium_seed
                    .unwrap_or_else(|| generate_hex_seed(MYCELIUM_SEED_BYTES)),
            )
        } else {
            None
        };
        let network = MachineNetwork::for_kind(
            kind,
            network_name,
            ip,
            self.planetary,
            &self.public_ip,
            mycelium_seed,
        );

        let machine = Machine {
            flist: self.flist,
            network,
            size: self.rootfs_gb * 1024u64.pow(3),
            compute_capacity: ComputeCapacity {
                cpu: self.cpu,
                memory: self.memory_mb * 1024u64.pow(2),
            },
            mounts: self
                .disks
                .iter()
                .map(|disk| Mount {
                    name: disk.name.clone(),
                    mountpoint: disk.mountpoint.clone(),
                })
                .collect(),
            entrypoint: self.entrypoint,
            env: self.env,
            corex: self.corex,
            gpu: self.gpus,
        };

        let data = match kind {
            MachineKind::Standard => WorkloadData::Machine(machine),
            MachineKind::Light => WorkloadData::MachineLight(machine),
        };
        let mut workload = Workload::new(self.version, self.name, data);
        workload.metadata = self.metadata;
        workload.description = self.description;
        Ok(workload)
    }
}
