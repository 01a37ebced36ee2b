//! Logical network state
//!
//! A `LogicalNetwork` is the in-memory view of one named private network
//! spanning one or more nodes. It owns the address allocator, the current
//! node's membership, and the deployments discovered on-chain. One node is
//! modelled richly at a time; other participants are reachable through
//! `deployments`.

use std::collections::BTreeSet;
use std::net::Ipv4Addr;
use std::sync::Arc;

use ipnet::Ipv4Net;
use parking_lot::RwLock;
use serde::Deserialize;
use tracing::{debug, info};

use grid_zos::{
    generate_hex_seed, validate_hex_seed, Deployment, Mycelium, NetworkLight, Workload,
    WorkloadData,
};

use crate::allocator::{next_free_ip, normalize_range, AddressAllocator};
use crate::client::{ChainDirectory, NodeTransport, NETWORK_LIGHT_TYPE};
use crate::membership::MembershipTracker;
use crate::session::ContractSession;
use crate::{Error, Result};

/// Shared handle to a network, held by every emitted operation that touches
/// it. Mutations go through the handle; deployments are refreshed with
/// `update_network_deployments`.
pub type NetworkHandle = Arc<RwLock<LogicalNetwork>>;

/// One node's stake in a network.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeMembership {
    pub node_id: u32,
    pub contract_id: u64,
    pub reserved_ips: BTreeSet<Ipv4Addr>,
}

/// Standard networks can designate access-point nodes as externally
/// reachable ingress; the light variant never does.
#[derive(Debug, Clone, PartialEq)]
pub enum NetworkKind {
    Standard { access_points: Vec<u32> },
    Light,
}

impl NetworkKind {
    pub fn standard() -> Self {
        NetworkKind::Standard {
            access_points: Vec::new(),
        }
    }

    pub fn is_light(&self) -> bool {
        matches!(self, NetworkKind::Light)
    }
}

/// Options for adding a node to a network.
#[derive(Debug, Clone, Default)]
pub struct AddNodeOptions {
    /// Caller-chosen subnet; allocated from the range when absent.
    pub subnet: Option<Ipv4Net>,
    pub mycelium: bool,
    pub mycelium_seed: Option<String>,
    pub description: String,
}

/// A user-supplied mycelium seed pinned to one node.
#[derive(Debug, Clone, PartialEq)]
pub struct MyceliumSeed {
    pub node_id: u32,
    pub seed: String,
}

/// Network workload metadata, as written by deployers that grant access.
#[derive(Debug, Default, Deserialize)]
struct NetworkMeta {
    #[serde(default)]
    user_accesses: Vec<UserAccess>,
}

#[derive(Debug, Deserialize)]
struct UserAccess {
    node_id: u32,
}

/// The in-memory representation of one named private network.
pub struct LogicalNetwork {
    name: String,
    kind: NetworkKind,
    allocator: AddressAllocator,
    node: Option<NodeMembership>,
    node_ids: Vec<u32>,
    deployments: Vec<Deployment>,
    data: Option<NetworkLight>,
    tracker: MembershipTracker,
    directory: Arc<dyn ChainDirectory>,
    transport: Arc<dyn NodeTransport>,
    loaded: bool,
}

impl std::fmt::Debug for LogicalNetwork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogicalNetwork")
            .field("name", &self.name)
            .field("ip_range", &self.allocator.range())
            .field("kind", &self.kind)
            .field("node_ids", &self.node_ids)
            .field("deployments", &self.deployments.len())
            .finish()
    }
}

impl LogicalNetwork {
    /// Build a network over `ip_range`, normalized to a private /16.
    pub fn new(
        name: impl Into<String>,
        ip_range: &str,
        kind: NetworkKind,
        directory: Arc<dyn ChainDirectory>,
        transport: Arc<dyn NodeTransport>,
        session: Arc<ContractSession>,
    ) -> Result<Self> {
        let range = normalize_range(ip_range)?;
        let tracker = MembershipTracker::new(directory.clone(), session, NETWORK_LIGHT_TYPE);
        Ok(Self {
            name: name.into(),
            kind,
            allocator: AddressAllocator::new(range),
            node: None,
            node_ids: Vec::new(),
            deployments: Vec::new(),
            data: None,
            tracker,
            directory,
            transport,
            loaded: false,
        })
    }

    pub fn into_handle(self) -> NetworkHandle {
        Arc::new(RwLock::new(self))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ip_range(&self) -> Ipv4Net {
        self.allocator.range()
    }

    pub fn kind(&self) -> &NetworkKind {
        &self.kind
    }

    pub fn node_ids(&self) -> &[u32] {
        &self.node_ids
    }

    pub fn node_count(&self) -> usize {
        self.node_ids.len()
    }

    pub fn deployments(&self) -> &[Deployment] {
        &self.deployments
    }

    /// Deployments held by this network for a given contract.
    pub fn contract_deployments(&self, contract_id: u64) -> Vec<Deployment> {
        self.deployments
            .iter()
            .filter(|d| d.contract_id == contract_id)
            .cloned()
            .collect()
    }

    pub fn node_exists(&self, node_id: u32) -> bool {
        self.node_ids.contains(&node_id)
    }

    /// The subnet assigned to `node_id`, when it is the current node.
    pub fn node_subnet(&self, node_id: u32) -> Option<Ipv4Net> {
        let data = self.data.as_ref()?;
        if data.node_id != node_id {
            return None;
        }
        data.subnet.parse().ok()
    }

    /// Whether `node_id` is this network's externally reachable ingress.
    pub fn has_access_point(&self, node_id: u32) -> bool {
        match &self.kind {
            NetworkKind::Standard { access_points } => access_points.contains(&node_id),
            NetworkKind::Light => false,
        }
    }

    pub fn add_access_point(&mut self, node_id: u32) {
        if let NetworkKind::Standard { access_points } = &mut self.kind {
            if !access_points.contains(&node_id) {
                access_points.push(node_id);
            }
        }
    }

    /// Add a node to the network, handing it a subnet. Returns the network
    /// workload for the node's deployment, or `None` when the node already
    /// participates.
    pub fn add_node(&mut self, node_id: u32, opts: AddNodeOptions) -> Result<Option<Workload>> {
        if self.node_exists(node_id) {
            return Ok(None);
        }
        info!(node_id, network = %self.name, "adding node to network");

        let subnet = match opts.subnet {
            Some(subnet) => self.allocator.reserve_subnet(subnet)?,
            None => self.allocator.free_subnet()?,
        };

        let mycelium = if opts.mycelium {
            let hex_key = match opts.mycelium_seed {
                Some(seed) => {
                    validate_hex_seed(&seed, 32)?;
                    seed
                }
                None => generate_hex_seed(32),
            };
            Some(Mycelium {
                hex_key,
                peers: Vec::new(),
            })
        } else {
            None
        };

        let data = NetworkLight {
            subnet: subnet.to_string(),
            ip_range: self.allocator.range().to_string(),
            node_id,
            mycelium,
        };
        self.data = Some(data.clone());
        self.update_network_deployments();

        let mut workload = Workload::new(0, self.name.clone(), WorkloadData::NetworkLight(data));
        workload.description = opts.description;

        self.node = Some(NodeMembership {
            node_id,
            contract_id: 0,
            reserved_ips: BTreeSet::new(),
        });
        self.node_ids.push(node_id);
        Ok(Some(workload))
    }

    /// Load the network's state from its on-chain contract history.
    ///
    /// Memoized; pass `force` to refetch after submitting operations.
    pub async fn load(&mut self, force: bool) -> Result<()> {
        if self.loaded && !force {
            return Ok(());
        }
        if !self.tracker.network_exists(&self.name).await? {
            self.loaded = true;
            return Ok(());
        }

        self.node_ids = self.tracker.participating_nodes(&self.name, false).await?;
        self.deployments.clear();

        let contracts = self.tracker.network_contracts(&self.name, false).await?;
        for contract in contracts {
            let twin_id = self.directory.node_twin_id(contract.node_id).await?;
            let deployment = self
                .transport
                .deployment_get(twin_id, contract.contract_id)
                .await?;

            for workload in &deployment.workloads {
                let Some(payload) = workload.data.as_network() else {
                    continue;
                };
                if workload.name != self.name || workload.is_deleted() {
                    continue;
                }

                let reserved_ips = self
                    .transport
                    .list_private_ips(twin_id, contract.node_id, &self.name)
                    .await?;

                let mut data = payload.clone();
                data.node_id = contract.node_id;
                if let Ok(subnet) = data.subnet.parse::<Ipv4Net>() {
                    self.allocator.record_subnet(subnet);
                }
                self.record_access_points(&workload.metadata);

                self.node = Some(NodeMembership {
                    node_id: contract.node_id,
                    contract_id: contract.contract_id,
                    reserved_ips: reserved_ips.into_iter().collect(),
                });
                self.data = Some(data);
                self.deployments.push(deployment.clone());
                break;
            }
        }

        self.loaded = true;
        debug!(network = %self.name, nodes = self.node_ids.len(), "network loaded");
        Ok(())
    }

    fn record_access_points(&mut self, metadata: &str) {
        if self.kind.is_light() || metadata.is_empty() {
            return;
        }
        let meta: NetworkMeta = serde_json::from_str(metadata).unwrap_or_default();
        for access in meta.user_accesses {
            self.add_access_point(access.node_id);
        }
    }

    /// Reserve the next free host address for `node_id`, or inside
    /// `subnet_override` when the node's own subnet is unknown.
    pub fn free_ip(&mut self, node_id: u32, subnet_override: Option<Ipv4Net>) -> Result<Ipv4Addr> {
        let subnet = match self.node_subnet(node_id) {
            Some(subnet) => subnet,
            None => subnet_override.ok_or(Error::UnknownNode)?,
        };

        let taken = match &self.node {
            Some(node) if node.node_id == node_id => node.reserved_ips.clone(),
            _ => BTreeSet::new(),
        };
        let ip = next_free_ip(subnet, &taken)?;

        match &mut self.node {
            Some(node) if node.node_id == node_id => {
                node.reserved_ips.insert(ip);
                Ok(ip)
            }
            _ => Err(Error::NodeNotInNetwork(node_id)),
        }
    }

    /// Accept a caller-chosen address after checking it sits in the node's
    /// subnet.
    pub fn validate_user_ip(&mut self, node_id: u32, ip: Ipv4Addr) -> Result<Ipv4Addr> {
        let subnet = self.node_subnet(node_id).ok_or(Error::UnknownNode)?;
        if !subnet.contains(&ip) {
            return Err(Error::IpNotInSubnet { ip, subnet });
        }
        match &mut self.node {
            Some(node) if node.node_id == node_id => {
                node.reserved_ips.insert(ip);
                Ok(ip)
            }
            _ => Err(Error::NodeNotInNetwork(node_id)),
        }
    }

    /// Release a host address. Idempotent; always echoes the address back.
    pub fn release_ip(&mut self, node_id: u32, ip: Ipv4Addr) -> Ipv4Addr {
        if let Some(node) = &mut self.node {
            if node.node_id == node_id && node.reserved_ips.remove(&ip) {
                debug!(node_id, %ip, network = %self.name, "released reserved ip");
            }
        }
        ip
    }

    pub fn reserved_ip_count(&self, node_id: u32) -> usize {
        match &self.node {
            Some(node) if node.node_id == node_id => node.reserved_ips.len(),
            _ => 0,
        }
    }

    pub fn node_reserved_ips(&self, node_id: u32) -> Vec<Ipv4Addr> {
        match &self.node {
            Some(node) if node.node_id == node_id => node.reserved_ips.iter().copied().collect(),
            _ => Vec::new(),
        }
    }

    /// Drop a node from the network. Returns the node's contract id when it
    /// was the current node context, 0 otherwise (contract id 0 is unused
    /// on-chain and acts as a "not found" sentinel).
    pub fn delete_node(&mut self, node_id: u32) -> u64 {
        info!(node_id, network = %self.name, "deleting node from network");

        let mut contract_id = 0;
        if let Some(node) = &self.node {
            if node.node_id == node_id {
                contract_id = node.contract_id;
                self.node = None;
            }
        }
        self.node_ids.retain(|id| *id != node_id);

        let current_subnet = self
            .data
            .as_ref()
            .and_then(|data| data.subnet.parse::<Ipv4Net>().ok());
        self.allocator.retain_only(current_subnet);

        contract_id
    }

    /// Push the current network payload into every held deployment whose
    /// network workload matches by subnet. This is the single authoritative
    /// mutation path for the shared payload.
    pub fn update_network_deployments(&mut self) {
        let Some(data) = self.data.clone() else {
            return;
        };
        for deployment in &mut self.deployments {
            for workload in &mut deployment.workloads {
                if let WorkloadData::NetworkLight(payload) = &mut workload.data {
                    if payload.subnet == data.subnet {
                        *payload = data.clone();
                        break;
                    }
                }
            }
        }
    }

    /// Refresh a network workload in place: current payload, and a metadata
    /// version bump when it belongs to the current node.
    pub fn update_workload(&self, node_id: u32, mut workload: Workload) -> Workload {
        if let (Some(data), WorkloadData::NetworkLight(payload)) =
            (&self.data, &mut workload.data)
        {
            if payload.subnet == data.subnet {
                *payload = data.clone();
            }
        }
        if let Some(node) = &self.node {
            if node.node_id == node_id {
                let mut meta: serde_json::Value = serde_json::from_str(&workload.metadata)
                    .unwrap_or_else(|_| serde_json::json!({}));
                meta["version"] = serde_json::json!(4);
                workload.metadata = meta.to_string();
            }
        }
        workload
    }

    /// Make sure the overlay seed is consistent, enabling the overlay late
    /// when the network was deployed without one. Returns the refreshed
    /// deployment to resubmit, if any.
    pub fn ensure_mycelium(
        &mut self,
        node_id: u32,
        seeds: &[MyceliumSeed],
    ) -> Result<Option<Deployment>> {
        let Some(data) = &self.data else {
            return Ok(None);
        };
        let requested = seeds.iter().find(|s| s.node_id == node_id);

        if let Some(mycelium) = &data.mycelium {
            if let Some(requested) = requested {
                if requested.seed != mycelium.hex_key {
                    return Err(Error::SeedMismatch {
                        network: self.name.clone(),
                        node_id,
                    });
                }
            }
            return Ok(None);
        }

        let hex_key = match requested {
            Some(requested) => {
                validate_hex_seed(&requested.seed, 32)?;
                requested.seed.clone()
            }
            None => generate_hex_seed(32),
        };
        if let Some(data) = &mut self.data {
            data.mycelium = Some(Mycelium {
                hex_key,
                peers: Vec::new(),
            });
        }
        self.update_network_deployments();

        for deployment in &self.deployments {
            let holds_node_network = deployment.workloads.iter().any(|w| {
                w.data
                    .as_network()
                    .is_some_and(|payload| payload.node_id == node_id)
            });
            if !holds_node_network {
                continue;
            }
            let mut refreshed = deployment.clone();
            for workload in &mut refreshed.workloads {
                if let (Some(data), WorkloadData::NetworkLight(payload)) =
                    (&self.data, &mut workload.data)
                {
                    *payload = data.clone();
                    workload.version += 1;
                }
            }
            return Ok(Some(refreshed));
        }
        Ok(None)
    }
}
