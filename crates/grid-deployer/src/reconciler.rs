//! Deployment reconciliation
//!
//! Turns a "delete these workloads" request against a deployed contract into
//! the minimal list of twin deployment operations. Network bookkeeping rides
//! along: host addresses are released, nodes whose last reservation is gone
//! are dropped from their network, and deployments on other contracts that
//! only held the network workload get their own delete or update operations.
//!
//! A pass performs no compensating rollback. Errors from the chain or the
//! transport propagate as-is and leave the submitted prefix of operations in
//! place; callers retry the whole pass against refetched state.

use std::collections::{HashMap, HashSet};
use std::net::Ipv4Addr;
use std::sync::Arc;

use tracing::{debug, info};

use grid_network::{
    ChainDirectory, ContractSession, LogicalNetwork, NetworkHandle, NetworkKind, NodeTransport,
};
use grid_zos::{Deployment, MachineKind, Workload, WorkloadType};

use crate::differ::split_workloads;
use crate::models::{Operation, TwinDeployment};
use crate::{Error, Result};

/// Orchestrates one delete/shrink pass over a deployed contract.
pub struct Reconciler {
    directory: Arc<dyn ChainDirectory>,
    transport: Arc<dyn NodeTransport>,
    session: Arc<ContractSession>,
    /// Networks loaded during this pass, keyed by name.
    networks: HashMap<String, NetworkHandle>,
}

impl Reconciler {
    pub fn new(
        directory: Arc<dyn ChainDirectory>,
        transport: Arc<dyn NodeTransport>,
        session: Arc<ContractSession>,
    ) -> Self {
        Self {
            directory,
            transport,
            session,
            networks: HashMap::new(),
        }
    }

    /// Networks touched by the pass, for callers that want to inspect or
    /// reuse the loaded state.
    pub fn network(&self, name: &str) -> Option<NetworkHandle> {
        self.networks.get(name).cloned()
    }

    /// Compute the operations that remove `names` (every machine when empty)
    /// from the deployment bound to `deployment.contract_id`. `types` limits
    /// which workload kinds name-based removal may touch, usually
    /// [`default_delete_types`](crate::differ::default_delete_types).
    pub async fn delete_workloads(
        &mut self,
        deployment: &Deployment,
        names: &[String],
        types: &[WorkloadType],
    ) -> Result<Vec<TwinDeployment>> {
        for workload_type in types {
            if workload_type.is_network() {
                return Err(Error::WorkloadDelete(workload_type.as_str().to_string()));
            }
        }
        for name in names {
            let is_network = deployment
                .workloads
                .iter()
                .any(|w| w.workload_type().is_network() && &w.name == name);
            if is_network {
                return Err(Error::WorkloadDelete(name.clone()));
            }
        }

        let node_id = self
            .directory
            .node_id_from_contract(deployment.contract_id)
            .await?;
        let twin_id = self.directory.node_twin_id(node_id).await?;
        let canonical = self
            .transport
            .deployment_get(twin_id, deployment.contract_id)
            .await?;
        info!(
            contract_id = canonical.contract_id,
            node_id,
            names = ?names,
            "reconciling workload removal"
        );

        let (mut remaining, removed) = split_workloads(&canonical.workloads, names, types);

        if remaining.is_empty() && removed.is_empty() {
            self.session.mark_deleted(canonical.contract_id);
            return Ok(vec![TwinDeployment::new(
                canonical,
                Operation::Delete,
                node_id,
                None,
            )]);
        }

        let mut ops = Vec::new();
        let mut emitted_deletes = HashSet::new();

        for workload in &removed {
            let Some((kind, machine)) = workload.data.as_machine() else {
                continue;
            };
            let Some(iface) = machine.network.interfaces.first() else {
                continue;
            };
            let handle = self.network_for(&canonical, &iface.network, kind).await?;

            let mut net = handle.write();
            if let Ok(ip) = iface.ip.parse::<Ipv4Addr>() {
                net.release_ip(node_id, ip);
            }
            if net.reserved_ip_count(node_id) > 0 {
                debug!(node_id, network = %iface.network, "node keeps other reservations");
                continue;
            }
            if net.has_access_point(node_id) && net.node_count() > 1 {
                debug!(node_id, network = %iface.network, "node is an access point with dependents");
                continue;
            }

            let freed = net.delete_node(node_id);
            if freed == canonical.contract_id {
                shrink_network_out(&mut remaining, &iface.network);
            } else if freed != 0 {
                self.emit_for_contract(
                    &net,
                    &handle,
                    freed,
                    &iface.network,
                    &mut ops,
                    &mut emitted_deletes,
                );
            }
        }

        // A network left with one reservation-free node collapses too.
        let handles: Vec<NetworkHandle> = self.networks.values().cloned().collect();
        for handle in handles {
            let mut net = handle.write();
            let sole_node = match net.node_ids() {
                [node] => *node,
                _ => continue,
            };
            if net.reserved_ip_count(sole_node) > 0 {
                continue;
            }
            let network_name = net.name().to_string();
            let freed = net.delete_node(sole_node);
            if freed == canonical.contract_id {
                shrink_network_out(&mut remaining, &network_name);
            } else if freed != 0 {
                self.emit_for_contract(
                    &net,
                    &handle,
                    freed,
                    &network_name,
                    &mut ops,
                    &mut emitted_deletes,
                );
            }
        }

        // Attach the network the main deployment itself references, in its
        // own workload order, never an arbitrary handle from the memo map.
        let network = canonical
            .workloads
            .iter()
            .filter(|w| w.workload_type().is_network())
            .find_map(|w| self.networks.get(&w.name).cloned());
        if remaining.is_empty() {
            if emitted_deletes.insert(canonical.contract_id) {
                self.session.mark_deleted(canonical.contract_id);
                let mut emptied = canonical.clone();
                emptied.workloads = remaining;
                ops.push(TwinDeployment::new(
                    emptied,
                    Operation::Delete,
                    node_id,
                    network,
                ));
            }
        } else if remaining.len() < canonical.workloads.len() {
            let mut updated = canonical.clone();
            updated.workloads = remaining;
            updated.version += 1;
            ops.push(TwinDeployment::new(
                updated,
                Operation::Update,
                node_id,
                network,
            ));
        }

        Ok(ops)
    }

    /// Close out the network workload on another contract freed by
    /// `delete_node`: delete the deployment when nothing else remains in it,
    /// update it otherwise.
    fn emit_for_contract(
        &self,
        net: &LogicalNetwork,
        handle: &NetworkHandle,
        contract_id: u64,
        network_name: &str,
        ops: &mut Vec<TwinDeployment>,
        emitted_deletes: &mut HashSet<u64>,
    ) {
        for deployment in net.contract_deployments(contract_id) {
            let target_node = deployment
                .workloads
                .iter()
                .find_map(|w| w.data.as_network().map(|n| n.node_id))
                .unwrap_or_default();

            let mut shrunk = deployment.clone();
            shrink_network_out(&mut shrunk.workloads, network_name);

            if shrunk.workloads.is_empty() {
                if emitted_deletes.insert(contract_id) {
                    self.session.mark_deleted(contract_id);
                    ops.push(TwinDeployment::new(
                        shrunk,
                        Operation::Delete,
                        target_node,
                        None,
                    ));
                }
            } else {
                shrunk.version += 1;
                ops.push(TwinDeployment::new(
                    shrunk,
                    Operation::Update,
                    target_node,
                    Some(handle.clone()),
                ));
            }
        }
    }

    /// Load (once per pass) the network a machine interface points at. The
    /// range comes from the deployment's own network workload; the network
    /// kind follows the machine kind.
    async fn network_for(
        &mut self,
        deployment: &Deployment,
        name: &str,
        machine_kind: MachineKind,
    ) -> Result<NetworkHandle> {
        if let Some(handle) = self.networks.get(name) {
            return Ok(handle.clone());
        }

        let ip_range = deployment
            .workloads
            .iter()
            .find(|w| w.workload_type().is_network() && w.name == name)
            .and_then(|w| w.data.as_network())
            .map(|n| n.ip_range.clone())
            .ok_or_else(|| Error::NetworkNotFound(name.to_string()))?;

        let kind = match machine_kind {
            MachineKind::Standard => NetworkKind::standard(),
            MachineKind::Light => NetworkKind::Light,
        };
        let mut net = LogicalNetwork::new(
            name,
            &ip_range,
            kind,
            self.directory.clone(),
            self.transport.clone(),
            self.session.clone(),
        )?;
        net.load(true).await?;

        let handle = net.into_handle();
        self.networks.insert(name.to_string(), handle.clone());
        Ok(handle)
    }
}

fn shrink_network_out(workloads: &mut Vec<Workload>, network_name: &str) {
    workloads.retain(|w| !(w.workload_type().is_network() && w.name == network_name));
}
