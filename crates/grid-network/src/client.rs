//! Collaborator seams: the chain directory and the node transport
//!
//! Both are consumed, not implemented, here. The directory answers contract
//! and twin lookups; the transport carries JSON payloads to named procedures
//! on node twins. Retry policy belongs to the implementations.

use std::net::Ipv4Addr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use grid_zos::Deployment;

use crate::{Error, Result};

/// Deployment type tag of light network contracts.
pub const NETWORK_LIGHT_TYPE: &str = "network-light";

/// Parsed `deployment_data` JSON carried by a node contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentData {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub deployment_type: String,
    #[serde(rename = "projectName", default)]
    pub project_name: String,
}

/// On-chain record binding a deployment's content hash to a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeContract {
    pub contract_id: u64,
    pub node_id: u32,
    #[serde(default)]
    pub deployment_hash: String,
    /// JSON string with at least `{name, type}`.
    #[serde(default)]
    pub deployment_data: String,
}

impl NodeContract {
    pub fn parsed_data(&self) -> Result<DeploymentData> {
        if self.deployment_data.is_empty() {
            return Ok(DeploymentData {
                name: String::new(),
                deployment_type: String::new(),
                project_name: String::new(),
            });
        }
        Ok(serde_json::from_str(&self.deployment_data)?)
    }
}

/// Contract and node lookups against the chain and its indexers.
#[async_trait]
pub trait ChainDirectory: Send + Sync {
    /// All node contracts of the caller tagged with `deployment_type`.
    async fn list_my_node_contracts(&self, deployment_type: &str) -> Result<Vec<NodeContract>>;

    /// Owning node of a contract.
    async fn node_id_from_contract(&self, contract_id: u64) -> Result<u32>;

    /// Message-bus twin of a node.
    async fn node_twin_id(&self, node_id: u32) -> Result<u32>;
}

/// Message-bus request path to node twins.
#[async_trait]
pub trait NodeTransport: Send + Sync {
    /// Send `payload` to `procedure` on the given twins and return the raw
    /// JSON response.
    async fn request(
        &self,
        twin_ids: &[u32],
        procedure: &str,
        payload: serde_json::Value,
    ) -> Result<serde_json::Value>;

    /// Fetch and rehydrate the deployment bound to `contract_id`.
    async fn deployment_get(&self, twin_id: u32, contract_id: u64) -> Result<Deployment> {
        let payload = json!({ "contract_id": contract_id });
        let value = self
            .request(&[twin_id], "zos.deployment.get", payload)
            .await
            .map_err(|e| e.context(format!("Failed to load deployment {contract_id}")))?;
        Deployment::from_value(value)
            .map_err(|e| Error::from(e).context(format!("Failed to load deployment {contract_id}")))
    }

    /// Addresses a node holds for a named network.
    async fn list_private_ips(
        &self,
        twin_id: u32,
        node_id: u32,
        network_name: &str,
    ) -> Result<Vec<Ipv4Addr>> {
        let payload = json!({ "network_name": network_name });
        let value = self
            .request(&[twin_id], "zos.network.list_private_ips", payload)
            .await
            .map_err(|e| e.context(format!("Failed to list reserved ips from node {node_id}")))?;
        let ips: Vec<String> = serde_json::from_value(value).map_err(|e| {
            Error::from(e).context(format!("Failed to list reserved ips from node {node_id}"))
        })?;
        ips.iter()
            .map(|ip| {
                ip.parse::<Ipv4Addr>()
                    .map_err(|_| Error::InvalidCidr(ip.clone()))
            })
            .collect()
    }

    /// Liveness probe used before fanning out deployments.
    async fn ping_node(&self, twin_id: u32) -> Result<()> {
        self.request(&[twin_id], "zos.system.version", json!({}))
            .await
            .map(|_| ())
    }
}
