//! Units of work emitted by the reconciler

use serde::{Deserialize, Serialize};

use grid_network::NetworkHandle;
use grid_zos::Deployment;

/// What the external transport should do with a deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Deploy,
    Update,
    Delete,
}

/// A deployment paired with the operation to apply and its target node.
///
/// When the deployment embeds a network workload, `network` carries the
/// shared handle so the executor can refresh the payload before submission.
#[derive(Debug, Clone)]
pub struct TwinDeployment {
    pub deployment: Deployment,
    pub operation: Operation,
    pub node_id: u32,
    pub public_ip_count: u32,
    pub network: Option<NetworkHandle>,
}

impl TwinDeployment {
    pub fn new(
        deployment: Deployment,
        operation: Operation,
        node_id: u32,
        network: Option<NetworkHandle>,
    ) -> Self {
        Self {
            deployment,
            operation,
            node_id,
            public_ip_count: 0,
            network,
        }
    }
}
