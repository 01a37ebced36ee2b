//! Per-session contract bookkeeping
//!
//! Newly submitted contracts are not visible through the indexer until the
//! chain confirms them, and deleted contracts linger there for a while. The
//! session keeps both sets so membership reconciliation sees a consistent
//! view. State is threaded explicitly; concurrent reconciliations against
//! different networks each get their own session.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::client::NodeContract;

/// Pending and deleted contracts for one reconciliation context.
#[derive(Debug, Default)]
pub struct ContractSession {
    pending: RwLock<Vec<NodeContract>>,
    deleted: RwLock<HashSet<u64>>,
}

impl ContractSession {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Record a contract submitted this session but not yet indexed.
    pub fn add_pending(&self, contract: NodeContract) {
        self.pending.write().push(contract);
    }

    /// Record a contract deleted this session.
    pub fn mark_deleted(&self, contract_id: u64) {
        self.deleted.write().insert(contract_id);
    }

    pub fn is_deleted(&self, contract_id: u64) -> bool {
        self.deleted.read().contains(&contract_id)
    }

    /// Pending contracts whose deployment data carries `deployment_type`.
    pub fn pending_of_type(&self, deployment_type: &str) -> Vec<NodeContract> {
        self.pending
            .read()
            .iter()
            .filter(|c| {
                c.parsed_data()
                    .map(|d| d.deployment_type == deployment_type)
                    .unwrap_or(false)
            })
            .cloned()
            .collect()
    }

    /// Drop pending entries that showed up in an on-chain fetch.
    pub fn prune_pending(&self, fetched_ids: &[u64]) {
        self.pending
            .write()
            .retain(|c| !fetched_ids.contains(&c.contract_id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contract(id: u64, name: &str) -> NodeContract {
        NodeContract {
            contract_id: id,
            node_id: 1,
            deployment_hash: String::new(),
            deployment_data: format!(r#"{{"name":"{name}","type":"network-light"}}"#),
        }
    }

    #[test]
    fn pending_filtered_by_type() {
        let session = ContractSession::new();
        session.add_pending(contract(1, "netA"));
        session.add_pending(NodeContract {
            contract_id: 2,
            node_id: 1,
            deployment_hash: String::new(),
            deployment_data: r#"{"name":"vm1","type":"vm"}"#.to_string(),
        });

        let pending = session.pending_of_type("network-light");
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].contract_id, 1);
    }

    #[test]
    fn prune_removes_fetched() {
        let session = ContractSession::new();
        session.add_pending(contract(1, "netA"));
        session.add_pending(contract(2, "netB"));
        session.prune_pending(&[1]);
        assert_eq!(session.pending_of_type("network-light").len(), 1);
    }

    #[test]
    fn deleted_is_sticky() {
        let session = ContractSession::new();
        assert!(!session.is_deleted(9));
        session.mark_deleted(9);
        assert!(session.is_deleted(9));
    }
}
