//! Network membership derived from on-chain contracts
//!
//! The authoritative node list for a named network is the merge of freshly
//! fetched contracts, session-pending contracts not yet indexed, minus
//! session-deleted ones. Fetches are memoized; a forced refetch drops the
//! cache. Transport failures propagate unmodified.

use std::sync::Arc;

use tracing::debug;

use crate::client::{ChainDirectory, NodeContract};
use crate::session::ContractSession;
use crate::Result;

/// Tracks which contracts (and therefore nodes) participate in networks of
/// one deployment type.
pub struct MembershipTracker {
    directory: Arc<dyn ChainDirectory>,
    session: Arc<ContractSession>,
    deployment_type: String,
    cache: Option<Vec<NodeContract>>,
}

impl std::fmt::Debug for MembershipTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MembershipTracker")
            .field("deployment_type", &self.deployment_type)
            .field("cached", &self.cache.as_ref().map(Vec::len))
            .finish()
    }
}

impl MembershipTracker {
    pub fn new(
        directory: Arc<dyn ChainDirectory>,
        session: Arc<ContractSession>,
        deployment_type: impl Into<String>,
    ) -> Self {
        Self {
            directory,
            session,
            deployment_type: deployment_type.into(),
            cache: None,
        }
    }

    /// All of the caller's network contracts, merged with the session view.
    pub async fn my_network_contracts(&mut self, force: bool) -> Result<Vec<NodeContract>> {
        if force || self.cache.is_none() {
            let mut contracts = self
                .directory
                .list_my_node_contracts(&self.deployment_type)
                .await?;

            let fetched_ids: Vec<u64> = contracts.iter().map(|c| c.contract_id).collect();
            for pending in self.session.pending_of_type(&self.deployment_type) {
                if !fetched_ids.contains(&pending.contract_id) {
                    contracts.push(pending);
                }
            }
            self.session.prune_pending(&fetched_ids);

            contracts.retain(|c| !self.session.is_deleted(c.contract_id));
            debug!(
                deployment_type = %self.deployment_type,
                count = contracts.len(),
                "refreshed network contracts"
            );
            self.cache = Some(contracts);
        }
        Ok(self.cache.clone().unwrap_or_default())
    }

    /// Contracts belonging to the network called `name`.
    pub async fn network_contracts(&mut self, name: &str, force: bool) -> Result<Vec<NodeContract>> {
        let contracts = self.my_network_contracts(force).await?;
        let mut matching = Vec::new();
        for contract in contracts {
            if contract.parsed_data()?.name == name {
                matching.push(contract);
            }
        }
        Ok(matching)
    }

    /// Distinct node ids participating in the network called `name`.
    pub async fn participating_nodes(&mut self, name: &str, force: bool) -> Result<Vec<u32>> {
        let contracts = self.network_contracts(name, force).await?;
        let mut nodes = Vec::new();
        for contract in contracts {
            if !nodes.contains(&contract.node_id) {
                nodes.push(contract.node_id);
            }
        }
        Ok(nodes)
    }

    /// Distinct network names across all of the caller's contracts.
    pub async fn all_network_names(&mut self) -> Result<Vec<String>> {
        let contracts = self.my_network_contracts(true).await?;
        let mut names = Vec::new();
        for contract in contracts {
            let name = contract.parsed_data()?.name;
            if !names.contains(&name) {
                names.push(name);
            }
        }
        Ok(names)
    }

    pub async fn network_exists(&mut self, name: &str) -> Result<bool> {
        Ok(self.all_network_names().await?.contains(&name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::client::NETWORK_LIGHT_TYPE;
    use crate::Error;

    struct StaticDirectory {
        contracts: Vec<NodeContract>,
        fetches: AtomicUsize,
    }

    #[async_trait]
    impl ChainDirectory for StaticDirectory {
        async fn list_my_node_contracts(
            &self,
            _deployment_type: &str,
        ) -> Result<Vec<NodeContract>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(self.contracts.clone())
        }

        async fn node_id_from_contract(&self, _contract_id: u64) -> Result<u32> {
            Err(Error::Transport {
                context: "unused".to_string(),
                message: String::new(),
            })
        }

        async fn node_twin_id(&self, node_id: u32) -> Result<u32> {
            Ok(node_id + 100)
        }
    }

    fn contract(id: u64, node_id: u32, name: &str) -> NodeContract {
        NodeContract {
            contract_id: id,
            node_id,
            deployment_hash: String::new(),
            deployment_data: format!(r#"{{"name":"{name}","type":"network-light"}}"#),
        }
    }

    fn make_tracker(contracts: Vec<NodeContract>) -> (MembershipTracker, Arc<ContractSession>) {
        let session = ContractSession::new();
        let directory = Arc::new(StaticDirectory {
            contracts,
            fetches: AtomicUsize::new(0),
        });
        (
            MembershipTracker::new(directory, session.clone(), NETWORK_LIGHT_TYPE),
            session,
        )
    }

    #[tokio::test]
    async fn filters_by_network_name() {
        let (mut tracker, _session) =
            make_tracker(vec![contract(1, 11, "netA"), contract(2, 12, "netB")]);
        let nodes = tracker.participating_nodes("netA", false).await.unwrap();
        assert_eq!(nodes, vec![11]);
    }

    #[tokio::test]
    async fn pending_contracts_are_merged_until_indexed() {
        let (mut tracker, session) = make_tracker(vec![contract(1, 11, "netA")]);
        session.add_pending(contract(2, 12, "netA"));

        let nodes = tracker.participating_nodes("netA", true).await.unwrap();
        assert_eq!(nodes, vec![11, 12]);

        // Once the pending contract shows up on-chain it must not duplicate.
        let (mut tracker, session) =
            make_tracker(vec![contract(1, 11, "netA"), contract(2, 12, "netA")]);
        session.add_pending(contract(2, 12, "netA"));
        let nodes = tracker.participating_nodes("netA", true).await.unwrap();
        assert_eq!(nodes, vec![11, 12]);
        assert!(session.pending_of_type(NETWORK_LIGHT_TYPE).is_empty());
    }

    #[tokio::test]
    async fn deleted_contracts_are_excluded() {
        let (mut tracker, session) =
            make_tracker(vec![contract(1, 11, "netA"), contract(2, 12, "netA")]);
        session.mark_deleted(2);
        let nodes = tracker.participating_nodes("netA", true).await.unwrap();
        assert_eq!(nodes, vec![11]);
    }

    #[tokio::test]
    async fn fetch_is_memoized_unless_forced() {
        let session = ContractSession::new();
        let directory = Arc::new(StaticDirectory {
            contracts: vec![contract(1, 11, "netA")],
            fetches: AtomicUsize::new(0),
        });
        let mut tracker =
            MembershipTracker::new(directory.clone(), session, NETWORK_LIGHT_TYPE);

        tracker.my_network_contracts(false).await.unwrap();
        tracker.my_network_contracts(false).await.unwrap();
        assert_eq!(directory.fetches.load(Ordering::SeqCst), 1);

        tracker.my_network_contracts(true).await.unwrap();
        assert_eq!(directory.fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn network_names_are_distinct() {
        let (mut tracker, _session) = make_tracker(vec![
            contract(1, 11, "netA"),
            contract(2, 12, "netA"),
            contract(3, 13, "netB"),
        ]);
        let names = tracker.all_network_names().await.unwrap();
        assert_eq!(names, vec!["netA".to_string(), "netB".to_string()]);
        assert!(tracker.network_exists("netA").await.unwrap());
        assert!(!tracker.network_exists("netC").await.unwrap());
    }
}
