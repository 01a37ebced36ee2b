//! Fan-out submission of many twin deployments
//!
//! Submissions run concurrently; each one targets a distinct deployment, so
//! the single-reconciler-per-network rule is not violated here. The outcome
//! partitions nodes strictly: a failed submission lands in `failed` and never
//! in `succeeded`.

use std::future::Future;

use futures::future::join_all;
use tracing::{info, warn};

use crate::models::TwinDeployment;
use crate::{Error, Result};

/// A node whose deployment was accepted, with the contract that now binds it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSuccess {
    pub node_id: u32,
    pub contract_id: u64,
}

/// A node whose deployment was rejected or never reached the node.
#[derive(Debug)]
pub struct NodeFailure {
    pub node_id: u32,
    pub error: Error,
}

/// Partitioned result of a batch submission.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub succeeded: Vec<NodeSuccess>,
    pub failed: Vec<NodeFailure>,
}

impl BatchOutcome {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn failed_node_ids(&self) -> Vec<u32> {
        self.failed.iter().map(|f| f.node_id).collect()
    }
}

/// Submit every deployment through `submit` and partition the outcomes by
/// node. `submit` resolves to the contract id the chain assigned.
pub async fn deploy_batch<F, Fut>(deployments: Vec<TwinDeployment>, submit: F) -> BatchOutcome
where
    F: Fn(TwinDeployment) -> Fut,
    Fut: Future<Output = Result<u64>>,
{
    let submissions = deployments.into_iter().map(|twin_deployment| {
        let node_id = twin_deployment.node_id;
        let fut = submit(twin_deployment);
        async move { (node_id, fut.await) }
    });

    let mut outcome = BatchOutcome::default();
    for (node_id, result) in join_all(submissions).await {
        match result {
            Ok(contract_id) => {
                info!(node_id, contract_id, "deployment accepted");
                outcome.succeeded.push(NodeSuccess {
                    node_id,
                    contract_id,
                });
            }
            Err(error) => {
                warn!(node_id, %error, "deployment failed");
                outcome.failed.push(NodeFailure { node_id, error });
            }
        }
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Operation;
    use grid_zos::Deployment;

    fn batch(node_ids: &[u32]) -> Vec<TwinDeployment> {
        node_ids
            .iter()
            .map(|&node_id| {
                TwinDeployment::new(Deployment::default(), Operation::Deploy, node_id, None)
            })
            .collect()
    }

    #[tokio::test]
    async fn all_successes() {
        let outcome = deploy_batch(batch(&[1, 2]), |td| async move {
            Ok(1000 + u64::from(td.node_id))
        })
        .await;
        assert!(outcome.is_complete());
        assert_eq!(
            outcome.succeeded,
            vec![
                NodeSuccess {
                    node_id: 1,
                    contract_id: 1001
                },
                NodeSuccess {
                    node_id: 2,
                    contract_id: 1002
                },
            ]
        );
    }

    // A node whose submission failed must never appear in the success set.
    #[tokio::test]
    async fn failures_never_count_as_successes() {
        let outcome = deploy_batch(batch(&[1, 2, 3]), |td| async move {
            if td.node_id == 2 {
                Err(Error::NetworkNotFound("netA".to_string()))
            } else {
                Ok(u64::from(td.node_id))
            }
        })
        .await;

        assert_eq!(outcome.failed_node_ids(), vec![2]);
        assert!(outcome.succeeded.iter().all(|s| s.node_id != 2));
        assert_eq!(outcome.succeeded.len(), 2);
        assert!(!outcome.is_complete());
    }
}
