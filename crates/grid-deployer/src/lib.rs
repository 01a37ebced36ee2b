//! Deployment reconciliation core
//!
//! Computes the minimal set of deployment operations that move a node's
//! deployed state to a requested one:
//! - `split_workloads` partitions a deployment's workload graph, dragging a
//!   machine's dependents along with it
//! - `Reconciler` turns a removal request into `TwinDeployment` operations,
//!   releasing network reservations and collapsing empty networks on the way
//! - `deploy_batch` fans submissions out and partitions nodes into succeeded
//!   and failed sets
//!
//! Submission itself is external; every emitted operation is applied by the
//! caller's transport.

pub mod batch;
pub mod differ;
pub mod error;
pub mod models;
pub mod reconciler;

pub use batch::{deploy_batch, BatchOutcome, NodeFailure, NodeSuccess};
pub use differ::{default_delete_types, split_workloads};
pub use error::{Error, Result};
pub use models::{Operation, TwinDeployment};
pub use reconciler::Reconciler;
