use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::cycling::retry::RetryExecutor;
use crate::domain::id::NodeName;
use crate::error::{Error, Result};
use crate::gateway::cluster::{ClusterGateway, DrainOutcome};

/// Per-node drain lifecycle.
///
/// `Pending -> Draining -> Drained` on the cooperative path,
/// `Draining -> TimedOut | Errored -> ForceEvicting -> ForceEvicted` otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum DrainState {
    Pending,
    Draining,
    Drained,
    TimedOut,
    Errored(String),
    ForceEvicting,
    ForceEvicted { pods: usize },
}

impl DrainState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, DrainState::Drained | DrainState::ForceEvicted { .. })
    }
}

impl fmt::Display for DrainState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DrainState::Pending => write!(f, "pending"),
            DrainState::Draining => write!(f, "draining"),
            DrainState::Drained => write!(f, "drained"),
            DrainState::TimedOut => write!(f, "timed out"),
            DrainState::Errored(reason) => write!(f, "errored ({})", reason),
            DrainState::ForceEvicting => write!(f, "force evicting"),
            DrainState::ForceEvicted { pods } => write!(f, "force evicted ({} pods)", pods),
        }
    }
}

/// How one node ended up empty, and the states it passed through.
#[derive(Debug, Clone, Serialize)]
pub struct DrainReport {
    pub node: NodeName,
    pub history: Vec<DrainState>,
}

impl DrainReport {
    pub fn final_state(&self) -> &DrainState {
        self.history.last().unwrap_or(&DrainState::Pending)
    }

    pub fn was_forced(&self) -> bool {
        matches!(self.final_state(), DrainState::ForceEvicted { .. })
    }
}

/// Empties one node at a time: a bounded cooperative drain, then forced pod
/// deletion if the drain did not finish.
#[derive(Debug, Clone)]
pub struct NodeDrainer {
    cluster: Arc<dyn ClusterGateway>,
    retry: RetryExecutor,
    timeout: Duration,
}

impl NodeDrainer {
    pub fn new(cluster: Arc<dyn ClusterGateway>, retry: RetryExecutor, timeout: Duration) -> NodeDrainer {
        NodeDrainer { cluster, retry, timeout }
    }

    /// Returns only once the node holds no workload pods, or with an error if
    /// forced deletion failed. Both `TimedOut` and `Errored` fall back to forced deletion.
    pub async fn drain(&self, node: &NodeName) -> Result<DrainReport> {
        let mut report = DrainReport { node: node.clone(), history: vec![DrainState::Pending] };

        report.history.push(DrainState::Draining);
        log::info!("Draining node {} (timeout {}s).", node, self.timeout.as_secs());

        let fallback = match self.cluster.drain(node, self.timeout).await {
            DrainOutcome::Drained => {
                report.history.push(DrainState::Drained);
                log::info!("Node {} drained.", node);
                return Ok(report);
            }
            DrainOutcome::TimedOut => DrainState::TimedOut,
            DrainOutcome::Errored(reason) => DrainState::Errored(reason),
        };
        log::warn!("Drain of node {} {}. Deleting its pods forcibly.", node, fallback);
        report.history.push(fallback);
        report.history.push(DrainState::ForceEvicting);

        let cluster = self.cluster.as_ref();
        let operation = format!("force delete pods on {}", node);
        let pods = self
            .retry
            .run(&operation, move || cluster.force_delete_pods(node))
            .await
            .map_err(|e| Error::ForceEvictionFailed { node: node.to_string(), reason: e.to_string() })?;

        if pods == 0 {
            log::info!("No pods left on node {}.", node);
        } else {
            log::info!("Force deleted {} pod(s) on node {}.", pods, node);
        }
        report.history.push(DrainState::ForceEvicted { pods });
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cycling::config::RetryPolicy;
    use crate::domain::node::Role;
    use crate::gateway::simulated::{SimCall, SimulatedCloud};

    const NODE: &str = "worker-000.c.acme.internal";

    fn drainer(cloud: &Arc<SimulatedCloud>, attempts: u32) -> NodeDrainer {
        NodeDrainer::new(cloud.clone(), RetryExecutor::new(RetryPolicy { max_attempts: attempts, delay: Duration::ZERO }), Duration::from_secs(300))
    }

    #[tokio::test]
    async fn cooperative_drain_skips_forced_deletion() {
        let cloud = Arc::new(SimulatedCloud::new(Role::Worker, 1, &["a"]));

        let report = drainer(&cloud, 12).drain(&NodeName::new(NODE)).await.unwrap();

        assert_eq!(report.history, vec![DrainState::Pending, DrainState::Draining, DrainState::Drained]);
        assert!(cloud.calls_of("force_delete_pods").is_empty());
        assert_eq!(cloud.pods_on(NODE), 0);
    }

    #[tokio::test]
    async fn timeout_falls_back_to_forced_deletion() {
        let cloud = Arc::new(SimulatedCloud::new(Role::Worker, 1, &["a"]));
        cloud.set_drain_outcome(NODE, DrainOutcome::TimedOut);

        let report = drainer(&cloud, 12).drain(&NodeName::new(NODE)).await.unwrap();

        assert!(report.was_forced());
        assert_eq!(report.history[2], DrainState::TimedOut);
        assert_eq!(report.final_state(), &DrainState::ForceEvicted { pods: 4 });
        assert_eq!(cloud.calls_of("force_delete_pods"), vec![SimCall::ForceDeletePods(NODE.to_string())]);
    }

    #[tokio::test]
    async fn drain_error_falls_back_and_empty_node_is_a_no_op() {
        let cloud = Arc::new(SimulatedCloud::new(Role::Worker, 1, &["a"]));
        cloud.set_drain_outcome(NODE, DrainOutcome::Errored("cannot evict pod".into()));
        cloud.force_delete_pods(&NodeName::new(NODE)).await.unwrap();

        let report = drainer(&cloud, 12).drain(&NodeName::new(NODE)).await.unwrap();

        assert_eq!(report.history[2], DrainState::Errored("cannot evict pod".into()));
        assert_eq!(report.final_state(), &DrainState::ForceEvicted { pods: 0 });
        assert!(report.final_state().is_terminal());
    }

    #[tokio::test]
    async fn failed_forced_deletion_is_surfaced() {
        let cloud = Arc::new(SimulatedCloud::new(Role::Worker, 1, &["a"]));
        cloud.set_drain_outcome(NODE, DrainOutcome::TimedOut);
        cloud.fail_times("force_delete_pods", 2);

        let err = drainer(&cloud, 2).drain(&NodeName::new(NODE)).await.unwrap_err();

        assert!(matches!(err, Error::ForceEvictionFailed { ref node, .. } if node == NODE));
        assert_eq!(cloud.calls_of("force_delete_pods").len(), 2);
    }
}
