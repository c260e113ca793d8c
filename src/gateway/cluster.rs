use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::id::NodeName;
use crate::domain::node::{LabelKeys, Node, Role};
use crate::domain::retirement_batch::RetirementTag;
use crate::domain::zone_distribution::ZoneDistribution;
use crate::error::GatewayError;

/// Label selector over the role label and, optionally, the retiring label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSelector {
    pub role: Role,
    pub retiring: Option<RetirementTag>,
}

impl NodeSelector {
    pub fn role(role: Role) -> NodeSelector {
        NodeSelector { role, retiring: None }
    }

    pub fn batch(role: Role, tag: &RetirementTag) -> NodeSelector {
        NodeSelector { role, retiring: Some(tag.clone()) }
    }

    pub fn to_label_selector(&self, keys: &LabelKeys) -> String {
        match &self.retiring {
            Some(tag) => format!("{}={},{}={}", keys.role, self.role, keys.retiring, tag),
            None => format!("{}={}", keys.role, self.role),
        }
    }

    pub fn matches(&self, node: &Node) -> bool {
        node.role == self.role && (self.retiring.is_none() || node.retiring == self.retiring)
    }
}

impl fmt::Display for NodeSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_label_selector(&LabelKeys::default()))
    }
}

/// How a cooperative drain ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrainOutcome {
    Drained,
    TimedOut,
    Errored(String),
}

/// Reads and writes against the cluster control plane.
#[async_trait]
pub trait ClusterGateway: fmt::Debug + Send + Sync {
    /// Nodes matching `selector`. An empty result means "not yet available" to callers.
    async fn list_nodes(&self, selector: &NodeSelector) -> Result<Vec<Node>, GatewayError>;

    /// Labels `node` with `tag` (overwriting any previous value) and marks it unschedulable.
    /// Safe to repeat.
    async fn label_and_cordon(&self, node: &NodeName, tag: &RetirementTag) -> Result<(), GatewayError>;

    /// Evicts every non-DaemonSet pod from `node`, deleting emptyDir data, bounded by `timeout`.
    async fn drain(&self, node: &NodeName, timeout: Duration) -> DrainOutcome;

    /// Deletes every pod scheduled on `node` in any namespace, bypassing eviction.
    /// Returns how many pods were deleted; zero pods is a successful no-op.
    async fn force_delete_pods(&self, node: &NodeName) -> Result<usize, GatewayError>;

    async fn zone_distribution(&self, role: Role) -> Result<ZoneDistribution, GatewayError> {
        let nodes = self.list_nodes(&NodeSelector::role(role)).await?;
        Ok(ZoneDistribution::from_nodes(&nodes))
    }
}
