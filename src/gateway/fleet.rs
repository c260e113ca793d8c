use async_trait::async_trait;

use crate::domain::id::{InstanceName, Zone};
use crate::domain::instance_group::InstanceGroup;
use crate::error::GatewayError;

/// Largest number of instances named in one `delete_instances` request.
pub const MAX_DELETE_BATCH: usize = 100;

/// Reads and writes against the cloud fleet manager.
#[async_trait]
pub trait FleetGateway: std::fmt::Debug + Send + Sync {
    /// The managed group that created `instance`, read from its `created-by` metadata.
    async fn resolve_backing_group(&self, instance: &InstanceName, zone: &Zone) -> Result<InstanceGroup, GatewayError>;

    /// Current desired capacity. Never cache the answer across a resize decision.
    async fn target_size(&self, group: &InstanceGroup) -> Result<i64, GatewayError>;

    /// Requests a new target size. Success only means the request was accepted.
    async fn resize(&self, group: &InstanceGroup, size: u32) -> Result<(), GatewayError>;

    /// Deletes exactly the named instances in one request (at most `MAX_DELETE_BATCH`).
    async fn delete_instances(&self, group: &InstanceGroup, instances: &[InstanceName]) -> Result<(), GatewayError>;

    /// Blocks until the group has no pending create or delete operations.
    async fn wait_until_stable(&self, group: &InstanceGroup) -> Result<(), GatewayError>;
}
