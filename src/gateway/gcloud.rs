use std::sync::Arc;

use async_trait::async_trait;

use crate::api::gcloud_dto::{CREATED_BY_KEY, InstanceDto, ManagedGroupDto};
use crate::domain::id::{InstanceName, Zone};
use crate::domain::instance_group::{GroupLocation, InstanceGroup};
use crate::error::GatewayError;
use crate::gateway::fleet::{FleetGateway, MAX_DELETE_BATCH};
use crate::gateway::runner::CommandRunner;

const GCLOUD: &str = "gcloud";

/// `FleetGateway` backed by the `gcloud` CLI and managed instance groups.
#[derive(Debug, Clone)]
pub struct GcloudGateway {
    runner: Arc<dyn CommandRunner>,
    project: String,
}

impl GcloudGateway {
    pub fn new(runner: Arc<dyn CommandRunner>, project: impl Into<String>) -> Self {
        GcloudGateway { runner, project: project.into() }
    }

    async fn gcloud(&self, args: Vec<String>) -> Result<String, GatewayError> {
        self.runner.run(GCLOUD, &args, None).await?.into_stdout(GCLOUD)
    }

    fn group_args(group: &InstanceGroup, verb: &[&str]) -> Vec<String> {
        let mut args: Vec<String> = ["compute", "instance-groups", "managed"].iter().chain(verb).map(|s| s.to_string()).collect();
        args.push(group.name.clone());
        match &group.location {
            GroupLocation::Region(region) => args.extend(["--region".to_string(), region.to_string()]),
            GroupLocation::Zone(zone) => args.extend(["--zone".to_string(), zone.to_string()]),
        }
        args.extend(["--project".to_string(), group.project.to_string()]);
        args
    }
}

#[async_trait]
impl FleetGateway for GcloudGateway {
    async fn resolve_backing_group(&self, instance: &InstanceName, zone: &Zone) -> Result<InstanceGroup, GatewayError> {
        let args = ["compute", "instances", "describe", instance.as_str(), "--zone", zone.as_str(), "--project", self.project.as_str(), "--format", "json"];
        let stdout = self.gcloud(args.iter().map(|s| s.to_string()).collect()).await?;
        let dto: InstanceDto = serde_json::from_str(&stdout)?;

        let created_by = dto
            .created_by()
            .ok_or_else(|| GatewayError::malformed("instance metadata", format!("instance '{}' has no '{}' entry", dto.name, CREATED_BY_KEY)))?;
        created_by.parse::<InstanceGroup>().map_err(|e| GatewayError::malformed(CREATED_BY_KEY, e.to_string()))
    }

    async fn target_size(&self, group: &InstanceGroup) -> Result<i64, GatewayError> {
        let mut args = Self::group_args(group, &["describe"]);
        args.extend(["--format".to_string(), "json".to_string()]);
        let dto: ManagedGroupDto = serde_json::from_str(&self.gcloud(args).await?)?;

        dto.target_size.as_i64().ok_or_else(|| GatewayError::malformed("targetSize", dto.target_size.to_string()))
    }

    async fn resize(&self, group: &InstanceGroup, size: u32) -> Result<(), GatewayError> {
        let mut args = Self::group_args(group, &["resize"]);
        args.extend(["--size".to_string(), size.to_string()]);
        self.gcloud(args).await.map(|_| ())
    }

    async fn delete_instances(&self, group: &InstanceGroup, instances: &[InstanceName]) -> Result<(), GatewayError> {
        if instances.len() > MAX_DELETE_BATCH {
            return Err(GatewayError::malformed("delete request", format!("{} instances exceed the limit of {}", instances.len(), MAX_DELETE_BATCH)));
        }
        let names: Vec<&str> = instances.iter().map(|i| i.as_str()).collect();
        let mut args = Self::group_args(group, &["delete-instances"]);
        args.push(format!("--instances={}", names.join(",")));
        self.gcloud(args).await.map(|_| ())
    }

    async fn wait_until_stable(&self, group: &InstanceGroup) -> Result<(), GatewayError> {
        let mut args = Self::group_args(group, &["wait-until"]);
        args.push("--stable".to_string());
        self.gcloud(args).await.map(|_| ())
    }
}
