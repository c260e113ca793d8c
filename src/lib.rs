use std::sync::Arc;

use crate::cycling::config::RunConfig;
use crate::cycling::orchestrator::{CycleReport, CyclingOrchestrator};
use crate::cycling::request::CycleRequest;
use crate::domain::clock::SystemClock;
use crate::error::Result;
use crate::gateway::gcloud::GcloudGateway;
use crate::gateway::kubectl::KubectlGateway;
use crate::gateway::runner::CommandRunner;

pub mod api;
pub mod cycling;
pub mod domain;
pub mod error;
pub mod gateway;
pub mod loader;
pub mod logger;
pub mod setup;

/// Printed to stdout once every requested role has been cycled.
pub const SUCCESS_MARKER: &str = "NODE CYCLING COMPLETE";

/// Wires the CLI-backed gateways to one orchestrator and runs `request`.
pub async fn cycle_nodes(runner: Arc<dyn CommandRunner>, config: RunConfig, request: &CycleRequest) -> Result<Vec<CycleReport>> {
    let cluster = Arc::new(KubectlGateway::new(runner.clone(), config.context.clone(), config.labels.clone()));
    let fleet = Arc::new(GcloudGateway::new(runner, config.project.clone()));
    log::info!("Gateways ready for context '{}' and project '{}'.", config.context, config.project);

    let orchestrator = CyclingOrchestrator::new(cluster, fleet, Arc::new(SystemClock), config);
    orchestrator.execute(request).await
}
