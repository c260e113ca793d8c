use std::sync::Arc;

use serde::Serialize;

use crate::cycling::config::RunConfig;
use crate::cycling::drainer::{DrainReport, NodeDrainer};
use crate::cycling::poll::wait_until;
use crate::cycling::request::CycleRequest;
use crate::cycling::retry::RetryExecutor;
use crate::cycling::state::{CycleState, FleetTarget};
use crate::domain::clock::SharedClock;
use crate::domain::id::InstanceName;
use crate::domain::instance_group::InstanceGroup;
use crate::domain::node::{Node, Role};
use crate::domain::retirement_batch::{RetirementBatch, RetirementTag};
use crate::error::{Error, GatewayError, Result};
use crate::gateway::cluster::{ClusterGateway, NodeSelector};
use crate::gateway::fleet::{FleetGateway, MAX_DELETE_BATCH};

/// What one role's run did. Built up as the state machine advances.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleReport {
    pub role: Role,
    pub tag: RetirementTag,
    pub resumed: bool,
    pub target: Option<FleetTarget>,
    pub drains: Vec<DrainReport>,
    pub deleted_instances: Vec<InstanceName>,
    /// Every state entered, in order.
    pub states: Vec<&'static str>,
}

impl CycleReport {
    fn new(role: Role, tag: RetirementTag, resumed: bool) -> CycleReport {
        CycleReport { role, tag, resumed, target: None, drains: Vec::new(), deleted_instances: Vec::new(), states: Vec::new() }
    }

    pub fn forced_drains(&self) -> usize {
        self.drains.iter().filter(|d| d.was_forced()).count()
    }
}

/// Replaces every node of a role: label and cordon the old nodes, double the
/// backing group, wait for fresh capacity, check zone balance, drain the old
/// nodes one by one, delete their instances and wait for the group to settle.
///
/// Holds no state between runs. Each role gets its own tag and report.
#[derive(Debug)]
pub struct CyclingOrchestrator {
    cluster: Arc<dyn ClusterGateway>,
    fleet: Arc<dyn FleetGateway>,
    clock: SharedClock,
    config: RunConfig,
    retry: RetryExecutor,
    drainer: NodeDrainer,
}

impl CyclingOrchestrator {
    pub fn new(cluster: Arc<dyn ClusterGateway>, fleet: Arc<dyn FleetGateway>, clock: SharedClock, config: RunConfig) -> CyclingOrchestrator {
        let retry = RetryExecutor::new(config.retry);
        let drainer = NodeDrainer::new(cluster.clone(), retry, config.drain_timeout);
        CyclingOrchestrator { cluster, fleet, clock, config, retry, drainer }
    }

    /// Runs the request to completion. The first failing role aborts the rest.
    pub async fn execute(&self, request: &CycleRequest) -> Result<Vec<CycleReport>> {
        log::info!("Starting: {} (context {}, project {}).", request, self.config.context, self.config.project);
        match request {
            CycleRequest::Resume { role, tag } => Ok(vec![self.resume(*role, tag.clone()).await?]),
            _ => {
                let mut reports = Vec::new();
                for role in request.roles() {
                    reports.push(self.cycle(role).await?);
                }
                Ok(reports)
            }
        }
    }

    /// Full replacement of every `role` node under a freshly minted tag.
    pub async fn cycle(&self, role: Role) -> Result<CycleReport> {
        let tag = RetirementTag::mint(self.clock.as_ref());
        log::info!("Cycling {} nodes under retirement tag {}.", role, tag);
        self.run(CycleReport::new(role, tag, false), CycleState::Idle).await
    }

    /// Drains the nodes an interrupted run already tagged. Does not scale,
    /// check zones, or delete instances.
    pub async fn resume(&self, role: Role, tag: RetirementTag) -> Result<CycleReport> {
        log::info!("Resuming drain of {} nodes tagged {}.", role, tag);
        let nodes = self.await_nodes(&NodeSelector::batch(role, &tag)).await?;
        let batch = RetirementBatch::new(role, tag.clone(), nodes);
        log::info!("Found {} {} node(s) to drain.", batch.len(), role);
        self.run(CycleReport::new(role, tag, true), CycleState::Draining { batch, target: None }).await
    }

    async fn run(&self, mut report: CycleReport, mut state: CycleState) -> Result<CycleReport> {
        loop {
            report.states.push(state.name());
            if state.is_done() {
                break;
            }
            tracing::info!(role = %report.role, tag = %report.tag, state = state.name(), "Entering {} for {} nodes.", state, report.role);

            let entered = state.name();
            state = match self.step(state, &mut report).await {
                Ok(next) => next,
                Err(e) => {
                    log::error!("Cycling {} nodes failed in {}: {}", report.role, entered, e);
                    return Err(e);
                }
            };
        }

        log::info!(
            "Finished {} nodes (tag {}): {} drained, {} forced, {} instance(s) deleted.",
            report.role,
            report.tag,
            report.drains.len(),
            report.forced_drains(),
            report.deleted_instances.len()
        );
        Ok(report)
    }

    async fn step(&self, state: CycleState, report: &mut CycleReport) -> Result<CycleState> {
        let role = report.role;

        match state {
            CycleState::Idle => Ok(CycleState::Labeling),

            CycleState::Labeling => {
                let nodes = self.await_nodes(&NodeSelector::role(role)).await?;
                let tag = report.tag.clone();
                let cluster = self.cluster.as_ref();

                let mut tagged = Vec::with_capacity(nodes.len());
                for mut node in nodes {
                    let (name, tag_ref) = (&node.name, &tag);
                    self.retry.run(&format!("label and cordon {}", name), move || cluster.label_and_cordon(name, tag_ref)).await?;
                    log::info!("Labeled and cordoned {}.", node.name);
                    node.retiring = Some(tag.clone());
                    tagged.push(node);
                }

                Ok(CycleState::ResolvingGroup { batch: RetirementBatch::new(role, tag, tagged) })
            }

            CycleState::ResolvingGroup { batch } => {
                let first = batch.nodes().first().ok_or_else(|| Error::EmptyBatch { role: role.to_string(), tag: batch.tag().to_string() })?;
                let zone = first.zone.clone().ok_or_else(|| Error::MissingNodeAttribute { node: first.name.to_string(), attribute: "zone label" })?;
                if first.region.is_none() {
                    log::warn!("Node {} has no region label.", first.name);
                }

                let instance = first.instance_name();
                let fleet = self.fleet.as_ref();
                let (instance_ref, zone_ref) = (&instance, &zone);
                let group = self
                    .retry
                    .run(&format!("resolve backing group of {}", instance), move || fleet.resolve_backing_group(instance_ref, zone_ref))
                    .await?;
                log::info!("{} nodes are backed by instance group {}.", role, group);

                Ok(CycleState::Scaling { batch, group })
            }

            CycleState::Scaling { batch, group } => {
                let original_size = self.read_target_size(&group).await?;
                let target = FleetTarget { group, original_size };
                let doubled = target
                    .doubled_size()
                    .ok_or_else(|| Error::InvalidTargetSize { group: target.group.to_string(), detail: format!("{} cannot be doubled", original_size) })?;

                let fleet = self.fleet.as_ref();
                let group_ref = &target.group;
                self.retry.run(&format!("resize {} to {}", group_ref, doubled), move || fleet.resize(group_ref, doubled)).await?;
                log::info!("Requested {} -> {} instances for {}.", original_size, doubled, target.group);

                report.target = Some(target.clone());
                Ok(CycleState::AwaitingScaleUp { batch, target })
            }

            CycleState::AwaitingScaleUp { batch, target } => {
                let expected = target.original_size as usize;
                let selector = NodeSelector::role(role);
                let selector_ref = &selector;

                wait_until(&self.config.poll, &format!("{} fresh {} node(s) to become Ready", expected, role), move || async move {
                    let nodes = self.list_nodes(selector_ref).await?;
                    let fresh = nodes.iter().filter(|n| n.is_fresh_capacity()).count();
                    log::info!("{}/{} fresh {} node(s) Ready.", fresh, expected, role);
                    Ok::<_, Error>((fresh >= expected).then_some(()))
                })
                .await?;

                Ok(CycleState::ZoneBalanceCheck { batch, target })
            }

            CycleState::ZoneBalanceCheck { batch, target } => {
                let cluster = self.cluster.as_ref();
                let distribution = self.retry.run("read zone distribution", move || cluster.zone_distribution(role)).await?;
                log::info!("Fresh {} capacity per zone: {} ({} nodes).", role, distribution, distribution.total());
                distribution.ensure_balanced(self.config.required_zones)?;

                Ok(CycleState::Draining { batch, target: Some(target) })
            }

            CycleState::Draining { batch, target } => {
                for (i, node) in batch.nodes().iter().enumerate() {
                    log::info!("Draining {}/{}: {}.", i + 1, batch.len(), node.name);
                    report.drains.push(self.drainer.drain(&node.name).await?);
                }

                match target {
                    Some(target) => Ok(CycleState::Terminating { batch, target }),
                    None => {
                        log::info!("Resumed batch {} drained. Its instances are left in place.", batch.tag());
                        Ok(CycleState::Done)
                    }
                }
            }

            CycleState::Terminating { batch, target } => {
                let fleet = self.fleet.as_ref();
                let group = &target.group;
                let instances = batch.instance_names();

                for chunk in instances.chunks(MAX_DELETE_BATCH) {
                    self.retry.run(&format!("delete {} instance(s) from {}", chunk.len(), group), move || fleet.delete_instances(group, chunk)).await?;
                    report.deleted_instances.extend(chunk.iter().cloned());
                }
                log::info!("Deleted {} instance(s) from {}.", instances.len(), group);

                self.retry.run(&format!("wait for {} to stabilize", group), move || fleet.wait_until_stable(group)).await?;

                Ok(CycleState::AwaitingScaleDown { target })
            }

            CycleState::AwaitingScaleDown { target } => {
                let expected = target.original_size as usize;
                let selector = NodeSelector::role(role);
                let selector_ref = &selector;

                wait_until(&self.config.poll, &format!("{} node count to return to {}", role, expected), move || async move {
                    let count = self.list_nodes(selector_ref).await?.len();
                    log::info!("{} {} node(s) registered, expecting {}.", count, role, expected);
                    Ok::<_, Error>((count == expected).then_some(()))
                })
                .await?;

                Ok(CycleState::Done)
            }

            CycleState::Done => Ok(CycleState::Done),
        }
    }

    /// Polls until `selector` matches at least one node.
    async fn await_nodes(&self, selector: &NodeSelector) -> Result<Vec<Node>> {
        let condition = format!("nodes matching {}", selector.to_label_selector(&self.config.labels));
        wait_until(&self.config.poll, &condition, move || async move {
            let nodes = self.list_nodes(selector).await?;
            Ok::<_, Error>((!nodes.is_empty()).then_some(nodes))
        })
        .await
    }

    async fn list_nodes(&self, selector: &NodeSelector) -> Result<Vec<Node>> {
        let cluster = self.cluster.as_ref();
        self.retry.run("list nodes", move || cluster.list_nodes(selector)).await
    }

    /// Reads the live target size. Anything but a positive integer is fatal.
    async fn read_target_size(&self, group: &InstanceGroup) -> Result<u32> {
        let fleet = self.fleet.as_ref();
        let raw = match self.retry.run(&format!("read target size of {}", group), move || fleet.target_size(group)).await {
            Ok(raw) => raw,
            Err(Error::Gateway { source: GatewayError::Malformed { detail, .. }, .. }) => {
                return Err(Error::InvalidTargetSize { group: group.to_string(), detail });
            }
            Err(e) => return Err(e),
        };

        match u32::try_from(raw) {
            Ok(size) if size > 0 => Ok(size),
            _ => Err(Error::InvalidTargetSize { group: group.to_string(), detail: format!("{} is not a positive instance count", raw) }),
        }
    }
}
