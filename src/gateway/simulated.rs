//! In-memory cluster and fleet used to exercise the orchestrator.
//!
//! `SimulatedCloud` implements both gateways over one shared state. Resizing the
//! group up creates nodes round-robin across the configured zones; new nodes turn
//! Ready after a configurable number of node listings. Deleting instances removes
//! their nodes and lowers the target size, like a managed instance group does.
//! Every call is recorded so tests can assert on exactly what was issued.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::id::{InstanceName, NodeName, Project, Region, Zone};
use crate::domain::instance_group::{GroupLocation, InstanceGroup};
use crate::domain::node::{Node, Role};
use crate::domain::retirement_batch::RetirementTag;
use crate::error::GatewayError;
use crate::gateway::cluster::{ClusterGateway, DrainOutcome, NodeSelector};
use crate::gateway::fleet::FleetGateway;

/// One recorded gateway call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimCall {
    ListNodes(String),
    LabelAndCordon(String),
    Drain(String),
    ForceDeletePods(String),
    ResolveBackingGroup(String),
    TargetSize,
    Resize(u32),
    DeleteInstances(Vec<String>),
    WaitUntilStable,
}

impl SimCall {
    fn operation(&self) -> &'static str {
        match self {
            SimCall::ListNodes(_) => "list_nodes",
            SimCall::LabelAndCordon(_) => "label_and_cordon",
            SimCall::Drain(_) => "drain",
            SimCall::ForceDeletePods(_) => "force_delete_pods",
            SimCall::ResolveBackingGroup(_) => "resolve_backing_group",
            SimCall::TargetSize => "target_size",
            SimCall::Resize(_) => "resize",
            SimCall::DeleteInstances(_) => "delete_instances",
            SimCall::WaitUntilStable => "wait_until_stable",
        }
    }
}

#[derive(Debug, Clone)]
struct SimNode {
    node: Node,
    cordoned: bool,
    pods: usize,
    /// Listings left before the node reports Ready.
    ready_countdown: u32,
}

#[derive(Debug)]
struct SimState {
    role: Role,
    zones: Vec<Zone>,
    region: Region,
    group: InstanceGroup,
    target_size: i64,
    nodes: BTreeMap<String, SimNode>,
    next_node: usize,
    ready_after_listings: u32,
    pods_per_node: usize,
    drain_outcomes: HashMap<String, DrainOutcome>,
    failures: HashMap<&'static str, u32>,
    /// Listings that return nothing, simulating a lagging control plane.
    empty_listings: u32,
    calls: Vec<SimCall>,
}

#[derive(Debug)]
pub struct SimulatedCloud {
    state: Mutex<SimState>,
}

impl SimulatedCloud {
    /// A group for `role` with `size` Ready nodes spread round-robin over `zones`.
    pub fn new(role: Role, size: usize, zones: &[&str]) -> SimulatedCloud {
        let region = Region::new("europe-west1");
        let group = InstanceGroup { name: format!("{}-group", role), location: GroupLocation::Region(region.clone()), project: Project::new("acme") };
        let state = SimState {
            role,
            zones: zones.iter().map(|z| Zone::new(*z)).collect(),
            region,
            group,
            target_size: size as i64,
            nodes: BTreeMap::new(),
            next_node: 0,
            ready_after_listings: 1,
            pods_per_node: 4,
            drain_outcomes: HashMap::new(),
            failures: HashMap::new(),
            empty_listings: 0,
            calls: Vec::new(),
        };
        let cloud = SimulatedCloud { state: Mutex::new(state) };
        {
            let mut state = cloud.lock();
            for _ in 0..size {
                state.spawn_node(0);
            }
        }
        cloud
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// New nodes stay NotReady for this many node listings.
    pub fn with_ready_after_listings(self, listings: u32) -> Self {
        self.lock().ready_after_listings = listings;
        self
    }

    /// The next `times` calls of `operation` fail with a transient error.
    pub fn fail_times(&self, operation: &'static str, times: u32) {
        self.lock().failures.insert(operation, times);
    }

    pub fn set_drain_outcome(&self, node: &str, outcome: DrainOutcome) {
        self.lock().drain_outcomes.insert(node.to_string(), outcome);
    }

    pub fn set_target_size(&self, size: i64) {
        self.lock().target_size = size;
    }

    pub fn set_empty_listings(&self, listings: u32) {
        self.lock().empty_listings = listings;
    }

    /// Tags existing nodes as if an earlier run had labeled and cordoned them.
    pub fn tag_nodes(&self, names: &[&str], tag: &RetirementTag) {
        let mut state = self.lock();
        for name in names {
            if let Some(sim) = state.nodes.get_mut(*name) {
                sim.node.retiring = Some(tag.clone());
                sim.cordoned = true;
            }
        }
    }

    pub fn calls(&self) -> Vec<SimCall> {
        self.lock().calls.clone()
    }

    pub fn calls_of(&self, operation: &str) -> Vec<SimCall> {
        self.lock().calls.iter().filter(|c| c.operation() == operation).cloned().collect()
    }

    pub fn nodes(&self) -> Vec<Node> {
        self.lock().nodes.values().map(|s| s.node.clone()).collect()
    }

    pub fn node_names(&self) -> Vec<String> {
        self.lock().nodes.keys().cloned().collect()
    }

    pub fn is_cordoned(&self, node: &str) -> bool {
        self.lock().nodes.get(node).is_some_and(|s| s.cordoned)
    }

    pub fn pods_on(&self, node: &str) -> usize {
        self.lock().nodes.get(node).map(|s| s.pods).unwrap_or(0)
    }

    /// The group's target size as the fleet manager currently holds it.
    pub fn desired_size(&self) -> i64 {
        self.lock().target_size
    }

    pub fn group(&self) -> InstanceGroup {
        self.lock().group.clone()
    }
}

impl SimState {
    fn record(&mut self, call: SimCall) -> Result<(), GatewayError> {
        let operation = call.operation();
        self.calls.push(call);
        match self.failures.get_mut(operation) {
            Some(left) if *left > 0 => {
                *left -= 1;
                Err(GatewayError::CommandFailed { program: "simulated".into(), status: "exit status: 1".into(), stderr: format!("{} failed", operation) })
            }
            _ => Ok(()),
        }
    }

    fn spawn_node(&mut self, ready_countdown: u32) -> String {
        let zone = self.zones[self.next_node % self.zones.len()].clone();
        let name = format!("{}-{:03}.c.acme.internal", self.role, self.next_node);
        self.next_node += 1;

        let node = Node {
            name: NodeName::new(name.clone()),
            role: self.role,
            ready: ready_countdown == 0,
            zone: Some(zone),
            region: Some(self.region.clone()),
            retiring: None,
        };
        self.nodes.insert(name.clone(), SimNode { node, cordoned: false, pods: self.pods_per_node, ready_countdown });
        name
    }

    fn find_by_instance(&self, instance: &InstanceName) -> Option<&SimNode> {
        self.nodes.values().find(|s| &s.node.instance_name() == instance)
    }
}

#[async_trait]
impl ClusterGateway for SimulatedCloud {
    async fn list_nodes(&self, selector: &NodeSelector) -> Result<Vec<Node>, GatewayError> {
        let mut state = self.lock();
        state.record(SimCall::ListNodes(selector.to_string()))?;

        for sim in state.nodes.values_mut() {
            if sim.ready_countdown > 0 {
                sim.ready_countdown -= 1;
                sim.node.ready = sim.ready_countdown == 0;
            }
        }
        if state.empty_listings > 0 {
            state.empty_listings -= 1;
            return Ok(Vec::new());
        }
        Ok(state.nodes.values().map(|s| &s.node).filter(|n| selector.matches(n)).cloned().collect())
    }

    async fn label_and_cordon(&self, node: &NodeName, tag: &RetirementTag) -> Result<(), GatewayError> {
        let mut state = self.lock();
        state.record(SimCall::LabelAndCordon(node.to_string()))?;
        let sim = state.nodes.get_mut(node.as_str()).ok_or_else(|| GatewayError::CommandFailed {
            program: "simulated".into(),
            status: "exit status: 1".into(),
            stderr: format!("nodes \"{}\" not found", node),
        })?;
        sim.node.retiring = Some(tag.clone());
        sim.cordoned = true;
        Ok(())
    }

    async fn drain(&self, node: &NodeName, _timeout: Duration) -> DrainOutcome {
        let mut state = self.lock();
        if let Err(e) = state.record(SimCall::Drain(node.to_string())) {
            return DrainOutcome::Errored(e.to_string());
        }
        let outcome = state.drain_outcomes.get(node.as_str()).cloned().unwrap_or(DrainOutcome::Drained);
        if outcome == DrainOutcome::Drained {
            if let Some(sim) = state.nodes.get_mut(node.as_str()) {
                sim.pods = 0;
            }
        }
        outcome
    }

    async fn force_delete_pods(&self, node: &NodeName) -> Result<usize, GatewayError> {
        let mut state = self.lock();
        state.record(SimCall::ForceDeletePods(node.to_string()))?;
        Ok(state.nodes.get_mut(node.as_str()).map(|sim| std::mem::take(&mut sim.pods)).unwrap_or(0))
    }
}

#[async_trait]
impl FleetGateway for SimulatedCloud {
    async fn resolve_backing_group(&self, instance: &InstanceName, _zone: &Zone) -> Result<InstanceGroup, GatewayError> {
        let mut state = self.lock();
        state.record(SimCall::ResolveBackingGroup(instance.to_string()))?;
        match state.find_by_instance(instance) {
            Some(_) => Ok(state.group.clone()),
            None => Err(GatewayError::CommandFailed { program: "simulated".into(), status: "exit status: 1".into(), stderr: format!("instance {} not found", instance) }),
        }
    }

    async fn target_size(&self, _group: &InstanceGroup) -> Result<i64, GatewayError> {
        let mut state = self.lock();
        state.record(SimCall::TargetSize)?;
        Ok(state.target_size)
    }

    async fn resize(&self, _group: &InstanceGroup, size: u32) -> Result<(), GatewayError> {
        let mut state = self.lock();
        state.record(SimCall::Resize(size))?;
        let countdown = state.ready_after_listings;
        while state.nodes.len() < size as usize {
            state.spawn_node(countdown);
        }
        state.target_size = size as i64;
        Ok(())
    }

    async fn delete_instances(&self, _group: &InstanceGroup, instances: &[InstanceName]) -> Result<(), GatewayError> {
        let mut state = self.lock();
        state.record(SimCall::DeleteInstances(instances.iter().map(|i| i.to_string()).collect()))?;
        for instance in instances {
            let name = state.find_by_instance(instance).map(|s| s.node.name.to_string());
            if let Some(name) = name {
                state.nodes.remove(&name);
                state.target_size -= 1;
            }
        }
        Ok(())
    }

    async fn wait_until_stable(&self, _group: &InstanceGroup) -> Result<(), GatewayError> {
        self.lock().record(SimCall::WaitUntilStable)
    }
}
