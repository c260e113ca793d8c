use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::domain::id::{InstanceName, NodeName, Region, Zone};
use crate::domain::retirement_batch::RetirementTag;
use crate::error::Error;

/// The two node roles a cluster is cycled by, in the order a full run visits them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Master,
    Worker,
}

impl Role {
    pub const ALL: [Role; 2] = [Role::Master, Role::Worker];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Master => "master",
            Role::Worker => "worker",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(role: &str) -> Result<Role, Self::Err> {
        match role {
            "master" => Ok(Role::Master),
            "worker" => Ok(Role::Worker),
            _ => Err(Error::Config(format!("unknown role '{}', expected 'master' or 'worker'", role))),
        }
    }
}

/// Label keys the cycler reads and writes on nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelKeys {
    pub role: String,
    pub retiring: String,
    pub zone: String,
    pub region: String,
}

impl Default for LabelKeys {
    fn default() -> Self {
        LabelKeys {
            role: "role".to_string(),
            retiring: "retiring".to_string(),
            zone: "topology.kubernetes.io/zone".to_string(),
            region: "topology.kubernetes.io/region".to_string(),
        }
    }
}

/// A cluster node as observed through the control plane.
///
/// The cycler never creates nodes. It labels, cordons, drains and observes them;
/// the fleet manager creates and destroys the backing instances.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Node {
    pub name: NodeName,
    pub role: Role,
    pub ready: bool,
    pub zone: Option<Zone>,
    pub region: Option<Region>,
    pub retiring: Option<RetirementTag>,
}

impl Node {
    /// Name of the compute instance backing this node: the hostname without its domain suffix.
    pub fn instance_name(&self) -> InstanceName {
        let name = self.name.as_str();
        InstanceName::new(name.split('.').next().unwrap_or(name))
    }

    pub fn is_retiring(&self) -> bool {
        self.retiring.is_some()
    }

    /// Ready and not tagged by any cycling run, i.e. part of the replacement capacity.
    pub fn is_fresh_capacity(&self) -> bool {
        self.ready && !self.is_retiring()
    }
}
