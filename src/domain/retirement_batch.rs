use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::domain::clock::Clock;
use crate::domain::id::InstanceName;
use crate::domain::node::{Node, Role};
use crate::error::Error;

const MAX_LABEL_VALUE_LEN: usize = 63;

/// Timestamp label value shared by every node retired in one cycling run.
///
/// The tag is the durable resume token: it lives only as a node label.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct RetirementTag(String);

impl RetirementTag {
    /// Validates an externally supplied tag as a Kubernetes label value.
    pub fn new(value: impl Into<String>) -> Result<RetirementTag, Error> {
        let value = value.into();
        let valid_chars = value.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        let alnum_edges = value.chars().next().is_some_and(|c| c.is_ascii_alphanumeric())
            && value.chars().last().is_some_and(|c| c.is_ascii_alphanumeric());

        if value.is_empty() || value.len() > MAX_LABEL_VALUE_LEN || !valid_chars || !alnum_edges {
            return Err(Error::Config(format!("'{}' is not a valid retirement tag", value)));
        }
        Ok(RetirementTag(value))
    }

    /// A fresh tag for a new run. Never reuse an existing tag for new nodes.
    pub fn mint(clock: &dyn Clock) -> RetirementTag {
        RetirementTag(clock.now_unix_secs().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RetirementTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RetirementTag {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RetirementTag::new(s)
    }
}

/// All nodes of one role carrying one retirement tag.
///
/// Fixed at construction: nodes are never added to or removed from a batch.
#[derive(Debug, Clone, Serialize)]
pub struct RetirementBatch {
    role: Role,
    tag: RetirementTag,
    nodes: Vec<Node>,
}

impl RetirementBatch {
    pub fn new(role: Role, tag: RetirementTag, nodes: Vec<Node>) -> RetirementBatch {
        RetirementBatch { role, tag, nodes }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn tag(&self) -> &RetirementTag {
        &self.tag
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Backing instance names, in batch order.
    pub fn instance_names(&self) -> Vec<InstanceName> {
        self.nodes.iter().map(Node::instance_name).collect()
    }
}
