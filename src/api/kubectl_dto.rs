use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::id::{NodeName, Region, Zone};
use crate::domain::node::{LabelKeys, Node, Role};
use crate::domain::retirement_batch::RetirementTag;
use crate::error::GatewayError;

/// Root object of `kubectl get nodes -o json`.
#[derive(Debug, Deserialize, Serialize)]
pub struct NodeListDto {
    #[serde(default)]
    pub items: Vec<NodeDto>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct NodeDto {
    pub metadata: ObjectMetaDto,
    #[serde(default)]
    pub spec: NodeSpecDto,
    #[serde(default)]
    pub status: NodeStatusDto,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ObjectMetaDto {
    pub name: String,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub labels: HashMap<String, String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct NodeSpecDto {
    #[serde(default)]
    pub unschedulable: bool,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct NodeStatusDto {
    #[serde(default)]
    pub conditions: Vec<NodeConditionDto>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct NodeConditionDto {
    #[serde(rename = "type")]
    pub condition_type: String,
    pub status: String,
}

/// Root object of `kubectl get pods -o json`.
#[derive(Debug, Deserialize, Serialize)]
pub struct PodListDto {
    #[serde(default)]
    pub items: Vec<PodDto>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct PodDto {
    pub metadata: ObjectMetaDto,
}

impl NodeDto {
    pub fn is_ready(&self) -> bool {
        self.status.conditions.iter().any(|c| c.condition_type == "Ready" && c.status == "True")
    }

    /// Converts the wire object into a domain node. The role label must be present
    /// and name one of the known roles.
    pub fn into_node(self, keys: &LabelKeys) -> Result<Node, GatewayError> {
        let ready = self.is_ready();
        let labels = &self.metadata.labels;

        let role_value = labels
            .get(&keys.role)
            .ok_or_else(|| GatewayError::malformed("node labels", format!("node '{}' has no '{}' label", self.metadata.name, keys.role)))?;
        let role = role_value.parse::<Role>().map_err(|e| GatewayError::malformed("node role", e.to_string()))?;

        let retiring = match labels.get(&keys.retiring) {
            Some(value) => Some(RetirementTag::new(value.as_str()).map_err(|e| GatewayError::malformed("retiring label", e.to_string()))?),
            None => None,
        };

        Ok(Node {
            zone: labels.get(&keys.zone).map(Zone::new),
            region: labels.get(&keys.region).map(Region::new),
            name: NodeName::new(self.metadata.name),
            role,
            ready,
            retiring,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NODE_LIST: &str = r#"{
        "apiVersion": "v1",
        "kind": "List",
        "items": [{
            "metadata": {
                "name": "worker-a1.c.acme.internal",
                "labels": {
                    "role": "worker",
                    "retiring": "1700000000",
                    "topology.kubernetes.io/zone": "europe-west1-b",
                    "topology.kubernetes.io/region": "europe-west1"
                }
            },
            "spec": { "unschedulable": true },
            "status": { "conditions": [
                { "type": "MemoryPressure", "status": "False" },
                { "type": "Ready", "status": "True" }
            ]}
        }, {
            "metadata": { "name": "worker-a2", "labels": { "role": "worker" } },
            "status": { "conditions": [{ "type": "Ready", "status": "Unknown" }] }
        }]
    }"#;

    #[test]
    fn node_list_converts_to_domain_nodes() {
        let list: NodeListDto = serde_json::from_str(NODE_LIST).unwrap();
        let keys = LabelKeys::default();
        let nodes: Vec<Node> = list.items.into_iter().map(|n| n.into_node(&keys).unwrap()).collect();

        assert_eq!(nodes[0].name, NodeName::new("worker-a1.c.acme.internal"));
        assert!(nodes[0].ready);
        assert_eq!(nodes[0].zone, Some(Zone::new("europe-west1-b")));
        assert_eq!(nodes[0].retiring.as_ref().map(|t| t.as_str()), Some("1700000000"));

        assert!(!nodes[1].ready);
        assert_eq!(nodes[1].zone, None);
        assert!(nodes[1].retiring.is_none());
    }

    #[test]
    fn missing_role_label_is_malformed() {
        let dto: NodeDto = serde_json::from_str(r#"{ "metadata": { "name": "n1" } }"#).unwrap();
        let err = dto.into_node(&LabelKeys::default()).unwrap_err();
        assert!(!err.is_transient());
    }
}
