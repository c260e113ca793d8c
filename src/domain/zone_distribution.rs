use std::collections::BTreeMap;
use std::fmt;

use crate::domain::id::Zone;
use crate::domain::node::Node;
use crate::error::Error;

pub const REQUIRED_ZONES: usize = 3;

/// Ready, non-retiring nodes of a role counted per zone. Derived, never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ZoneDistribution {
    counts: BTreeMap<Zone, usize>,
}

impl ZoneDistribution {
    pub fn from_counts(counts: impl IntoIterator<Item = (Zone, usize)>) -> ZoneDistribution {
        ZoneDistribution { counts: counts.into_iter().filter(|(_, count)| *count > 0).collect() }
    }

    /// Nodes with no zone label are not counted.
    pub fn from_nodes<'a>(nodes: impl IntoIterator<Item = &'a Node>) -> ZoneDistribution {
        let mut counts: BTreeMap<Zone, usize> = BTreeMap::new();
        for node in nodes.into_iter().filter(|n| n.is_fresh_capacity()) {
            if let Some(zone) = &node.zone {
                *counts.entry(zone.clone()).or_insert(0) += 1;
            }
        }
        ZoneDistribution { counts }
    }

    pub fn zone_count(&self) -> usize {
        self.counts.len()
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn get(&self, zone: &Zone) -> usize {
        self.counts.get(zone).copied().unwrap_or(0)
    }

    /// Exactly `required` populated zones, all holding the same number of nodes.
    pub fn is_balanced(&self, required: usize) -> bool {
        let mut counts = self.counts.values();
        match counts.next() {
            Some(first) => self.counts.len() == required && counts.all(|c| c == first),
            None => false,
        }
    }

    pub fn ensure_balanced(&self, required: usize) -> Result<(), Error> {
        if self.is_balanced(required) {
            Ok(())
        } else {
            Err(Error::ZoneImbalance { distribution: self.to_string(), required })
        }
    }
}

impl fmt::Display for ZoneDistribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries: Vec<String> = self.counts.iter().map(|(zone, count)| format!("{}:{}", zone, count)).collect();
        write!(f, "{{{}}}", entries.join(", "))
    }
}
