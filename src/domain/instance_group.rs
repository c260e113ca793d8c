use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::domain::id::{Project, Region, Zone};
use crate::error::Error;

const COMPUTE_API_PREFIX: &str = "https://www.googleapis.com/compute/v1/";

/// Where a managed instance group lives.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupLocation {
    Region(Region),
    Zone(Zone),
}

impl fmt::Display for GroupLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupLocation::Region(region) => write!(f, "regions/{}", region),
            GroupLocation::Zone(zone) => write!(f, "zones/{}", zone),
        }
    }
}

/// The managed instance group backing all nodes of one role.
///
/// Only identity is held here. The target size is always re-read from the
/// fleet manager and never cached on this type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct InstanceGroup {
    pub name: String,
    pub location: GroupLocation,
    pub project: Project,
}

impl fmt::Display for InstanceGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "projects/{}/{}/instanceGroupManagers/{}", self.project, self.location, self.name)
    }
}

/// Parses the `created-by` instance metadata value, e.g.
/// `projects/123456/regions/europe-west1/instanceGroupManagers/workers`.
/// A full compute API URL is accepted as well.
impl FromStr for InstanceGroup {
    type Err = Error;

    fn from_str(created_by: &str) -> Result<Self, Self::Err> {
        let unrecognized = || Error::UnrecognizedCreatedBy(created_by.to_string());
        let path = created_by.trim().strip_prefix(COMPUTE_API_PREFIX).unwrap_or(created_by.trim());

        let segments: Vec<&str> = path.split('/').collect();
        let [projects, project, scope, location, managers, name] = segments.as_slice() else {
            return Err(unrecognized());
        };

        if *projects != "projects" || *managers != "instanceGroupManagers" {
            return Err(unrecognized());
        }
        if [project, location, name].iter().any(|s| s.is_empty()) {
            return Err(unrecognized());
        }

        let location = match *scope {
            "regions" => GroupLocation::Region(Region::new(*location)),
            "zones" => GroupLocation::Zone(Zone::new(*location)),
            _ => return Err(unrecognized()),
        };

        Ok(InstanceGroup { name: name.to_string(), location, project: Project::new(*project) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_regional_reference() {
        let group: InstanceGroup = "projects/123456/regions/europe-west1/instanceGroupManagers/k8s-workers".parse().unwrap();
        assert_eq!(group.name, "k8s-workers");
        assert_eq!(group.project, Project::new("123456"));
        assert_eq!(group.location, GroupLocation::Region(Region::new("europe-west1")));
        assert_eq!(group.to_string(), "projects/123456/regions/europe-west1/instanceGroupManagers/k8s-workers");
    }

    #[test]
    fn parses_zonal_reference_and_api_urls() {
        let group: InstanceGroup =
            "https://www.googleapis.com/compute/v1/projects/acme/zones/us-east1-b/instanceGroupManagers/masters".parse().unwrap();
        assert_eq!(group.location, GroupLocation::Zone(Zone::new("us-east1-b")));
        assert_eq!(group.project, Project::new("acme"));
    }

    #[test]
    fn rejects_anything_else() {
        for bad in [
            "",
            "projects/1/regions/europe-west1/instanceGroups/workers",
            "projects/1/global/europe-west1/instanceGroupManagers/workers",
            "projects/1/regions/europe-west1/instanceGroupManagers/",
            "projects/1/regions/europe-west1/instanceGroupManagers/workers/extra",
            "workers",
        ] {
            assert!(matches!(bad.parse::<InstanceGroup>(), Err(Error::UnrecognizedCreatedBy(_))), "accepted '{}'", bad);
        }
    }
}
