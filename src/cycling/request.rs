use std::fmt;

use crate::domain::node::Role;
use crate::domain::retirement_batch::RetirementTag;
use crate::error::{Error, Result};

/// What one invocation asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleRequest {
    /// Masters first, then workers.
    AllRoles,
    Role(Role),
    /// Drain an existing batch only. Never scales or deletes.
    Resume { role: Role, tag: RetirementTag },
}

impl CycleRequest {
    pub fn from_args(role: Option<&str>, resume: Option<&str>) -> Result<CycleRequest> {
        let role = role.map(str::parse::<Role>).transpose()?;
        match (role, resume) {
            (None, None) => Ok(CycleRequest::AllRoles),
            (Some(role), None) => Ok(CycleRequest::Role(role)),
            (Some(role), Some(tag)) => Ok(CycleRequest::Resume { role, tag: RetirementTag::new(tag)? }),
            (None, Some(_)) => Err(Error::Config("--resume requires --role".to_string())),
        }
    }

    pub fn roles(&self) -> Vec<Role> {
        match self {
            CycleRequest::AllRoles => Role::ALL.to_vec(),
            CycleRequest::Role(role) | CycleRequest::Resume { role, .. } => vec![*role],
        }
    }
}

impl fmt::Display for CycleRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CycleRequest::AllRoles => write!(f, "cycle all roles"),
            CycleRequest::Role(role) => write!(f, "cycle {} nodes", role),
            CycleRequest::Resume { role, tag } => write!(f, "resume draining {} nodes tagged {}", role, tag),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resume_needs_a_role() {
        assert!(matches!(CycleRequest::from_args(None, Some("1700000000")), Err(Error::Config(_))));
        assert_eq!(CycleRequest::from_args(None, None).unwrap().roles(), vec![Role::Master, Role::Worker]);
        assert_eq!(CycleRequest::from_args(Some("worker"), None).unwrap(), CycleRequest::Role(Role::Worker));

        let resume = CycleRequest::from_args(Some("master"), Some("1700000000")).unwrap();
        assert_eq!(resume, CycleRequest::Resume { role: Role::Master, tag: RetirementTag::new("1700000000").unwrap() });
    }

    #[test]
    fn rejects_unknown_roles_and_bad_tags() {
        assert!(CycleRequest::from_args(Some("etcd"), None).is_err());
        assert!(CycleRequest::from_args(Some("worker"), Some("not a tag")).is_err());
    }
}
