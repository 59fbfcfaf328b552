//! Dependency resolution from the owner's recorded status

use crate::error::{Dependency, ReconcileError};
use crate::owner::InfrastructureStatus;

/// Prerequisites a NAT gateway is created against
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependencies {
    pub allocation_id: String,
    /// First private subnet; placement among several subnets is not chosen
    pub subnet_id: String,
}

/// Read the elastic IP allocation and private subnet from `status`
///
/// Missing values are not failures: they yield
/// [`ReconcileError::WaitingForDependency`] so the pass is retried once the
/// sibling controllers have caught up.
pub fn resolve(owner: &str, status: &InfrastructureStatus) -> Result<Dependencies, ReconcileError> {
    let allocation_id = status
        .address_allocation_id
        .as_deref()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ReconcileError::waiting_for(Dependency::AddressAllocation, owner))?;

    let subnet_id = status
        .private_subnet_ids
        .first()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ReconcileError::waiting_for(Dependency::Subnet, owner))?;

    Ok(Dependencies {
        allocation_id: allocation_id.to_string(),
        subnet_id: subnet_id.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(allocation: Option<&str>, subnets: &[&str]) -> InfrastructureStatus {
        InfrastructureStatus {
            address_allocation_id: allocation.map(String::from),
            private_subnet_ids: subnets.iter().map(|s| s.to_string()).collect(),
            nat_gateway_id: None,
        }
    }

    #[test]
    fn first_subnet_wins() {
        let deps = resolve("alpha", &status(Some("eipalloc-1"), &["subnet-1", "subnet-2"])).unwrap();
        assert_eq!(deps.allocation_id, "eipalloc-1");
        assert_eq!(deps.subnet_id, "subnet-1");
    }

    #[test]
    fn missing_allocation_waits() {
        let err = resolve("alpha", &status(None, &["subnet-1"])).unwrap_err();
        assert!(matches!(
            err,
            ReconcileError::WaitingForDependency {
                dependency: Dependency::AddressAllocation,
                ..
            }
        ));
    }

    #[test]
    fn empty_allocation_waits() {
        let err = resolve("alpha", &status(Some(""), &["subnet-1"])).unwrap_err();
        assert!(err.is_waiting_for_dependency());
    }

    #[test]
    fn empty_subnet_list_waits() {
        let err = resolve("alpha", &status(Some("eipalloc-1"), &[])).unwrap_err();
        assert!(matches!(
            err,
            ReconcileError::WaitingForDependency {
                dependency: Dependency::Subnet,
                ..
            }
        ));
    }
}
