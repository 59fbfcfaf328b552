//! Owner - The control-plane object a controller converges toward

use serde::{Deserialize, Serialize};

/// Control plane whose infrastructure status the controllers maintain
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlPlane {
    /// Stable name, used as the correlation tag on remote resources
    pub name: String,
    /// Set when the owner is being removed; the next pass runs finalize
    #[serde(default)]
    pub deletion_requested: bool,
    #[serde(default)]
    pub status: ControlPlaneStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlPlaneStatus {
    #[serde(default)]
    pub infrastructure: InfrastructureStatus,
}

/// Identifiers of the remote infrastructure backing a control plane
///
/// `address_allocation_id` and `private_subnet_ids` are written by sibling
/// controllers. `nat_gateway_id` is owned by the NAT gateway controller and is
/// only a cache of the last identifier it saw.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InfrastructureStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_allocation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub private_subnet_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nat_gateway_id: Option<String>,
}

impl ControlPlane {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_address_allocation(mut self, allocation_id: impl Into<String>) -> Self {
        self.status.infrastructure.address_allocation_id = Some(allocation_id.into());
        self
    }

    pub fn with_private_subnets<I, S>(mut self, subnets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.status.infrastructure.private_subnet_ids =
            subnets.into_iter().map(Into::into).collect();
        self
    }

    pub fn is_being_deleted(&self) -> bool {
        self.deletion_requested
    }

    pub fn nat_gateway_id(&self) -> Option<&str> {
        self.status.infrastructure.nat_gateway_id.as_deref()
    }
}
