//! Resource - The managed gateway as observed in the remote provider

use std::collections::BTreeMap;
use std::fmt;

/// Tag key carrying the owner name
pub const OWNER_TAG_KEY: &str = "kit.k8s.sh/cluster-name";

/// Tag key carrying the name of the controller that created the resource
pub const CONTROLLER_TAG_KEY: &str = "kit.k8s.sh/controller";

/// Human readable name tag shown in the provider console
pub const NAME_TAG_KEY: &str = "Name";

/// Tags attached to a remote resource, ordered by key
pub type Tags = BTreeMap<String, String>;

/// Lifecycle state reported by the remote provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GatewayState {
    Pending,
    Available,
    Failed,
    Deleting,
    Deleted,
}

impl GatewayState {
    pub fn as_str(&self) -> &'static str {
        match self {
            GatewayState::Pending => "pending",
            GatewayState::Available => "available",
            GatewayState::Failed => "failed",
            GatewayState::Deleting => "deleting",
            GatewayState::Deleted => "deleted",
        }
    }

    /// Parse the provider's state string. Returns None for states this
    /// controller does not know about.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(GatewayState::Pending),
            "available" => Some(GatewayState::Available),
            "failed" => Some(GatewayState::Failed),
            "deleting" => Some(GatewayState::Deleting),
            "deleted" => Some(GatewayState::Deleted),
            _ => None,
        }
    }

    /// Failed, deleting and deleted gateways form the inactive class. They
    /// are ignored by discovery and never brought back.
    pub fn is_active(&self) -> bool {
        !matches!(
            self,
            GatewayState::Failed | GatewayState::Deleting | GatewayState::Deleted
        )
    }
}

impl fmt::Display for GatewayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A NAT gateway in the remote provider
#[derive(Debug, Clone, PartialEq)]
pub struct NatGateway {
    /// Provider identifier (e.g., nat-0a1b2c3d)
    pub id: String,
    pub state: GatewayState,
    /// Elastic IP allocation bound to the gateway
    pub allocation_id: Option<String>,
    /// Subnet the gateway is placed in
    pub subnet_id: Option<String>,
    pub tags: Tags,
}

impl NatGateway {
    pub fn new(id: impl Into<String>, state: GatewayState) -> Self {
        Self {
            id: id.into(),
            state,
            allocation_id: None,
            subnet_id: None,
            tags: Tags::new(),
        }
    }

    pub fn with_allocation_id(mut self, allocation_id: impl Into<String>) -> Self {
        self.allocation_id = Some(allocation_id.into());
        self
    }

    pub fn with_subnet_id(mut self, subnet_id: impl Into<String>) -> Self {
        self.subnet_id = Some(subnet_id.into());
        self
    }

    pub fn with_tags(mut self, tags: Tags) -> Self {
        self.tags = tags;
        self
    }

    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }
}

/// Build the tags every gateway created by `controller` for `owner` carries
pub fn correlation_tags(controller: &str, owner: &str) -> Tags {
    let mut tags = Tags::new();
    tags.insert(NAME_TAG_KEY.to_string(), format!("{}-{}", owner, controller));
    tags.insert(OWNER_TAG_KEY.to_string(), owner.to_string());
    tags.insert(CONTROLLER_TAG_KEY.to_string(), controller.to_string());
    tags
}

/// Tag filter used to find the gateways one controller created for one owner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagFilter {
    pub controller: String,
    pub owner: String,
}

impl TagFilter {
    pub fn new(controller: impl Into<String>, owner: impl Into<String>) -> Self {
        Self {
            controller: controller.into(),
            owner: owner.into(),
        }
    }

    /// (tag key, tag value) pairs that must all be present
    pub fn pairs(&self) -> [(&'static str, &str); 2] {
        [
            (OWNER_TAG_KEY, self.owner.as_str()),
            (CONTROLLER_TAG_KEY, self.controller.as_str()),
        ]
    }

    pub fn matches(&self, tags: &Tags) -> bool {
        self.pairs()
            .iter()
            .all(|(key, value)| tags.get(*key).map(String::as_str) == Some(*value))
    }
}
