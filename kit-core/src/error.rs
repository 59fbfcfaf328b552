//! Reconcile error taxonomy

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::provider::ProviderError;

/// Remote call a failure happened in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Describe,
    Create,
    Wait,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operation::Describe => "describing",
            Operation::Create => "creating",
            Operation::Wait => "waiting for",
            Operation::Delete => "deleting",
        };
        f.write_str(s)
    }
}

/// Prerequisite produced by a sibling controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dependency {
    AddressAllocation,
    Subnet,
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dependency::AddressAllocation => f.write_str("elastic IP allocation"),
            Dependency::Subnet => f.write_str("private subnet"),
        }
    }
}

/// Errors returned from a reconcile or finalize pass
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The remote provider call failed
    #[error("{operation} nat-gateway for {owner}: {source}")]
    Transport {
        operation: Operation,
        owner: String,
        #[source]
        source: ProviderError,
    },

    /// More than one active gateway carries this owner's tags
    #[error(
        "expected at most one active nat-gateway for {owner}, found {}: {}",
        .ids.len(),
        .ids.join(", ")
    )]
    AmbiguousState { owner: String, ids: Vec<String> },

    /// A prerequisite has not been recorded on the owner yet
    #[error("{dependency} for {owner} does not exist yet")]
    WaitingForDependency { owner: String, dependency: Dependency },

    /// The created gateway did not become available in time
    #[error("nat-gateway {gateway_id} for {owner} not available after {timeout:?}")]
    CreateTimeout {
        owner: String,
        gateway_id: String,
        timeout: Duration,
    },

    /// The pass was cancelled or hit its deadline
    #[error("{operation} nat-gateway for {owner} was cancelled")]
    Cancelled { operation: Operation, owner: String },
}

impl ReconcileError {
    pub fn transport(operation: Operation, owner: impl Into<String>, source: ProviderError) -> Self {
        Self::Transport {
            operation,
            owner: owner.into(),
            source,
        }
    }

    pub fn waiting_for(dependency: Dependency, owner: impl Into<String>) -> Self {
        Self::WaitingForDependency {
            owner: owner.into(),
            dependency,
        }
    }

    /// "Not ready yet": the scheduler retries without escalating
    pub fn is_waiting_for_dependency(&self) -> bool {
        matches!(self, ReconcileError::WaitingForDependency { .. })
    }

    /// Failures no amount of retrying will fix without a human
    pub fn requires_operator(&self) -> bool {
        matches!(self, ReconcileError::AmbiguousState { .. })
    }

    /// Owner the failing pass was running for
    pub fn owner(&self) -> &str {
        match self {
            ReconcileError::Transport { owner, .. }
            | ReconcileError::AmbiguousState { owner, .. }
            | ReconcileError::WaitingForDependency { owner, .. }
            | ReconcileError::CreateTimeout { owner, .. }
            | ReconcileError::Cancelled { owner, .. } => owner,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_error_names_operation_and_owner() {
        let err = ReconcileError::transport(
            Operation::Create,
            "alpha",
            ProviderError::new("InsufficientAddressCapacity"),
        );
        assert_eq!(
            err.to_string(),
            "creating nat-gateway for alpha: InsufficientAddressCapacity"
        );
        assert_eq!(err.owner(), "alpha");
    }

    #[test]
    fn ambiguous_state_lists_every_id() {
        let err = ReconcileError::AmbiguousState {
            owner: "beta".to_string(),
            ids: vec!["nat-1".to_string(), "nat-2".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "expected at most one active nat-gateway for beta, found 2: nat-1, nat-2"
        );
        assert!(err.requires_operator());
        assert!(!err.is_waiting_for_dependency());
    }

    #[test]
    fn waiting_for_dependency_is_classified_separately() {
        let err = ReconcileError::waiting_for(Dependency::Subnet, "gamma");
        assert_eq!(err.to_string(), "private subnet for gamma does not exist yet");
        assert!(err.is_waiting_for_dependency());
        assert!(!err.requires_operator());
    }
}
