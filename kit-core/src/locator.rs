//! Locator - Find the one live gateway belonging to an owner

use log::debug;

use crate::error::{Operation, ReconcileError};
use crate::provider::GatewayApi;
use crate::resource::{NatGateway, TagFilter};

/// Split gateways into (active, inactive)
pub fn partition_active(gateways: Vec<NatGateway>) -> (Vec<NatGateway>, Vec<NatGateway>) {
    gateways.into_iter().partition(NatGateway::is_active)
}

/// Reduce a discovery result to at most one active gateway
///
/// Inactive gateways are dropped. Two or more active gateways are never
/// resolved by picking one; they surface as [`ReconcileError::AmbiguousState`].
pub fn single_active(
    owner: &str,
    gateways: Vec<NatGateway>,
) -> Result<Option<NatGateway>, ReconcileError> {
    let (mut active, inactive) = partition_active(gateways);
    for gateway in &inactive {
        debug!(
            "Ignoring nat-gateway {} for {} in state {}",
            gateway.id, owner, gateway.state
        );
    }

    match active.len() {
        0 => Ok(None),
        1 => Ok(active.pop()),
        _ => Err(ReconcileError::AmbiguousState {
            owner: owner.to_string(),
            ids: active.into_iter().map(|g| g.id).collect(),
        }),
    }
}

/// Query the provider for gateways tagged for `filter` and return the live one
pub async fn locate<P>(api: &P, filter: &TagFilter) -> Result<Option<NatGateway>, ReconcileError>
where
    P: GatewayApi + ?Sized,
{
    let gateways = api
        .describe(filter)
        .await
        .map_err(|e| ReconcileError::transport(Operation::Describe, &filter.owner, e))?;
    single_active(&filter.owner, gateways)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::memory::{FailOn, MemoryGateway};
    use crate::resource::{GatewayState, correlation_tags};

    fn gateway(id: &str, state: GatewayState) -> NatGateway {
        NatGateway::new(id, state).with_tags(correlation_tags("natgateway", "alpha"))
    }

    #[test]
    fn nothing_found_is_absent() {
        assert_eq!(single_active("alpha", vec![]).unwrap(), None);
    }

    #[test]
    fn inactive_gateways_are_ignored() {
        let found = single_active(
            "alpha",
            vec![
                gateway("nat-1", GatewayState::Failed),
                gateway("nat-2", GatewayState::Deleted),
                gateway("nat-3", GatewayState::Deleting),
            ],
        )
        .unwrap();
        assert_eq!(found, None);
    }

    #[test]
    fn single_active_among_inactive_is_returned() {
        let found = single_active(
            "alpha",
            vec![
                gateway("nat-1", GatewayState::Failed),
                gateway("nat-2", GatewayState::Pending),
            ],
        )
        .unwrap()
        .unwrap();
        assert_eq!(found.id, "nat-2");
    }

    #[test]
    fn two_active_is_ambiguous() {
        let err = single_active(
            "alpha",
            vec![
                gateway("nat-1", GatewayState::Available),
                gateway("nat-2", GatewayState::Deleted),
                gateway("nat-3", GatewayState::Pending),
            ],
        )
        .unwrap_err();
        match err {
            ReconcileError::AmbiguousState { owner, ids } => {
                assert_eq!(owner, "alpha");
                assert_eq!(ids, vec!["nat-1".to_string(), "nat-3".to_string()]);
            }
            other => panic!("Expected AmbiguousState, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn locate_filters_by_owner_tag() {
        let api = MemoryGateway::new();
        api.insert(gateway("nat-1", GatewayState::Available)).await;
        api.insert(
            NatGateway::new("nat-2", GatewayState::Available)
                .with_tags(correlation_tags("natgateway", "beta")),
        )
        .await;

        let found = locate(&api, &TagFilter::new("natgateway", "alpha"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, "nat-1");
    }

    #[tokio::test]
    async fn describe_failure_is_transport_error() {
        let api = MemoryGateway::new();
        api.fail_next(FailOn::Describe).await;

        let err = locate(&api, &TagFilter::new("natgateway", "alpha"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ReconcileError::Transport {
                operation: Operation::Describe,
                ..
            }
        ));
    }
}
