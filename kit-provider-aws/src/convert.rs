//! Conversion between EC2 SDK types and the core gateway model

use aws_sdk_ec2::types::{
    Filter, NatGateway as Ec2NatGateway, ResourceType, Tag, TagSpecification,
};
use kit_core::resource::{GatewayState, NatGateway, TagFilter, Tags};
use log::debug;

/// Build the describe filters for a tag filter (`tag:<key>` = value)
pub fn tag_filters(filter: &TagFilter) -> Vec<Filter> {
    filter
        .pairs()
        .iter()
        .map(|(key, value)| {
            Filter::builder()
                .name(format!("tag:{}", key))
                .values(*value)
                .build()
        })
        .collect()
}

/// Tag specification applied to the gateway at creation time
pub fn tag_specification(tags: &Tags) -> TagSpecification {
    let mut spec = TagSpecification::builder().resource_type(ResourceType::Natgateway);
    for (key, value) in tags {
        spec = spec.tags(Tag::builder().key(key).value(value).build());
    }
    spec.build()
}

/// Error codes EC2 returns for a gateway ID it cannot see (yet)
const NOT_FOUND_CODES: [&str; 2] = ["NatGatewayNotFound", "InvalidNatGatewayID.NotFound"];

/// Whether a service error code means the gateway is not visible
///
/// Describing by ID right after a create can report the gateway as missing
/// until EC2 catches up; callers treat that as absence, not failure.
pub fn is_not_found(code: Option<&str>) -> bool {
    code.is_some_and(|code| NOT_FOUND_CODES.contains(&code))
}

/// Map an EC2 state string into the core lifecycle state
///
/// States the controller does not recognise are treated as pending, so they
/// count as active and are never silently replaced.
pub fn gateway_state(state: Option<&str>) -> GatewayState {
    match state.and_then(GatewayState::parse) {
        Some(state) => state,
        None => {
            debug!("Treating nat-gateway state {:?} as pending", state);
            GatewayState::Pending
        }
    }
}

/// Convert an EC2 NAT gateway. Returns None when the response carries no ID.
pub fn gateway_from_sdk(gateway: &Ec2NatGateway) -> Option<NatGateway> {
    let id = gateway.nat_gateway_id().filter(|id| !id.is_empty())?;
    let state = gateway_state(gateway.state().map(|s| s.as_str()));

    let tags: Tags = gateway
        .tags()
        .iter()
        .filter_map(|tag| match (tag.key(), tag.value()) {
            (Some(key), Some(value)) => Some((key.to_string(), value.to_string())),
            _ => None,
        })
        .collect();

    let mut result = NatGateway::new(id, state).with_tags(tags);
    if let Some(allocation_id) = gateway
        .nat_gateway_addresses()
        .iter()
        .find_map(|address| address.allocation_id())
    {
        result = result.with_allocation_id(allocation_id);
    }
    if let Some(subnet_id) = gateway.subnet_id() {
        result = result.with_subnet_id(subnet_id);
    }
    Some(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_ec2::types::{NatGatewayAddress, NatGatewayState};
    use kit_core::resource::{CONTROLLER_TAG_KEY, OWNER_TAG_KEY, correlation_tags};

    #[test]
    fn converts_full_gateway() {
        let sdk = Ec2NatGateway::builder()
            .nat_gateway_id("nat-0abc")
            .state(NatGatewayState::Available)
            .subnet_id("subnet-1")
            .nat_gateway_addresses(
                NatGatewayAddress::builder()
                    .allocation_id("eipalloc-1")
                    .build(),
            )
            .tags(Tag::builder().key(OWNER_TAG_KEY).value("alpha").build())
            .tags(Tag::builder().key("orphan").build())
            .build();

        let gateway = gateway_from_sdk(&sdk).unwrap();
        assert_eq!(gateway.id, "nat-0abc");
        assert_eq!(gateway.state, GatewayState::Available);
        assert_eq!(gateway.allocation_id.as_deref(), Some("eipalloc-1"));
        assert_eq!(gateway.subnet_id.as_deref(), Some("subnet-1"));
        assert_eq!(gateway.tags.len(), 1);
        assert_eq!(gateway.tags.get(OWNER_TAG_KEY).unwrap(), "alpha");
    }

    #[test]
    fn gateway_without_id_is_skipped() {
        let sdk = Ec2NatGateway::builder()
            .state(NatGatewayState::Pending)
            .build();
        assert!(gateway_from_sdk(&sdk).is_none());
    }

    #[test]
    fn inactive_states_map_to_inactive_class() {
        for state in [
            NatGatewayState::Failed,
            NatGatewayState::Deleting,
            NatGatewayState::Deleted,
        ] {
            assert!(!gateway_state(Some(state.as_str())).is_active());
        }
        assert_eq!(gateway_state(None), GatewayState::Pending);
        assert_eq!(gateway_state(Some("rebooting")), GatewayState::Pending);
    }

    #[test]
    fn not_found_codes_mean_absence() {
        assert!(is_not_found(Some("NatGatewayNotFound")));
        assert!(is_not_found(Some("InvalidNatGatewayID.NotFound")));
        assert!(!is_not_found(Some("UnauthorizedOperation")));
        assert!(!is_not_found(Some("RequestLimitExceeded")));
        assert!(!is_not_found(None));
    }

    #[test]
    fn not_found_service_error_is_classified() {
        use aws_sdk_ec2::error::{ErrorMetadata, ProvideErrorMetadata};
        use aws_sdk_ec2::operation::describe_nat_gateways::DescribeNatGatewaysError;

        let err = DescribeNatGatewaysError::generic(
            ErrorMetadata::builder()
                .code("NatGatewayNotFound")
                .message("The Nat Gateway nat-0abc was not found")
                .build(),
        );
        assert!(is_not_found(err.code()));

        let err = DescribeNatGatewaysError::generic(
            ErrorMetadata::builder().code("AuthFailure").build(),
        );
        assert!(!is_not_found(err.code()));
    }

    #[test]
    fn filters_use_tag_prefix() {
        let filters = tag_filters(&TagFilter::new("natgateway", "alpha"));
        assert_eq!(filters.len(), 2);
        assert_eq!(filters[0].name(), Some("tag:kit.k8s.sh/cluster-name"));
        assert_eq!(filters[0].values(), ["alpha".to_string()]);
        assert_eq!(filters[1].name(), Some("tag:kit.k8s.sh/controller"));
    }

    #[test]
    fn tag_specification_targets_nat_gateways() {
        let spec = tag_specification(&correlation_tags("natgateway", "alpha"));
        assert_eq!(spec.resource_type(), Some(&ResourceType::Natgateway));
        assert!(
            spec.tags()
                .iter()
                .any(|t| t.key() == Some(CONTROLLER_TAG_KEY) && t.value() == Some("natgateway"))
        );
    }
}
